//! Incremental updates: append-only revisions that shadow older objects.

use quire::backend::Backend;
use quire::build::{text_content, CatalogBuilder, PageBuilder};
use quire::file::{File, LoadOptions};
use quire::object::types::{Action, Annot, Rectangle};
use quire::object::{Lazy, ObjectWrite};
use quire::primitive::Primitive;
use quire::write::SaveOptions;

fn original_bytes() -> Vec<u8> {
    let mut page = PageBuilder::from_content(text_content("F1", 12.0, 100.0, 700.0, "Hello"));
    page.size(595.0, 842.0);
    page.standard_font("F1", "Helvetica");
    CatalogBuilder::from_pages(vec![page])
        .build_file(LoadOptions::default())
        .unwrap()
        .save_with(&SaveOptions::default())
        .unwrap()
}

#[test]
fn appended_annotation() {
    let bytes1 = original_bytes();
    let startxref1 = bytes1.locate_xref_offset().unwrap();

    let mut file = File::from_data(bytes1.clone()).unwrap();
    let original_id = file.trailer.id.first().cloned().expect("original has an ID");

    let page = file.get_page(0).unwrap();
    let mut updated = (*page).clone();
    let annot = Annot::link(
        Rectangle::new(100., 690., 200., 710.),
        Action::goto_page(page.get_ref()),
    );
    let annots = Primitive::Array(vec![annot.to_primitive(file.storage_mut()).unwrap()]);
    updated.annotations = Lazy::from(annots);
    file.update_page(&page, updated).unwrap();

    let options = SaveOptions {
        incremental: true,
        ..SaveOptions::default()
    };
    let bytes2 = file.save_with(&options).unwrap();

    // the first revision is preserved byte for byte
    assert!(bytes2.len() > bytes1.len());
    assert_eq!(&bytes2[..bytes1.len()], &bytes1[..]);

    let file2 = File::from_data(bytes2).unwrap();

    // the new trailer points back at the previous revision
    assert_eq!(file2.trailer.prev, Some(startxref1 as i64));
    // both revision layers are visible to the resolver
    assert_eq!(file2.storage().xref_table().revisions().len(), 2);
    // the first id half is preserved, the second reminted
    assert_eq!(file2.trailer.id.first(), Some(&original_id));
    assert_ne!(file2.trailer.id.get(1), Some(&original_id));

    // newer entries shadow older: the page now has exactly one annotation
    let page = file2.get_page(0).unwrap();
    let annots = page.annotations.load(&file2).unwrap();
    assert_eq!(annots.len(), 1);
    assert_eq!(annots[0].subtype.as_str(), "Link");
    assert_eq!(
        annots[0].rect.unwrap(),
        Rectangle::new(100., 690., 200., 710.)
    );
}

#[test]
fn untouched_documents_still_resolve_old_objects() {
    let bytes1 = original_bytes();
    let mut file = File::from_data(bytes1).unwrap();

    // change nothing but the info dictionary
    file.set_info(quire::object::types::InfoDict {
        title: Some(quire::primitive::PdfString::new(&b"revised"[..])),
        ..Default::default()
    });
    let bytes2 = file
        .save_with(&SaveOptions {
            incremental: true,
            ..SaveOptions::default()
        })
        .unwrap();

    let file2 = File::from_data(bytes2).unwrap();
    assert_eq!(file2.num_pages(), 1);
    let content = file2.get_page(0).unwrap().contents.clone().unwrap();
    assert_eq!(content.operations.len(), 5);
}
