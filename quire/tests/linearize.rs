//! Fast Web View layout checks on a three-page document.

use quire::build::{text_content, CatalogBuilder, PageBuilder};
use quire::file::{File, LoadOptions};
use quire::object::ObjRef;
use quire::object::Resolve;
use quire::write::SaveOptions;

fn three_page_bytes() -> Vec<u8> {
    let pages = (0..3)
        .map(|i| {
            let mut page =
                PageBuilder::from_content(text_content("F1", 9.0, 10.0, 80.0, &format!("p{}", i)));
            page.size(100.0, 100.0);
            page.standard_font("F1", "Helvetica");
            page
        })
        .collect();
    CatalogBuilder::from_pages(pages)
        .build_file(LoadOptions::default())
        .unwrap()
        .save_with(&SaveOptions {
            linearize: true,
            ..SaveOptions::default()
        })
        .unwrap()
}

#[test]
fn linearized_structure() {
    let bytes = three_page_bytes();
    let file = File::from_data(bytes.clone()).unwrap();

    // the resolver notices the linearization dictionary up front
    assert!(file.is_linearized());
    // two xref sections: the first-page section and the main one
    assert_eq!(file.storage().xref_table().revisions().len(), 2);

    // the first object is the linearization parameter dictionary
    let lin = file
        .resolve(ObjRef { num: 1, gen: 0 })
        .unwrap()
        .into_dictionary(&quire::object::NoResolve)
        .unwrap();
    assert_eq!(lin.get("Linearized").unwrap().as_integer().unwrap(), 1);
    assert_eq!(lin.get("N").unwrap().as_integer().unwrap(), 3);

    // /L is the final file length
    assert_eq!(
        lin.get("L").unwrap().as_integer().unwrap(),
        bytes.len() as i64
    );

    // /O is the object number of the first page
    let first_page = file.get_page(0).unwrap();
    assert_eq!(
        lin.get("O").unwrap().as_integer().unwrap(),
        first_page.get_ref().num as i64
    );

    // /T points at the main xref section
    let t = lin.get("T").unwrap().as_integer().unwrap() as usize;
    assert!(bytes[t..].starts_with(b"xref"));

    // /H names the hint stream span
    let h = lin.get("H").unwrap().as_array().unwrap();
    assert_eq!(h.len(), 2);
    let h0 = h[0].as_integer().unwrap() as usize;
    assert!(h0 > 0 && h0 < bytes.len());

    // all three pages still read back
    for i in 0..3 {
        let page = file.get_page(i).unwrap();
        assert!(page.contents.is_some());
    }
}

#[test]
fn linearized_output_is_deterministic() {
    assert_eq!(three_page_bytes(), three_page_bytes());
}
