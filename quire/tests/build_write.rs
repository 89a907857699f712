//! End-to-end authoring: build a document in memory, serialize it, and
//! check the emitted bytes and their re-parse.

use quire::build::{text_content, CatalogBuilder, PageBuilder};
use quire::file::{File, LoadOptions};
use quire::object::types::Rectangle;
use quire::write::SaveOptions;

fn one_page_hello() -> File<Vec<u8>> {
    let mut page = PageBuilder::from_content(text_content("F1", 12.0, 100.0, 700.0, "Hello"));
    page.size(595.0, 842.0);
    page.standard_font("F1", "Helvetica");
    CatalogBuilder::from_pages(vec![page])
        .build_file(LoadOptions::default())
        .unwrap()
}

#[test]
fn minimal_document_layout() {
    let bytes = one_page_hello().save_with(&SaveOptions::default()).unwrap();

    assert!(bytes.starts_with(b"%PDF-1.7\n%"));
    // binary marker: four bytes over 0x80 right after the header comment sign
    let marker = &bytes[10..14];
    assert!(marker.iter().all(|&b| b >= 0x80), "marker {:?}", marker);

    let text = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
    assert!(text(b"/Type/Catalog"));
    assert!(text(b"/Type/Pages"));
    assert!(text(b"/Count 1"));
    assert!(text(b"/Type/Page"));
    assert!(text(b"/BaseFont/Helvetica"));
    assert!(text(b"(Hello)"));
    assert!(text(b"/MediaBox[0 0 595 842]"));
    assert!(text(b"startxref\n"));
    assert!(bytes.ends_with(b"%%EOF\n"));
}

#[test]
fn reparses_to_the_same_shape() {
    let bytes = one_page_hello().save_with(&SaveOptions::default()).unwrap();
    let file = File::from_data(bytes).unwrap();

    assert_eq!(file.num_pages(), 1);
    let page = file.get_page(0).unwrap();
    assert_eq!(page.media_box().unwrap(), Rectangle::new(0., 0., 595., 842.));

    let content = page.contents.as_ref().expect("page has contents");
    let ops: Vec<&str> = content
        .operations
        .iter()
        .map(|op| op.operator.as_str())
        .collect();
    assert_eq!(ops, vec!["BT", "Tf", "Td", "Tj", "ET"]);
}

#[test]
fn deterministic_output_is_byte_identical() {
    let a = one_page_hello().save_with(&SaveOptions::default()).unwrap();
    let b = one_page_hello().save_with(&SaveOptions::default()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn version_controls_the_header() {
    let options = SaveOptions {
        version: (1, 4),
        ..SaveOptions::default()
    };
    let bytes = one_page_hello().save_with(&options).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4\n"));
}

#[test]
fn compressed_content_streams_round_trip() {
    let options = SaveOptions {
        compression_level: 9,
        ..SaveOptions::default()
    };
    let bytes = one_page_hello().save_with(&options).unwrap();
    let text = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
    assert!(text(b"/Filter/FlateDecode"));
    assert!(!text(b"(Hello)"));

    let file = File::from_data(bytes).unwrap();
    let page = file.get_page(0).unwrap();
    let content = page.contents.as_ref().unwrap();
    assert_eq!(content.operations[3].operator, "Tj");
}

#[test]
fn xref_stream_and_table_forms_are_equivalent() {
    let classic = one_page_hello().save_with(&SaveOptions::default()).unwrap();
    let streamed = one_page_hello()
        .save_with(&SaveOptions {
            xref_streams: true,
            ..SaveOptions::default()
        })
        .unwrap();
    assert_ne!(classic, streamed);

    let a = File::from_data(classic).unwrap();
    let b = File::from_data(streamed).unwrap();
    assert_eq!(a.num_pages(), b.num_pages());
    assert_eq!(
        a.get_page(0).unwrap().contents,
        b.get_page(0).unwrap().contents
    );
}

#[test]
fn object_streams_pack_and_reparse() {
    let bytes = one_page_hello()
        .save_with(&SaveOptions {
            object_streams: true,
            ..SaveOptions::default()
        })
        .unwrap();
    let text = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
    assert!(text(b"/Type/ObjStm"));
    assert!(text(b"/Type/XRef"));

    let file = File::from_data(bytes).unwrap();
    assert_eq!(file.num_pages(), 1);
    let page = file.get_page(0).unwrap();
    assert_eq!(page.contents.as_ref().unwrap().operations.len(), 5);
}

#[test]
fn cancellation_aborts_cleanly() {
    let options = SaveOptions::default();
    options.cancel.cancel();
    match one_page_hello().save_with(&options) {
        Err(quire::PdfError::Cancelled) => {}
        other => panic!("expected Cancelled, got {:?}", other.map(|v| v.len())),
    }
}
