//! Parse a hand-assembled file and push it back out: the graph that comes
//! out the far side must match.

use quire::file::{File, LoadOptions};
use quire::primitive::Primitive;
use quire::write::SaveOptions;
use quire::PdfError;

/// A small one-page file exercising an indirect `/Length`, escapes in
/// literal strings, hex strings and `#`-escaped names. Offsets are
/// computed, not hard-coded.
fn handmade_pdf(annots: Option<&str>) -> Vec<u8> {
    let content = b"BT (Par\\(en\\)s and \\134 escapes) Tj ET";
    let annots_entry = annots.map(|a| format!(" /Annots {}", a)).unwrap_or_default();
    let bodies: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R /Lang (en#) >>".into(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".into(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] /Contents 4 0 R{} /PieceInfo << /Quick#20Look << /Hex <414243> >> >> >>",
            annots_entry
        ),
        format!(
            "<< /Length 5 0 R >>\nstream\n{}\nendstream",
            std::str::from_utf8(content).unwrap()
        ),
        format!("{}", content.len()),
    ];

    let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in bodies.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_pos = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", bodies.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            bodies.len() + 1,
            xref_pos
        )
        .as_bytes(),
    );
    out
}

#[test]
fn parse_and_reserialize() {
    let original = handmade_pdf(None);
    let file = File::from_data(original).unwrap();
    assert_eq!(file.num_pages(), 1);

    let page = file.get_page(0).unwrap();
    let content = page.contents.clone().unwrap();
    assert_eq!(content.operations.len(), 3);
    assert_eq!(
        content.operations[1].operands[0],
        Primitive::String(quire::primitive::PdfString::new(
            &b"Par(en)s and \\ escapes"[..]
        ))
    );

    // the #-escaped name round-tripped into its byte form
    assert!(page.other.get("PieceInfo").is_some());

    let bytes = file.save_with(&SaveOptions::default()).unwrap();
    let reparsed = File::from_data(bytes).unwrap();
    assert_eq!(reparsed.num_pages(), 1);
    assert_eq!(
        reparsed.get_page(0).unwrap().contents.clone().unwrap(),
        content
    );
    assert_eq!(
        reparsed.get_page(0).unwrap().media_box().unwrap(),
        page.media_box().unwrap()
    );
}

#[test]
fn reserialization_is_stable() {
    let file = File::from_data(handmade_pdf(None)).unwrap();
    let once = file.save_with(&SaveOptions::default()).unwrap();
    let twice = File::from_data(once.clone())
        .unwrap()
        .save_with(&SaveOptions::default())
        .unwrap();
    assert_eq!(once, twice);
}

#[test]
fn dangling_reference_is_null_when_tolerant() {
    let data = handmade_pdf(Some("9 0 R"));
    let file = File::from_data(data).unwrap();
    let page = file.get_page(0).unwrap();
    let annots = page.annotations.load(&file).unwrap();
    assert!(annots.is_empty());
}

#[test]
fn dangling_reference_fails_when_strict() {
    let data = handmade_pdf(Some("9 0 R"));
    let file = File::with_options(data, b"", LoadOptions::strict()).unwrap();
    let page = file.get_page(0).unwrap();
    match page.annotations.load(&file) {
        Err(PdfError::MissingObject { num: 9, .. }) => {}
        other => panic!("expected MissingObject, got {:?}", other.map(|v| v.len())),
    }
}

#[test]
fn broken_startxref_recovers_by_scanning() {
    let mut data = handmade_pdf(None);
    // corrupt the startxref offset
    let pos = data
        .windows(9)
        .rposition(|w| w == b"startxref")
        .unwrap();
    data[pos + 10] = b'9';
    data[pos + 11] = b'9';

    let file = File::from_data(data).unwrap();
    assert!(file.storage().xref_table().is_repaired());
    assert_eq!(file.num_pages(), 1);

    // strict mode refuses instead
    let mut data = handmade_pdf(None);
    let pos = data
        .windows(9)
        .rposition(|w| w == b"startxref")
        .unwrap();
    data[pos + 10] = b'9';
    data[pos + 11] = b'9';
    assert!(File::with_options(data, b"", LoadOptions::strict()).is_err());
}
