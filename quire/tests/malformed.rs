//! Hostile and broken inputs must fail cleanly, never hang or blow up.

use quire::file::{File, LoadOptions};

#[test]
fn truncated_garbage_is_rejected() {
    assert!(File::from_data(b"startxref%PDF-".as_ref().to_vec()).is_err());
    assert!(File::from_data(b"%PDF-startxref>".as_ref().to_vec()).is_err());
    assert!(File::from_data(b"%PDF-startxref<".as_ref().to_vec()).is_err());
    assert!(File::from_data(Vec::new()).is_err());
}

#[test]
fn prev_chain_loops_are_detected() {
    // a trailer whose /Prev points back at its own xref section
    let mut data = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n".to_vec();
    let xref_pos = data.len();
    data.extend_from_slice(b"xref\n0 2\n0000000000 65535 f \n0000000009 00000 n \n");
    data.extend_from_slice(
        format!(
            "trailer\n<< /Size 2 /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
            xref_pos, xref_pos
        )
        .as_bytes(),
    );
    // strict mode surfaces the cycle; tolerant mode may repair, but must
    // not spin
    assert!(File::with_options(data, b"", LoadOptions::strict()).is_err());
}

#[test]
fn xref_offset_outside_file_is_an_error_when_strict() {
    let data = b"%PDF-1.4\ntrailer\n<< /Size 1 >>\nstartxref\n99999\n%%EOF\n".to_vec();
    assert!(File::with_options(data, b"", LoadOptions::strict()).is_err());
}
