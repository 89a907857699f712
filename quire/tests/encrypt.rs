//! Encryption round-trips at every supported security level.

use quire::build::{text_content, CatalogBuilder, PageBuilder};
use quire::crypt::{AuthLevel, EncryptionConfig, EncryptionLevel, Permissions};
use quire::file::{File, LoadOptions};
use quire::write::SaveOptions;
use quire::PdfError;

fn secret_document_bytes(level: EncryptionLevel) -> Vec<u8> {
    let mut page = PageBuilder::from_content(text_content("F1", 12.0, 100.0, 700.0, "Hello"));
    page.size(595.0, 842.0);
    page.standard_font("F1", "Helvetica");
    let file = CatalogBuilder::from_pages(vec![page])
        .build_file(LoadOptions::default())
        .unwrap();

    let options = SaveOptions {
        encryption: Some(EncryptionConfig {
            owner_password: "owner".into(),
            user_password: "user".into(),
            permissions: Permissions::PRINT,
            encrypt_metadata: true,
            level,
        }),
        ..SaveOptions::default()
    };
    file.save_with(&options).unwrap()
}

fn assert_hello_hidden(bytes: &[u8]) {
    assert!(
        !bytes.windows(5).any(|w| w == b"Hello"),
        "plaintext leaked into the encrypted output"
    );
}

fn assert_decrypts(bytes: Vec<u8>) {
    // the user password opens the document and decodes the content
    let file = File::from_data_password(bytes.clone(), b"user").unwrap();
    assert_eq!(file.auth_level(), Some(AuthLevel::User));
    let page = file.get_page(0).unwrap();
    let content = page.contents.as_ref().unwrap();
    let tj = &content.operations[3];
    assert_eq!(tj.operator, "Tj");
    assert_eq!(
        tj.operands[0].as_string().unwrap().as_bytes(),
        b"Hello"
    );

    // the owner password authenticates regardless of /P
    let owner = File::from_data_password(bytes.clone(), b"owner").unwrap();
    assert_eq!(owner.auth_level(), Some(AuthLevel::Owner));

    // a wrong password is a CryptoAuth failure
    match File::from_data_password(bytes, b"wrong") {
        Err(PdfError::CryptoAuth) => {}
        Err(e) => panic!("expected CryptoAuth, got {:?}", e),
        Ok(_) => panic!("wrong password must not open the file"),
    }
}

#[test]
fn rc4_40_document() {
    let bytes = secret_document_bytes(EncryptionLevel::V1);
    assert_hello_hidden(&bytes);
    assert_decrypts(bytes);
}

#[test]
fn rc4_128_document() {
    let bytes = secret_document_bytes(EncryptionLevel::V2);
    assert_hello_hidden(&bytes);
    assert_decrypts(bytes);
}

#[test]
fn aes_128_document() {
    let bytes = secret_document_bytes(EncryptionLevel::V4);
    assert_hello_hidden(&bytes);
    assert_decrypts(bytes);
}

#[test]
fn aes_256_document() {
    let bytes = secret_document_bytes(EncryptionLevel::V5);
    assert_hello_hidden(&bytes);
    assert_decrypts(bytes);
}

#[test]
fn encrypted_output_is_deterministic() {
    let a = secret_document_bytes(EncryptionLevel::V2);
    let b = secret_document_bytes(EncryptionLevel::V2);
    assert_eq!(a, b);
}

#[test]
fn encrypt_dictionary_stays_plaintext() {
    let bytes = secret_document_bytes(EncryptionLevel::V2);
    let text = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
    assert!(text(b"/Filter/Standard"));
    assert!(text(b"/R 3"));
}
