//! The Standard Security Handler: password-based key derivation, per-object
//! keying, string/stream encryption and decryption for V1 through V5
//! (revisions 2 through 6).

use crate as quire;
use crate::error::*;
use crate::object::ObjRef;
use crate::primitive::{Dict, Name, PdfString, Primitive};

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// The fixed password padding string (ISO 32000-1, 7.6.3.3).
const PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

bitflags::bitflags! {
    /// User access permissions (`/P`). Bit positions per ISO 32000-2
    /// Table 22; all positions outside this set are reserved and written
    /// as 1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        const PRINT = 1 << 2;
        const MODIFY = 1 << 3;
        const COPY = 1 << 4;
        const ANNOTATE = 1 << 5;
        const FILL_FORMS = 1 << 8;
        const EXTRACT_ACCESSIBLE = 1 << 9;
        const ASSEMBLE = 1 << 10;
        const HIGH_RES_PRINT = 1 << 11;
    }
}

impl Permissions {
    /// The signed 32-bit value stored in the encryption dictionary.
    pub fn to_p_value(self) -> i64 {
        (self.bits() | 0xFFFF_F0C0) as i32 as i64
    }
    pub fn from_p_value(p: i64) -> Permissions {
        Permissions::from_bits_truncate(p as u32)
    }
}

/// RC4, the stream cipher of the legacy handlers.
#[derive(Copy)]
pub struct Rc4 {
    i: u8,
    j: u8,
    state: [u8; 256],
}

impl Clone for Rc4 {
    fn clone(&self) -> Rc4 {
        *self
    }
}

impl Rc4 {
    pub fn new(key: &[u8]) -> Rc4 {
        assert!(!key.is_empty() && key.len() <= 256);
        let mut rc4 = Rc4 {
            i: 0,
            j: 0,
            state: [0; 256],
        };
        for (i, x) in rc4.state.iter_mut().enumerate() {
            *x = i as u8;
        }
        let mut j: u8 = 0;
        for i in 0..256 {
            j = j.wrapping_add(rc4.state[i]).wrapping_add(key[i % key.len()]);
            rc4.state.swap(i, j as usize);
        }
        rc4
    }
    fn next(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.state[self.i as usize]);
        self.state.swap(self.i as usize, self.j as usize);
        self.state[(self.state[self.i as usize].wrapping_add(self.state[self.j as usize])) as usize]
    }
    /// XOR the keystream over `data`. Encryption and decryption are the
    /// same operation.
    pub fn apply(key: &[u8], data: &mut [u8]) {
        let mut rc4 = Rc4::new(key);
        for b in data.iter_mut() {
            *b ^= rc4.next();
        }
    }
}

/// The encryption dictionary (`/Filter /Standard`), ISO 32000-2 Tables 20/21.
#[derive(Object, ObjectWrite, Debug, Clone)]
#[pdf(Filter = "Standard")]
pub struct CryptDict {
    #[pdf(key = "V", default = "0")]
    pub v: i64,

    #[pdf(key = "R")]
    pub r: i64,

    #[pdf(key = "O")]
    pub o: PdfString,

    #[pdf(key = "U")]
    pub u: PdfString,

    #[pdf(key = "OE")]
    pub oe: Option<PdfString>,

    #[pdf(key = "UE")]
    pub ue: Option<PdfString>,

    #[pdf(key = "Perms")]
    pub perms: Option<PdfString>,

    #[pdf(key = "P")]
    pub p: i64,

    #[pdf(key = "Length", default = "40")]
    pub bits: i64,

    #[pdf(key = "CF")]
    pub crypt_filters: HashMap<Name, CryptFilter>,

    #[pdf(key = "StmF")]
    pub default_stream_filter: Option<Name>,

    #[pdf(key = "StrF")]
    pub default_string_filter: Option<Name>,

    #[pdf(key = "EncryptMetadata", default = "true")]
    pub encrypt_metadata: bool,

    #[pdf(other)]
    pub other: Dict,
}

#[derive(Object, ObjectWrite, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptMethod {
    None,
    V2,
    AESV2,
    AESV3,
}

#[derive(Object, ObjectWrite, Debug, Clone, Copy)]
pub enum AuthEvent {
    DocOpen,
    EFOpen,
}

#[derive(Object, ObjectWrite, Debug, Clone)]
#[pdf(Type = "CryptFilter?")]
pub struct CryptFilter {
    #[pdf(key = "CFM", default = "CryptMethod::None")]
    pub method: CryptMethod,

    #[pdf(key = "AuthEvent", default = "AuthEvent::DocOpen")]
    pub auth_event: AuthEvent,

    #[pdf(key = "Length")]
    pub length: Option<i64>,

    #[pdf(other)]
    pub other: Dict,
}

/// Which password authenticated. The owner password grants unrestricted
/// access regardless of `/P`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthLevel {
    User,
    Owner,
}

/// What kind of data is passing through the handler. Metadata streams are
/// exempt when `EncryptMetadata` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptClass {
    String,
    Stream,
    Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cipher {
    Rc4,
    Aes128,
    Aes256,
}

/// Holds the file encryption key and performs all per-object work.
pub struct SecurityHandler {
    key: Vec<u8>,
    cipher: Cipher,
    revision: u8,
    encrypt_metadata: bool,
    permissions: Permissions,
    auth: AuthLevel,
    /// The indirect `/Encrypt` dictionary; its strings are stored in the
    /// clear and must not be touched.
    pub(crate) encrypt_ref: Option<ObjRef>,
    // per-object keys are tiny but MD5 on every string adds up
    object_keys: RefCell<HashMap<(ObjRef, bool), Vec<u8>>>,
    /// Seed for deterministic IV generation on the write side.
    iv_seed: [u8; 16],
    iv_counter: RefCell<u64>,
}

impl fmt::Debug for SecurityHandler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SecurityHandler")
            .field("cipher", &self.cipher)
            .field("revision", &self.revision)
            .field("auth", &self.auth)
            .finish()
    }
}

fn pad_password(pass: &[u8]) -> [u8; 32] {
    let mut padded = [0; 32];
    let n = pass.len().min(32);
    padded[..n].copy_from_slice(&pass[..n]);
    padded[n..].copy_from_slice(&PAD[..32 - n]);
    padded
}

/// SASLprep for V5 passwords, truncated to 127 bytes. Raw bytes pass
/// through untouched when they are not UTF-8.
fn prep_password(pass: &[u8]) -> Vec<u8> {
    let prepped = match std::str::from_utf8(pass) {
        Ok(s) => match stringprep::saslprep(s) {
            Ok(p) => p.into_owned().into_bytes(),
            Err(_) => pass.to_vec(),
        },
        Err(_) => pass.to_vec(),
    };
    prepped[..prepped.len().min(127)].to_vec()
}

impl SecurityHandler {
    /// Authenticate `pass` (tried as user, then as owner) and derive the
    /// file key. Fails with `CryptoAuth` if neither password matches.
    pub fn from_password(dict: &CryptDict, file_id: &[u8], pass: &[u8]) -> Result<SecurityHandler> {
        let (key_bits, cipher) = match dict.v {
            1 => (40, Cipher::Rc4),
            2 => (dict.bits, Cipher::Rc4),
            4 => {
                let name = dict
                    .default_stream_filter
                    .as_ref()
                    .map(|n| n.as_str())
                    .unwrap_or("Identity");
                let filter = dict.crypt_filters.get(name).ok_or_else(|| {
                    PdfError::Other {
                        msg: format!("crypt filter /{} not defined in /CF", name),
                    }
                })?;
                let bits = filter.length.map(|n| n * 8).unwrap_or(dict.bits);
                match filter.method {
                    CryptMethod::V2 => (bits, Cipher::Rc4),
                    CryptMethod::AESV2 => (128, Cipher::Aes128),
                    m => bail!("unsupported crypt method {:?} for V4", m),
                }
            }
            5 => (256, Cipher::Aes256),
            v => bail!("unsupported encryption dictionary /V {}", v),
        };
        let revision = match dict.r {
            r @ 2..=6 => r as u8,
            other => bail!("unsupported standard security handler revision {}", other),
        };

        if revision >= 5 {
            Self::v5_with_password(dict, revision, pass)
        } else {
            Self::authenticate_legacy(dict, file_id, pass, key_bits as usize / 8, cipher, revision)
        }
    }

    /// Legacy path (V <= 4): Algorithm 2 for the key, Algorithms 4/5 for
    /// the user check, Algorithm 7 for owner authentication.
    fn authenticate_legacy(
        dict: &CryptDict,
        file_id: &[u8],
        pass: &[u8],
        key_size: usize,
        cipher: Cipher,
        revision: u8,
    ) -> Result<SecurityHandler> {
        // try the password as the user password
        let key = legacy_file_key(dict, file_id, pass, key_size, revision);
        let mut handler = SecurityHandler {
            key,
            cipher,
            revision,
            encrypt_metadata: dict.encrypt_metadata,
            permissions: Permissions::from_p_value(dict.p),
            auth: AuthLevel::User,
            encrypt_ref: None,
            object_keys: RefCell::new(HashMap::new()),
            iv_seed: [0; 16],
            iv_counter: RefCell::new(0),
        };
        if handler.check_user_password(dict, file_id) {
            return Ok(handler);
        }

        // try it as the owner password: peel /O to recover the user
        // password, then re-run the user check (Algorithm 7)
        let owner_key = owner_rc4_key(pass, key_size, revision);
        let mut o = dict.o.as_bytes().to_vec();
        if revision == 2 {
            Rc4::apply(&owner_key, &mut o);
        } else {
            for i in (0..=19u8).rev() {
                let round_key: Vec<u8> = owner_key.iter().map(|&b| b ^ i).collect();
                Rc4::apply(&round_key, &mut o);
            }
        }
        handler.key = legacy_file_key(dict, file_id, &o, key_size, revision);
        if handler.check_user_password(dict, file_id) {
            handler.auth = AuthLevel::Owner;
            return Ok(handler);
        }

        Err(PdfError::CryptoAuth)
    }

    fn check_user_password(&self, dict: &CryptDict, file_id: &[u8]) -> bool {
        let computed = self.compute_u(file_id);
        let document = dict.u.as_bytes();
        match self.revision {
            2 => computed.as_slice() == document,
            _ => document.len() >= 16 && computed[..16] == document[..16],
        }
    }

    /// Algorithm 4 (R2) / Algorithm 5 (R3+).
    fn compute_u(&self, file_id: &[u8]) -> Vec<u8> {
        match self.revision {
            2 => {
                let mut data = PAD.to_vec();
                Rc4::apply(&self.key, &mut data);
                data
            }
            _ => {
                let mut hash = md5::Context::new();
                hash.consume(PAD);
                hash.consume(file_id);
                let mut data = *hash.compute();
                Rc4::apply(&self.key, &mut data);
                for i in 1u8..=19 {
                    let key: Vec<u8> = self.key.iter().map(|&b| b ^ i).collect();
                    Rc4::apply(&key, &mut data);
                }
                data.to_vec()
            }
        }
    }

    /// V5 path: SHA-2 based validation against `/U` and `/O`, file key
    /// unwrapped from `/UE` or `/OE`, `/Perms` integrity check.
    fn v5_with_password(dict: &CryptDict, revision: u8, pass: &[u8]) -> Result<SecurityHandler> {
        let pass = prep_password(pass);
        let u = dict.u.as_bytes();
        let o = dict.o.as_bytes();
        if u.len() < 48 || o.len() < 48 {
            err!(PdfError::CryptoIntegrity {
                msg: "V5 /U or /O shorter than 48 bytes".into(),
            });
        }
        let ue = dict
            .ue
            .as_ref()
            .ok_or(PdfError::CryptoIntegrity {
                msg: "V5 dictionary lacks /UE".into(),
            })?
            .as_bytes();
        let oe = dict
            .oe
            .as_ref()
            .ok_or(PdfError::CryptoIntegrity {
                msg: "V5 dictionary lacks /OE".into(),
            })?
            .as_bytes();

        let (auth, key) = if v5_hash(revision, &pass, &u[32..40], &[]) == u[..32] {
            let intermediate = v5_hash(revision, &pass, &u[40..48], &[]);
            (AuthLevel::User, aes256_unwrap(&intermediate, ue)?)
        } else if v5_hash(revision, &pass, &o[32..40], &u[..48]) == o[..32] {
            let intermediate = v5_hash(revision, &pass, &o[40..48], &u[..48]);
            (AuthLevel::Owner, aes256_unwrap(&intermediate, oe)?)
        } else {
            return Err(PdfError::CryptoAuth);
        };

        // verify /Perms: AES-ECB with the file key, bytes 9..12 spell "adb"
        if let Some(perms) = dict.perms.as_ref() {
            let data = perms.as_bytes();
            if data.len() >= 16 {
                let cipher = aes::Aes256::new_from_slice(&key)
                    .map_err(|_| PdfError::CryptoIntegrity {
                        msg: "bad key length".into(),
                    })?;
                let mut block = GenericArray::clone_from_slice(&data[..16]);
                cipher.decrypt_block(&mut block);
                if &block[9..12] != b"adb" {
                    err!(PdfError::CryptoIntegrity {
                        msg: "/Perms does not decrypt to a valid permission record".into(),
                    });
                }
            }
        }

        Ok(SecurityHandler {
            key,
            cipher: Cipher::Aes256,
            revision,
            encrypt_metadata: dict.encrypt_metadata,
            permissions: Permissions::from_p_value(dict.p),
            auth,
            encrypt_ref: None,
            object_keys: RefCell::new(HashMap::new()),
            iv_seed: [0; 16],
            iv_counter: RefCell::new(0),
        })
    }

    pub fn auth_level(&self) -> AuthLevel {
        self.auth
    }

    /// Effective permissions; owner authentication grants everything.
    pub fn permissions(&self) -> Permissions {
        match self.auth {
            AuthLevel::Owner => Permissions::all(),
            AuthLevel::User => self.permissions,
        }
    }

    pub fn encrypts_metadata(&self) -> bool {
        self.encrypt_metadata
    }

    /// Per-object key for the legacy ciphers (Algorithm 1): the file key,
    /// the low 3 bytes of the object number, the low 2 of the generation,
    /// and `sAlT` for AES, pushed through MD5.
    fn object_key(&self, id: ObjRef, aes: bool) -> Vec<u8> {
        if let Some(key) = self.object_keys.borrow().get(&(id, aes)) {
            return key.clone();
        }
        let n = self.key.len();
        let mut data = Vec::with_capacity(n + 9);
        data.extend_from_slice(&self.key);
        data.extend_from_slice(&id.num.to_le_bytes()[..3]);
        data.extend_from_slice(&id.gen.to_le_bytes()[..2]);
        if aes {
            data.extend_from_slice(b"sAlT");
        }
        let digest = *md5::compute(&data);
        let key = digest[..(n + 5).min(16)].to_vec();
        self.object_keys
            .borrow_mut()
            .insert((id, aes), key.clone());
        key
    }

    fn exempt(&self, id: ObjRef, class: CryptClass) -> bool {
        if self.encrypt_ref == Some(id) {
            return true;
        }
        class == CryptClass::Metadata && !self.encrypt_metadata
    }

    pub fn decrypt(&self, id: ObjRef, data: &[u8], class: CryptClass) -> Result<Vec<u8>> {
        if self.exempt(id, class) {
            return Ok(data.to_vec());
        }
        match self.cipher {
            Cipher::Rc4 => {
                let key = self.object_key(id, false);
                let mut out = data.to_vec();
                Rc4::apply(&key, &mut out);
                Ok(out)
            }
            Cipher::Aes128 => {
                let key = self.object_key(id, true);
                aes_cbc_decrypt(&key, data, true)
            }
            Cipher::Aes256 => aes_cbc_decrypt(&self.key, data, false),
        }
    }

    pub fn encrypt(&self, id: ObjRef, data: &[u8], class: CryptClass) -> Result<Vec<u8>> {
        if self.exempt(id, class) {
            return Ok(data.to_vec());
        }
        match self.cipher {
            Cipher::Rc4 => {
                let key = self.object_key(id, false);
                let mut out = data.to_vec();
                Rc4::apply(&key, &mut out);
                Ok(out)
            }
            Cipher::Aes128 => {
                let key = self.object_key(id, true);
                let iv = self.next_iv(id);
                aes_cbc_encrypt(&key, &iv, data, true)
            }
            Cipher::Aes256 => {
                let iv = self.next_iv(id);
                aes_cbc_encrypt(&self.key, &iv, data, false)
            }
        }
    }

    /// IVs are drawn from a hash chain over the writer's seed, keeping
    /// deterministic output deterministic.
    fn next_iv(&self, id: ObjRef) -> [u8; 16] {
        let mut counter = self.iv_counter.borrow_mut();
        *counter += 1;
        let mut data = Vec::with_capacity(16 + 8 + 10);
        data.extend_from_slice(&self.iv_seed);
        data.extend_from_slice(&counter.to_le_bytes());
        data.extend_from_slice(&id.num.to_le_bytes());
        data.extend_from_slice(&id.gen.to_le_bytes());
        *md5::compute(&data)
    }
}

/// Algorithm 2: the file encryption key for V <= 4.
fn legacy_file_key(
    dict: &CryptDict,
    file_id: &[u8],
    pass: &[u8],
    key_size: usize,
    revision: u8,
) -> Vec<u8> {
    let mut hash = md5::Context::new();
    hash.consume(pad_password(pass));
    hash.consume(dict.o.as_bytes());
    hash.consume((dict.p as i32).to_le_bytes());
    hash.consume(file_id);
    if revision >= 4 && !dict.encrypt_metadata {
        hash.consume([0xff, 0xff, 0xff, 0xff]);
    }
    let mut digest = *hash.compute();
    if revision >= 3 {
        for _ in 0..50 {
            digest = *md5::compute(&digest[..key_size]);
        }
    }
    digest[..key_size].to_vec()
}

/// Algorithm 3, steps a-d: the RC4 key derived from the owner password.
fn owner_rc4_key(owner_pass: &[u8], key_size: usize, revision: u8) -> Vec<u8> {
    let mut digest = *md5::compute(pad_password(owner_pass));
    if revision >= 3 {
        for _ in 0..50 {
            digest = *md5::compute(&digest[..key_size]);
        }
    }
    digest[..key_size].to_vec()
}

/// Algorithm 2.A/2.B hash for R5/R6.
fn v5_hash(revision: u8, pass: &[u8], salt: &[u8], udata: &[u8]) -> [u8; 32] {
    let mut k: Vec<u8> = {
        let mut h = Sha256::new();
        h.update(pass);
        h.update(salt);
        h.update(udata);
        h.finalize().to_vec()
    };
    if revision == 5 {
        return k.try_into().unwrap();
    }
    // R6: the stretched KDF iterating SHA-256/384/512 under AES-128-CBC
    let mut round = 0usize;
    loop {
        let mut k1 = Vec::with_capacity(64 * (pass.len() + k.len() + udata.len()));
        for _ in 0..64 {
            k1.extend_from_slice(pass);
            k1.extend_from_slice(&k);
            k1.extend_from_slice(udata);
        }
        let e = Aes128CbcEnc::new_from_slices(&k[..16], &k[16..32])
            .expect("fixed key sizes")
            .encrypt_padded_vec_mut::<NoPadding>(&k1);
        let sum: u32 = e[..16].iter().map(|&b| b as u32).sum();
        k = match sum % 3 {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };
        round += 1;
        if round >= 64 && (*e.last().unwrap() as usize) <= round - 32 {
            break;
        }
    }
    k[..32].try_into().unwrap()
}

/// Unwrap the 32-byte file key from `/UE` or `/OE`: AES-256-CBC, zero IV,
/// no padding.
fn aes256_unwrap(intermediate: &[u8; 32], wrapped: &[u8]) -> Result<Vec<u8>> {
    if wrapped.len() != 32 {
        err!(PdfError::CryptoIntegrity {
            msg: "wrapped file key is not 32 bytes".into(),
        });
    }
    let mut buf = wrapped.to_vec();
    Aes256CbcDec::new_from_slices(intermediate, &[0u8; 16])
        .expect("fixed key sizes")
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| PdfError::CryptoIntegrity {
            msg: "file key unwrap failed".into(),
        })?;
    Ok(buf)
}

fn aes256_wrap(intermediate: &[u8; 32], key: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new_from_slices(intermediate, &[0u8; 16])
        .expect("fixed key sizes")
        .encrypt_padded_vec_mut::<NoPadding>(key)
}

/// CBC decrypt where the IV is the first 16 bytes of the payload.
fn aes_cbc_decrypt(key: &[u8], data: &[u8], aes128: bool) -> Result<Vec<u8>> {
    if data.len() < 16 || (data.len() - 16) % 16 != 0 {
        err!(PdfError::CryptoIntegrity {
            msg: "AES payload is not a whole number of blocks".into(),
        });
    }
    let (iv, ciphertext) = data.split_at(16);
    let mut buf = ciphertext.to_vec();
    let plain_len = if aes128 {
        Aes128CbcDec::new_from_slices(key, iv)
            .map_err(|_| PdfError::CryptoIntegrity {
                msg: "bad key length".into(),
            })?
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|_| PdfError::CryptoIntegrity {
                msg: "bad PKCS#7 padding".into(),
            })?
            .len()
    } else {
        Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|_| PdfError::CryptoIntegrity {
                msg: "bad key length".into(),
            })?
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|_| PdfError::CryptoIntegrity {
                msg: "bad PKCS#7 padding".into(),
            })?
            .len()
    };
    buf.truncate(plain_len);
    Ok(buf)
}

/// CBC encrypt, emitting `iv || ciphertext`.
fn aes_cbc_encrypt(key: &[u8], iv: &[u8; 16], data: &[u8], aes128: bool) -> Result<Vec<u8>> {
    let ciphertext = if aes128 {
        Aes128CbcEnc::new_from_slices(key, iv)
            .map_err(|_| PdfError::CryptoIntegrity {
                msg: "bad key length".into(),
            })?
            .encrypt_padded_vec_mut::<Pkcs7>(data)
    } else {
        Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(|_| PdfError::CryptoIntegrity {
                msg: "bad key length".into(),
            })?
            .encrypt_padded_vec_mut::<Pkcs7>(data)
    };
    let mut out = Vec::with_capacity(16 + ciphertext.len());
    out.extend_from_slice(iv);
    out.extend(ciphertext);
    Ok(out)
}

/// Security level requested when writing an encrypted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionLevel {
    /// 40-bit RC4 (R2).
    V1,
    /// Up-to-128-bit RC4 (R3).
    V2,
    /// AES-128 through a crypt filter (R4).
    V4,
    /// AES-256 (R6).
    V5,
}

/// Everything the writer needs to encrypt the output.
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    pub owner_password: String,
    pub user_password: String,
    pub permissions: Permissions,
    pub encrypt_metadata: bool,
    pub level: EncryptionLevel,
}

impl EncryptionConfig {
    pub fn new(owner: impl Into<String>, user: impl Into<String>) -> EncryptionConfig {
        EncryptionConfig {
            owner_password: owner.into(),
            user_password: user.into(),
            permissions: Permissions::empty(),
            encrypt_metadata: true,
            level: EncryptionLevel::V2,
        }
    }
}

/// Build the encryption dictionary and a handler keyed for writing.
/// `seed` feeds every nominally-random value (salts, file key, IVs) so a
/// deterministic serialization stays byte-identical.
pub fn prepare_encryption(
    config: &EncryptionConfig,
    file_id: &[u8],
    seed: &[u8; 32],
) -> Result<(SecurityHandler, Dict)> {
    let user_pass = config.user_password.as_bytes();
    let owner_pass: &[u8] = if config.owner_password.is_empty() {
        user_pass
    } else {
        config.owner_password.as_bytes()
    };
    let p = config.permissions.to_p_value();

    match config.level {
        EncryptionLevel::V5 => prepare_v5(config, seed, p),
        level => {
            let (v, r, bits) = match level {
                EncryptionLevel::V1 => (1, 2, 40),
                EncryptionLevel::V2 => (2, 3, 128),
                EncryptionLevel::V4 => (4, 4, 128),
                EncryptionLevel::V5 => unreachable!(),
            };
            let key_size = bits / 8;
            let cipher = if v == 4 { Cipher::Aes128 } else { Cipher::Rc4 };

            // Algorithm 3: /O
            let owner_key = owner_rc4_key(owner_pass, key_size, r);
            let mut o = pad_password(user_pass).to_vec();
            if r == 2 {
                Rc4::apply(&owner_key, &mut o);
            } else {
                for i in 0..=19u8 {
                    let round_key: Vec<u8> = owner_key.iter().map(|&b| b ^ i).collect();
                    Rc4::apply(&round_key, &mut o);
                }
            }

            let mut dict = CryptDict {
                v: v as i64,
                r: r as i64,
                o: PdfString::hex(o),
                u: PdfString::hex(Vec::new()),
                oe: None,
                ue: None,
                perms: None,
                p,
                bits: bits as i64,
                crypt_filters: HashMap::new(),
                default_stream_filter: None,
                default_string_filter: None,
                encrypt_metadata: config.encrypt_metadata,
                other: Dict::new(),
            };

            let mut handler = SecurityHandler {
                key: legacy_file_key(&dict, file_id, user_pass, key_size, r),
                cipher,
                revision: r,
                encrypt_metadata: config.encrypt_metadata,
                permissions: config.permissions,
                auth: AuthLevel::Owner,
                encrypt_ref: None,
                object_keys: RefCell::new(HashMap::new()),
                iv_seed: seed[..16].try_into().unwrap(),
                iv_counter: RefCell::new(0),
            };
            // Algorithm 4/5: /U
            let mut u = handler.compute_u(file_id);
            if r >= 3 {
                u.extend_from_slice(&[0; 16]);
            }
            dict.u = PdfString::hex(u);

            if v == 4 {
                let filter = CryptFilter {
                    method: CryptMethod::AESV2,
                    auth_event: AuthEvent::DocOpen,
                    length: Some(16),
                    other: Dict::new(),
                };
                dict.crypt_filters.insert(Name::from("StdCF"), filter);
                dict.default_stream_filter = Some(Name::from("StdCF"));
                dict.default_string_filter = Some(Name::from("StdCF"));
            }

            let dict_prim = crypt_dict_to_dict(&dict)?;
            handler.auth = AuthLevel::Owner;
            Ok((handler, dict_prim))
        }
    }
}

fn prepare_v5(config: &EncryptionConfig, seed: &[u8; 32], p: i64) -> Result<(SecurityHandler, Dict)> {
    let user_pass = prep_password(config.user_password.as_bytes());
    let owner_pass = if config.owner_password.is_empty() {
        user_pass.clone()
    } else {
        prep_password(config.owner_password.as_bytes())
    };

    // every random input is drawn from the seed chain
    let material = |label: &[u8]| -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(seed);
        h.update(label);
        h.finalize().into()
    };
    let file_key: [u8; 32] = material(b"file-key");
    let user_salts = material(b"user-salts");
    let owner_salts = material(b"owner-salts");

    let revision = 6;
    let mut u = v5_hash(revision, &user_pass, &user_salts[0..8], &[]).to_vec();
    u.extend_from_slice(&user_salts[0..8]);
    u.extend_from_slice(&user_salts[8..16]);
    let user_intermediate = v5_hash(revision, &user_pass, &user_salts[8..16], &[]);
    let ue = aes256_wrap(&user_intermediate, &file_key);

    let mut o = v5_hash(revision, &owner_pass, &owner_salts[0..8], &u[..48]).to_vec();
    o.extend_from_slice(&owner_salts[0..8]);
    o.extend_from_slice(&owner_salts[8..16]);
    let owner_intermediate = v5_hash(revision, &owner_pass, &owner_salts[8..16], &u[..48]);
    let oe = aes256_wrap(&owner_intermediate, &file_key);

    // /Perms: P, four 0xff bytes, the metadata flag, "adb", four seed bytes
    let mut perms_block = [0u8; 16];
    perms_block[..4].copy_from_slice(&(p as i32).to_le_bytes());
    perms_block[4..8].copy_from_slice(&[0xff; 4]);
    perms_block[8] = if config.encrypt_metadata { b'T' } else { b'F' };
    perms_block[9..12].copy_from_slice(b"adb");
    perms_block[12..16].copy_from_slice(&material(b"perms-filler")[..4]);
    let cipher = aes::Aes256::new_from_slice(&file_key).expect("fixed key size");
    let mut block = GenericArray::clone_from_slice(&perms_block);
    cipher.encrypt_block(&mut block);

    let mut filters = HashMap::new();
    filters.insert(
        Name::from("StdCF"),
        CryptFilter {
            method: CryptMethod::AESV3,
            auth_event: AuthEvent::DocOpen,
            length: Some(32),
            other: Dict::new(),
        },
    );
    let dict = CryptDict {
        v: 5,
        r: 6,
        o: PdfString::hex(o),
        u: PdfString::hex(u),
        oe: Some(PdfString::hex(oe)),
        ue: Some(PdfString::hex(ue)),
        perms: Some(PdfString::hex(block.to_vec())),
        p,
        bits: 256,
        crypt_filters: filters,
        default_stream_filter: Some(Name::from("StdCF")),
        default_string_filter: Some(Name::from("StdCF")),
        encrypt_metadata: config.encrypt_metadata,
        other: Dict::new(),
    };

    let handler = SecurityHandler {
        key: file_key.to_vec(),
        cipher: Cipher::Aes256,
        revision: 6,
        encrypt_metadata: config.encrypt_metadata,
        permissions: config.permissions,
        auth: AuthLevel::Owner,
        encrypt_ref: None,
        object_keys: RefCell::new(HashMap::new()),
        iv_seed: seed[..16].try_into().unwrap(),
        iv_counter: RefCell::new(0),
    };
    Ok((handler, crypt_dict_to_dict(&dict)?))
}

/// Serialize a CryptDict to a primitive dictionary without an updater (it
/// never contains indirect references).
fn crypt_dict_to_dict(dict: &CryptDict) -> Result<Dict> {
    use crate::object::{NoUpdate, ObjectWrite};
    match dict.to_primitive(&mut NoUpdate)? {
        Primitive::Dictionary(d) => Ok(d),
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{NoResolve, Object};

    fn round_trip(level: EncryptionLevel, wrong_then_right: (&str, &str)) {
        let (wrong, user) = wrong_then_right;
        let config = EncryptionConfig {
            owner_password: "owner-secret".into(),
            user_password: user.into(),
            permissions: Permissions::PRINT,
            encrypt_metadata: true,
            level,
        };
        let file_id = b"0123456789abcdef";
        let seed = [7u8; 32];
        let (writer, dict) = prepare_encryption(&config, file_id, &seed).unwrap();

        let id = ObjRef { num: 12, gen: 0 };
        let secret = b"the quick brown fox";
        let ciphertext = writer.encrypt(id, secret, CryptClass::Stream).unwrap();
        assert_ne!(&ciphertext, secret);
        assert!(!ciphertext
            .windows(secret.len())
            .any(|w| w == &secret[..]));

        let parsed = CryptDict::from_primitive(Primitive::Dictionary(dict), &NoResolve).unwrap();

        // user password opens it
        let reader = SecurityHandler::from_password(&parsed, file_id, user.as_bytes()).unwrap();
        assert_eq!(reader.auth_level(), AuthLevel::User);
        assert_eq!(
            reader.decrypt(id, &ciphertext, CryptClass::Stream).unwrap(),
            secret
        );

        // owner password opens it with full permissions
        let owner = SecurityHandler::from_password(&parsed, file_id, b"owner-secret").unwrap();
        assert_eq!(owner.auth_level(), AuthLevel::Owner);
        assert_eq!(owner.permissions(), Permissions::all());
        assert_eq!(
            owner.decrypt(id, &ciphertext, CryptClass::Stream).unwrap(),
            secret
        );

        // a wrong password is CryptoAuth
        match SecurityHandler::from_password(&parsed, file_id, wrong.as_bytes()) {
            Err(PdfError::CryptoAuth) => {}
            other => panic!("expected CryptoAuth, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rc4_40_round_trip() {
        round_trip(EncryptionLevel::V1, ("wrong", "user"));
    }

    #[test]
    fn rc4_128_round_trip() {
        round_trip(EncryptionLevel::V2, ("wrong", "user"));
    }

    #[test]
    fn aes_128_round_trip() {
        round_trip(EncryptionLevel::V4, ("bad", "s3cret"));
    }

    #[test]
    fn aes_256_round_trip() {
        round_trip(EncryptionLevel::V5, ("nope", "pässword"));
    }

    #[test]
    fn rc4_is_its_own_inverse() {
        let mut data = b"attack at dawn".to_vec();
        Rc4::apply(b"key", &mut data);
        assert_ne!(&data, b"attack at dawn");
        Rc4::apply(b"key", &mut data);
        assert_eq!(&data, b"attack at dawn");
    }

    #[test]
    fn padding_is_truncation_safe() {
        let padded = pad_password(&[b'x'; 40]);
        assert_eq!(padded, [b'x'; 32]);
        let padded = pad_password(b"");
        assert_eq!(padded, PAD);
    }

    #[test]
    fn permissions_value_sets_reserved_bits() {
        let p = Permissions::PRINT.to_p_value();
        assert!(p < 0);
        assert!(Permissions::from_p_value(p).contains(Permissions::PRINT));
        assert!(!Permissions::from_p_value(p).contains(Permissions::MODIFY));
    }

    #[test]
    fn metadata_exemption() {
        let config = EncryptionConfig {
            owner_password: "o".into(),
            user_password: "u".into(),
            permissions: Permissions::empty(),
            encrypt_metadata: false,
            level: EncryptionLevel::V2,
        };
        let (handler, _) = prepare_encryption(&config, b"id", &[1; 32]).unwrap();
        let id = ObjRef { num: 3, gen: 0 };
        let xmp = b"<x:xmpmeta/>";
        assert_eq!(
            handler.encrypt(id, xmp, CryptClass::Metadata).unwrap(),
            xmp
        );
        assert_ne!(handler.encrypt(id, xmp, CryptClass::Stream).unwrap(), xmp);
    }
}
