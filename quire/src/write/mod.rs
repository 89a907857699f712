//! Deterministic emission of the object graph back to bytes: header,
//! bodies, xref (table or stream), trailer, with optional encryption wrap,
//! object-stream compaction, incremental append and linearization.

mod linearize;
mod objstm;

pub use linearize::linearize;

use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::crypt::{prepare_encryption, CryptClass, EncryptionConfig, SecurityHandler};
use crate::error::*;
use crate::file::{Storage, Trailer};
use crate::filters::{self, LzwFlateParams};
use crate::object::{ObjRef, Resolve};
use crate::primitive::{Dict, PdfString, Primitive, RawStream, StreamData};

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Filter forced onto content streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFilter {
    None,
    Flate,
    AsciiHex,
    Ascii85,
    RunLength,
    Lzw,
}

#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Header version; also raises the catalog `/Version` when the catalog
    /// carries a lower one.
    pub version: (u8, u8),
    /// Flate level for content streams; 0 leaves them as authored.
    pub compression_level: u8,
    pub content_filter: Option<ContentFilter>,
    /// Replace every nondeterministic input (ids, salts, IVs) with values
    /// derived from the document's stable fields.
    pub deterministic: bool,
    pub xref_streams: bool,
    pub object_streams: bool,
    pub incremental: bool,
    pub linearize: bool,
    pub encryption: Option<EncryptionConfig>,
    pub cancel: CancelToken,
}

impl Default for SaveOptions {
    fn default() -> SaveOptions {
        SaveOptions {
            version: (1, 7),
            compression_level: 0,
            content_filter: None,
            deterministic: true,
            xref_streams: false,
            object_streams: false,
            incremental: false,
            linearize: false,
            encryption: None,
            cancel: CancelToken::new(),
        }
    }
}

/// One object ready for emission.
pub(crate) struct OutObject {
    pub gen: u16,
    pub primitive: Primitive,
}

/// The flat map the emitter works from.
pub(crate) type ObjectMap = BTreeMap<u64, OutObject>;

pub fn save<B: Backend>(
    storage: &Storage<B>,
    trailer: &Trailer,
    options: &SaveOptions,
) -> Result<Vec<u8>> {
    if options.linearize && (options.incremental || options.object_streams) {
        bail!("linearization cannot be combined with incremental or object-stream output");
    }
    options.cancel.check()?;

    let root = trailer.root.get_ref().get_inner();
    let mut objects = collect_objects(storage, options)?;
    rewrite_content_streams(&mut objects, root, options)?;

    let mut next_num = next_object_number(storage, &objects);
    let info_ref = info_reference(trailer, &mut objects, &mut next_num)?;

    if options.linearize {
        return linearize::linearize(objects, root, info_ref, options);
    }

    let file_id = derive_file_id(&objects, root, info_ref, options);

    // set up encryption before emission; the key depends on the file id
    let mut encrypt_ref = None;
    let mut own_handler: Option<SecurityHandler> = None;
    if let Some(ref config) = options.encryption {
        if options.incremental {
            bail!("changing encryption requires a full save, not an incremental one");
        }
        let seed = encryption_seed(&file_id, options);
        let (mut handler, crypt_dict) = prepare_encryption(config, file_id.0.as_bytes(), &seed)?;
        let num = next_num;
        next_num += 1;
        objects.insert(
            num,
            OutObject {
                gen: 0,
                primitive: Primitive::Dictionary(crypt_dict),
            },
        );
        let r = ObjRef { num, gen: 0 };
        handler.encrypt_ref = Some(r);
        encrypt_ref = Some(r);
        own_handler = Some(handler);
    }
    // appending to an encrypted file keeps its security handler
    let handler: Option<&SecurityHandler> = match own_handler {
        Some(ref h) => Some(h),
        None if options.incremental => storage.decoder(),
        None => None,
    };

    // object streams pack plaintext bodies; the container is encrypted as
    // one stream afterwards
    let mut packed: BTreeMap<u64, (u64, u32)> = BTreeMap::new();
    let mut use_xref_stream = options.xref_streams;
    if options.object_streams && !options.incremental {
        if !use_xref_stream {
            info!("object streams require an xref stream; enabling it");
            use_xref_stream = true;
        }
        objstm::pack_objects(
            &mut objects,
            &mut packed,
            &mut next_num,
            root,
            encrypt_ref,
            options,
        )?;
    }

    if let Some(handler) = handler {
        for (&num, out) in objects.iter_mut() {
            options.cancel.check()?;
            let id = ObjRef { num, gen: out.gen };
            if Some(id) != encrypt_ref {
                out.primitive = encrypt_primitive(out.primitive.clone(), id, handler)?;
            }
        }
    }

    let mut emitter = Emitter::new(options);
    let mut prev = None;
    if options.incremental {
        if storage.prev_startxref().is_none() {
            bail!("incremental save needs an existing revision to append to");
        }
        let original = t!(storage.backend().read(..));
        emitter.out.extend_from_slice(original);
        if emitter.out.last() != Some(&b'\n') {
            emitter.out.push(b'\n');
        }
        emitter.base = storage.start_offset();
        prev = storage.prev_startxref();
    } else {
        emitter.header(options.version);
    }

    for (&num, out) in objects.iter() {
        options.cancel.check()?;
        if packed.contains_key(&num) {
            continue;
        }
        emitter.object(num, out.gen, &out.primitive)?;
    }

    let file_id = match (options.incremental, storage.file_trailer()) {
        (true, Some(file_trailer)) => incremental_file_id(file_trailer, &file_id),
        _ => file_id,
    };

    let mut trailer_dict = Dict::new();
    trailer_dict.insert("Root", Primitive::Reference(root));
    if let Some(info) = info_ref {
        trailer_dict.insert("Info", Primitive::Reference(info));
    }
    if let Some(encrypt) = encrypt_ref {
        trailer_dict.insert("Encrypt", Primitive::Reference(encrypt));
    } else if options.incremental {
        if let Some(file_trailer) = storage.file_trailer() {
            if let Some(e) = file_trailer.get("Encrypt") {
                trailer_dict.insert("Encrypt", e.clone());
            }
        }
    }
    trailer_dict.insert(
        "ID",
        Primitive::Array(vec![
            Primitive::String(file_id.0.clone()),
            Primitive::String(file_id.1.clone()),
        ]),
    );
    if let Some(prev) = prev {
        trailer_dict.insert("Prev", Primitive::Integer(prev as i64));
        // an update may touch few objects; /Size still covers the rest
        trailer_dict.insert(
            "Size",
            Primitive::Integer(storage.xref_table().len() as i64),
        );
    }

    if use_xref_stream {
        emitter.xref_stream(&objects, &packed, next_num, trailer_dict, options)?;
    } else {
        emitter.xref_table(&objects, trailer_dict, options)?;
    }

    Ok(emitter.out)
}

/// Resolve every populated object into a materialized primitive. Stale
/// containers (xref streams, object streams) and the superseded encryption
/// dictionary are dropped; their content is re-emitted in the new form.
fn collect_objects<B: Backend>(
    storage: &Storage<B>,
    options: &SaveOptions,
) -> Result<ObjectMap> {
    let old_encrypt = storage
        .file_trailer()
        .and_then(|t| t.get("Encrypt"))
        .and_then(|p| match *p {
            Primitive::Reference(r) => Some(r.num),
            _ => None,
        });

    let mut objects = ObjectMap::new();
    let ids: Vec<(u64, u16)> = if options.incremental {
        storage
            .changes()
            .iter()
            .map(|(&num, &(_, gen))| (num, gen))
            .collect()
    } else {
        storage
            .populated_ids()
            .into_iter()
            .filter(|&num| num != 0)
            .map(|num| {
                let gen = match storage.changes().get(&num) {
                    Some(&(_, gen)) => gen,
                    None => storage
                        .xref_table()
                        .get(num)
                        .map(|slot| slot.gen())
                        .unwrap_or(0),
                };
                (num, gen)
            })
            .collect()
    };

    for (num, gen) in ids {
        options.cancel.check()?;
        if Some(num) == old_encrypt && !options.incremental {
            continue;
        }
        let p = match storage.resolve(ObjRef { num, gen }) {
            Ok(p) => p,
            Err(e) if storage.options().tolerant => {
                warn!("dropping unreadable object {}: {}", num, e);
                continue;
            }
            Err(e) => return Err(e),
        };
        if stale_container(&p) && !options.incremental {
            continue;
        }
        let p = materialize(p, storage)?;
        objects.insert(num, OutObject { gen, primitive: p });
    }
    Ok(objects)
}

fn stale_container(p: &Primitive) -> bool {
    match p {
        Primitive::Stream(s) => matches!(
            s.dict.get("Type").and_then(|t| t.as_name().ok()),
            Some("XRef") | Some("ObjStm")
        ),
        _ => false,
    }
}

/// Pull stream payloads out of the source file so the graph is
/// self-contained: decrypted, still filter-encoded, `/Length` trued up.
fn materialize(p: Primitive, resolve: &impl Resolve) -> Result<Primitive> {
    Ok(match p {
        Primitive::Stream(stream) => {
            let data = resolve.stream_data(&stream)?;
            let mut dict = stream.dict;
            dict.insert("Length", Primitive::Integer(data.len() as i64));
            Primitive::Stream(RawStream {
                dict,
                data: StreamData::Memory(data),
            })
        }
        Primitive::Array(items) => Primitive::Array(
            items
                .into_iter()
                .map(|p| materialize(p, resolve))
                .collect::<Result<_>>()?,
        ),
        Primitive::Dictionary(dict) => Primitive::Dictionary(
            dict.into_iter()
                .map(|(k, v)| Ok((k, materialize(v, resolve)?)))
                .collect::<Result<_>>()?,
        ),
        p => p,
    })
}

/// The first object number that is free both in the file and in memory.
fn next_object_number<B: Backend>(storage: &Storage<B>, objects: &ObjectMap) -> u64 {
    let in_memory = objects.keys().next_back().map(|&n| n + 1).unwrap_or(1);
    in_memory.max(storage.xref_table().len() as u64)
}

/// The `/Info` reference: reuse the indirect dictionary when there is one,
/// otherwise give the inline dictionary its own object.
fn info_reference(
    trailer: &Trailer,
    objects: &mut ObjectMap,
    next_num: &mut u64,
) -> Result<Option<ObjRef>> {
    use crate::object::{MaybeRef, NoUpdate, ObjectWrite};
    match trailer.info_dict {
        None => Ok(None),
        Some(MaybeRef::Indirect(ref r)) => Ok(Some(r.get_ref().get_inner())),
        Some(MaybeRef::Direct(ref info)) => {
            let num = *next_num;
            *next_num += 1;
            let primitive = info.to_primitive(&mut NoUpdate)?;
            objects.insert(num, OutObject { gen: 0, primitive });
            Ok(Some(ObjRef { num, gen: 0 }))
        }
    }
}

/// Re-encode content streams per the configuration. The page tree is
/// walked on the raw graph so a half-broken document still saves.
fn rewrite_content_streams(
    objects: &mut ObjectMap,
    root: ObjRef,
    options: &SaveOptions,
) -> Result<()> {
    let content_ids = collect_content_ids(objects, root.num);
    for num in content_ids {
        options.cancel.check()?;
        let out = match objects.get_mut(&num) {
            Some(out) => out,
            None => continue,
        };
        let stream = match out.primitive {
            Primitive::Stream(ref s) => s,
            _ => continue,
        };
        let data = match stream.data {
            StreamData::Memory(ref bytes) => bytes.clone(),
            StreamData::InFile { .. } => continue,
        };
        let chain = match filters::filters_from_dict(&stream.dict, &crate::object::NoResolve) {
            Ok(chain) => chain,
            Err(_) => continue, // indirect filter parameters: leave alone
        };

        let target = match options.content_filter {
            Some(f) => f,
            // without an override, only unfiltered content is (optionally)
            // compressed; everything else stays as authored
            None if options.compression_level > 0 && chain.is_empty() => ContentFilter::Flate,
            None => continue,
        };

        let plain = filters::decode_all(&data, &chain, &crate::filters::Limits::default())?;
        let (encoded, filter_name): (Vec<u8>, Option<&str>) = match target {
            ContentFilter::None => (plain.clone(), None),
            ContentFilter::Flate => (
                filters::flate_encode(&plain, options.compression_level.max(1)),
                Some("FlateDecode"),
            ),
            ContentFilter::AsciiHex => (filters::encode_hex(&plain), Some("ASCIIHexDecode")),
            ContentFilter::Ascii85 => (filters::encode_85(&plain), Some("ASCII85Decode")),
            ContentFilter::RunLength => {
                (filters::run_length_encode(&plain), Some("RunLengthDecode"))
            }
            ContentFilter::Lzw => {
                let params = LzwFlateParams {
                    early_change: 0,
                    ..LzwFlateParams::default()
                };
                let encoded = filters::lzw_encode(&plain, &params)?;
                (encoded, Some("LZWDecode"))
            }
        };
        let mut dict = stream.dict.clone();
        dict.remove("Filter");
        dict.remove("DecodeParms");
        if let Some(name) = filter_name {
            dict.insert("Filter", Primitive::name(name));
            if matches!(target, ContentFilter::Lzw) {
                let mut parms = Dict::new();
                parms.insert("EarlyChange", Primitive::Integer(0));
                dict.insert("DecodeParms", Primitive::Dictionary(parms));
            }
        }
        dict.insert("Length", Primitive::Integer(encoded.len() as i64));
        out.primitive = Primitive::Stream(RawStream {
            dict,
            data: StreamData::Memory(encoded.into()),
        });
    }
    Ok(())
}

/// Page `/Contents` references, found by walking Kids from the catalog.
fn collect_content_ids(objects: &ObjectMap, root: u64) -> Vec<u64> {
    let mut out = Vec::new();
    let catalog = match objects.get(&root).map(|o| &o.primitive) {
        Some(Primitive::Dictionary(d)) => d,
        _ => return out,
    };
    let mut stack: Vec<u64> = match catalog.get("Pages") {
        Some(&Primitive::Reference(r)) => vec![r.num],
        _ => return out,
    };
    let mut seen = std::collections::HashSet::new();
    while let Some(num) = stack.pop() {
        if !seen.insert(num) {
            continue;
        }
        let dict = match objects.get(&num).map(|o| &o.primitive) {
            Some(Primitive::Dictionary(d)) => d,
            _ => continue,
        };
        if let Some(Primitive::Array(kids)) = dict.get("Kids") {
            for kid in kids {
                if let Primitive::Reference(r) = *kid {
                    stack.push(r.num);
                }
            }
        }
        match dict.get("Contents") {
            Some(&Primitive::Reference(r)) => out.push(r.num),
            Some(Primitive::Array(parts)) => {
                for part in parts {
                    if let Primitive::Reference(r) = *part {
                        out.push(r.num);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// Replace every string and stream payload with ciphertext keyed by the
/// containing object.
fn encrypt_primitive(p: Primitive, id: ObjRef, handler: &SecurityHandler) -> Result<Primitive> {
    Ok(match p {
        Primitive::String(s) => {
            let cipher = handler.encrypt(id, s.as_bytes(), CryptClass::String)?;
            Primitive::String(PdfString::hex(cipher))
        }
        Primitive::Array(items) => Primitive::Array(
            items
                .into_iter()
                .map(|p| encrypt_primitive(p, id, handler))
                .collect::<Result<_>>()?,
        ),
        Primitive::Dictionary(dict) => Primitive::Dictionary(
            dict.into_iter()
                .map(|(k, v)| Ok((k, encrypt_primitive(v, id, handler)?)))
                .collect::<Result<_>>()?,
        ),
        Primitive::Stream(stream) => {
            let class = match stream.dict.get("Type").and_then(|t| t.as_name().ok()) {
                Some("Metadata") => CryptClass::Metadata,
                _ => CryptClass::Stream,
            };
            let data = match stream.data {
                StreamData::Memory(ref bytes) => bytes,
                StreamData::InFile { .. } => bail!("stream data not materialized"),
            };
            let cipher = handler.encrypt(id, data, class)?;
            let mut dict = Dict::new();
            for (k, v) in stream.dict.into_iter() {
                dict.insert(k, encrypt_primitive(v, id, handler)?);
            }
            dict.insert("Length", Primitive::Integer(cipher.len() as i64));
            Primitive::Stream(RawStream {
                dict,
                data: StreamData::Memory(cipher.into()),
            })
        }
        p => p,
    })
}

pub(crate) struct FileId(pub PdfString, pub PdfString);

impl FileId {
    fn both(bytes: [u8; 16]) -> FileId {
        FileId(
            PdfString::hex(bytes.to_vec()),
            PdfString::hex(bytes.to_vec()),
        )
    }
}

/// SHA-256 over the document's stable fields: version, info, page count
/// and the geometry of every page. In non-deterministic mode the clock and
/// a process counter are mixed in.
fn derive_file_id(
    objects: &ObjectMap,
    root: ObjRef,
    info: Option<ObjRef>,
    options: &SaveOptions,
) -> FileId {
    let mut hash = Sha256::new();
    hash.update([options.version.0, options.version.1]);
    if let Some(info) = info {
        if let Some(out) = objects.get(&info.num) {
            let mut buf = Vec::new();
            let _ = out.primitive.serialize(&mut buf);
            hash.update(&buf);
        }
    }
    let pages = collect_page_nums(objects, root.num);
    hash.update((pages.len() as u64).to_be_bytes());
    for num in pages {
        if let Some(Primitive::Dictionary(dict)) = objects.get(&num).map(|o| &o.primitive) {
            for key in ["MediaBox", "Rotate"] {
                if let Some(p) = dict.get(key) {
                    let mut buf = Vec::new();
                    let _ = p.serialize(&mut buf);
                    hash.update(&buf);
                }
            }
            if let Some(Primitive::Reference(r)) = dict.get("Metadata") {
                hash.update(r.num.to_be_bytes());
            }
        }
    }
    if !options.deterministic {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        hash.update(now.to_be_bytes());
        hash.update(COUNTER.fetch_add(1, Ordering::Relaxed).to_be_bytes());
    }
    let digest = hash.finalize();
    FileId::both(digest[..16].try_into().unwrap())
}

/// Appending preserves the original first id and mints a fresh second one.
fn incremental_file_id(file_trailer: &Dict, fresh: &FileId) -> FileId {
    let id0 = file_trailer
        .get("ID")
        .and_then(|p| p.as_array().ok())
        .and_then(|arr| arr.first())
        .and_then(|p| p.as_string().ok())
        .cloned()
        .unwrap_or_else(|| fresh.0.clone());
    let mut hash = Sha256::new();
    hash.update(id0.as_bytes());
    hash.update(fresh.1.as_bytes());
    let digest = hash.finalize();
    FileId(
        id0,
        PdfString::hex(digest[..16].to_vec()),
    )
}

fn encryption_seed(file_id: &FileId, options: &SaveOptions) -> [u8; 32] {
    let mut hash = Sha256::new();
    hash.update(b"encryption-seed");
    hash.update(file_id.0.as_bytes());
    if !options.deterministic {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        hash.update(now.to_be_bytes());
    }
    hash.finalize().into()
}

pub(crate) fn collect_page_nums(objects: &ObjectMap, root: u64) -> Vec<u64> {
    let mut pages = Vec::new();
    let catalog = match objects.get(&root).map(|o| &o.primitive) {
        Some(Primitive::Dictionary(d)) => d,
        _ => return pages,
    };
    let mut stack: Vec<u64> = match catalog.get("Pages") {
        Some(&Primitive::Reference(r)) => vec![r.num],
        _ => return pages,
    };
    let mut seen = std::collections::HashSet::new();
    while let Some(num) = stack.pop() {
        if !seen.insert(num) {
            continue;
        }
        let dict = match objects.get(&num).map(|o| &o.primitive) {
            Some(Primitive::Dictionary(d)) => d,
            _ => continue,
        };
        match dict.get("Type").and_then(|t| t.as_name().ok()) {
            Some("Page") => pages.push(num),
            _ => {
                if let Some(Primitive::Array(kids)) = dict.get("Kids") {
                    // preserve document order
                    for kid in kids.iter().rev() {
                        if let Primitive::Reference(r) = *kid {
                            stack.push(r.num);
                        }
                    }
                }
            }
        }
    }
    pages
}

/// Accumulates output bytes and the offset of every emitted object.
pub(crate) struct Emitter {
    pub out: Vec<u8>,
    pub offsets: BTreeMap<u64, (u64, u16)>,
    /// Offset subtracted from positions (nonzero when appending behind an
    /// existing header).
    pub base: usize,
    cancel: CancelToken,
}

impl Emitter {
    pub fn new(options: &SaveOptions) -> Emitter {
        Emitter {
            out: Vec::new(),
            offsets: BTreeMap::new(),
            base: 0,
            cancel: options.cancel.clone(),
        }
    }

    pub fn pos(&self) -> u64 {
        (self.out.len() - self.base) as u64
    }

    pub fn header(&mut self, version: (u8, u8)) {
        self.out
            .extend_from_slice(format!("%PDF-{}.{}\n", version.0, version.1).as_bytes());
        // binary marker: four bytes over 0x80 keep transports honest
        self.out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
    }

    pub fn object(&mut self, num: u64, gen: u16, p: &Primitive) -> Result<()> {
        self.cancel.check()?;
        self.offsets.insert(num, (self.pos(), gen));
        self.out
            .extend_from_slice(format!("{} {} obj\n", num, gen).as_bytes());
        p.serialize(&mut self.out)?;
        self.out.extend_from_slice(b"\nendobj\n");
        Ok(())
    }

    /// Classic table covering `0..=max`, gaps chained into the free list.
    pub fn xref_table(
        &mut self,
        objects: &ObjectMap,
        mut trailer: Dict,
        options: &SaveOptions,
    ) -> Result<()> {
        options.cancel.check()?;
        let xref_pos = self.pos();
        let max = self.offsets.keys().next_back().cloned().unwrap_or(0);

        if options.incremental {
            // subsections only for what was written
            self.out.extend_from_slice(b"xref\n");
            let written: Vec<u64> = self.offsets.keys().cloned().collect();
            let mut i = 0;
            while i < written.len() {
                let start = written[i];
                let mut len = 1;
                while i + len < written.len() && written[i + len] == start + len as u64 {
                    len += 1;
                }
                self.out
                    .extend_from_slice(format!("{} {}\n", start, len).as_bytes());
                for n in 0..len {
                    let (offset, gen) = self.offsets[&(start + n as u64)];
                    self.out
                        .extend_from_slice(format!("{:010} {:05} n \n", offset, gen).as_bytes());
                }
                i += len;
            }
        } else {
            self.out.extend_from_slice(b"xref\n");
            self.out
                .extend_from_slice(format!("0 {}\n", max + 1).as_bytes());
            // object 0 heads the free list; every unused number links on
            let free: Vec<u64> = (1..=max).filter(|n| !self.offsets.contains_key(n)).collect();
            let first_free = free.first().cloned().unwrap_or(0);
            self.out
                .extend_from_slice(format!("{:010} {:05} f \n", first_free, 65535).as_bytes());
            for num in 1..=max {
                match self.offsets.get(&num) {
                    Some(&(offset, gen)) => {
                        self.out.extend_from_slice(
                            format!("{:010} {:05} n \n", offset, gen).as_bytes(),
                        );
                    }
                    None => {
                        let next = free
                            .iter()
                            .find(|&&n| n > num)
                            .cloned()
                            .unwrap_or(0);
                        self.out
                            .extend_from_slice(format!("{:010} {:05} f \n", next, 0).as_bytes());
                    }
                }
            }
        }

        let size = (max as i64 + 1).max(
            trailer
                .get("Size")
                .and_then(|p| p.as_integer().ok())
                .unwrap_or(0),
        );
        trailer.insert("Size", Primitive::Integer(size));
        self.out.extend_from_slice(b"trailer\n");
        trailer.serialize(&mut self.out)?;
        self.out
            .extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_pos).as_bytes());
        let _ = objects;
        Ok(())
    }

    /// Xref stream: the section becomes one more (Flate-compressed) stream
    /// object whose dictionary doubles as the trailer.
    pub fn xref_stream(
        &mut self,
        objects: &ObjectMap,
        packed: &BTreeMap<u64, (u64, u32)>,
        stream_num: u64,
        mut trailer: Dict,
        options: &SaveOptions,
    ) -> Result<()> {
        options.cancel.check()?;
        let _ = objects;
        let xref_pos = self.pos();
        // the stream indexes itself
        self.offsets.insert(stream_num, (xref_pos, 0));

        let max = stream_num;
        let mut entries: Vec<(u64, [u64; 3])> = Vec::new();
        let free: Vec<u64> = (1..=max)
            .filter(|n| !self.offsets.contains_key(n) && !packed.contains_key(n))
            .collect();
        if !options.incremental {
            let first_free = free.first().cloned().unwrap_or(0);
            entries.push((0, [0, first_free, 65535]));
        }
        for num in 1..=max {
            if let Some(&(container, index)) = packed.get(&num) {
                entries.push((num, [2, container, index as u64]));
            } else if let Some(&(offset, gen)) = self.offsets.get(&num) {
                entries.push((num, [1, offset, gen as u64]));
            } else if !options.incremental {
                let next = free.iter().find(|&&n| n > num).cloned().unwrap_or(0);
                entries.push((num, [0, next, 0]));
            }
        }

        let w2 = byte_width(entries.iter().map(|&(_, f)| f[1]).max().unwrap_or(0));
        let w3 = byte_width(entries.iter().map(|&(_, f)| f[2]).max().unwrap_or(0));
        let mut data = Vec::with_capacity(entries.len() * (1 + w2 + w3));
        let mut index: Vec<(u64, u64)> = Vec::new();
        for &(num, fields) in &entries {
            match index.last_mut() {
                Some((start, len)) if *start + *len == num => *len += 1,
                _ => index.push((num, 1)),
            }
            data.push(fields[0] as u8);
            data.extend_from_slice(&fields[1].to_be_bytes()[8 - w2..]);
            data.extend_from_slice(&fields[2].to_be_bytes()[8 - w3..]);
        }

        let encoded = filters::flate_encode(&data, options.compression_level.max(1));

        trailer.insert("Type", Primitive::name("XRef"));
        let size = (max as i64 + 1).max(
            trailer
                .get("Size")
                .and_then(|p| p.as_integer().ok())
                .unwrap_or(0),
        );
        trailer.insert("Size", Primitive::Integer(size));
        trailer.insert(
            "W",
            Primitive::Array(vec![
                Primitive::Integer(1),
                Primitive::Integer(w2 as i64),
                Primitive::Integer(w3 as i64),
            ]),
        );
        trailer.insert(
            "Index",
            Primitive::Array(
                index
                    .iter()
                    .flat_map(|&(start, len)| {
                        [Primitive::Integer(start as i64), Primitive::Integer(len as i64)]
                    })
                    .collect(),
            ),
        );
        trailer.insert("Filter", Primitive::name("FlateDecode"));
        trailer.insert("Length", Primitive::Integer(encoded.len() as i64));

        self.out
            .extend_from_slice(format!("{} 0 obj\n", stream_num).as_bytes());
        trailer.serialize(&mut self.out)?;
        self.out.extend_from_slice(b"\nstream\n");
        self.out.extend_from_slice(&encoded);
        self.out.extend_from_slice(b"\nendstream\nendobj\n");
        self.out
            .extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_pos).as_bytes());
        Ok(())
    }
}

fn byte_width(max: u64) -> usize {
    let mut width = 1;
    while max >= 1u64 << (8 * width) {
        width += 1;
    }
    width
}
