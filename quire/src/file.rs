//! The entry point tying everything together: `Storage` resolves, caches
//! and records mutations over a byte source; `File` adds the typed trailer
//! and document-level API.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use crate as quire;
use crate::any::Any;
use crate::backend::Backend;
use crate::crypt::{CryptClass, CryptDict, SecurityHandler};
use crate::error::*;
use crate::filters::Limits;
use crate::object::types::{Catalog, InfoDict, Page, PageRc};
use crate::object::*;
use crate::parse::{parse, parse_indirect_object, ParseFlags};
use crate::primitive::{Dict, PdfString, Primitive, RawStream, StreamData};
use crate::scan::Scanner;
use crate::write::SaveOptions;
use crate::xref::{Slot, XRefTable};

/// When to fall back to the full-file scan that rebuilds a broken xref.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairPolicy {
    Never,
    IfBroken,
}

/// Knobs for the read path.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Substitute Null for dangling references and recover from bad stream
    /// lengths instead of failing.
    pub tolerant: bool,
    pub repair: RepairPolicy,
    pub limits: Limits,
    /// Recursion bound while parsing nested containers.
    pub max_parse_depth: usize,
    /// Bound on chained indirection while resolving.
    pub max_resolve_depth: usize,
    /// Byte budget of the object cache; least recently used entries are
    /// evicted past it.
    pub cache_budget: usize,
}

impl Default for LoadOptions {
    fn default() -> LoadOptions {
        DEFAULT_LOAD_OPTIONS
    }
}

pub static DEFAULT_LOAD_OPTIONS: LoadOptions = LoadOptions {
    tolerant: true,
    repair: RepairPolicy::IfBroken,
    limits: Limits {
        max_decoded: 256 << 20,
        max_expansion: 32_768,
    },
    max_parse_depth: 20,
    max_resolve_depth: 16,
    cache_budget: 64 << 20,
};

impl LoadOptions {
    pub fn strict() -> LoadOptions {
        LoadOptions {
            tolerant: false,
            repair: RepairPolicy::Never,
            ..DEFAULT_LOAD_OPTIONS
        }
    }
}

/// An object number handed out before its content exists, so that mutually
/// referencing objects can be built.
#[must_use]
pub struct PromisedRef<T> {
    inner: ObjRef,
    _marker: PhantomData<T>,
}
impl<T> PromisedRef<T> {
    pub(crate) fn new(inner: ObjRef) -> PromisedRef<T> {
        PromisedRef {
            inner,
            _marker: PhantomData,
        }
    }
    pub fn get_inner(&self) -> ObjRef {
        self.inner
    }
    pub fn get_ref(&self) -> Ref<T> {
        Ref::new(self.inner)
    }
}

/// Typed cache with LRU eviction by estimated byte cost.
struct ObjectCache {
    entries: HashMap<ObjRef, CacheEntry>,
    total_cost: usize,
    budget: usize,
    tick: u64,
}

struct CacheEntry {
    any: Any,
    cost: usize,
    last_used: u64,
}

impl ObjectCache {
    fn new(budget: usize) -> ObjectCache {
        ObjectCache {
            entries: HashMap::new(),
            total_cost: 0,
            budget,
            tick: 0,
        }
    }
    fn get(&mut self, key: &ObjRef) -> Option<Any> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|e| {
            e.last_used = tick;
            e.any.clone()
        })
    }
    fn insert(&mut self, key: ObjRef, any: Any, cost: usize) {
        self.tick += 1;
        if let Some(old) = self.entries.insert(
            key,
            CacheEntry {
                any,
                cost,
                last_used: self.tick,
            },
        ) {
            self.total_cost -= old.cost;
        }
        self.total_cost += cost;
        while self.total_cost > self.budget && self.entries.len() > 1 {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(&k, _)| k);
            match victim {
                Some(k) if k != key => {
                    let removed = self.entries.remove(&k).unwrap();
                    self.total_cost -= removed.cost;
                }
                _ => break,
            }
        }
    }
}

// removes the in-flight marker even on early return
struct InflightGuard<'a> {
    set: &'a RefCell<HashSet<ObjRef>>,
    id: ObjRef,
}
impl<'a> InflightGuard<'a> {
    fn enter(set: &'a RefCell<HashSet<ObjRef>>, id: ObjRef) -> Result<InflightGuard<'a>> {
        if !set.borrow_mut().insert(id) {
            return Err(PdfError::CycleDetected {
                num: id.num,
                gen: id.gen,
            });
        }
        Ok(InflightGuard { set, id })
    }
}
impl<'a> Drop for InflightGuard<'a> {
    fn drop(&mut self) {
        self.set.borrow_mut().remove(&self.id);
    }
}

pub struct Storage<B: Backend> {
    backend: B,

    refs: XRefTable,

    // position of the %PDF header within the backend
    start_offset: usize,

    cache: RefCell<ObjectCache>,

    // objects that differ from what the backend holds, keyed by number
    changes: BTreeMap<u64, (Primitive, u16)>,

    decoder: Option<SecurityHandler>,

    options: LoadOptions,

    inflight: RefCell<HashSet<ObjRef>>,
}

impl<B: Backend> Storage<B> {
    pub fn new(backend: B, refs: XRefTable, start_offset: usize, options: LoadOptions) -> Storage<B> {
        Storage {
            backend,
            refs,
            start_offset,
            cache: RefCell::new(ObjectCache::new(options.cache_budget)),
            changes: BTreeMap::new(),
            decoder: None,
            options,
            inflight: RefCell::new(HashSet::new()),
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }
    pub fn xref_table(&self) -> &XRefTable {
        &self.refs
    }
    pub fn decoder(&self) -> Option<&SecurityHandler> {
        self.decoder.as_ref()
    }
    pub(crate) fn changes(&self) -> &BTreeMap<u64, (Primitive, u16)> {
        &self.changes
    }
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }
    pub(crate) fn start_offset(&self) -> usize {
        self.start_offset
    }

    /// Offset of the newest xref section, used for `/Prev` when appending.
    pub fn prev_startxref(&self) -> Option<u64> {
        self.refs.revisions().first().map(|r| r.xref_offset)
    }

    /// The newest trailer dictionary as read from the file.
    pub fn file_trailer(&self) -> Option<&Dict> {
        self.refs.revisions().first().map(|r| &r.trailer)
    }

    /// Every object number that resolves, with changes shadowing the file.
    pub fn populated_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.refs.iter_used().map(|(num, _)| num).collect();
        for &num in self.changes.keys() {
            ids.push(num);
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn resolve_impl(&self, r: ObjRef, flags: ParseFlags, depth: usize) -> Result<Primitive> {
        if depth == 0 {
            return Err(PdfError::MaxDepth);
        }
        if let Some((primitive, _gen)) = self.changes.get(&r.num) {
            return Ok(primitive.clone());
        }
        let missing = |e: PdfError| -> Result<Primitive> {
            if self.options.tolerant {
                warn!("substituting null for {}: {}", r, e);
                Ok(Primitive::Null)
            } else {
                Err(e)
            }
        };
        let slot = match self.refs.get(r.num) {
            Ok(slot) => slot,
            Err(e) => return missing(e),
        };
        match slot {
            Slot::Used { offset, gen } => {
                if gen != r.gen {
                    return missing(PdfError::MissingObject {
                        num: r.num,
                        gen: r.gen,
                    });
                }
                let _guard = InflightGuard::enter(&self.inflight, r)?;
                let pos = self.start_offset + offset as usize;
                let mut scanner = Scanner::with_offset(t!(self.backend.read(pos..)), pos);
                let (id, p) = t!(parse_indirect_object(&mut scanner, self, self.decoder.as_ref()));
                if id != r {
                    warn!("object at offset {} claims to be {}, expected {}", offset, id, r);
                }
                check_flags(&p, flags)?;
                Ok(p)
            }
            Slot::Packed { container, index } => {
                let _guard = InflightGuard::enter(&self.inflight, r)?;
                let container_ref = Ref::<ObjectStream>::new(ObjRef {
                    num: container,
                    gen: 0,
                });
                let obj_stream = t!(self.get(container_ref));
                let (num, slice) = t!(obj_stream.object_slice(index as usize));
                if num != r.num {
                    warn!(
                        "object stream {} slot {} holds object {}, expected {}",
                        container, index, num, r.num
                    );
                }
                let p = t!(parse(slice, self, flags & !ParseFlags::STREAM));
                Ok(p)
            }
            Slot::Free { .. } => missing(PdfError::FreeObject { num: r.num }),
            Slot::Promised => Ok(Primitive::Null),
            Slot::Unset => missing(PdfError::MissingObject {
                num: r.num,
                gen: r.gen,
            }),
        }
    }
}

fn check_flags(p: &Primitive, flags: ParseFlags) -> Result<()> {
    if flags.contains(ParseFlags::ANY) {
        return Ok(());
    }
    let found = match *p {
        Primitive::Null => ParseFlags::NULL,
        Primitive::Bool(_) => ParseFlags::BOOL,
        Primitive::Integer(_) => ParseFlags::INTEGER,
        Primitive::Real(_) => ParseFlags::NUMBER,
        Primitive::String(_) => ParseFlags::STRING,
        Primitive::Stream(_) => ParseFlags::STREAM,
        Primitive::Dictionary(_) => ParseFlags::DICT,
        Primitive::Array(_) => ParseFlags::ARRAY,
        Primitive::Reference(_) => ParseFlags::REF,
        Primitive::Name(_) => ParseFlags::NAME,
    };
    if flags.intersects(found) {
        Ok(())
    } else {
        Err(PdfError::PrimitiveNotAllowed {
            found: p.get_debug_name(),
        })
    }
}

impl<B: Backend> Resolve for Storage<B> {
    fn resolve(&self, r: ObjRef) -> Result<Primitive> {
        self.resolve_impl(r, ParseFlags::ANY, self.options.max_resolve_depth)
    }
    fn resolve_flags(&self, r: ObjRef, flags: ParseFlags, depth: usize) -> Result<Primitive> {
        self.resolve_impl(r, flags, depth.min(self.options.max_resolve_depth))
    }
    fn get<T: Object + fmt::Debug>(&self, r: Ref<T>) -> Result<RcRef<T>> {
        let key = r.get_inner();
        if let Some(any) = self.cache.borrow_mut().get(&key) {
            return Ok(RcRef::new(key, any.downcast()?));
        }
        let primitive = t!(self.resolve(key));
        let cost = primitive.byte_cost();
        let obj = t!(T::from_primitive(primitive, self));
        let rc = Rc::new(obj);
        self.cache
            .borrow_mut()
            .insert(key, Any::new(rc.clone()), cost);
        Ok(RcRef::new(key, rc))
    }
    fn options(&self) -> &LoadOptions {
        &self.options
    }
    fn stream_data(&self, stream: &RawStream) -> Result<Arc<[u8]>> {
        match stream.data {
            StreamData::Memory(ref bytes) => Ok(bytes.clone()),
            StreamData::InFile { id, ref range } => {
                let bytes = t!(self.backend.read(range.clone())).to_vec();
                let decoder = match self.decoder {
                    Some(ref d) => d,
                    None => return Ok(bytes.into()),
                };
                // a leading Identity crypt filter bypasses the handler
                if identity_crypt(&stream.dict, self) {
                    return Ok(bytes.into());
                }
                let class = match stream.dict.get("Type") {
                    Some(Primitive::Name(name)) if name == "Metadata" => CryptClass::Metadata,
                    _ => CryptClass::Stream,
                };
                Ok(t!(decoder.decrypt(id, &bytes, class)).into())
            }
        }
    }
}

fn identity_crypt(dict: &Dict, r: &impl Resolve) -> bool {
    match crate::filters::filters_from_dict(dict, r) {
        Ok(chain) => matches!(
            chain.first(),
            Some(crate::filters::StreamFilter::Crypt(params)) if params.name == "Identity"
        ),
        Err(_) => false,
    }
}

impl<B: Backend> Updater for Storage<B> {
    fn create<T: ObjectWrite>(&mut self, obj: T) -> Result<RcRef<T>> {
        let num = self.refs.len() as u64;
        self.refs.push(Slot::Promised);
        let primitive = obj.to_primitive(self)?;
        self.changes.insert(num, (primitive, 0));
        let r = ObjRef { num, gen: 0 };
        Ok(RcRef::new(r, Rc::new(obj)))
    }
    fn update<T: ObjectWrite>(&mut self, old: ObjRef, obj: T) -> Result<RcRef<T>> {
        let gen = match self.refs.get(old.num) {
            Ok(Slot::Free { .. }) => {
                return Err(PdfError::FreeObject { num: old.num });
            }
            Ok(Slot::Used { gen, .. }) => gen,
            Ok(Slot::Packed { .. }) | Ok(Slot::Promised) | Ok(Slot::Unset) => 0,
            Err(_) => 0,
        };
        let primitive = obj.to_primitive(self)?;
        self.changes.insert(old.num, (primitive, gen));
        let mut cache = self.cache.borrow_mut();
        if let Some(entry) = cache.entries.remove(&old) {
            cache.total_cost -= entry.cost;
        }
        Ok(RcRef::new(ObjRef { num: old.num, gen }, Rc::new(obj)))
    }
    fn promise<T: Object>(&mut self) -> PromisedRef<T> {
        let num = self.refs.len() as u64;
        self.refs.push(Slot::Promised);
        PromisedRef::new(ObjRef { num, gen: 0 })
    }
    fn fulfill<T: ObjectWrite>(&mut self, promise: PromisedRef<T>, obj: T) -> Result<RcRef<T>> {
        self.update(promise.inner, obj)
    }
}

impl Storage<Vec<u8>> {
    /// A storage with no backing file, for documents built from scratch.
    pub fn empty(options: LoadOptions) -> Storage<Vec<u8>> {
        let mut refs = XRefTable::new(0);
        refs.push(Slot::Free {
            next: 0,
            gen: 65535,
        });
        Storage::new(Vec::new(), refs, 0, options)
    }
}

/// Read the xref machinery and set up decryption, without typing the
/// trailer yet.
pub fn load_storage_and_trailer_password<B: Backend>(
    backend: B,
    password: &[u8],
    options: LoadOptions,
) -> Result<(Storage<B>, Dict)> {
    let start_offset = t!(backend.locate_start_offset());
    let (mut refs, trailer) = match backend.read_xref_table_and_trailer(start_offset, &NoResolve) {
        Ok(found) => found,
        Err(e) if options.repair == RepairPolicy::IfBroken => {
            warn!("can't read xref table ({}), rebuilding by scanning", e);
            let refs = t!(crate::repair::rebuild_xref_table(&backend, start_offset));
            let trailer = t!(crate::repair::find_trailer(&backend, &NoResolve));
            (refs, trailer)
        }
        Err(e) => return Err(e),
    };

    if detect_linearized(&backend, start_offset) {
        refs.mark_linearized();
    }

    let mut storage = Storage::new(backend, refs, start_offset, options);

    if let Some(crypt) = trailer.get("Encrypt") {
        let id_entry = trailer
            .get("ID")
            .ok_or(PdfError::MissingEntry {
                typ: "Trailer",
                field: "ID".into(),
            })?
            .as_array()?;
        let key = id_entry
            .first()
            .ok_or(PdfError::MissingEntry {
                typ: "Trailer",
                field: "ID".into(),
            })?
            .as_string()?
            .as_bytes()
            .to_vec();
        let dict = CryptDict::from_primitive(crypt.clone(), &storage)?;
        let mut decoder = t!(SecurityHandler::from_password(&dict, &key, password));
        if let Primitive::Reference(reference) = crypt {
            decoder.encrypt_ref = Some(*reference);
        }
        storage.decoder = Some(decoder);
    }
    Ok((storage, trailer))
}

/// The first object of a linearized file is its linearization parameter
/// dictionary; failures here just mean "not linearized".
fn detect_linearized<B: Backend>(backend: &B, start_offset: usize) -> bool {
    let read = match backend.read(start_offset..) {
        Ok(data) => data,
        Err(_) => return false,
    };
    let mut scanner = Scanner::with_offset(read, start_offset);
    // skip the header line
    if scanner.seek_substr(b"obj").is_none() {
        return false;
    }
    let probe = (|| -> Result<Primitive> {
        parse(
            scanner.remaining_slice(),
            &NoResolve,
            ParseFlags::DICT | ParseFlags::INTEGER,
        )
    })();
    match probe {
        Ok(Primitive::Dictionary(dict)) => dict.contains_key("Linearized"),
        _ => false,
    }
}

pub struct File<B: Backend> {
    storage: Storage<B>,
    pub trailer: Trailer,
}

impl<B: Backend> Resolve for File<B> {
    fn resolve(&self, r: ObjRef) -> Result<Primitive> {
        self.storage.resolve(r)
    }
    fn resolve_flags(&self, r: ObjRef, flags: ParseFlags, depth: usize) -> Result<Primitive> {
        self.storage.resolve_flags(r, flags, depth)
    }
    fn get<T: Object + fmt::Debug>(&self, r: Ref<T>) -> Result<RcRef<T>> {
        self.storage.get(r)
    }
    fn options(&self) -> &LoadOptions {
        self.storage.options()
    }
    fn stream_data(&self, stream: &RawStream) -> Result<Arc<[u8]>> {
        self.storage.stream_data(stream)
    }
}
impl<B: Backend> Updater for File<B> {
    fn create<T: ObjectWrite>(&mut self, obj: T) -> Result<RcRef<T>> {
        self.storage.create(obj)
    }
    fn update<T: ObjectWrite>(&mut self, old: ObjRef, obj: T) -> Result<RcRef<T>> {
        self.storage.update(old, obj)
    }
    fn promise<T: Object>(&mut self) -> PromisedRef<T> {
        self.storage.promise()
    }
    fn fulfill<T: ObjectWrite>(&mut self, promise: PromisedRef<T>, obj: T) -> Result<RcRef<T>> {
        self.storage.fulfill(promise, obj)
    }
}

#[cfg(feature = "mmap")]
impl File<memmap2::Mmap> {
    /// Memory-map the file instead of reading it up front; the blanket
    /// `Backend` impl over byte slices covers the mapping.
    pub fn open_mapped(path: impl AsRef<Path>) -> Result<Self> {
        let file = fs::File::open(path)?;
        let map = unsafe { memmap2::Mmap::map(&file)? };
        Self::from_data(map)
    }
}

impl File<Vec<u8>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_data(fs::read(path)?)
    }
    pub fn open_password(path: impl AsRef<Path>, password: &[u8]) -> Result<Self> {
        Self::from_data_password(fs::read(path)?, password)
    }
    pub fn save_to(&self, path: impl AsRef<Path>, options: &SaveOptions) -> Result<()> {
        fs::write(path, self.save_with(options)?)?;
        Ok(())
    }
}

impl<B: Backend> File<B> {
    pub fn from_data(backend: B) -> Result<Self> {
        Self::from_data_password(backend, b"")
    }
    pub fn from_data_password(backend: B, password: &[u8]) -> Result<Self> {
        Self::load_data(backend, password, LoadOptions::default())
    }
    pub fn with_options(backend: B, password: &[u8], options: LoadOptions) -> Result<Self> {
        Self::load_data(backend, password, options)
    }

    fn load_data(backend: B, password: &[u8], options: LoadOptions) -> Result<Self> {
        let (storage, trailer) = load_storage_and_trailer_password(backend, password, options)?;
        let trailer = t!(Trailer::from_primitive(
            Primitive::Dictionary(trailer),
            &storage,
        ));
        Ok(File { storage, trailer })
    }

    pub fn storage(&self) -> &Storage<B> {
        &self.storage
    }
    pub fn storage_mut(&mut self) -> &mut Storage<B> {
        &mut self.storage
    }

    pub fn get_root(&self) -> &Catalog {
        &self.trailer.root
    }

    pub fn is_linearized(&self) -> bool {
        self.storage.xref_table().is_linearized()
    }

    /// What the active password unlocked, if the file is encrypted.
    pub fn auth_level(&self) -> Option<crate::crypt::AuthLevel> {
        self.storage.decoder().map(|d| d.auth_level())
    }

    pub fn num_pages(&self) -> u32 {
        self.trailer.root.pages.count as u32
    }
    pub fn get_page(&self, n: u32) -> Result<PageRc> {
        self.trailer.root.pages.page(self, n)
    }
    pub fn pages(&'_ self) -> impl Iterator<Item = Result<PageRc>> + '_ {
        (0..self.num_pages()).map(move |n| self.get_page(n))
    }

    pub fn update_catalog(&mut self, catalog: Catalog) -> Result<()> {
        self.trailer.root = self.storage.create(catalog)?;
        Ok(())
    }

    pub fn update_page(&mut self, page: &PageRc, new: Page) -> Result<()> {
        PageRc::update(new, page, &mut self.storage)?;
        Ok(())
    }

    /// Serialize per `options`; the in-memory document is left unchanged.
    pub fn save_with(&self, options: &SaveOptions) -> Result<Vec<u8>> {
        crate::write::save(&self.storage, &self.trailer, options)
    }
}

impl File<Vec<u8>> {
    /// A document built from scratch around an already-created catalog.
    pub fn from_catalog(mut storage: Storage<Vec<u8>>, root: Catalog) -> Result<File<Vec<u8>>> {
        let root = storage.create(root)?;
        Ok(File {
            storage,
            trailer: Trailer {
                size: 0,
                prev: None,
                root,
                encrypt_dict: None,
                info_dict: None,
                id: Vec::new(),
                other: Dict::new(),
            },
        })
    }

    pub fn set_info(&mut self, info: InfoDict) {
        self.trailer.info_dict = Some(MaybeRef::Direct(std::rc::Rc::new(info)));
    }
}

#[derive(Object, ObjectWrite, Debug)]
pub struct Trailer {
    #[pdf(key = "Size")]
    pub size: i64,

    #[pdf(key = "Prev")]
    pub prev: Option<i64>,

    #[pdf(key = "Root")]
    pub root: RcRef<Catalog>,

    #[pdf(key = "Encrypt")]
    pub encrypt_dict: Option<RcRef<CryptDict>>,

    #[pdf(key = "Info")]
    pub info_dict: Option<MaybeRef<InfoDict>>,

    #[pdf(key = "ID")]
    pub id: Vec<PdfString>,

    #[pdf(other)]
    pub other: Dict,
}
