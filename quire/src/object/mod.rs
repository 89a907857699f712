//! The `Object`/`ObjectWrite` traits bridging primitives and typed views,
//! the resolver and updater seams, and the reference wrapper types.
//!
//! Cross-links in the graph (pages to parent, annotations to popup, tree
//! nodes to parent) are always `(num, gen)` references resolved through a
//! lookup, never ownership pointers.

mod stream;
pub mod types;

pub use self::stream::{ObjectStream, Stream};
pub use crate::file::{LoadOptions, PromisedRef, RepairPolicy};

use crate::error::*;
use crate::parse::ParseFlags;
use crate::primitive::{Dict, Name, Primitive, RawStream};

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;

/// Identity of an indirect object.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    pub num: u64,
    pub gen: u16,
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.gen)
    }
}
impl Object for ObjRef {
    fn from_primitive(p: Primitive, _: &impl Resolve) -> Result<Self> {
        p.into_reference()
    }
}
impl ObjectWrite for ObjRef {
    fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
        Ok(Primitive::Reference(*self))
    }
}

/// Read access to the object graph.
pub trait Resolve {
    fn resolve(&self, r: ObjRef) -> Result<Primitive>;
    /// Resolve while restricting what the parsed object may be; `depth`
    /// bounds chained indirection.
    fn resolve_flags(&self, r: ObjRef, flags: ParseFlags, depth: usize) -> Result<Primitive>;
    fn get<T: Object + fmt::Debug>(&self, r: Ref<T>) -> Result<RcRef<T>>;
    fn options(&self) -> &LoadOptions;
    /// The encoded payload of a stream, with encryption already peeled.
    fn stream_data(&self, stream: &RawStream) -> Result<Arc<[u8]>>;
}

pub struct NoResolve;
impl Resolve for NoResolve {
    fn resolve(&self, _: ObjRef) -> Result<Primitive> {
        Err(PdfError::NoResolver)
    }
    fn resolve_flags(&self, _: ObjRef, _: ParseFlags, _: usize) -> Result<Primitive> {
        Err(PdfError::NoResolver)
    }
    fn get<T: Object + fmt::Debug>(&self, _: Ref<T>) -> Result<RcRef<T>> {
        Err(PdfError::NoResolver)
    }
    fn options(&self) -> &LoadOptions {
        &crate::file::DEFAULT_LOAD_OPTIONS
    }
    fn stream_data(&self, stream: &RawStream) -> Result<Arc<[u8]>> {
        match stream.data {
            crate::primitive::StreamData::Memory(ref bytes) => Ok(bytes.clone()),
            crate::primitive::StreamData::InFile { .. } => Err(PdfError::NoResolver),
        }
    }
}

/// Construct a typed view from a primitive.
pub trait Object: Sized + 'static {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self>;
}

/// Lower a typed view back into the graph. `update` receives any new
/// indirect objects created along the way.
pub trait ObjectWrite {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive>;
}

/// Mutation access to the object graph: create, replace and promise
/// indirect objects. Changes are recorded as dirty and picked up by the
/// serializer.
pub trait Updater {
    fn create<T: ObjectWrite>(&mut self, obj: T) -> Result<RcRef<T>>;
    fn update<T: ObjectWrite>(&mut self, old: ObjRef, obj: T) -> Result<RcRef<T>>;
    fn promise<T: Object>(&mut self) -> PromisedRef<T>;
    fn fulfill<T: ObjectWrite>(&mut self, promise: PromisedRef<T>, obj: T) -> Result<RcRef<T>>;
}

pub struct NoUpdate;
impl Updater for NoUpdate {
    fn create<T: ObjectWrite>(&mut self, _obj: T) -> Result<RcRef<T>> {
        Err(PdfError::NoResolver)
    }
    fn update<T: ObjectWrite>(&mut self, _old: ObjRef, _obj: T) -> Result<RcRef<T>> {
        Err(PdfError::NoResolver)
    }
    fn promise<T: Object>(&mut self) -> PromisedRef<T> {
        panic!("NoUpdate cannot promise objects")
    }
    fn fulfill<T: ObjectWrite>(&mut self, _promise: PromisedRef<T>, _obj: T) -> Result<RcRef<T>> {
        Err(PdfError::NoResolver)
    }
}

/// Marks that `Self` may stand where a `T` is expected (pages in the page
/// tree, for instance).
pub trait SubType<T> {}

/// A typed reference: `(num, gen)` plus the type it resolves to.
pub struct Ref<T> {
    inner: ObjRef,
    _marker: PhantomData<T>,
}
impl<T> Clone for Ref<T> {
    fn clone(&self) -> Ref<T> {
        *self
    }
}
impl<T> Copy for Ref<T> {}

impl<T> Ref<T> {
    pub fn new(inner: ObjRef) -> Ref<T> {
        Ref {
            inner,
            _marker: PhantomData,
        }
    }
    pub fn from_num(num: u64) -> Ref<T> {
        Ref::new(ObjRef { num, gen: 0 })
    }
    pub fn get_inner(&self) -> ObjRef {
        self.inner
    }
    pub fn upcast<U>(self) -> Ref<U>
    where
        T: SubType<U>,
    {
        Ref::new(self.inner)
    }
}
impl<T: Object> Object for Ref<T> {
    fn from_primitive(p: Primitive, _: &impl Resolve) -> Result<Self> {
        Ok(Ref::new(p.into_reference()?))
    }
}
impl<T> ObjectWrite for Ref<T> {
    fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
        Ok(Primitive::Reference(self.inner))
    }
}
impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Ref({})", self.inner.num)
    }
}
impl<T> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state)
    }
}
impl<T> PartialEq for Ref<T> {
    fn eq(&self, rhs: &Self) -> bool {
        self.inner.eq(&rhs.inner)
    }
}
impl<T> Eq for Ref<T> {}

/// A resolved object along with the reference it came from. Cheap to clone.
#[derive(Debug)]
pub struct RcRef<T> {
    inner: ObjRef,
    data: Rc<T>,
}

impl<T> RcRef<T> {
    pub fn new(inner: ObjRef, data: Rc<T>) -> RcRef<T> {
        RcRef { inner, data }
    }
    pub fn get_ref(&self) -> Ref<T> {
        Ref::new(self.inner)
    }
    pub fn data(&self) -> &Rc<T> {
        &self.data
    }
}
impl<T: Object + fmt::Debug> Object for RcRef<T> {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Reference(r) => resolve.get(Ref::new(r)),
            p => Err(PdfError::UnexpectedPrimitive {
                expected: "Reference",
                found: p.get_debug_name(),
            }),
        }
    }
}
impl<T> ObjectWrite for RcRef<T> {
    fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
        Ok(Primitive::Reference(self.inner))
    }
}
impl<T> Deref for RcRef<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.data
    }
}
impl<T> Clone for RcRef<T> {
    fn clone(&self) -> RcRef<T> {
        RcRef {
            inner: self.inner,
            data: self.data.clone(),
        }
    }
}
impl<'a, T> From<&'a RcRef<T>> for Ref<T> {
    fn from(r: &'a RcRef<T>) -> Ref<T> {
        Ref::new(r.inner)
    }
}
impl<T> Hash for RcRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(&**self, state)
    }
}
impl<T> PartialEq for RcRef<T> {
    fn eq(&self, rhs: &Self) -> bool {
        std::ptr::eq(&**self, &**rhs)
    }
}
impl<T> Eq for RcRef<T> {}

/// Either inline or behind a reference - common for dictionaries that the
/// producer may or may not have made indirect.
#[derive(Debug)]
pub enum MaybeRef<T> {
    Direct(Rc<T>),
    Indirect(RcRef<T>),
}
impl<T> MaybeRef<T> {
    pub fn as_ref(&self) -> Option<Ref<T>> {
        match *self {
            MaybeRef::Indirect(ref r) => Some(r.get_ref()),
            _ => None,
        }
    }
}
impl<T: Object + fmt::Debug> Object for MaybeRef<T> {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        Ok(match p {
            Primitive::Reference(r) => MaybeRef::Indirect(resolve.get(Ref::new(r))?),
            p => MaybeRef::Direct(Rc::new(T::from_primitive(p, resolve)?)),
        })
    }
}
impl<T: ObjectWrite> ObjectWrite for MaybeRef<T> {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        match self {
            MaybeRef::Direct(ref inner) => inner.to_primitive(update),
            MaybeRef::Indirect(ref r) => r.to_primitive(update),
        }
    }
}
impl<T> Deref for MaybeRef<T> {
    type Target = T;
    fn deref(&self) -> &T {
        match *self {
            MaybeRef::Direct(ref t) => t,
            MaybeRef::Indirect(ref r) => r,
        }
    }
}
impl<T> Clone for MaybeRef<T> {
    fn clone(&self) -> Self {
        match *self {
            MaybeRef::Direct(ref rc) => MaybeRef::Direct(rc.clone()),
            MaybeRef::Indirect(ref r) => MaybeRef::Indirect(r.clone()),
        }
    }
}
impl<T> From<Rc<T>> for MaybeRef<T> {
    fn from(r: Rc<T>) -> MaybeRef<T> {
        MaybeRef::Direct(r)
    }
}
impl<T> From<RcRef<T>> for MaybeRef<T> {
    fn from(r: RcRef<T>) -> MaybeRef<T> {
        MaybeRef::Indirect(r)
    }
}
impl<T> From<MaybeRef<T>> for Rc<T> {
    fn from(r: MaybeRef<T>) -> Rc<T> {
        match r {
            MaybeRef::Direct(rc) => rc,
            MaybeRef::Indirect(r) => r.data,
        }
    }
}
impl<T> Hash for MaybeRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(&**self, state)
    }
}
impl<T> PartialEq for MaybeRef<T> {
    fn eq(&self, rhs: &Self) -> bool {
        std::ptr::eq(&**self, &**rhs)
    }
}
impl<T> Eq for MaybeRef<T> {}

/// Keeps the primitive and converts on demand - for fields that are
/// expensive to project eagerly (fonts, annotation arrays).
#[derive(Clone, Debug)]
pub struct Lazy<T> {
    primitive: Primitive,
    _marker: PhantomData<T>,
}

impl<T: Object> Lazy<T> {
    pub fn load(&self, r: &impl Resolve) -> Result<T> {
        T::from_primitive(self.primitive.clone(), r)
    }
    pub fn primitive(&self) -> &Primitive {
        &self.primitive
    }
    pub fn from(primitive: Primitive) -> Lazy<T> {
        Lazy {
            primitive,
            _marker: PhantomData,
        }
    }
}
impl<T: Object> Object for Lazy<T> {
    fn from_primitive(p: Primitive, _: &impl Resolve) -> Result<Self> {
        Ok(Lazy::from(p))
    }
}
impl<T> ObjectWrite for Lazy<T> {
    fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
        Ok(self.primitive.clone())
    }
}
impl<T> Default for Lazy<T> {
    fn default() -> Lazy<T> {
        Lazy {
            primitive: Primitive::Null,
            _marker: PhantomData,
        }
    }
}

//////////////////////////////////////
// Object for primitives & std types
//////////////////////////////////////

impl Object for Primitive {
    fn from_primitive(p: Primitive, _: &impl Resolve) -> Result<Self> {
        Ok(p)
    }
}
impl ObjectWrite for Primitive {
    fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
        Ok(self.clone())
    }
}

impl Object for Dict {
    fn from_primitive(p: Primitive, r: &impl Resolve) -> Result<Self> {
        p.into_dictionary(r)
    }
}
impl ObjectWrite for Dict {
    fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
        Ok(Primitive::Dictionary(self.clone()))
    }
}

impl Object for Name {
    fn from_primitive(p: Primitive, r: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Name(name) => Ok(name),
            Primitive::Reference(id) => Name::from_primitive(r.resolve(id)?, &NoResolve),
            p => unexpected_primitive!(Name, p.get_debug_name()),
        }
    }
}
impl ObjectWrite for Name {
    fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
        Ok(Primitive::Name(self.clone()))
    }
}

macro_rules! int_object {
    ($($ty:ty),*) => {
        $(
            impl Object for $ty {
                fn from_primitive(p: Primitive, r: &impl Resolve) -> Result<Self> {
                    let n = match p {
                        Primitive::Reference(id) => r.resolve(id)?.as_integer()?,
                        p => p.as_integer()?,
                    };
                    <$ty>::try_from(n).map_err(|_| PdfError::Other {
                        msg: format!("integer {} out of range", n),
                    })
                }
            }
            impl ObjectWrite for $ty {
                fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
                    Ok(Primitive::Integer(*self as i64))
                }
            }
        )*
    };
}
int_object!(i64, i32, u64, u32, u16, usize);

impl Object for f32 {
    fn from_primitive(p: Primitive, r: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Reference(id) => r.resolve(id)?.as_number(),
            p => p.as_number(),
        }
    }
}
impl ObjectWrite for f32 {
    fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
        Ok(Primitive::Real(*self))
    }
}

impl Object for bool {
    fn from_primitive(p: Primitive, r: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Reference(id) => r.resolve(id)?.as_bool(),
            p => p.as_bool(),
        }
    }
}
impl ObjectWrite for bool {
    fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
        Ok(Primitive::Bool(*self))
    }
}

impl<T: Object> Object for Option<T> {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Null => Ok(None),
            p => T::from_primitive(p, resolve).map(Some),
        }
    }
}
impl<T: ObjectWrite> ObjectWrite for Option<T> {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        match self {
            None => Ok(Primitive::Null),
            Some(t) => t.to_primitive(update),
        }
    }
}

/// One-or-many: a lone element is promoted to a single-element vector.
impl<T: Object> Object for Vec<T> {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Null => Ok(Vec::new()),
            Primitive::Array(items) => items
                .into_iter()
                .map(|p| T::from_primitive(p, resolve))
                .collect(),
            Primitive::Reference(id) => Vec::from_primitive(resolve.resolve(id)?, resolve),
            p => Ok(vec![T::from_primitive(p, resolve)?]),
        }
    }
}
impl<T: ObjectWrite> ObjectWrite for Vec<T> {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        if self.is_empty() {
            Ok(Primitive::Null)
        } else {
            Primitive::array::<T, _, _, _>(self.iter(), update)
        }
    }
}

impl<T: Object> Object for HashMap<Name, T> {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Null => Ok(HashMap::new()),
            Primitive::Dictionary(dict) => dict
                .into_iter()
                .map(|(k, v)| Ok((k, T::from_primitive(v, resolve)?)))
                .collect(),
            Primitive::Reference(id) => HashMap::from_primitive(resolve.resolve(id)?, resolve),
            p => unexpected_primitive!(Dictionary, p.get_debug_name()),
        }
    }
}
impl<T: ObjectWrite> ObjectWrite for HashMap<Name, T> {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        if self.is_empty() {
            return Ok(Primitive::Null);
        }
        let mut dict = Dict::new();
        for (k, v) in self.iter() {
            dict.insert(k.clone(), v.to_primitive(update)?);
        }
        Ok(Primitive::Dictionary(dict))
    }
}

impl<T: ObjectWrite + ?Sized> ObjectWrite for Rc<T> {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        (**self).to_primitive(update)
    }
}

impl Object for () {
    fn from_primitive(_: Primitive, _: &impl Resolve) -> Result<Self> {
        Ok(())
    }
}
impl ObjectWrite for () {
    fn to_primitive(&self, _: &mut impl Updater) -> Result<Primitive> {
        Ok(Primitive::Null)
    }
}
