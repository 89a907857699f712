//! The tagged primitive value making up the object graph, plus the compact
//! byte-level serialization used by the writer.

use crate::error::*;
use crate::object::{NoResolve, ObjRef, Object, ObjectWrite, Resolve, Updater};

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike};
use itertools::Itertools;
use std::borrow::{Borrow, Cow};
use std::collections::{btree_map, BTreeMap};
use std::fmt;
use std::io;
use std::ops::{Deref, Index, Range};
use std::str;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Null,
    Bool(bool),
    /// A number written without a decimal point.
    Integer(i64),
    /// A number written with a decimal point. Kept apart from [`Integer`] so
    /// re-serialization does not invent or drop the point.
    Real(f32),
    String(PdfString),
    Stream(RawStream),
    Dictionary(Dict),
    Array(Vec<Primitive>),
    Reference(ObjRef),
    Name(Name),
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Primitive::Null => write!(f, "null"),
            Primitive::Bool(b) => b.fmt(f),
            Primitive::Integer(i) => i.fmt(f),
            Primitive::Real(n) => n.fmt(f),
            Primitive::String(ref s) => write!(f, "{:?}", s),
            Primitive::Stream(_) => write!(f, "stream"),
            Primitive::Dictionary(ref d) => d.fmt(f),
            Primitive::Array(ref arr) => write!(f, "[{}]", arr.iter().format(", ")),
            Primitive::Reference(r) => write!(f, "@{}", r.num),
            Primitive::Name(ref s) => write!(f, "{}", s),
        }
    }
}

impl Primitive {
    /// For debugging / error messages: the name of the variant.
    pub fn get_debug_name(&self) -> &'static str {
        match *self {
            Primitive::Null => "Null",
            Primitive::Bool(..) => "Bool",
            Primitive::Integer(..) => "Integer",
            Primitive::Real(..) => "Real",
            Primitive::String(..) => "String",
            Primitive::Stream(..) => "Stream",
            Primitive::Dictionary(..) => "Dictionary",
            Primitive::Array(..) => "Array",
            Primitive::Reference(..) => "Reference",
            Primitive::Name(..) => "Name",
        }
    }

    pub fn name(name: impl Into<Name>) -> Primitive {
        Primitive::Name(name.into())
    }

    pub fn array<O, T, I, U>(i: I, update: &mut U) -> Result<Primitive>
    where
        O: ObjectWrite,
        I: Iterator<Item = T>,
        T: Borrow<O>,
        U: Updater,
    {
        i.map(|t| t.borrow().to_primitive(update))
            .collect::<Result<_>>()
            .map(Primitive::Array)
    }

    /// Follow a reference, or return self unchanged.
    pub fn resolve(self, r: &impl Resolve) -> Result<Primitive> {
        match self {
            Primitive::Reference(id) => r.resolve(id),
            p => Ok(p),
        }
    }

    pub fn as_integer(&self) -> Result<i64> {
        match *self {
            Primitive::Integer(n) => Ok(n),
            ref p => unexpected_primitive!(Integer, p.get_debug_name()),
        }
    }
    pub fn as_u32(&self) -> Result<u32> {
        match *self {
            Primitive::Integer(n) if n >= 0 && n <= u32::MAX as i64 => Ok(n as u32),
            Primitive::Integer(_) => bail!("integer out of range"),
            ref p => unexpected_primitive!(Integer, p.get_debug_name()),
        }
    }
    pub fn as_usize(&self) -> Result<usize> {
        match *self {
            Primitive::Integer(n) if n >= 0 => Ok(n as usize),
            Primitive::Integer(_) => bail!("negative integer"),
            ref p => unexpected_primitive!(Integer, p.get_debug_name()),
        }
    }
    pub fn as_number(&self) -> Result<f32> {
        match *self {
            Primitive::Integer(n) => Ok(n as f32),
            Primitive::Real(f) => Ok(f),
            ref p => unexpected_primitive!(Number, p.get_debug_name()),
        }
    }
    pub fn as_bool(&self) -> Result<bool> {
        match *self {
            Primitive::Bool(b) => Ok(b),
            ref p => unexpected_primitive!(Bool, p.get_debug_name()),
        }
    }
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Primitive::Name(ref name) => Ok(name.as_str()),
            p => unexpected_primitive!(Name, p.get_debug_name()),
        }
    }
    pub fn as_string(&self) -> Result<&PdfString> {
        match self {
            Primitive::String(ref s) => Ok(s),
            p => unexpected_primitive!(String, p.get_debug_name()),
        }
    }
    /// Does not accept a Reference.
    pub fn as_array(&self) -> Result<&[Primitive]> {
        match self {
            Primitive::Array(ref v) => Ok(v),
            p => unexpected_primitive!(Array, p.get_debug_name()),
        }
    }
    pub fn as_dictionary(&self) -> Result<&Dict> {
        match self {
            Primitive::Dictionary(ref d) => Ok(d),
            p => unexpected_primitive!(Dictionary, p.get_debug_name()),
        }
    }
    pub fn into_reference(self) -> Result<ObjRef> {
        match self {
            Primitive::Reference(id) => Ok(id),
            p => unexpected_primitive!(Reference, p.get_debug_name()),
        }
    }
    /// Does accept a Reference.
    pub fn into_array(self, r: &impl Resolve) -> Result<Vec<Primitive>> {
        match self {
            Primitive::Array(v) => Ok(v),
            Primitive::Reference(id) => r.resolve(id)?.into_array(r),
            p => unexpected_primitive!(Array, p.get_debug_name()),
        }
    }
    /// Does accept a Reference. A stream yields its dictionary.
    pub fn into_dictionary(self, r: &impl Resolve) -> Result<Dict> {
        match self {
            Primitive::Dictionary(dict) => Ok(dict),
            Primitive::Stream(s) => Ok(s.dict),
            Primitive::Reference(id) => r.resolve(id)?.into_dictionary(r),
            p => unexpected_primitive!(Dictionary, p.get_debug_name()),
        }
    }
    pub fn into_name(self) -> Result<Name> {
        match self {
            Primitive::Name(name) => Ok(name),
            p => unexpected_primitive!(Name, p.get_debug_name()),
        }
    }
    pub fn into_string(self) -> Result<PdfString> {
        match self {
            Primitive::String(s) => Ok(s),
            p => unexpected_primitive!(String, p.get_debug_name()),
        }
    }
    pub fn into_stream(self, r: &impl Resolve) -> Result<RawStream> {
        match self {
            Primitive::Stream(s) => Ok(s),
            Primitive::Reference(id) => r.resolve(id)?.into_stream(r),
            p => unexpected_primitive!(Stream, p.get_debug_name()),
        }
    }

    /// Compact single-line serialization. Dictionaries come out with their
    /// keys in lexicographic order; streams must be materialized first.
    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        match self {
            Primitive::Null => write!(out, "null")?,
            Primitive::Bool(b) => write!(out, "{}", b)?,
            Primitive::Integer(i) => write!(out, "{}", i)?,
            Primitive::Real(n) => write_real(out, *n)?,
            Primitive::String(ref s) => s.serialize(out)?,
            Primitive::Stream(ref s) => s.serialize(out)?,
            Primitive::Dictionary(ref d) => d.serialize(out)?,
            Primitive::Array(ref arr) => {
                write!(out, "[")?;
                for (i, p) in arr.iter().enumerate() {
                    if i > 0 && p.needs_separator() {
                        write!(out, " ")?;
                    }
                    p.serialize(out)?;
                }
                write!(out, "]")?;
            }
            Primitive::Reference(r) => write!(out, "{} {} R", r.num, r.gen)?,
            Primitive::Name(ref s) => serialize_name(s.as_str(), out)?,
        }
        Ok(())
    }

    // tokens that start with a delimiter need no whitespace in front
    fn needs_separator(&self) -> bool {
        !matches!(
            self,
            Primitive::String(_)
                | Primitive::Dictionary(_)
                | Primitive::Array(_)
                | Primitive::Name(_)
        )
    }

    /// Rough heap footprint, used by the loader's cache for eviction.
    pub fn byte_cost(&self) -> usize {
        let base = std::mem::size_of::<Primitive>();
        base + match self {
            Primitive::String(s) => s.data.len(),
            Primitive::Name(n) => n.as_str().len(),
            Primitive::Array(a) => a.iter().map(|p| p.byte_cost()).sum(),
            Primitive::Dictionary(d) => d
                .iter()
                .map(|(k, v)| k.as_str().len() + v.byte_cost())
                .sum(),
            Primitive::Stream(s) => {
                s.dict
                    .iter()
                    .map(|(k, v)| k.as_str().len() + v.byte_cost())
                    .sum::<usize>()
                    + match s.data {
                        StreamData::Memory(ref bytes) => bytes.len(),
                        StreamData::InFile { .. } => 0,
                    }
            }
            _ => 0,
        }
    }
}

/// Emit a real without exponent notation and with the decimal point the
/// lexeme promises.
pub fn write_real(out: &mut impl io::Write, n: f32) -> Result<()> {
    if !n.is_finite() {
        bail!("cannot serialize non-finite number");
    }
    let s = format!("{}", n);
    out.write_all(s.as_bytes())?;
    if !s.contains('.') {
        out.write_all(b".0")?;
    }
    Ok(())
}

/// `/Name` with `#XX` escapes for delimiters, whitespace and non-printable
/// bytes.
pub fn serialize_name(s: &str, out: &mut impl io::Write) -> Result<()> {
    out.write_all(b"/")?;
    for &b in s.as_bytes() {
        match b {
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#' => {
                write!(out, "#{:02X}", b)?
            }
            0x21..=0x7e => out.write_all(&[b])?,
            _ => write!(out, "#{:02X}", b)?,
        }
    }
    Ok(())
}

/// An interned identifier. `#XX` escapes are decoded when the file is read
/// and re-applied on write.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Name(pub String);

impl Name {
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn into_string(self) -> String {
        self.0
    }
}
impl Deref for Name {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}
impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}
impl From<&str> for Name {
    fn from(s: &str) -> Name {
        Name(s.into())
    }
}
impl From<String> for Name {
    fn from(s: String) -> Name {
        Name(s)
    }
}
impl PartialEq<str> for Name {
    fn eq(&self, rhs: &str) -> bool {
        self.0 == rhs
    }
}
impl PartialEq<&str> for Name {
    fn eq(&self, rhs: &&str) -> bool {
        self.0 == *rhs
    }
}
impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}
impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

/// How a string was (or will be) written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringFormat {
    Literal,
    Hex,
}

/// A raw byte sequence plus its presentation hint.
#[derive(Clone, PartialEq)]
pub struct PdfString {
    pub data: Vec<u8>,
    pub format: StringFormat,
}

impl PdfString {
    pub fn new(data: impl Into<Vec<u8>>) -> PdfString {
        PdfString {
            data: data.into(),
            format: StringFormat::Literal,
        }
    }
    pub fn hex(data: impl Into<Vec<u8>>) -> PdfString {
        PdfString {
            data: data.into(),
            format: StringFormat::Hex,
        }
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
    /// UTF-16BE when the BOM says so, UTF-8/ASCII otherwise.
    pub fn as_str(&self) -> Result<Cow<str>> {
        if self.data.starts_with(&[0xfe, 0xff]) {
            let utf16: Vec<u16> = self.data[2..]
                .chunks(2)
                .map(|c| (c[0] as u16) << 8 | c.get(1).cloned().unwrap_or(0) as u16)
                .collect();
            Ok(Cow::Owned(String::from_utf16(&utf16)?))
        } else {
            Ok(Cow::Borrowed(str::from_utf8(&self.data)?))
        }
    }
    pub fn into_string(self) -> Result<String> {
        Ok(self.as_str()?.into_owned())
    }

    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        match self.format {
            StringFormat::Hex => {
                write!(out, "<")?;
                for &b in &self.data {
                    write!(out, "{:02X}", b)?;
                }
                write!(out, ">")?;
            }
            StringFormat::Literal => {
                write!(out, "(")?;
                for &b in &self.data {
                    match b {
                        b'\\' | b'(' | b')' => {
                            out.write_all(&[b'\\', b])?;
                        }
                        b'\n' => out.write_all(b"\\n")?,
                        b'\r' => out.write_all(b"\\r")?,
                        b'\t' => out.write_all(b"\\t")?,
                        0x08 => out.write_all(b"\\b")?,
                        0x0c => out.write_all(b"\\f")?,
                        0x00..=0x1f => write!(out, "\\{:03o}", b)?,
                        _ => out.write_all(&[b])?,
                    }
                }
                write!(out, ")")?;
            }
        }
        Ok(())
    }
}

impl AsRef<[u8]> for PdfString {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
impl fmt::Debug for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"")?;
        for &b in &self.data {
            match b {
                b'"' => write!(f, "\\\"")?,
                b' '..=b'~' => write!(f, "{}", b as char)?,
                x => write!(f, "\\x{:02x}", x)?,
            }
        }
        write!(f, "\"")
    }
}
impl Object for PdfString {
    fn from_primitive(p: Primitive, r: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::String(s) => Ok(s),
            Primitive::Reference(id) => PdfString::from_primitive(r.resolve(id)?, &NoResolve),
            p => unexpected_primitive!(String, p.get_debug_name()),
        }
    }
}
impl ObjectWrite for PdfString {
    fn to_primitive(&self, _update: &mut impl Updater) -> Result<Primitive> {
        Ok(Primitive::String(self.clone()))
    }
}

/// Primitive dictionary. A `BTreeMap` keeps the keys in the lexicographic
/// order the serializer must emit them in.
#[derive(Default, Clone, PartialEq)]
pub struct Dict {
    map: BTreeMap<Name, Primitive>,
}

impl Dict {
    pub fn new() -> Dict {
        Dict {
            map: BTreeMap::new(),
        }
    }
    pub fn len(&self) -> usize {
        self.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
    pub fn get(&self, key: &str) -> Option<&Primitive> {
        self.map.get(key)
    }
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }
    pub fn insert(&mut self, key: impl Into<Name>, val: impl Into<Primitive>) -> Option<Primitive> {
        self.map.insert(key.into(), val.into())
    }
    pub fn remove(&mut self, key: &str) -> Option<Primitive> {
        self.map.remove(key)
    }
    pub fn iter(&self) -> btree_map::Iter<Name, Primitive> {
        self.map.iter()
    }
    /// Like remove, but reports `MissingEntry` naming the calling type.
    pub fn require(&mut self, typ: &'static str, key: &str) -> Result<Primitive> {
        self.remove(key).ok_or(PdfError::MissingEntry {
            typ,
            field: key.into(),
        })
    }
    /// Assert that `key` maps to the name `value` (`required = true`), or is
    /// absent (`required = false`).
    pub fn expect(&self, typ: &'static str, key: &str, value: &str, required: bool) -> Result<()> {
        match self.map.get(key) {
            Some(ty) => {
                let ty = ty.as_name()?;
                if ty != value {
                    Err(PdfError::KeyValueMismatch {
                        key: key.into(),
                        value: value.into(),
                        found: ty.into(),
                    })
                } else {
                    Ok(())
                }
            }
            None if required => Err(PdfError::MissingEntry {
                typ,
                field: key.into(),
            }),
            None => Ok(()),
        }
    }

    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        write!(out, "<<")?;
        for (key, val) in self.iter() {
            serialize_name(key.as_str(), out)?;
            if val.needs_separator() {
                write!(out, " ")?;
            }
            val.serialize(out)?;
        }
        write!(out, ">>")?;
        Ok(())
    }
}

impl Deref for Dict {
    type Target = BTreeMap<Name, Primitive>;
    fn deref(&self) -> &BTreeMap<Name, Primitive> {
        &self.map
    }
}
impl<'a> Index<&'a str> for Dict {
    type Output = Primitive;
    fn index(&self, idx: &'a str) -> &Primitive {
        self.map.index(idx)
    }
}
impl IntoIterator for Dict {
    type Item = (Name, Primitive);
    type IntoIter = btree_map::IntoIter<Name, Primitive>;
    fn into_iter(self) -> Self::IntoIter {
        self.map.into_iter()
    }
}
impl<'a> IntoIterator for &'a Dict {
    type Item = (&'a Name, &'a Primitive);
    type IntoIter = btree_map::Iter<'a, Name, Primitive>;
    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}
impl fmt::Debug for Dict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{{")?;
        for (k, v) in self {
            writeln!(f, "{:>15}: {}", k.as_str(), v)?;
        }
        write!(f, "}}")
    }
}
impl fmt::Display for Dict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<{}>",
            self.iter()
                .format_with(", ", |(k, v), f| f(&format_args!("{}={}", k.as_str(), v)))
        )
    }
}
impl FromIterator<(Name, Primitive)> for Dict {
    fn from_iter<I: IntoIterator<Item = (Name, Primitive)>>(iter: I) -> Dict {
        Dict {
            map: iter.into_iter().collect(),
        }
    }
}

/// Where a stream's encoded payload lives.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamData {
    /// Still in the source file: decryption and decoding happen on demand.
    InFile { id: ObjRef, range: Range<usize> },
    /// Already materialized (decrypted, still filter-encoded).
    Memory(Arc<[u8]>),
}

/// Dictionary plus payload. The payload stays a handle into the file until
/// someone asks for the bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct RawStream {
    pub dict: Dict,
    pub data: StreamData,
}

impl RawStream {
    pub fn from_bytes(dict: Dict, data: impl Into<Arc<[u8]>>) -> RawStream {
        RawStream {
            dict,
            data: StreamData::Memory(data.into()),
        }
    }

    /// Length of the encoded payload as recorded in the dictionary.
    pub fn advertised_len(&self, r: &impl Resolve) -> Result<usize> {
        self.dict
            .get("Length")
            .ok_or(PdfError::MissingEntry {
                typ: "Stream",
                field: "Length".into(),
            })?
            .clone()
            .resolve(r)?
            .as_usize()
    }

    /// Serialization requires materialized data (see `Resolve::materialize`).
    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        let data = match self.data {
            StreamData::Memory(ref bytes) => bytes,
            StreamData::InFile { .. } => bail!("stream data not materialized"),
        };
        self.dict.serialize(out)?;
        out.write_all(b"\nstream\n")?;
        out.write_all(data)?;
        out.write_all(b"\nendstream")?;
        Ok(())
    }
}

impl Object for RawStream {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Stream(s) => Ok(s),
            Primitive::Reference(r) => RawStream::from_primitive(resolve.resolve(r)?, resolve),
            p => unexpected_primitive!(Stream, p.get_debug_name()),
        }
    }
}

impl From<i64> for Primitive {
    fn from(x: i64) -> Primitive {
        Primitive::Integer(x)
    }
}
impl From<i32> for Primitive {
    fn from(x: i32) -> Primitive {
        Primitive::Integer(x as i64)
    }
}
impl From<usize> for Primitive {
    fn from(x: usize) -> Primitive {
        Primitive::Integer(x as i64)
    }
}
impl From<f32> for Primitive {
    fn from(x: f32) -> Primitive {
        Primitive::Real(x)
    }
}
impl From<bool> for Primitive {
    fn from(x: bool) -> Primitive {
        Primitive::Bool(x)
    }
}
impl From<Name> for Primitive {
    fn from(x: Name) -> Primitive {
        Primitive::Name(x)
    }
}
impl From<PdfString> for Primitive {
    fn from(x: PdfString) -> Primitive {
        Primitive::String(x)
    }
}
impl From<RawStream> for Primitive {
    fn from(x: RawStream) -> Primitive {
        Primitive::Stream(x)
    }
}
impl From<Dict> for Primitive {
    fn from(x: Dict) -> Primitive {
        Primitive::Dictionary(x)
    }
}
impl From<Vec<Primitive>> for Primitive {
    fn from(x: Vec<Primitive>) -> Primitive {
        Primitive::Array(x)
    }
}
impl From<ObjRef> for Primitive {
    fn from(x: ObjRef) -> Primitive {
        Primitive::Reference(x)
    }
}

fn parse_or<T: str::FromStr + Clone>(buffer: &str, range: Range<usize>, default: T) -> T {
    buffer
        .get(range)
        .map(|s| str::parse::<T>(s).unwrap_or_else(|_| default.clone()))
        .unwrap_or(default)
}

impl Object for DateTime<FixedOffset> {
    fn from_primitive(p: Primitive, r: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::String(s) => {
                let data = s.into_bytes();
                let s = str::from_utf8(&data)?;
                if s.len() < 6 || &s[0..2] != "D:" {
                    bail!("malformed date string");
                }
                let year = str::parse::<i32>(&s[2..6])?;
                let month = parse_or(s, 6..8, 1);
                let day = parse_or(s, 8..10, 1);
                let hour = parse_or(s, 10..12, 0);
                let minute = parse_or(s, 12..14, 0);
                let second = parse_or(s, 14..16, 0);
                let (tz_sign, tz_hour, tz_minute) = match s.as_bytes().get(16) {
                    Some(b'-') => (-1, parse_or(s, 17..19, 0), parse_or(s, 20..22, 0)),
                    Some(b'+') => (1, parse_or(s, 17..19, 0), parse_or(s, 20..22, 0)),
                    _ => (1, 0, 0),
                };
                let tz = FixedOffset::east_opt(tz_sign * (tz_hour * 3600 + tz_minute * 60))
                    .ok_or_else(|| PdfError::Other {
                        msg: "invalid timezone offset".into(),
                    })?;
                tz.with_ymd_and_hms(year, month, day, hour, minute, second)
                    .single()
                    .ok_or_else(|| PdfError::Other {
                        msg: "invalid date".into(),
                    })
            }
            Primitive::Reference(id) => Self::from_primitive(r.resolve(id)?, &NoResolve),
            p => unexpected_primitive!(String, p.get_debug_name()),
        }
    }
}
impl ObjectWrite for DateTime<FixedOffset> {
    fn to_primitive(&self, _update: &mut impl Updater) -> Result<Primitive> {
        let offset = self.offset().local_minus_utc();
        let (sign, offset) = if offset < 0 {
            ('-', -offset)
        } else {
            ('+', offset)
        };
        let s = format!(
            "D:{:04}{:02}{:02}{:02}{:02}{:02}{}{:02}'{:02}'",
            self.year(),
            self.month(),
            self.day(),
            self.hour(),
            self.minute(),
            self.second(),
            sign,
            offset / 3600,
            (offset % 3600) / 60,
        );
        Ok(Primitive::String(PdfString::new(s.into_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ser(p: &Primitive) -> String {
        let mut out = Vec::new();
        p.serialize(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn dict_keys_sorted() {
        let mut dict = Dict::new();
        dict.insert("Zebra", Primitive::Integer(1));
        dict.insert("Alpha", Primitive::Integer(2));
        dict.insert("Mid", Primitive::Null);
        assert_eq!(
            ser(&Primitive::Dictionary(dict)),
            "<</Alpha 2/Mid null/Zebra 1>>"
        );
    }

    #[test]
    fn real_keeps_decimal_point() {
        assert_eq!(ser(&Primitive::Real(2.0)), "2.0");
        assert_eq!(ser(&Primitive::Real(0.5)), "0.5");
        assert_eq!(ser(&Primitive::Integer(2)), "2");
    }

    #[test]
    fn name_escapes() {
        assert_eq!(ser(&Primitive::name("A B#c")), "/A#20B#23c");
        assert_eq!(ser(&Primitive::name("Plain")), "/Plain");
    }

    #[test]
    fn string_formats() {
        assert_eq!(ser(&Primitive::String(PdfString::new(&b"a(b)"[..]))), "(a\\(b\\))");
        assert_eq!(ser(&Primitive::String(PdfString::hex(&b"\x01\xff"[..]))), "<01FF>");
    }
}
