//! Typed stream wrapper with deferred decoding, and the reader side of
//! object streams (`/Type /ObjStm`).

use crate as quire;
use crate::error::*;
use crate::filters::{self, LzwFlateParams, StreamFilter};
use crate::object::*;
use crate::primitive::{Dict, Primitive, RawStream, StreamData};
use crate::scan::Scanner;

use once_cell::unsync::OnceCell;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A stream projected onto `I` (the typed remainder of its dictionary).
/// The payload stays a cheap handle; `data()` decrypts and decodes on the
/// first call and caches the result.
#[derive(Clone)]
pub struct Stream<I = ()> {
    pub info: I,
    filters: Vec<StreamFilter>,
    raw: RawStream,
    decoded: OnceCell<Arc<[u8]>>,
}

impl<I: Object + fmt::Debug> Stream<I> {
    pub fn from_raw(raw: RawStream, resolve: &impl Resolve) -> Result<Self> {
        let filters = t!(filters::filters_from_dict(&raw.dict, resolve));
        let mut dict = raw.dict.clone();
        dict.remove("Length");
        dict.remove("Filter");
        dict.remove("DecodeParms");
        dict.remove("DP");
        let info = t!(I::from_primitive(Primitive::Dictionary(dict), resolve));
        Ok(Stream {
            info,
            filters,
            raw,
            decoded: OnceCell::new(),
        })
    }
}

impl<I> Stream<I> {
    /// A fresh, unfiltered stream around plaintext bytes.
    pub fn new(info: I, data: impl Into<Arc<[u8]>>) -> Stream<I> {
        Stream {
            info,
            filters: Vec::new(),
            raw: RawStream {
                dict: Dict::new(),
                data: StreamData::Memory(data.into()),
            },
            decoded: OnceCell::new(),
        }
    }

    /// A Flate-compressed stream around plaintext bytes.
    pub fn compressed(info: I, data: &[u8], level: u8) -> Stream<I> {
        let encoded = filters::flate_encode(data, level);
        Stream {
            info,
            filters: vec![StreamFilter::Flate(LzwFlateParams::default())],
            raw: RawStream {
                dict: Dict::new(),
                data: StreamData::Memory(encoded.into()),
            },
            decoded: OnceCell::new(),
        }
    }

    pub fn with_filter(info: I, filter: StreamFilter, plain: &[u8]) -> Result<Stream<I>> {
        let encoded = filters::encode(plain, &filter)?;
        Ok(Stream {
            info,
            filters: vec![filter],
            raw: RawStream {
                dict: Dict::new(),
                data: StreamData::Memory(encoded.into()),
            },
            decoded: OnceCell::new(),
        })
    }

    pub fn filters(&self) -> &[StreamFilter] {
        &self.filters
    }

    /// The encoded payload, decrypted but not defiltered.
    pub fn raw_data(&self, r: &impl Resolve) -> Result<Arc<[u8]>> {
        r.stream_data(&self.raw)
    }

    /// The decoded payload. Image codec output stays opaque (the bytes of
    /// the innermost non-image encoding).
    pub fn data(&self, r: &impl Resolve) -> Result<Arc<[u8]>> {
        self.decoded
            .get_or_try_init(|| {
                let encoded = r.stream_data(&self.raw)?;
                let decoded = filters::decode_all(&encoded, &self.filters, &r.options().limits)?;
                Ok(Arc::from(decoded))
            })
            .cloned()
    }

    /// If this holds DCT-encoded data, the compressed JPEG as-is.
    pub fn as_jpeg(&self, r: &impl Resolve) -> Option<Arc<[u8]>> {
        match self.filters.as_slice() {
            [StreamFilter::Dct(_)] => self.raw_data(r).ok(),
            _ => None,
        }
    }
}

impl<I: ObjectWrite> Stream<I> {
    /// Reassemble a full primitive stream: typed info, filter names,
    /// parameter dictionaries and `/Length`.
    pub fn to_raw(&self, update: &mut impl Updater) -> Result<RawStream> {
        let mut dict = match self.info.to_primitive(update)? {
            Primitive::Dictionary(dict) => dict,
            Primitive::Null => Dict::new(),
            p => bail!("stream info must be a dictionary (found {})", p.get_debug_name()),
        };

        let data = match self.raw.data {
            StreamData::Memory(ref bytes) => bytes.clone(),
            StreamData::InFile { .. } => bail!("stream data not materialized"),
        };

        match self.filters.len() {
            0 => {}
            1 => {
                dict.insert("Filter", Primitive::name(self.filters[0].name()));
                if let Some(params) = filter_params(&self.filters[0], update)? {
                    dict.insert("DecodeParms", params);
                }
            }
            _ => {
                let names: Vec<Primitive> = self
                    .filters
                    .iter()
                    .map(|f| Primitive::name(f.name()))
                    .collect();
                let mut all_params = Vec::with_capacity(self.filters.len());
                let mut any = false;
                for f in &self.filters {
                    match filter_params(f, update)? {
                        Some(p) => {
                            any = true;
                            all_params.push(p);
                        }
                        None => all_params.push(Primitive::Null),
                    }
                }
                dict.insert("Filter", Primitive::Array(names));
                if any {
                    dict.insert("DecodeParms", Primitive::Array(all_params));
                }
            }
        }
        dict.insert("Length", Primitive::Integer(data.len() as i64));

        Ok(RawStream {
            dict,
            data: StreamData::Memory(data),
        })
    }
}

/// Parameter dictionary for a filter, omitted when everything is default.
fn filter_params(filter: &StreamFilter, update: &mut impl Updater) -> Result<Option<Primitive>> {
    let params = match filter {
        StreamFilter::Lzw(p) | StreamFilter::Flate(p) => {
            if *p == LzwFlateParams::default() {
                None
            } else {
                Some(p.to_primitive(update)?)
            }
        }
        StreamFilter::Fax(p) => Some(p.to_primitive(update)?),
        _ => None,
    };
    Ok(params)
}

impl<I: Object + fmt::Debug> Object for Stream<I> {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        let raw = RawStream::from_primitive(p, resolve)?;
        Stream::from_raw(raw, resolve)
    }
}
impl<I: ObjectWrite> ObjectWrite for Stream<I> {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        self.to_raw(update).map(Primitive::Stream)
    }
}
impl<I: fmt::Debug> fmt::Debug for Stream<I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Stream")
            .field("info", &self.info)
            .field("filters", &self.filters)
            .finish()
    }
}
impl<I> Deref for Stream<I> {
    type Target = I;
    fn deref(&self) -> &I {
        &self.info
    }
}

#[derive(Object, ObjectWrite, Debug, Default, Clone)]
#[pdf(Type = "ObjStm")]
pub struct ObjStmInfo {
    /// Number of compressed objects.
    #[pdf(key = "N")]
    pub n: i64,

    /// Offset of the first object body within the decoded payload.
    #[pdf(key = "First")]
    pub first: i64,

    /// An object stream this one extends.
    #[pdf(key = "Extends")]
    pub extends: Option<ObjRef>,
}

/// An expanded object stream: the decoded payload plus the
/// `obj_num offset` index that precedes the bodies.
pub struct ObjectStream {
    data: Arc<[u8]>,
    /// (object number, offset) per slot, in stream order.
    index: Vec<(u64, usize)>,
    first: usize,
}

impl ObjectStream {
    pub fn from_stream(stream: Stream<ObjStmInfo>, resolve: &impl Resolve) -> Result<ObjectStream> {
        if stream.info.extends.is_some() {
            warn!("/Extends chains of object streams are not followed");
        }
        let data = t!(stream.data(resolve));
        let mut index = Vec::with_capacity(stream.info.n as usize);
        {
            let mut scanner = Scanner::new(&data);
            for _ in 0..stream.info.n {
                let num = t!(scanner.next()).to::<u64>()?;
                let offset = t!(scanner.next()).to::<usize>()?;
                index.push((num, offset));
            }
        }
        Ok(ObjectStream {
            data,
            index,
            first: stream.info.first as usize,
        })
    }

    pub fn n_objects(&self) -> usize {
        self.index.len()
    }

    /// The slice holding object `index`, plus the object number the header
    /// table claims for it.
    pub fn object_slice(&self, index: usize) -> Result<(u64, &[u8])> {
        let &(num, offset) = self.index.get(index).ok_or(PdfError::ObjStmOutOfBounds {
            index,
            max: self.index.len(),
        })?;
        let start = self.first + offset;
        let end = match self.index.get(index + 1) {
            Some(&(_, next)) => self.first + next,
            None => self.data.len(),
        };
        if start > end || end > self.data.len() {
            err!(PdfError::ObjStmOutOfBounds {
                index,
                max: self.index.len(),
            });
        }
        Ok((num, &self.data[start..end]))
    }
}

impl Object for ObjectStream {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<ObjectStream> {
        let stream = Stream::<ObjStmInfo>::from_primitive(p, resolve)?;
        ObjectStream::from_stream(stream, resolve)
    }
}

impl fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ObjectStream")
            .field("objects", &self.index.len())
            .field("first", &self.first)
            .finish()
    }
}
