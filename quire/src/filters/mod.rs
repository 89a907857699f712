//! The composable stream filter pipeline. Decoders run left to right over
//! the `/Filter` array, first-listed first, per ISO 32000 (so the array
//! names the decode order and encoding applied them right to left). Every
//! decoder enforces the configured resource limits so a crafted stream
//! cannot blow up memory.

mod ascii;
mod predict;

pub use self::ascii::{decode_85, decode_hex, encode_85, encode_hex};
pub use self::predict::{apply_predictor, undo_predictor, PredictorKind};

use crate as quire;
use crate::error::*;
use crate::object::{Object, Resolve};
use crate::primitive::{Dict, Name, Primitive};
use once_cell::sync::OnceCell;
use std::io::Read;

/// Resource caps enforced while decoding.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Upper bound on the decoded size of a single stream.
    pub max_decoded: usize,
    /// Upper bound on `decoded_size / encoded_size`.
    pub max_expansion: usize,
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            max_decoded: 256 << 20,
            max_expansion: 32_768,
        }
    }
}

impl Limits {
    fn ensure(&self, produced: usize, consumed: usize) -> Result<()> {
        if produced > self.max_decoded {
            err!(PdfError::LimitExceeded {
                what: "decoded stream size",
                limit: self.max_decoded,
            });
        }
        if produced > consumed.max(1).saturating_mul(self.max_expansion) {
            err!(PdfError::LimitExceeded {
                what: "stream expansion ratio",
                limit: self.max_expansion,
            });
        }
        Ok(())
    }
}

#[derive(Object, ObjectWrite, Debug, Clone, PartialEq)]
pub struct LzwFlateParams {
    #[pdf(key = "Predictor", default = "1")]
    pub predictor: i64,
    #[pdf(key = "Colors", default = "1")]
    pub colors: i64,
    #[pdf(key = "BitsPerComponent", default = "8")]
    pub bits_per_component: i64,
    #[pdf(key = "Columns", default = "1")]
    pub columns: i64,
    #[pdf(key = "EarlyChange", default = "1")]
    pub early_change: i64,
}
impl Default for LzwFlateParams {
    fn default() -> LzwFlateParams {
        LzwFlateParams {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
            early_change: 1,
        }
    }
}

#[derive(Object, ObjectWrite, Debug, Clone, Default)]
pub struct DctParams {
    #[pdf(key = "ColorTransform")]
    pub color_transform: Option<i64>,
}

#[derive(Object, ObjectWrite, Debug, Clone)]
pub struct FaxParams {
    #[pdf(key = "K", default = "0")]
    pub k: i64,
    #[pdf(key = "EndOfLine", default = "false")]
    pub end_of_line: bool,
    #[pdf(key = "EncodedByteAlign", default = "false")]
    pub encoded_byte_align: bool,
    #[pdf(key = "Columns", default = "1728")]
    pub columns: i64,
    #[pdf(key = "Rows", default = "0")]
    pub rows: i64,
    #[pdf(key = "EndOfBlock", default = "true")]
    pub end_of_block: bool,
    #[pdf(key = "BlackIs1", default = "false")]
    pub black_is_1: bool,
    #[pdf(key = "DamagedRowsBeforeError", default = "0")]
    pub damaged_rows_before_error: i64,
}

/// A named crypt filter in a `/Filter` chain. `/Identity` is a pass-through;
/// anything else was already handled by the security handler when the
/// payload was pulled out of the file.
#[derive(Debug, Clone)]
pub struct CryptParams {
    pub name: Name,
}

#[derive(Debug, Clone)]
pub enum StreamFilter {
    AsciiHex,
    Ascii85,
    Lzw(LzwFlateParams),
    Flate(LzwFlateParams),
    RunLength,
    Jpx,
    Dct(DctParams),
    Fax(FaxParams),
    Jbig2,
    Crypt(CryptParams),
}

impl StreamFilter {
    pub fn from_kind_and_params(kind: &str, params: Dict, r: &impl Resolve) -> Result<StreamFilter> {
        let params = Primitive::Dictionary(params);
        Ok(match kind {
            "ASCIIHexDecode" | "AHx" => StreamFilter::AsciiHex,
            "ASCII85Decode" | "A85" => StreamFilter::Ascii85,
            "LZWDecode" | "LZW" => StreamFilter::Lzw(LzwFlateParams::from_primitive(params, r)?),
            "FlateDecode" | "Fl" => StreamFilter::Flate(LzwFlateParams::from_primitive(params, r)?),
            "RunLengthDecode" | "RL" => StreamFilter::RunLength,
            "JPXDecode" => StreamFilter::Jpx,
            "DCTDecode" | "DCT" => StreamFilter::Dct(DctParams::from_primitive(params, r)?),
            "CCITTFaxDecode" | "CCF" => StreamFilter::Fax(FaxParams::from_primitive(params, r)?),
            "JBIG2Decode" => StreamFilter::Jbig2,
            "Crypt" => {
                let mut dict = params.into_dictionary(r)?;
                let name = match dict.remove("Name") {
                    Some(p) => p.into_name()?,
                    None => Name::from("Identity"),
                };
                StreamFilter::Crypt(CryptParams { name })
            }
            ty => bail!("unrecognized filter type {:?}", ty),
        })
    }

    pub fn name(&self) -> &'static str {
        match *self {
            StreamFilter::AsciiHex => "ASCIIHexDecode",
            StreamFilter::Ascii85 => "ASCII85Decode",
            StreamFilter::Lzw(_) => "LZWDecode",
            StreamFilter::Flate(_) => "FlateDecode",
            StreamFilter::RunLength => "RunLengthDecode",
            StreamFilter::Jpx => "JPXDecode",
            StreamFilter::Dct(_) => "DCTDecode",
            StreamFilter::Fax(_) => "CCITTFaxDecode",
            StreamFilter::Jbig2 => "JBIG2Decode",
            StreamFilter::Crypt(_) => "Crypt",
        }
    }

    /// Image codecs: their payloads stay opaque unless pixel data is
    /// explicitly requested.
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            StreamFilter::Jpx | StreamFilter::Dct(_) | StreamFilter::Fax(_) | StreamFilter::Jbig2
        )
    }
}

/// Extract the filter chain of a stream dictionary (`/Filter` +
/// `/DecodeParms`, both possibly indirect, single or array).
pub fn filters_from_dict(dict: &Dict, r: &impl Resolve) -> Result<Vec<StreamFilter>> {
    let filters = match dict.get("Filter") {
        None => return Ok(Vec::new()),
        Some(p) => match p.clone().resolve(r)? {
            Primitive::Null => return Ok(Vec::new()),
            Primitive::Name(name) => vec![Primitive::Name(name)],
            Primitive::Array(arr) => arr,
            p => err!(PdfError::UnexpectedPrimitive {
                expected: "Name or Array",
                found: p.get_debug_name(),
            }),
        },
    };
    let params = match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        None => Vec::new(),
        Some(p) => match p.clone().resolve(r)? {
            Primitive::Null => Vec::new(),
            Primitive::Dictionary(d) => vec![Primitive::Dictionary(d)],
            Primitive::Array(arr) => arr,
            p => err!(PdfError::UnexpectedPrimitive {
                expected: "Dictionary or Array",
                found: p.get_debug_name(),
            }),
        },
    };

    let mut chain = Vec::with_capacity(filters.len());
    for (i, filter) in filters.into_iter().enumerate() {
        let name = filter.resolve(r)?.into_name()?;
        let parms = match params.get(i) {
            Some(p) => match p.clone().resolve(r)? {
                Primitive::Dictionary(d) => d,
                Primitive::Null => Dict::new(),
                p => err!(PdfError::UnexpectedPrimitive {
                    expected: "Dictionary",
                    found: p.get_debug_name(),
                }),
            },
            None => Dict::new(),
        };
        chain.push(StreamFilter::from_kind_and_params(name.as_str(), parms, r)?);
    }
    Ok(chain)
}

/// Peel every filter of a chain, left to right, first-listed first. Image
/// codecs terminate the walk and leave the payload as-is.
pub fn decode_all(data: &[u8], chain: &[StreamFilter], limits: &Limits) -> Result<Vec<u8>> {
    let mut data = data.to_vec();
    for filter in chain {
        if filter.is_image() {
            break;
        }
        data = decode(&data, filter, limits)?;
    }
    Ok(data)
}

pub fn decode(data: &[u8], filter: &StreamFilter, limits: &Limits) -> Result<Vec<u8>> {
    match *filter {
        StreamFilter::AsciiHex => decode_hex(data),
        StreamFilter::Ascii85 => decode_85(data),
        StreamFilter::Lzw(ref params) => lzw_decode(data, params, limits),
        StreamFilter::Flate(ref params) => flate_decode(data, params, limits),
        StreamFilter::RunLength => run_length_decode(data, limits),
        StreamFilter::Dct(ref params) => dct_decode(data, params),
        StreamFilter::Fax(ref params) => fax_decode(data, params),
        StreamFilter::Jpx => jpx_decode(data),
        StreamFilter::Jbig2 => jbig2_decode(data),
        // handled when the payload was read; Identity by definition
        StreamFilter::Crypt(_) => Ok(data.to_vec()),
    }
}

pub fn encode(data: &[u8], filter: &StreamFilter) -> Result<Vec<u8>> {
    match *filter {
        StreamFilter::AsciiHex => Ok(encode_hex(data)),
        StreamFilter::Ascii85 => Ok(encode_85(data)),
        StreamFilter::Lzw(ref params) => lzw_encode(data, params),
        StreamFilter::Flate(_) => Ok(flate_encode(data, 6)),
        StreamFilter::RunLength => Ok(run_length_encode(data)),
        StreamFilter::Crypt(_) => Ok(data.to_vec()),
        ref f => err!(PdfError::Filter {
            filter: f.name(),
            msg: "encoding is not supported".into(),
        }),
    }
}

/// zlib-wrapped inflate with a fallback to a raw deflate body, followed by
/// the optional predictor pass.
pub fn flate_decode(data: &[u8], params: &LzwFlateParams, limits: &Limits) -> Result<Vec<u8>> {
    let decoded = match libflate::zlib::Decoder::new(data) {
        Ok(decoder) => read_capped(decoder, data.len(), limits, "FlateDecode")?,
        Err(_) => {
            info!("invalid zlib header, inflating as raw deflate");
            read_capped(
                libflate::deflate::Decoder::new(data),
                data.len(),
                limits,
                "FlateDecode",
            )?
        }
    };
    predict::undo_predictor(decoded, params)
}

pub fn flate_encode(data: &[u8], level: u8) -> Vec<u8> {
    use deflate::{deflate_bytes_zlib_conf, CompressionOptions};
    let options = match level {
        0..=3 => CompressionOptions::fast(),
        4..=6 => CompressionOptions::default(),
        _ => CompressionOptions::high(),
    };
    deflate_bytes_zlib_conf(data, options)
}

/// Pull everything out of `reader`, failing early once a limit is crossed.
fn read_capped(
    mut reader: impl Read,
    consumed: usize,
    limits: &Limits,
    filter: &'static str,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; 16 << 10];
    loop {
        let n = reader.read(&mut buf).map_err(|e| PdfError::Filter {
            filter,
            msg: e.to_string(),
        })?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
        limits.ensure(out.len(), consumed)?;
    }
}

pub fn lzw_decode(data: &[u8], params: &LzwFlateParams, limits: &Limits) -> Result<Vec<u8>> {
    use weezl::{decode::Decoder, BitOrder};
    let mut decoder = if params.early_change != 0 {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };

    let mut out = Vec::new();
    let mut buf = vec![0u8; 16 << 10];
    let mut consumed = 0;
    loop {
        let result = decoder.decode_bytes(&data[consumed..], &mut buf);
        consumed += result.consumed_in;
        out.extend_from_slice(&buf[..result.consumed_out]);
        limits.ensure(out.len(), data.len())?;
        match result.status {
            Ok(weezl::LzwStatus::Done) => break,
            Ok(weezl::LzwStatus::NoProgress) => break,
            Ok(weezl::LzwStatus::Ok) => {}
            Err(e) => err!(PdfError::Filter {
                filter: "LZWDecode",
                msg: e.to_string(),
            }),
        }
    }
    predict::undo_predictor(out, params)
}

pub fn lzw_encode(data: &[u8], params: &LzwFlateParams) -> Result<Vec<u8>> {
    use weezl::{encode::Encoder, BitOrder};
    if params.early_change != 0 {
        err!(PdfError::Filter {
            filter: "LZWDecode",
            msg: "encoding with EarlyChange 1 is not supported".into(),
        });
    }
    let mut out = Vec::new();
    let result = Encoder::new(BitOrder::Msb, 8)
        .into_stream(&mut out)
        .encode_all(data);
    result.status.map_err(|e| PdfError::Filter {
        filter: "LZWDecode",
        msg: e.to_string(),
    })?;
    Ok(out)
}

/// PDF run-length coding: `0..=127` copies n+1 literal bytes, `129..=255`
/// repeats the next byte 257-n times, `128` is EOD.
pub fn run_length_decode(data: &[u8], limits: &Limits) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let length = data[pos];
        if length == 128 {
            break;
        } else if length < 128 {
            let start = pos + 1;
            let end = start + length as usize + 1;
            if end > data.len() {
                err!(PdfError::Filter {
                    filter: "RunLengthDecode",
                    msg: "literal run past end of data".into(),
                });
            }
            out.extend_from_slice(&data[start..end]);
            pos = end;
        } else {
            let byte = *data.get(pos + 1).ok_or(PdfError::Filter {
                filter: "RunLengthDecode",
                msg: "repeat run past end of data".into(),
            })?;
            out.extend(std::iter::repeat(byte).take(257 - length as usize));
            pos += 2;
        }
        limits.ensure(out.len(), data.len())?;
    }
    Ok(out)
}

pub fn run_length_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let byte = data[pos];
        let mut run = 1;
        while run < 128 && data.get(pos + run) == Some(&byte) {
            run += 1;
        }
        if run >= 2 {
            out.push((257 - run) as u8);
            out.push(byte);
            pos += run;
        } else {
            // gather literals until the next run of two or the block is full
            let start = pos;
            pos += 1;
            while pos - start < 128
                && pos < data.len()
                && !(pos + 1 < data.len() && data[pos] == data[pos + 1])
            {
                pos += 1;
            }
            out.push((pos - start - 1) as u8);
            out.extend_from_slice(&data[start..pos]);
        }
    }
    out.push(128);
    out
}

pub fn dct_decode(data: &[u8], _params: &DctParams) -> Result<Vec<u8>> {
    let mut decoder = jpeg_decoder::Decoder::new(data);
    decoder.decode().map_err(|e| PdfError::Filter {
        filter: "DCTDecode",
        msg: e.to_string(),
    })
}

pub fn fax_decode(data: &[u8], params: &FaxParams) -> Result<Vec<u8>> {
    use fax::decoder::{decode_g4, pels};
    use fax::Color;

    if params.k >= 0 {
        err!(PdfError::Filter {
            filter: "CCITTFaxDecode",
            msg: format!("only Group 4 (K < 0) is supported, got K = {}", params.k),
        });
    }
    let columns = params.columns as usize;
    let rows = params.rows as usize;
    let height = if rows == 0 { None } else { Some(rows as u16) };
    let mut out = Vec::with_capacity(columns * rows.max(1));
    decode_g4(data.iter().cloned(), columns as u16, height, |line| {
        out.extend(pels(line, columns as u16).map(|c| match c {
            Color::Black => 0u8,
            Color::White => 255,
        }));
    })
    .ok_or(PdfError::Filter {
        filter: "CCITTFaxDecode",
        msg: "G4 decoding failed".into(),
    })?;
    if rows != 0 && out.len() != columns * rows {
        err!(PdfError::Filter {
            filter: "CCITTFaxDecode",
            msg: format!("expected {} rows, decoded {}", rows, out.len() / columns.max(1)),
        });
    }
    Ok(out)
}

pub type DecodeFn = dyn Fn(&[u8]) -> Result<Vec<u8>> + Sync + Send + 'static;
static JPX_DECODER: OnceCell<Box<DecodeFn>> = OnceCell::new();
static JBIG2_DECODER: OnceCell<Box<DecodeFn>> = OnceCell::new();

/// Register an external JPEG 2000 decoder.
pub fn set_jpx_decoder(f: Box<DecodeFn>) {
    let _ = JPX_DECODER.set(f);
}
/// Register an external JBIG2 decoder.
pub fn set_jbig2_decoder(f: Box<DecodeFn>) {
    let _ = JBIG2_DECODER.set(f);
}

pub fn jpx_decode(data: &[u8]) -> Result<Vec<u8>> {
    JPX_DECODER.get().ok_or(PdfError::Filter {
        filter: "JPXDecode",
        msg: "no JPEG 2000 decoder registered".into(),
    })?(data)
}
pub fn jbig2_decode(data: &[u8]) -> Result<Vec<u8>> {
    JBIG2_DECODER.get().ok_or(PdfError::Filter {
        filter: "JBIG2Decode",
        msg: "no JBIG2 decoder registered".into(),
    })?(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_length_reference_vector() {
        let encoded = run_length_encode(b"AABBBCCCCDD");
        assert_eq!(
            encoded,
            vec![255, b'A', 254, b'B', 253, b'C', 255, b'D', 128]
        );
        assert_eq!(
            run_length_decode(&encoded, &Limits::default()).unwrap(),
            b"AABBBCCCCDD"
        );
    }

    #[test]
    fn run_length_literals_and_mixed() {
        let data = b"abcdeffffg";
        let encoded = run_length_encode(data);
        assert_eq!(
            run_length_decode(&encoded, &Limits::default()).unwrap(),
            data
        );
    }

    #[test]
    fn flate_round_trip() {
        let data = b"some compressible data some compressible data".repeat(20);
        let encoded = flate_encode(&data, 6);
        let decoded =
            flate_decode(&encoded, &LzwFlateParams::default(), &Limits::default()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn lzw_round_trip_without_early_change() {
        let params = LzwFlateParams {
            early_change: 0,
            ..LzwFlateParams::default()
        };
        let data = b"TOBEORNOTTOBEORTOBEORNOT".repeat(8);
        let encoded = lzw_encode(&data, &params).unwrap();
        let decoded = lzw_decode(&encoded, &params, &Limits::default()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn decode_bomb_hits_limit() {
        let data = vec![0u8; 4 << 20];
        let encoded = flate_encode(&data, 9);
        let limits = Limits {
            max_decoded: 1 << 20,
            max_expansion: usize::MAX,
        };
        match flate_decode(&encoded, &LzwFlateParams::default(), &limits) {
            Err(PdfError::LimitExceeded { .. }) => {}
            other => panic!("expected LimitExceeded, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn expansion_ratio_enforced() {
        let data = vec![0u8; 1 << 20];
        let encoded = flate_encode(&data, 9);
        let limits = Limits {
            max_decoded: usize::MAX,
            max_expansion: 4,
        };
        assert!(matches!(
            flate_decode(&encoded, &LzwFlateParams::default(), &limits),
            Err(PdfError::LimitExceeded { .. })
        ));
    }
}
