//! Assembles primitives from lexemes.

mod object;
pub mod xref;

pub use self::object::{parse_indirect_object, parse_indirect_stream};

use crate::crypt::{CryptClass, SecurityHandler};
use crate::error::*;
use crate::object::{ObjRef, Resolve};
use crate::primitive::{Dict, Name, PdfString, Primitive, RawStream, StreamData, StringFormat};
use crate::scan::{HexStringScanner, LiteralStringScanner, Scanner};
use bitflags::bitflags;

bitflags! {
    /// What the caller is willing to accept. Parsing something outside the
    /// mask is reported instead of silently swallowed - the xref machinery
    /// uses this to insist on plain integers.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParseFlags: u16 {
        const INTEGER = 1 << 0;
        const STREAM = 1 << 1;
        const DICT = 1 << 2;
        const NUMBER = 1 << 3;
        const NAME = 1 << 4;
        const ARRAY = 1 << 5;
        const STRING = 1 << 6;
        const BOOL = 1 << 7;
        const NULL = 1 << 8;
        const REF = 1 << 9;
        const ANY = (1 << 10) - 1;
    }
}

/// Ambient state while parsing the body of one indirect object: its identity
/// and, for encrypted files, the handler that peels strings.
pub struct Context<'a> {
    pub decoder: Option<&'a SecurityHandler>,
    pub id: ObjRef,
}

impl<'a> Context<'a> {
    pub fn decrypt(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        match self.decoder {
            Some(decoder) => decoder.decrypt(self.id, &data, CryptClass::String),
            None => Ok(data),
        }
    }
    #[cfg(test)]
    pub fn plain() -> Self {
        Context {
            decoder: None,
            id: ObjRef { num: 0, gen: 0 },
        }
    }
}

#[inline]
fn check(flags: ParseFlags, allowed: ParseFlags, found: &'static str) -> Result<()> {
    if !flags.intersects(allowed) {
        return Err(PdfError::PrimitiveNotAllowed { found });
    }
    Ok(())
}

/// Parse one primitive. Streams whose dictionary holds indirect references
/// need `parse_stream` with a resolver instead.
pub fn parse(data: &[u8], r: &impl Resolve, flags: ParseFlags) -> Result<Primitive> {
    parse_with_scanner(&mut Scanner::new(data), r, flags)
}

pub fn parse_with_scanner(
    scanner: &mut Scanner,
    r: &impl Resolve,
    flags: ParseFlags,
) -> Result<Primitive> {
    parse_with_context(scanner, r, None, flags, r.options().max_parse_depth)
}

/// Recursive entry point. On error the scanner is rewound to where the
/// failed primitive started so the caller can recover.
pub fn parse_with_context(
    scanner: &mut Scanner,
    r: &impl Resolve,
    ctx: Option<&Context>,
    flags: ParseFlags,
    max_depth: usize,
) -> Result<Primitive> {
    let pos = scanner.get_pos();
    match parse_inner(scanner, r, ctx, flags, max_depth) {
        Ok(p) => Ok(p),
        Err(e) => {
            scanner.set_pos(pos);
            Err(e)
        }
    }
}

fn parse_dictionary_body(
    scanner: &mut Scanner,
    r: &impl Resolve,
    ctx: Option<&Context>,
    max_depth: usize,
) -> Result<Dict> {
    let mut dict = Dict::new();
    loop {
        let token = t!(scanner.next());
        if token.starts_with(b"/") {
            let key = t!(decode_name(&token.reslice(1..), token.file_offset()));
            let value = t!(parse_with_context(scanner, r, ctx, ParseFlags::ANY, max_depth));
            dict.insert(key, value);
        } else if token.equals(b">>") {
            break;
        } else {
            err!(PdfError::UnexpectedLexeme {
                offset: token.file_offset(),
                lexeme: token.to_string(),
                expected: "/ or >>",
            });
        }
    }
    Ok(dict)
}

/// The payload is left in the file: only `(offset, length)` is recorded.
/// `/Length` may be indirect; when the advertised length does not land on
/// `endstream` and the resolver is tolerant, the real end is found by
/// scanning for the keyword.
fn parse_stream_body(
    dict: Dict,
    scanner: &mut Scanner,
    r: &impl Resolve,
    ctx: &Context,
) -> Result<RawStream> {
    t!(scanner.next_stream());

    let length = match dict.get("Length") {
        Some(&Primitive::Integer(n)) if n >= 0 => Some(n as usize),
        Some(&Primitive::Reference(id)) => {
            match r.resolve_flags(id, ParseFlags::INTEGER, 1) {
                Ok(p) => Some(t!(p.as_usize())),
                Err(e) if r.options().tolerant => {
                    warn!("can't resolve stream /Length ({}), scanning for endstream", e);
                    None
                }
                Err(e) => return Err(e),
            }
        }
        Some(other) => err!(PdfError::UnexpectedPrimitive {
            expected: "unsigned Integer or Reference",
            found: other.get_debug_name(),
        }),
        None => err!(PdfError::MissingEntry {
            typ: "Stream",
            field: "Length".into(),
        }),
    };

    let range = match length {
        Some(length) => {
            let start = scanner.get_pos();
            let payload = scanner.read_n(length);
            if payload.len() != length {
                err!(PdfError::Eof);
            }
            match scanner.next_expect("endstream") {
                Ok(()) => payload.file_range(),
                Err(e) if r.options().tolerant => {
                    warn!("stream /Length {} is wrong ({}), scanning for endstream", length, e);
                    scanner.set_pos(start);
                    t!(rescan_for_endstream(scanner))
                }
                Err(e) => return Err(e),
            }
        }
        None => t!(rescan_for_endstream(scanner)),
    };

    Ok(RawStream {
        dict,
        data: StreamData::InFile {
            id: ctx.id,
            range,
        },
    })
}

/// Recovery path: take everything up to the next `endstream`, minus one
/// trailing EOL.
fn rescan_for_endstream(scanner: &mut Scanner) -> Result<std::ops::Range<usize>> {
    let span = scanner
        .seek_substr(b"endstream")
        .ok_or(PdfError::Eof)?;
    let mut range = span.file_range();
    let slice = span.as_slice();
    if slice.ends_with(b"\r\n") {
        range.end -= 2;
    } else if slice.ends_with(b"\n") || slice.ends_with(b"\r") {
        range.end -= 1;
    }
    Ok(range)
}

/// Decode `#XX` escapes in a name lexeme (the leading `/` stripped).
fn decode_name(lexeme: &crate::scan::Lexeme, offset: usize) -> Result<Name> {
    let mut rest: &[u8] = lexeme.as_slice();
    if !rest.contains(&b'#') {
        return Ok(Name(std::str::from_utf8(rest)?.into()));
    }
    let mut out = Vec::with_capacity(rest.len());
    while let Some(idx) = rest.iter().position(|&b| b == b'#') {
        let pair = rest.get(idx + 1..idx + 3).ok_or(PdfError::Eof)?;
        let byte = match (hex_nibble(pair[0]), hex_nibble(pair[1])) {
            (Some(high), Some(low)) => high << 4 | low,
            _ => {
                return Err(PdfError::HexDecode {
                    offset: offset + idx,
                    bytes: [pair[0], pair[1]],
                })
            }
        };
        out.extend_from_slice(&rest[..idx]);
        out.push(byte);
        rest = &rest[idx + 3..];
    }
    out.extend_from_slice(rest);
    Ok(Name(String::from_utf8(out)?))
}

#[inline]
fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 0xa),
        b'A'..=b'F' => Some(c - b'A' + 0xa),
        _ => None,
    }
}

fn parse_inner(
    scanner: &mut Scanner,
    r: &impl Resolve,
    ctx: Option<&Context>,
    flags: ParseFlags,
    max_depth: usize,
) -> Result<Primitive> {
    let first = t!(scanner.next());

    let obj = if first.equals(b"<<") {
        check(flags, ParseFlags::DICT | ParseFlags::STREAM, "Dictionary")?;
        if max_depth == 0 {
            return Err(PdfError::MaxDepth);
        }
        let dict = t!(parse_dictionary_body(scanner, r, ctx, max_depth - 1));
        // might be the dictionary in front of a stream
        if t!(scanner.peek()).equals(b"stream") {
            check(flags, ParseFlags::STREAM, "Stream")?;
            let ctx = ctx.ok_or(PdfError::PrimitiveNotAllowed { found: "Stream" })?;
            Primitive::Stream(t!(parse_stream_body(dict, scanner, r, ctx)))
        } else {
            check(flags, ParseFlags::DICT, "Dictionary")?;
            Primitive::Dictionary(dict)
        }
    } else if first.is_integer() {
        // Integer, or the start of `num gen R`
        check(flags, ParseFlags::INTEGER | ParseFlags::REF, "Integer")?;
        let pos_bk = scanner.get_pos();
        let is_reference = match scanner.next() {
            Ok(second) if second.is_integer() => match scanner.next() {
                Ok(third) if third.equals(b"R") => true,
                _ => false,
            },
            _ => false,
        };
        if is_reference {
            check(flags, ParseFlags::REF, "Reference")?;
            let second = {
                // re-read the generation; the scanner is past `R` now
                let mut s = *scanner;
                s.set_pos(pos_bk);
                t!(s.next())
            };
            Primitive::Reference(ObjRef {
                num: t!(first.to::<u64>()),
                gen: t!(second.to::<u16>()),
            })
        } else {
            check(flags, ParseFlags::INTEGER, "Integer")?;
            scanner.set_pos(pos_bk);
            Primitive::Integer(t!(first.to::<i64>()))
        }
    } else if let Some(s) = first.real_number() {
        check(flags, ParseFlags::NUMBER, "Real")?;
        Primitive::Real(t!(s.to::<f32>()))
    } else if first.starts_with(b"/") {
        check(flags, ParseFlags::NAME, "Name")?;
        Primitive::Name(t!(decode_name(&first.reslice(1..), first.file_offset())))
    } else if first.equals(b"[") {
        check(flags, ParseFlags::ARRAY, "Array")?;
        if max_depth == 0 {
            return Err(PdfError::MaxDepth);
        }
        let mut array = Vec::new();
        loop {
            if t!(scanner.peek()).equals(b"]") {
                break;
            }
            array.push(t!(parse_with_context(
                scanner,
                r,
                ctx,
                ParseFlags::ANY,
                max_depth - 1
            )));
        }
        t!(scanner.next()); // the closing bracket
        Primitive::Array(array)
    } else if first.equals(b"(") {
        check(flags, ParseFlags::STRING, "String")?;
        let mut data = Vec::new();
        let consumed = {
            let mut sub = LiteralStringScanner::new(scanner.remaining_slice());
            for byte in sub.iter() {
                data.push(t!(byte));
            }
            sub.offset()
        };
        scanner.advance(consumed);
        if let Some(ctx) = ctx {
            data = t!(ctx.decrypt(data));
        }
        Primitive::String(PdfString {
            data,
            format: StringFormat::Literal,
        })
    } else if first.equals(b"<") {
        check(flags, ParseFlags::STRING, "String")?;
        let mut data = Vec::new();
        let consumed = {
            let mut sub = HexStringScanner::new(scanner.remaining_slice());
            for byte in sub.iter() {
                data.push(t!(byte));
            }
            sub.offset()
        };
        scanner.advance(consumed);
        if let Some(ctx) = ctx {
            data = t!(ctx.decrypt(data));
        }
        Primitive::String(PdfString {
            data,
            format: StringFormat::Hex,
        })
    } else if first.equals(b"true") {
        check(flags, ParseFlags::BOOL, "Bool")?;
        Primitive::Bool(true)
    } else if first.equals(b"false") {
        check(flags, ParseFlags::BOOL, "Bool")?;
        Primitive::Bool(false)
    } else if first.equals(b"null") {
        check(flags, ParseFlags::NULL, "Null")?;
        Primitive::Null
    } else {
        err!(PdfError::Lex {
            offset: first.file_offset(),
            found: first.to_string(),
        });
    };

    Ok(obj)
}

/// Parse a stream object (dictionary + payload) at the scanner position.
pub fn parse_stream(data: &[u8], resolve: &impl Resolve, ctx: &Context) -> Result<RawStream> {
    parse_stream_with_scanner(&mut Scanner::new(data), resolve, ctx)
}

pub(crate) fn parse_stream_with_scanner(
    scanner: &mut Scanner,
    r: &impl Resolve,
    ctx: &Context,
) -> Result<RawStream> {
    let first = t!(scanner.next());
    if !first.equals(b"<<") {
        err!(PdfError::UnexpectedPrimitive {
            expected: "Stream",
            found: "something else",
        });
    }
    let dict = t!(parse_dictionary_body(
        scanner,
        r,
        None,
        r.options().max_parse_depth
    ));
    if !t!(scanner.peek()).equals(b"stream") {
        err!(PdfError::UnexpectedPrimitive {
            expected: "Stream",
            found: "Dictionary",
        });
    }
    parse_stream_body(dict, scanner, r, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::NoResolve;

    #[test]
    fn dict_with_empty_name_as_value() {
        let data = b"<</App<</Name/>>>>";
        let primitive = parse(data, &NoResolve, ParseFlags::DICT).unwrap();
        let dict = primitive.into_dictionary(&NoResolve).unwrap();
        assert_eq!(dict.len(), 1);
        let app = dict.get("App").unwrap().as_dictionary().unwrap();
        assert_eq!(app.get("Name").unwrap().as_name().unwrap(), "");
    }

    #[test]
    fn name_hex_escapes() {
        let p = parse(b"/A#42C", &NoResolve, ParseFlags::NAME).unwrap();
        assert_eq!(p.as_name().unwrap(), "ABC");
    }

    #[test]
    fn reference_vs_integer() {
        let p = parse(b"12 0 R", &NoResolve, ParseFlags::ANY).unwrap();
        assert_eq!(
            p.into_reference().unwrap(),
            ObjRef { num: 12, gen: 0 }
        );

        let p = parse(b"[1 2 3]", &NoResolve, ParseFlags::ANY).unwrap();
        assert_eq!(
            p.as_array().unwrap(),
            &[
                Primitive::Integer(1),
                Primitive::Integer(2),
                Primitive::Integer(3)
            ]
        );
    }

    #[test]
    fn numbers_keep_their_shape() {
        assert_eq!(
            parse(b"42", &NoResolve, ParseFlags::ANY).unwrap(),
            Primitive::Integer(42)
        );
        assert_eq!(
            parse(b"42.0", &NoResolve, ParseFlags::ANY).unwrap(),
            Primitive::Real(42.0)
        );
        assert_eq!(
            parse(b"-.5", &NoResolve, ParseFlags::ANY).unwrap(),
            Primitive::Real(-0.5)
        );
    }

    #[test]
    fn content_style_array() {
        let mut scanner = Scanner::new(b"[(Complete L)20(egend)]TJ");
        let p = parse_with_scanner(&mut scanner, &NoResolve, ParseFlags::ANY).unwrap();
        match p {
            Primitive::Array(items) => assert_eq!(items.len(), 3),
            p => panic!("expected array, got {:?}", p),
        }
        assert_eq!(scanner.next().unwrap(), "TJ");
    }

    #[test]
    fn stream_with_exact_length() {
        let data = b"<</Length 4>>stream\nDATA\nendstream";
        let stream = parse_stream(data, &NoResolve, &Context::plain()).unwrap();
        match stream.data {
            StreamData::InFile { range, .. } => assert_eq!(&data[range], b"DATA"),
            _ => panic!(),
        }
    }

    #[test]
    fn flags_reject() {
        assert!(parse(b"(s)", &NoResolve, ParseFlags::INTEGER).is_err());
        assert!(parse(b"42", &NoResolve, ParseFlags::STRING).is_err());
    }
}
