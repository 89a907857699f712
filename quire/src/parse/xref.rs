//! Reading cross-reference sections, in both syntaxes.

use crate::error::*;
use crate::filters;
use crate::object::Resolve;
use crate::parse::object::parse_indirect_stream;
use crate::parse::{parse_with_scanner, ParseFlags};
use crate::primitive::{Dict, Primitive, StreamData};
use crate::scan::Scanner;
use crate::xref::{Slot, XRefSection};

/// One subsection worth of packed entries from an xref stream.
/// `data` is consumed as entries are read.
fn parse_section_from_stream(
    first_id: u64,
    mut num_entries: usize,
    widths: [usize; 3],
    data: &mut &[u8],
    tolerant: bool,
) -> Result<XRefSection> {
    let entry_size = widths.iter().sum::<usize>();
    if num_entries * entry_size > data.len() {
        if tolerant {
            warn!("xref stream shorter than /Index claims, truncating");
            num_entries = data.len() / entry_size;
        } else {
            err!(PdfError::Xref {
                msg: "xref stream shorter than /Index claims".into(),
            });
        }
    }
    let mut section = XRefSection::new(first_id);
    for _ in 0..num_entries {
        // a zero-width type field defaults to 1 (in-use)
        let kind = if widths[0] == 0 {
            1
        } else {
            read_be(widths[0], data)?
        };
        let field1 = read_be(widths[1], data)?;
        let field2 = read_be(widths[2], data)?;
        let entry = match kind {
            0 => Slot::Free {
                next: field1,
                gen: field2 as u16,
            },
            1 => Slot::Used {
                offset: field1,
                gen: field2 as u16,
            },
            2 => Slot::Packed {
                container: field1,
                index: field2 as u32,
            },
            other => return Err(PdfError::XrefEntryType { found: other }),
        };
        section.slots.push(entry);
    }
    Ok(section)
}

/// Big-endian integer of `width` bytes, consuming them.
fn read_be(width: usize, data: &mut &[u8]) -> Result<u64> {
    if width > std::mem::size_of::<u64>() {
        err!(PdfError::Xref {
            msg: format!("xref stream field width {} out of range", width),
        });
    }
    if width > data.len() {
        err!(PdfError::Xref {
            msg: "xref stream data exhausted".into(),
        });
    }
    let mut result = 0;
    for &byte in &data[..width] {
        result = result << 8 | byte as u64;
    }
    *data = &data[width..];
    Ok(result)
}

/// Xref stream (`/Type /XRef`) plus the dictionary that doubles as trailer.
/// `file` is the whole byte source, needed because the payload is recorded
/// as a file range.
pub fn parse_xref_stream_and_trailer(
    scanner: &mut Scanner,
    file: &[u8],
    r: &impl Resolve,
) -> Result<(Vec<XRefSection>, Dict)> {
    let (_, stream) = t!(parse_indirect_stream(scanner, r, None));
    let trailer = stream.dict.clone();
    trailer.expect("XRefStream", "Type", "XRef", true)?;

    let raw = match stream.data {
        StreamData::InFile { ref range, .. } => file
            .get(range.clone())
            .ok_or(PdfError::Bounds)?,
        StreamData::Memory(ref bytes) => bytes,
    };
    let chain = t!(filters::filters_from_dict(&stream.dict, r));
    let data = t!(filters::decode_all(raw, &chain, &r.options().limits));

    let size = t!(t!(trailer.get("Size").ok_or(PdfError::MissingEntry {
        typ: "XRefStream",
        field: "Size".into()
    }))
    .as_integer()) as u64;

    let widths = match trailer.get("W") {
        Some(Primitive::Array(arr)) if arr.len() == 3 => [
            t!(arr[0].as_usize()),
            t!(arr[1].as_usize()),
            t!(arr[2].as_usize()),
        ],
        _ => err!(PdfError::Xref {
            msg: "missing or malformed /W".into(),
        }),
    };

    let index: Vec<u64> = match trailer.get("Index") {
        Some(Primitive::Array(arr)) => arr
            .iter()
            .map(|p| p.as_integer().map(|n| n as u64))
            .collect::<Result<_>>()?,
        None => vec![0, size],
        Some(p) => err!(PdfError::UnexpectedPrimitive {
            expected: "Array",
            found: p.get_debug_name(),
        }),
    };
    if index.len() % 2 != 0 {
        err!(PdfError::Xref {
            msg: format!("/Index has {} elements, expected an even count", index.len()),
        });
    }

    let mut data_left = &*data;
    let mut sections = Vec::new();
    for pair in index.chunks_exact(2) {
        sections.push(t!(parse_section_from_stream(
            pair[0],
            pair[1] as usize,
            widths,
            &mut data_left,
            r.options().tolerant,
        )));
    }

    Ok((sections, trailer))
}

/// Classic `xref` table: subsections of 20-byte entries, then `trailer`.
pub fn parse_xref_table_and_trailer(
    scanner: &mut Scanner,
    r: &impl Resolve,
) -> Result<(Vec<XRefSection>, Dict)> {
    let mut sections = Vec::new();

    while t!(scanner.peek()) != "trailer" {
        let first_id = t!(scanner.next_as::<u64>());
        let count = t!(scanner.next_as::<u64>());

        let mut section = XRefSection::new(first_id);
        for i in 0..count {
            let w1 = t!(scanner.next());
            if w1 == "trailer" {
                err!(PdfError::Xref {
                    msg: format!("subsection declares {} entries, only {} follow", count, i),
                });
            }
            let w2 = t!(scanner.next());
            let w3 = t!(scanner.next());
            if w3 == "f" {
                section.slots.push(Slot::Free {
                    next: t!(w1.to::<u64>()),
                    gen: t!(w2.to::<u16>()),
                });
            } else if w3 == "n" {
                section.slots.push(Slot::Used {
                    offset: t!(w1.to::<u64>()),
                    gen: t!(w2.to::<u16>()),
                });
            } else {
                err!(PdfError::UnexpectedLexeme {
                    offset: w3.file_offset(),
                    lexeme: w3.to_string(),
                    expected: "f or n",
                });
            }
        }
        sections.push(section);
    }

    t!(scanner.next_expect("trailer"));
    let trailer = t!(parse_with_scanner(scanner, r, ParseFlags::DICT));
    Ok((sections, t!(trailer.into_dictionary(r))))
}

/// Detect the section form at the scanner position and read it.
pub fn read_xref_and_trailer_at(
    scanner: &mut Scanner,
    file: &[u8],
    r: &impl Resolve,
) -> Result<(Vec<XRefSection>, Dict)> {
    if t!(scanner.peek()) == "xref" {
        t!(scanner.next());
        parse_xref_table_and_trailer(scanner, r)
    } else {
        parse_xref_stream_and_trailer(scanner, file, r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::NoResolve;

    #[test]
    fn classic_table() {
        let data = b"xref\n0 3\n0000000000 65535 f \n0000000017 00000 n \n0000000081 00000 n \ntrailer\n<</Size 3/Root 1 0 R>>";
        let mut scanner = Scanner::new(data);
        let (sections, trailer) =
            read_xref_and_trailer_at(&mut scanner, data, &NoResolve).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].first_id, 0);
        assert_eq!(sections[0].slots.len(), 3);
        assert!(matches!(
            sections[0].slots[0],
            Slot::Free { next: 0, gen: 65535 }
        ));
        assert!(matches!(
            sections[0].slots[1],
            Slot::Used { offset: 17, gen: 0 }
        ));
        assert_eq!(trailer.get("Size").unwrap().as_integer().unwrap(), 3);
    }

    #[test]
    fn stream_fields_big_endian() {
        let mut data: &[u8] = &[0x01, 0x02, 0x03];
        assert_eq!(read_be(3, &mut data).unwrap(), 0x010203);
        assert!(data.is_empty());
    }
}
