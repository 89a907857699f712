//! Fonts: simple and composite, their descriptors, and the ToUnicode CMap
//! needed to get text back out.

use super::prelude::*;
use crate::scan::Scanner;
use std::collections::HashMap;

#[derive(Object, ObjectWrite, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontType {
    Type0,
    Type1,
    MMType1,
    TrueType,
    Type3,
    CIDFontType0,
    CIDFontType2,
}

#[derive(Object, ObjectWrite, Debug)]
#[pdf(Type = "Font?")]
pub struct Font {
    #[pdf(key = "Subtype")]
    pub subtype: FontType,

    #[pdf(key = "BaseFont")]
    pub base_font: Option<Name>,

    /// Name or dictionary; interpreting it is the text stack's business.
    #[pdf(key = "Encoding")]
    pub encoding: Option<Primitive>,

    #[pdf(key = "FirstChar")]
    pub first_char: Option<i64>,

    #[pdf(key = "LastChar")]
    pub last_char: Option<i64>,

    /// Kept lazy - the array is often indirect and long.
    #[pdf(key = "Widths")]
    pub widths: Option<Primitive>,

    #[pdf(key = "FontDescriptor")]
    pub font_descriptor: Option<MaybeRef<FontDescriptor>>,

    #[pdf(key = "ToUnicode")]
    pub to_unicode: Option<Ref<Stream<()>>>,

    /// Type0 only: the single descendant CID font.
    #[pdf(key = "DescendantFonts")]
    pub descendant_fonts: Vec<MaybeRef<Font>>,

    // CID font fields
    #[pdf(key = "CIDSystemInfo")]
    pub cid_system_info: Option<Dict>,

    #[pdf(key = "CIDToGIDMap")]
    pub cid_to_gid_map: Option<Primitive>,

    #[pdf(key = "DW", default = "1000")]
    pub default_width: i64,

    #[pdf(key = "W")]
    pub cid_widths: Option<Primitive>,

    #[pdf(other)]
    pub other: Dict,
}

impl Font {
    pub fn is_cid(&self) -> bool {
        matches!(
            self.subtype,
            FontType::Type0 | FontType::CIDFontType0 | FontType::CIDFontType2
        )
    }

    /// The descendant of a Type0 font.
    pub fn descendant(&self, _r: &impl Resolve) -> Option<&MaybeRef<Font>> {
        self.descendant_fonts.first()
    }

    /// Glyph widths of a simple font, indexed from `first_char`.
    pub fn widths(&self, r: &impl Resolve) -> Result<Option<Vec<f32>>> {
        match self.widths {
            None => Ok(None),
            Some(ref p) => {
                let arr = p.clone().resolve(r)?.into_array(r)?;
                let widths = arr
                    .iter()
                    .map(|p| p.as_number())
                    .collect::<Result<Vec<f32>>>()?;
                Ok(Some(widths))
            }
        }
    }

    /// The embedded font program, from whichever `/FontFile*` is present.
    pub fn embedded_data(&self, r: &impl Resolve) -> Result<Option<std::sync::Arc<[u8]>>> {
        let descriptor = match self.font_descriptor {
            Some(ref d) => d,
            None => return Ok(None),
        };
        let file = descriptor
            .font_file
            .or(descriptor.font_file2)
            .or(descriptor.font_file3);
        match file {
            Some(stream_ref) => {
                let stream = r.get(stream_ref)?;
                Ok(Some(stream.data().data(r)?))
            }
            None => Ok(None),
        }
    }

    /// Parse the ToUnicode CMap, if any.
    pub fn to_unicode_map(&self, r: &impl Resolve) -> Result<Option<ToUnicodeMap>> {
        match self.to_unicode {
            None => Ok(None),
            Some(stream_ref) => {
                let stream = r.get(stream_ref)?;
                let data = stream.data().data(r)?;
                parse_cmap(&data).map(Some)
            }
        }
    }
}

#[derive(Object, ObjectWrite, Debug, Clone)]
#[pdf(Type = "FontDescriptor?")]
pub struct FontDescriptor {
    #[pdf(key = "FontName")]
    pub font_name: Option<Name>,

    #[pdf(key = "FontFamily")]
    pub font_family: Option<PdfString>,

    #[pdf(key = "Flags", default = "0")]
    pub flags: i64,

    #[pdf(key = "FontBBox")]
    pub font_bbox: Option<Rectangle>,

    #[pdf(key = "ItalicAngle", default = "0.")]
    pub italic_angle: f32,

    #[pdf(key = "Ascent")]
    pub ascent: Option<f32>,

    #[pdf(key = "Descent")]
    pub descent: Option<f32>,

    #[pdf(key = "CapHeight")]
    pub cap_height: Option<f32>,

    #[pdf(key = "StemV")]
    pub stem_v: Option<f32>,

    #[pdf(key = "MissingWidth")]
    pub missing_width: Option<f32>,

    /// Type1 program.
    #[pdf(key = "FontFile")]
    pub font_file: Option<Ref<Stream<()>>>,

    /// TrueType program.
    #[pdf(key = "FontFile2")]
    pub font_file2: Option<Ref<Stream<()>>>,

    /// CFF and friends.
    #[pdf(key = "FontFile3")]
    pub font_file3: Option<Ref<Stream<()>>>,

    #[pdf(other)]
    pub other: Dict,
}

/// Character code to Unicode, from a ToUnicode CMap.
#[derive(Debug, Default, Clone)]
pub struct ToUnicodeMap {
    map: HashMap<u32, String>,
}

impl ToUnicodeMap {
    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(|s| s.as_str())
    }
    pub fn len(&self) -> usize {
        self.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
    pub fn insert(&mut self, code: u32, value: String) {
        self.map.insert(code, value);
    }
}

fn be_code(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0, |acc, &b| acc << 8 | b as u32)
}

fn utf16_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|c| (c[0] as u16) << 8 | c.get(1).cloned().unwrap_or(0) as u16)
        .collect();
    String::from_utf16_lossy(&units)
}

/// Minimal CMap reader covering `bfchar` and `bfrange` sections, which is
/// what ToUnicode CMaps consist of.
pub fn parse_cmap(data: &[u8]) -> Result<ToUnicodeMap> {
    use crate::parse::{parse_with_scanner, ParseFlags};
    let mut map = ToUnicodeMap::default();
    let mut scanner = Scanner::new(data);
    loop {
        let word = match scanner.next() {
            Ok(w) => w,
            Err(e) if e.is_eof() => break,
            Err(e) => return Err(e),
        };
        if word.equals(b"beginbfchar") {
            loop {
                if scanner.peek()?.equals(b"endbfchar") {
                    scanner.next()?;
                    break;
                }
                let src = parse_with_scanner(&mut scanner, &NoResolve, ParseFlags::STRING)?
                    .into_string()?;
                let dst = parse_with_scanner(&mut scanner, &NoResolve, ParseFlags::STRING)?
                    .into_string()?;
                map.insert(be_code(src.as_bytes()), utf16_string(dst.as_bytes()));
            }
        } else if word.equals(b"beginbfrange") {
            loop {
                if scanner.peek()?.equals(b"endbfrange") {
                    scanner.next()?;
                    break;
                }
                let low = parse_with_scanner(&mut scanner, &NoResolve, ParseFlags::STRING)?
                    .into_string()?;
                let high = parse_with_scanner(&mut scanner, &NoResolve, ParseFlags::STRING)?
                    .into_string()?;
                let dst = parse_with_scanner(
                    &mut scanner,
                    &NoResolve,
                    ParseFlags::STRING | ParseFlags::ARRAY,
                )?;
                let (low, high) = (be_code(low.as_bytes()), be_code(high.as_bytes()));
                match dst {
                    Primitive::String(base) => {
                        let base_bytes = base.as_bytes();
                        for (i, code) in (low..=high).enumerate() {
                            // increment the last UTF-16 unit per step
                            let mut bytes = base_bytes.to_vec();
                            if bytes.len() >= 2 {
                                let last = bytes.len() - 2;
                                let unit = be_code(&bytes[last..]) as u16 as u32 + i as u32;
                                bytes[last] = (unit >> 8) as u8;
                                bytes[last + 1] = unit as u8;
                            }
                            map.insert(code, utf16_string(&bytes));
                        }
                    }
                    Primitive::Array(items) => {
                        for (i, item) in items.into_iter().enumerate() {
                            let s = item.into_string()?;
                            map.insert(low + i as u32, utf16_string(s.as_bytes()));
                        }
                    }
                    p => err!(PdfError::UnexpectedPrimitive {
                        expected: "String or Array",
                        found: p.get_debug_name(),
                    }),
                }
            }
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bfchar_and_bfrange() {
        let cmap = b"/CIDInit /ProcSet findresource begin\n\
            begincmap\n\
            2 beginbfchar\n\
            <0041> <0041>\n\
            <0042> <00480069>\n\
            endbfchar\n\
            1 beginbfrange\n\
            <0050> <0052> <0061>\n\
            endbfrange\n\
            endcmap\n";
        let map = parse_cmap(cmap).unwrap();
        assert_eq!(map.get(0x41), Some("A"));
        assert_eq!(map.get(0x42), Some("Hi"));
        assert_eq!(map.get(0x50), Some("a"));
        assert_eq!(map.get(0x51), Some("b"));
        assert_eq!(map.get(0x52), Some("c"));
        assert_eq!(map.get(0x53), None);
    }
}
