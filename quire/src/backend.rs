//! Random-access byte sources and the xref bootstrap that runs over them.

use crate::error::*;
use crate::object::Resolve;
use crate::parse::xref::read_xref_and_trailer_at;
use crate::primitive::Dict;
use crate::scan::Scanner;
use crate::xref::{Revision, XRefTable};
use std::ops::{Deref, Range, RangeFrom, RangeFull, RangeTo};

pub const MAX_ID: u64 = 1_000_000;

pub trait Backend: Sized {
    fn read<T: IndexRange>(&self, range: T) -> Result<&[u8]>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of the `%PDF-` header. Viewers accept leading junk as long
    /// as the header sits within the first kibibyte, so we do too.
    fn locate_start_offset(&self) -> Result<usize> {
        const HEADER: &[u8] = &[b'%', b'P', b'D', b'F', b'-'];
        let buf = t!(self.read(..self.len().min(1024)));
        buf.windows(HEADER.len())
            .position(|window| window == HEADER)
            .ok_or(PdfError::Other {
                msg: "file header is missing".into(),
            })
    }

    /// The value of the last `startxref`.
    fn locate_xref_offset(&self) -> Result<usize> {
        let mut scanner = Scanner::new(t!(self.read(..)));
        scanner.set_pos_from_end(0);
        scanner
            .seek_substr_back(b"startxref")
            .map_err(|_| PdfError::NoStartXref)?;
        t!(scanner.next()).to::<usize>()
    }

    /// Walk the xref chain from the last `startxref` through every `/Prev`,
    /// producing the merged table plus the newest trailer. Offsets found in
    /// the file are relative to the header.
    fn read_xref_table_and_trailer(
        &self,
        start_offset: usize,
        resolve: &impl Resolve,
    ) -> Result<(XRefTable, Dict)> {
        let file = t!(self.read(..));
        let xref_offset = t!(self.locate_xref_offset());
        let mut refs = XRefTable::new(0);
        let mut newest_trailer = None;

        let mut next = Some(xref_offset);
        let mut seen = Vec::new();
        while let Some(offset) = next {
            if seen.contains(&offset) {
                err!(PdfError::Xref {
                    msg: "cycle in /Prev chain".into(),
                });
            }
            seen.push(offset);

            let pos = start_offset
                .checked_add(offset)
                .filter(|&p| p < self.len())
                .ok_or(PdfError::Xref {
                    msg: "xref offset outside file bounds".into(),
                })?;
            let mut scanner = Scanner::with_offset(t!(self.read(pos..)), pos);
            let (sections, trailer) = t!(read_xref_and_trailer_at(&mut scanner, file, resolve));

            for section in &sections {
                refs.merge_section(section);
            }
            next = match trailer.get("Prev") {
                Some(p) => Some(t!(p.as_usize())),
                None => None,
            };
            refs.push_revision(Revision {
                xref_offset: offset as u64,
                trailer: trailer.clone(),
            });
            if newest_trailer.is_none() {
                newest_trailer = Some(trailer);
            }
        }

        let trailer = newest_trailer.ok_or(PdfError::NoStartXref)?;
        let highest_id = t!(t!(trailer.get("Size").ok_or(PdfError::MissingEntry {
            typ: "Trailer",
            field: "Size".into(),
        }))
        .as_integer()) as u64;
        if highest_id > MAX_ID {
            err!(PdfError::LimitExceeded {
                what: "object count",
                limit: MAX_ID as usize,
            });
        }
        Ok((refs, trailer))
    }
}

impl<T> Backend for T
where
    T: Deref<Target = [u8]>,
{
    fn read<R: IndexRange>(&self, range: R) -> Result<&[u8]> {
        let r = t!(range.to_range(self.len()));
        Ok(&self[r])
    }
    fn len(&self) -> usize {
        (**self).len()
    }
}

/// Implemented by the built-in range types so `read(..)`, `read(a..)` and
/// friends all work against a backend.
pub trait IndexRange {
    /// Start index (inclusive).
    fn start(&self) -> Option<usize>;
    /// End index (exclusive).
    fn end(&self) -> Option<usize>;

    fn to_range(&self, len: usize) -> Result<Range<usize>> {
        match (self.start(), self.end()) {
            (None, None) => Ok(0..len),
            (Some(start), None) if start <= len => Ok(start..len),
            (None, Some(end)) if end <= len => Ok(0..end),
            (Some(start), Some(end)) if start <= end && end <= len => Ok(start..end),
            _ => Err(PdfError::Bounds),
        }
    }
}

impl IndexRange for RangeFull {
    #[inline]
    fn start(&self) -> Option<usize> {
        None
    }
    #[inline]
    fn end(&self) -> Option<usize> {
        None
    }
}
impl IndexRange for RangeFrom<usize> {
    #[inline]
    fn start(&self) -> Option<usize> {
        Some(self.start)
    }
    #[inline]
    fn end(&self) -> Option<usize> {
        None
    }
}
impl IndexRange for RangeTo<usize> {
    #[inline]
    fn start(&self) -> Option<usize> {
        None
    }
    #[inline]
    fn end(&self) -> Option<usize> {
        Some(self.end)
    }
}
impl IndexRange for Range<usize> {
    #[inline]
    fn start(&self) -> Option<usize> {
        Some(self.start)
    }
    #[inline]
    fn end(&self) -> Option<usize> {
        Some(self.end)
    }
}
