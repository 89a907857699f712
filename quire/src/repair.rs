//! Last-resort recovery: when the startxref offset or the xref section is
//! broken, scan the whole file for `N G obj` headers and reconstruct an
//! approximate table.

use crate::backend::Backend;
use crate::error::*;
use crate::scan::Scanner;
use crate::xref::{Slot, XRefTable};

/// Scan for indirect-object headers and build a table from what is found.
/// The resulting table is flagged as repaired; the caller still needs a
/// trailer, which is searched for separately.
pub fn rebuild_xref_table(backend: &impl Backend, start_offset: usize) -> Result<XRefTable> {
    let file = t!(backend.read(..));
    let mut scanner = Scanner::new(file);
    let mut objects: Vec<(u64, u16, usize)> = Vec::new();

    loop {
        let offset = match scanner.seek_substr(b" obj") {
            Some(_) => scanner.get_pos() - 4,
            None => break,
        };
        // walk back over `N G` in front of the keyword
        let mut back = scanner;
        back.set_pos(offset);
        let gen = match back.back().and_then(|w| w.to::<u16>()) {
            Ok(gen) => gen,
            Err(_) => continue,
        };
        let (num, header_pos) = match back.back() {
            Ok(w) => match w.to::<u64>() {
                Ok(num) => (num, w.file_offset()),
                Err(_) => continue,
            },
            Err(_) => continue,
        };
        if header_pos < start_offset {
            continue;
        }
        objects.push((num, gen, header_pos - start_offset));
    }

    if objects.is_empty() {
        err!(PdfError::Xref {
            msg: "no object headers found while rebuilding".into(),
        });
    }

    // later definitions of the same object number win
    objects.sort_by_key(|&(num, _, offset)| (num, offset));
    let highest = objects.last().map(|&(num, _, _)| num).unwrap_or(0);
    let mut table = XRefTable::new(highest + 1);
    table.set(
        0,
        Slot::Free {
            next: 0,
            gen: 65535,
        },
    );
    for &(num, gen, offset) in &objects {
        table.set(
            num,
            Slot::Used {
                offset: offset as u64,
                gen,
            },
        );
    }
    table.mark_repaired();
    warn!(
        "rebuilt xref table from a full-file scan: {} objects, highest id {}",
        objects.len(),
        highest
    );
    Ok(table)
}

/// Find the last trailer dictionary in a broken file, for use with a
/// rebuilt table.
pub fn find_trailer(
    backend: &impl Backend,
    resolve: &impl crate::object::Resolve,
) -> Result<crate::primitive::Dict> {
    let file = t!(backend.read(..));
    let mut scanner = Scanner::new(file);
    scanner.set_pos_from_end(0);
    t!(scanner.seek_substr_back(b"trailer"));
    let p = t!(crate::parse::parse_with_scanner(
        &mut scanner,
        resolve,
        crate::parse::ParseFlags::DICT
    ));
    p.into_dictionary(resolve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_finds_headers() {
        let data: &[u8] = b"%PDF-1.7\n1 0 obj\n(one)\nendobj\n7 0 obj\n(seven)\nendobj\n";
        let backend = data.to_vec();
        let table = rebuild_xref_table(&backend, 0).unwrap();
        assert!(table.is_repaired());
        assert!(matches!(table.get(1).unwrap(), Slot::Used { offset: 9, .. }));
        assert!(matches!(table.get(7).unwrap(), Slot::Used { .. }));
        assert!(!table.get(3).unwrap().is_used());
    }
}
