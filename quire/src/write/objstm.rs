//! Packing small objects into `/Type /ObjStm` containers on write.

use super::{ObjectMap, OutObject, SaveOptions};
use crate::error::*;
use crate::filters;
use crate::object::ObjRef;
use crate::primitive::{Dict, Primitive, RawStream, StreamData};
use std::collections::BTreeMap;

const PER_STREAM: usize = 100;

/// Objects that must never live inside an object stream: streams
/// themselves, anything with a nonzero generation, the encryption
/// dictionary, and the catalog of an encrypted file.
fn eligible(num: u64, out: &OutObject, root: ObjRef, encrypt_ref: Option<ObjRef>) -> bool {
    if out.gen != 0 {
        return false;
    }
    if matches!(out.primitive, Primitive::Stream(_)) {
        return false;
    }
    if let Some(e) = encrypt_ref {
        if e.num == num || root.num == num {
            return false;
        }
    }
    true
}

/// Move every eligible object into a container; `packed` receives
/// `num -> (container, index)` for the xref stream.
pub(crate) fn pack_objects(
    objects: &mut ObjectMap,
    packed: &mut BTreeMap<u64, (u64, u32)>,
    next_num: &mut u64,
    root: ObjRef,
    encrypt_ref: Option<ObjRef>,
    options: &SaveOptions,
) -> Result<()> {
    let candidates: Vec<u64> = objects
        .iter()
        .filter(|&(&num, out)| eligible(num, out, root, encrypt_ref))
        .map(|(&num, _)| num)
        .collect();

    for chunk in candidates.chunks(PER_STREAM) {
        options.cancel.check()?;
        let mut header = Vec::new();
        let mut bodies = Vec::new();
        for (index, &num) in chunk.iter().enumerate() {
            let out = &objects[&num];
            header.extend_from_slice(format!("{} {} ", num, bodies.len()).as_bytes());
            out.primitive.serialize(&mut bodies)?;
            bodies.push(b'\n');
            packed.insert(num, (0, index as u32)); // container patched below
        }
        header.push(b'\n');

        let first = header.len();
        let mut payload = header;
        payload.extend_from_slice(&bodies);
        let encoded = filters::flate_encode(&payload, options.compression_level.max(1));

        let container = *next_num;
        *next_num += 1;
        for &num in chunk {
            packed.get_mut(&num).unwrap().0 = container;
        }

        let mut dict = Dict::new();
        dict.insert("Type", Primitive::name("ObjStm"));
        dict.insert("N", Primitive::Integer(chunk.len() as i64));
        dict.insert("First", Primitive::Integer(first as i64));
        dict.insert("Filter", Primitive::name("FlateDecode"));
        dict.insert("Length", Primitive::Integer(encoded.len() as i64));
        objects.insert(
            container,
            OutObject {
                gen: 0,
                primitive: Primitive::Stream(RawStream {
                    dict,
                    data: StreamData::Memory(encoded.into()),
                }),
            },
        );
    }
    Ok(())
}
