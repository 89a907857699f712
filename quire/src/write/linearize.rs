//! Fast Web View layout: classify objects by first-page reachability,
//! renumber, emit with a hint stream, and iterate the offset-dependent
//! fields to a fixed point.

use super::{collect_page_nums, Emitter, ObjectMap, OutObject, SaveOptions};
use crate::error::*;
use crate::object::ObjRef;
use crate::primitive::{Dict, PdfString, Primitive, RawStream, StreamData};

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const MAX_PASSES: usize = 8;

pub fn linearize(
    objects: ObjectMap,
    root: ObjRef,
    info: Option<ObjRef>,
    options: &SaveOptions,
) -> Result<Vec<u8>> {
    if options.encryption.is_some() {
        bail!("linearized output does not support encryption");
    }
    let pages = collect_page_nums(&objects, root.num);
    if pages.is_empty() {
        bail!("cannot linearize a document without pages");
    }

    // classify: objects needed for page 1, objects shared with later pages,
    // everything else. Walking from one page must not wander into another
    // page's subtree via the parent's /Kids.
    let page_set: BTreeSet<u64> = pages.iter().cloned().collect();
    let first_reach = reachable(&objects, pages[0], &page_set);
    let mut rest_reach = BTreeSet::new();
    for &page in &pages[1..] {
        options.cancel.check()?;
        rest_reach.extend(reachable(&objects, page, &page_set));
    }
    let shared: BTreeSet<u64> = first_reach.intersection(&rest_reach).cloned().collect();
    let first_only: Vec<u64> = {
        let mut v: Vec<u64> = first_reach.difference(&shared).cloned().collect();
        // the first page object leads its group, so /O is its number
        v.retain(|&n| n != pages[0]);
        v.insert(0, pages[0]);
        v
    };
    let mut other: Vec<u64> = objects
        .keys()
        .filter(|n| !first_reach.contains(n) && !shared.contains(n))
        .cloned()
        .collect();
    // the catalog leads the tail section
    other.retain(|&n| n != root.num);
    other.insert(0, root.num);

    // new numbering: 1 = linearization dict, first-page group from 2, the
    // hint stream, then shared, then the rest
    let mut renumber: HashMap<u64, u64> = HashMap::new();
    let mut next = 2;
    for &num in &first_only {
        renumber.insert(num, next);
        next += 1;
    }
    let hint_num = next;
    next += 1;
    for &num in shared.iter().chain(other.iter()) {
        renumber.insert(num, next);
        next += 1;
    }
    let total = next - 1;

    let mut renumbered: BTreeMap<u64, OutObject> = BTreeMap::new();
    for (num, out) in objects {
        let new_num = renumber[&num];
        renumbered.insert(
            new_num,
            OutObject {
                gen: 0,
                primitive: rewrite_refs(out.primitive, &renumber),
            },
        );
    }
    let new_root = renumber[&root.num];
    let new_info = info.map(|r| renumber[&r.num]);
    let first_page_num = 2u64;
    let front_last = hint_num;

    let file_id = linearized_file_id(&renumbered, options);

    // iterate: offsets feed the hint stream and the padded fields, which
    // feed the offsets
    let mut state = Layout::default();
    let mut previous: Option<Vec<u8>> = None;
    for _pass in 0..MAX_PASSES {
        options.cancel.check()?;
        let (bytes, new_layout) = emit(
            &renumbered,
            &state,
            Params {
                hint_num,
                front_last,
                total,
                new_root,
                new_info,
                first_page_num,
                n_pages: pages.len() as u64,
                n_shared: shared.len() as u64,
            },
            &file_id,
            options,
        )?;
        let stable = previous.as_deref() == Some(&bytes[..]);
        state = new_layout;
        if stable {
            return Ok(bytes);
        }
        previous = Some(bytes);
    }
    Err(PdfError::Other {
        msg: "linearization did not reach a fixed point".into(),
    })
}

/// Everything transitively referenced from `start`. Dangling references do
/// not join the set, and page objects other than `start` act as walls so a
/// page's closure stays its own.
fn reachable(objects: &ObjectMap, start: u64, pages: &BTreeSet<u64>) -> BTreeSet<u64> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(num) = stack.pop() {
        if !objects.contains_key(&num) || (num != start && pages.contains(&num)) {
            continue;
        }
        if !seen.insert(num) {
            continue;
        }
        walk_refs(&objects[&num].primitive, &mut |r| stack.push(r.num));
    }
    seen
}

fn walk_refs(p: &Primitive, cb: &mut impl FnMut(ObjRef)) {
    match p {
        Primitive::Reference(r) => cb(*r),
        Primitive::Array(items) => items.iter().for_each(|p| walk_refs(p, cb)),
        Primitive::Dictionary(dict) => dict.iter().for_each(|(_, p)| walk_refs(p, cb)),
        Primitive::Stream(s) => s.dict.iter().for_each(|(_, p)| walk_refs(p, cb)),
        _ => {}
    }
}

fn rewrite_refs(p: Primitive, map: &HashMap<u64, u64>) -> Primitive {
    match p {
        Primitive::Reference(r) => match map.get(&r.num) {
            Some(&num) => Primitive::Reference(ObjRef { num, gen: 0 }),
            None => Primitive::Null,
        },
        Primitive::Array(items) => {
            Primitive::Array(items.into_iter().map(|p| rewrite_refs(p, map)).collect())
        }
        Primitive::Dictionary(dict) => Primitive::Dictionary(
            dict.into_iter()
                .map(|(k, v)| (k, rewrite_refs(v, map)))
                .collect(),
        ),
        Primitive::Stream(s) => Primitive::Stream(RawStream {
            dict: s
                .dict
                .into_iter()
                .map(|(k, v)| (k, rewrite_refs(v, map)))
                .collect(),
            data: s.data,
        }),
        p => p,
    }
}

/// Offset-dependent values carried between passes.
#[derive(Default, Clone, PartialEq)]
struct Layout {
    file_length: u64,
    hint_offset: u64,
    hint_length: u64,
    end_of_first_page: u64,
    main_xref_offset: u64,
    front_xref_offset: u64,
    /// (offset, length) per page, page 1 first.
    page_spans: Vec<(u64, u64)>,
    object_offsets: BTreeMap<u64, u64>,
}

struct Params {
    hint_num: u64,
    front_last: u64,
    total: u64,
    new_root: u64,
    new_info: Option<u64>,
    first_page_num: u64,
    n_pages: u64,
    n_shared: u64,
}

fn pad10(n: u64) -> String {
    format!("{:010}", n)
}

fn emit(
    objects: &BTreeMap<u64, OutObject>,
    prev: &Layout,
    params: Params,
    file_id: &PdfString,
    options: &SaveOptions,
) -> Result<(Vec<u8>, Layout)> {
    let mut e = Emitter::new(options);
    let mut layout = Layout::default();

    e.header(options.version);

    // object 1: the linearization parameter dictionary, all of whose
    // offset-valued fields are zero-padded so their width never changes
    e.offsets.insert(1, (e.pos(), 0));
    e.out.extend_from_slice(
        format!(
            "1 0 obj\n<</Linearized 1/L {}/H [{} {}]/O {}/E {}/N {}/T {}>>\nendobj\n",
            pad10(prev.file_length),
            pad10(prev.hint_offset),
            pad10(prev.hint_length),
            params.first_page_num,
            pad10(prev.end_of_first_page),
            params.n_pages,
            pad10(prev.main_xref_offset),
        )
        .as_bytes(),
    );

    // first-page xref, placed ahead of the objects it indexes
    layout.front_xref_offset = e.pos();
    e.out.extend_from_slice(b"xref\n");
    e.out
        .extend_from_slice(format!("1 {}\n", params.front_last).as_bytes());
    for num in 1..=params.front_last {
        let offset = prev.object_offsets.get(&num).cloned().unwrap_or(0);
        e.out
            .extend_from_slice(format!("{:010} {:05} n \n", offset, 0).as_bytes());
    }
    let mut front_trailer = Dict::new();
    front_trailer.insert("Size", Primitive::Integer(params.total as i64 + 1));
    front_trailer.insert(
        "Root",
        Primitive::Reference(ObjRef {
            num: params.new_root,
            gen: 0,
        }),
    );
    front_trailer.insert(
        "ID",
        Primitive::Array(vec![
            Primitive::String(file_id.clone()),
            Primitive::String(file_id.clone()),
        ]),
    );
    e.out.extend_from_slice(b"trailer\n");
    front_trailer.serialize(&mut e.out)?;
    e.out.extend_from_slice(b"\n");

    // first-page objects
    for num in 2..params.hint_num {
        options.cancel.check()?;
        if let Some(out) = objects.get(&num) {
            e.object(num, 0, &out.primitive)?;
        }
    }

    // hint stream, built from the previous pass's measurements
    layout.hint_offset = e.pos();
    let hint_data = build_hint_stream(prev, &params);
    let encoded = crate::filters::flate_encode(&hint_data.data, options.compression_level.max(1));
    let mut hint_dict = Dict::new();
    hint_dict.insert("S", Primitive::Integer(hint_data.shared_offset as i64));
    hint_dict.insert("Filter", Primitive::name("FlateDecode"));
    hint_dict.insert("Length", Primitive::Integer(encoded.len() as i64));
    e.object(
        params.hint_num,
        0,
        &Primitive::Stream(RawStream {
            dict: hint_dict,
            data: StreamData::Memory(encoded.into()),
        }),
    )?;
    layout.hint_length = e.pos() - layout.hint_offset;
    layout.end_of_first_page = e.pos();

    // shared objects, then the remainder
    for num in params.hint_num + 1..=params.total {
        options.cancel.check()?;
        if let Some(out) = objects.get(&num) {
            e.object(num, 0, &out.primitive)?;
        }
    }

    // main xref covering object 0 and the tail section
    layout.main_xref_offset = e.pos();
    e.out.extend_from_slice(b"xref\n");
    e.out.extend_from_slice(b"0 1\n");
    e.out
        .extend_from_slice(format!("{:010} {:05} f \n", 0, 65535).as_bytes());
    let tail_first = params.hint_num + 1;
    if params.total >= tail_first {
        e.out.extend_from_slice(
            format!("{} {}\n", tail_first, params.total - tail_first + 1).as_bytes(),
        );
        for num in tail_first..=params.total {
            let offset = e.offsets.get(&num).map(|&(o, _)| o).unwrap_or(0);
            e.out
                .extend_from_slice(format!("{:010} {:05} n \n", offset, 0).as_bytes());
        }
    }
    let mut main_trailer = Dict::new();
    main_trailer.insert("Size", Primitive::Integer(params.total as i64 + 1));
    main_trailer.insert(
        "Root",
        Primitive::Reference(ObjRef {
            num: params.new_root,
            gen: 0,
        }),
    );
    if let Some(info) = params.new_info {
        main_trailer.insert("Info", Primitive::Reference(ObjRef { num: info, gen: 0 }));
    }
    main_trailer.insert(
        "ID",
        Primitive::Array(vec![
            Primitive::String(file_id.clone()),
            Primitive::String(file_id.clone()),
        ]),
    );
    // pad so the chain keeps its width across passes
    e.out.extend_from_slice(b"trailer\n");
    let mut trailer_bytes = Vec::new();
    main_trailer.serialize(&mut trailer_bytes)?;
    // splice the padded /Prev in front of the closing brackets
    trailer_bytes.truncate(trailer_bytes.len() - 2);
    trailer_bytes
        .extend_from_slice(format!("/Prev {}>>", pad10(layout.front_xref_offset)).as_bytes());
    e.out.extend_from_slice(&trailer_bytes);
    e.out.extend_from_slice(
        format!("\nstartxref\n{}\n%%EOF\n", pad10(layout.main_xref_offset)).as_bytes(),
    );

    layout.file_length = e.out.len() as u64;
    layout.object_offsets = e.offsets.iter().map(|(&n, &(o, _))| (n, o)).collect();

    // page spans for the next pass's hint table: page 1 starts after the
    // front xref; later pages sit in the tail
    layout.page_spans = page_spans(&layout, &params);

    Ok((e.out, layout))
}

fn page_spans(layout: &Layout, params: &Params) -> Vec<(u64, u64)> {
    let mut spans = Vec::with_capacity(params.n_pages as usize);
    let first = layout
        .object_offsets
        .get(&params.first_page_num)
        .cloned()
        .unwrap_or(0);
    spans.push((first, layout.end_of_first_page.saturating_sub(first)));
    for _ in 1..params.n_pages {
        // measured collectively; individual spans refine in later passes
        spans.push((
            layout.end_of_first_page,
            layout
                .main_xref_offset
                .saturating_sub(layout.end_of_first_page),
        ));
    }
    spans
}

struct HintData {
    data: Vec<u8>,
    shared_offset: usize,
}

/// The page offset hint table followed by the shared object hint table,
/// field widths computed from the measured maxima (ISO 32000-2 F.4).
fn build_hint_stream(prev: &Layout, params: &Params) -> HintData {
    let spans = if prev.page_spans.is_empty() {
        vec![(0u64, 0u64); params.n_pages as usize]
    } else {
        prev.page_spans.clone()
    };
    let least_length = spans.iter().map(|&(_, len)| len).min().unwrap_or(0);
    let max_delta = spans
        .iter()
        .map(|&(_, len)| len - least_length)
        .max()
        .unwrap_or(0);
    let bits_delta = bit_width(max_delta);

    let mut bits = BitWriter::new();
    // header: 13 items of the page offset hint table
    bits.write(1, 32); // least objects per page
    bits.write(prev.object_offsets.get(&params.first_page_num).cloned().unwrap_or(0), 32);
    bits.write(16, 16); // bits for object-count deltas
    bits.write(least_length, 32);
    bits.write(bits_delta as u64, 16);
    bits.write(0, 32); // least content stream offset
    bits.write(bits_delta as u64, 16);
    bits.write(least_length, 32);
    bits.write(bits_delta as u64, 16);
    bits.write(8, 16); // bits for shared-reference counts
    bits.write(bit_width(params.n_shared.max(1)) as u64, 16);
    bits.write(1, 16); // bits for fraction numerators
    bits.write(1, 16); // fraction denominator

    // per-page arrays, one item at a time across all pages
    for _ in &spans {
        bits.write(0, 16); // object-count delta
    }
    for &(_, len) in &spans {
        bits.write(len - least_length, bits_delta);
    }
    for _ in &spans {
        bits.write(0, 8); // shared references on this page
    }
    for &(offset, _) in &spans {
        bits.write(offset.min(u32::MAX as u64), bits_delta.max(1));
    }
    for &(_, len) in &spans {
        bits.write(len - least_length, bits_delta.max(1));
    }
    bits.align();

    let shared_offset = bits.len();
    // shared object hint table header
    let mut shared = BitWriter::new();
    shared.write(params.hint_num + 1, 32); // first shared object number
    shared.write(prev.end_of_first_page, 32); // its location
    shared.write(params.n_shared, 32); // shared objects on the first page
    shared.write(params.n_shared, 32); // shared objects in total
    shared.write(0, 16); // bits for group length deltas
    shared.write(0, 32); // least group length
    shared.write(0, 16); // bits for group object counts
    for _ in 0..params.n_shared {
        shared.write(0, 1); // no signature present
    }
    shared.align();

    let mut data = bits.into_bytes();
    data.extend_from_slice(&shared.into_bytes());
    HintData {
        data,
        shared_offset,
    }
}

fn bit_width(max: u64) -> usize {
    (64 - max.leading_zeros() as usize).max(1)
}

struct BitWriter {
    bytes: Vec<u8>,
    bit: u8,
}

impl BitWriter {
    fn new() -> BitWriter {
        BitWriter {
            bytes: Vec::new(),
            bit: 0,
        }
    }
    fn write(&mut self, value: u64, width: usize) {
        for i in (0..width).rev() {
            let bit = (value >> i & 1) as u8;
            if self.bit == 0 {
                self.bytes.push(0);
            }
            let last = self.bytes.last_mut().unwrap();
            *last |= bit << (7 - self.bit);
            self.bit = (self.bit + 1) % 8;
        }
    }
    fn align(&mut self) {
        self.bit = 0;
    }
    fn len(&self) -> usize {
        self.bytes.len()
    }
    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Linearized output derives its id from the renumbered graph.
fn linearized_file_id(objects: &BTreeMap<u64, OutObject>, options: &SaveOptions) -> PdfString {
    let mut hash = Sha256::new();
    hash.update(b"linearized");
    hash.update([options.version.0, options.version.1]);
    for (&num, out) in objects {
        hash.update(num.to_be_bytes());
        let mut buf = Vec::new();
        let _ = out.primitive.serialize(&mut buf);
        hash.update(&buf);
    }
    if !options.deterministic {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        hash.update(now.to_be_bytes());
    }
    let digest = hash.finalize();
    PdfString::hex(digest[..16].to_vec())
}
