//! Indirect object definitions: `N G obj … endobj`.

use crate::crypt::SecurityHandler;
use crate::error::*;
use crate::object::{ObjRef, Resolve};
use crate::parse::{parse_stream_with_scanner, parse_with_context, Context, ParseFlags};
use crate::primitive::{Primitive, RawStream};
use crate::scan::Scanner;

/// Parse an indirect object definition at the scanner position. The payload
/// is exactly one primitive; strings inside it are decrypted with the
/// object's own `(num, gen)` key.
pub fn parse_indirect_object(
    scanner: &mut Scanner,
    r: &impl Resolve,
    decoder: Option<&SecurityHandler>,
) -> Result<(ObjRef, Primitive)> {
    let num = t!(t!(scanner.next()).to::<u64>());
    let gen = t!(t!(scanner.next()).to::<u16>());
    t!(scanner.next_expect("obj"));

    let id = ObjRef { num, gen };
    let ctx = Context { decoder, id };
    let obj = t!(parse_with_context(
        scanner,
        r,
        Some(&ctx),
        ParseFlags::ANY,
        r.options().max_parse_depth
    ));

    t!(scanner.next_expect("endobj"));

    Ok((id, obj))
}

/// Like `parse_indirect_object`, but insists the payload is a stream.
pub fn parse_indirect_stream(
    scanner: &mut Scanner,
    r: &impl Resolve,
    decoder: Option<&SecurityHandler>,
) -> Result<(ObjRef, RawStream)> {
    let num = t!(t!(scanner.next()).to::<u64>());
    let gen = t!(t!(scanner.next()).to::<u16>());
    t!(scanner.next_expect("obj"));

    let id = ObjRef { num, gen };
    let ctx = Context { decoder, id };
    let stream = t!(parse_stream_with_scanner(scanner, r, &ctx), num, gen);

    t!(scanner.next_expect("endobj"));

    Ok((id, stream))
}
