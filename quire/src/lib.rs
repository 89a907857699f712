//! Full-fidelity PDF processing: parse existing files into a lazily
//! decoded object graph, mutate or assemble that graph, and serialize it
//! back to conforming bytes - including encrypted, incrementally updated
//! and linearized variants.
//!
//! The read path runs bytes through the scanner, parser and xref resolver
//! into [`file::File`]; streams stay undecoded until asked for. The write
//! path walks the graph back out through [`write::SaveOptions`].

#[macro_use]
extern crate quire_derive;
#[macro_use]
extern crate snafu;
#[macro_use]
extern crate log;

#[macro_use]
pub mod error;
pub mod any;
pub mod backend;
pub mod build;
pub mod cancel;
pub mod color;
pub mod content;
pub mod crypt;
pub mod file;
pub mod filters;
pub mod object;
pub mod parse;
pub mod primitive;
pub mod repair;
pub mod scan;
pub mod write;
pub mod xref;

pub use crate::error::{ErrorKind, PdfError, Result};
