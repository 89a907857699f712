use crate::object::ObjRef;
use std::error::Error;
use std::io;

/// Everything that can go wrong while reading, transforming or writing a
/// document. Hosts that want to render a failure can use [`PdfError::kind`],
/// [`PdfError::byte_offset`] and [`PdfError::obj_ref`] instead of matching
/// the full enum.
#[derive(Debug, Snafu)]
pub enum PdfError {
    #[snafu(display("unexpected end of file"))]
    Eof,

    #[snafu(display("malformed token at offset {}: {}", offset, found))]
    Lex { offset: usize, found: String },

    #[snafu(display("unexpected token '{}' at {} - expected '{}'", lexeme, offset, expected))]
    UnexpectedLexeme {
        offset: usize,
        lexeme: String,
        expected: &'static str,
    },

    #[snafu(display("expected {}, found {}", expected, found))]
    UnexpectedPrimitive {
        expected: &'static str,
        found: &'static str,
    },

    #[snafu(display("a {} is not allowed in this position", found))]
    PrimitiveNotAllowed { found: &'static str },

    #[snafu(display("maximum nesting depth exceeded"))]
    MaxDepth,

    #[snafu(display("cannot resolve a reference here (no resolver available)"))]
    NoResolver,

    #[snafu(display("no startxref near the end of the file"))]
    NoStartXref,

    #[snafu(display("corrupt xref section: {}", msg))]
    Xref { msg: String },

    #[snafu(display("xref stream entry type {} is not 0, 1 or 2", found))]
    XrefEntryType { found: u64 },

    #[snafu(display("object {} {} R does not exist", num, gen))]
    MissingObject { num: u64, gen: u16 },

    #[snafu(display("object number {} is free", num))]
    FreeObject { num: u64 },

    #[snafu(display("cycle detected while resolving {} {} R", num, gen))]
    CycleDetected { num: u64, gen: u16 },

    #[snafu(display("{} filter: {}", filter, msg))]
    Filter { filter: &'static str, msg: String },

    #[snafu(display("invalid hex digits {:?} at {}", bytes, offset))]
    HexDecode { offset: usize, bytes: [u8; 2] },

    #[snafu(display("truncated ASCII85 group"))]
    Ascii85Tail,

    #[snafu(display("{} is not a known predictor", predictor))]
    Predictor { predictor: i64 },

    #[snafu(display("wrong password"))]
    CryptoAuth,

    #[snafu(display("decryption failed: {}", msg))]
    CryptoIntegrity { msg: String },

    #[snafu(display("{} exceeds the configured limit of {}", what, limit))]
    LimitExceeded { what: &'static str, limit: usize },

    #[snafu(display("operation cancelled"))]
    Cancelled,

    #[snafu(display("can't parse field {} of {}: {}", field, typ, source))]
    FromField {
        typ: &'static str,
        field: &'static str,
        source: Box<PdfError>,
    },

    #[snafu(display("field /{} is missing in dictionary for {}", field, typ))]
    MissingEntry { typ: &'static str, field: String },

    #[snafu(display("expected /{} {}, found {}", key, value, found))]
    KeyValueMismatch {
        key: String,
        value: String,
        found: String,
    },

    #[snafu(display("expected dictionary /Type {}, found {}", expected, found))]
    WrongDictionaryType { expected: String, found: String },

    #[snafu(display("no variant '{}' in enum {}", name, id))]
    UnknownVariant { id: &'static str, name: String },

    #[snafu(display("object stream index out of bounds ({}/{})", index, max))]
    ObjStmOutOfBounds { index: usize, max: usize },

    #[snafu(display("page out of bounds ({}/{})", page_nr, max))]
    PageOutOfBounds { page_nr: u32, max: u32 },

    #[snafu(display("page {} not found in the page tree", page_nr))]
    PageNotFound { page_nr: u32 },

    #[snafu(display("read past the end of the referenced range"))]
    Bounds,

    #[snafu(display("error parsing from string: {}", source))]
    Parse {
        source: Box<dyn Error + Send + Sync>,
    },

    #[snafu(display("invalid UTF-8: {}", source))]
    Utf8 {
        source: Box<dyn Error + Send + Sync>,
    },

    #[snafu(display("IO error: {}", source))]
    Io { source: io::Error },

    #[snafu(display("{}", msg))]
    Other { msg: String },

    #[snafu(display("value missing at {}:{}:{}", file, line, column))]
    NoneError {
        file: &'static str,
        line: u32,
        column: u32,
    },
}

/// Coarse classification used when surfacing failures to a host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntactic,
    StructuralXRef,
    MissingObject,
    CycleDetected,
    FilterError,
    CryptoAuth,
    CryptoIntegrity,
    LimitExceeded,
    Cancelled,
    Io,
    Other,
}

impl PdfError {
    pub fn kind(&self) -> ErrorKind {
        use PdfError::*;
        match *self {
            Eof | Lex { .. } | HexDecode { .. } => ErrorKind::Lexical,
            UnexpectedLexeme { .. }
            | UnexpectedPrimitive { .. }
            | PrimitiveNotAllowed { .. }
            | MaxDepth
            | FromField { .. }
            | MissingEntry { .. }
            | KeyValueMismatch { .. }
            | WrongDictionaryType { .. }
            | UnknownVariant { .. }
            | Parse { .. }
            | Utf8 { .. } => ErrorKind::Syntactic,
            NoStartXref | Xref { .. } | XrefEntryType { .. } => ErrorKind::StructuralXRef,
            MissingObject { .. } | FreeObject { .. } | NoResolver | ObjStmOutOfBounds { .. } => {
                ErrorKind::MissingObject
            }
            CycleDetected { .. } => ErrorKind::CycleDetected,
            Filter { .. } | Ascii85Tail | Predictor { .. } => ErrorKind::FilterError,
            CryptoAuth => ErrorKind::CryptoAuth,
            CryptoIntegrity { .. } => ErrorKind::CryptoIntegrity,
            LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Cancelled => ErrorKind::Cancelled,
            Io { .. } => ErrorKind::Io,
            _ => ErrorKind::Other,
        }
    }

    /// Byte offset into the source, where the failing construct is known.
    pub fn byte_offset(&self) -> Option<usize> {
        match *self {
            PdfError::Lex { offset, .. }
            | PdfError::UnexpectedLexeme { offset, .. }
            | PdfError::HexDecode { offset, .. } => Some(offset),
            _ => None,
        }
    }

    /// The object the failure is attributed to, where one is known.
    pub fn obj_ref(&self) -> Option<ObjRef> {
        match *self {
            PdfError::MissingObject { num, gen } | PdfError::CycleDetected { num, gen } => {
                Some(ObjRef { num, gen })
            }
            PdfError::FreeObject { num } => Some(ObjRef { num, gen: 0 }),
            _ => None,
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, PdfError::Eof)
    }
}

pub type Result<T, E = PdfError> = std::result::Result<T, E>;

impl From<io::Error> for PdfError {
    fn from(source: io::Error) -> PdfError {
        PdfError::Io { source }
    }
}
impl From<String> for PdfError {
    fn from(msg: String) -> PdfError {
        PdfError::Other { msg }
    }
}

macro_rules! err_from {
    ($($st:ty),* => $variant:ident) => (
        $(
            impl From<$st> for PdfError {
                fn from(e: $st) -> PdfError {
                    PdfError::$variant { source: e.into() }
                }
            }
        )*
    )
}
err_from!(std::str::Utf8Error, std::string::FromUtf8Error, std::string::FromUtf16Error => Utf8);
err_from!(std::num::ParseIntError, std::num::ParseFloatError => Parse);

#[macro_export]
macro_rules! try_opt {
    ($e:expr) => {
        match $e {
            Some(v) => v,
            None => {
                return Err($crate::PdfError::NoneError {
                    file: file!(),
                    line: line!(),
                    column: column!(),
                })
            }
        }
    };
}

macro_rules! err {
    ($e: expr) => {{
        return Err($e);
    }};
}
macro_rules! unexpected_primitive {
    ($expected:ident, $found:expr) => {
        Err($crate::error::PdfError::UnexpectedPrimitive {
            expected: stringify!($expected),
            found: $found,
        })
    };
}
macro_rules! bail {
    ($($t:tt)*) => {
        err!($crate::PdfError::Other { msg: format!($($t)*) })
    }
}
macro_rules! t {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Err(e.into()),
        }
    };
    ($e:expr, $($ctx:expr),+ $(,)?) => {
        match $e {
            Ok(v) => v,
            Err(e) => {
                debug!("in context {:?}", ($(&$ctx),+));
                return Err(e.into());
            }
        }
    };
}
