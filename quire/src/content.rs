//! Content streams as operator sequences. A page may carry several
//! streams; they concatenate left to right into one logical program.

use std::fmt::{self, Display, Formatter};
use std::io::Write;

use itertools::Itertools;

use crate::error::*;
use crate::object::{Object, ObjectWrite, Resolve, Stream, Updater};
use crate::parse::{parse_with_context, ParseFlags};
use crate::primitive::Primitive;
use crate::scan::Scanner;

/// One operation: operands first, operator last, as in the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub operator: String,
    pub operands: Vec<Primitive>,
}

impl Op {
    pub fn new(operator: impl Into<String>, operands: Vec<Primitive>) -> Op {
        Op {
            operator: operator.into(),
            operands,
        }
    }
}

/// The program of graphics operators describing a page's contents.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Content {
    pub operations: Vec<Op>,
}

impl Content {
    pub fn from_ops(operations: Vec<Op>) -> Content {
        Content { operations }
    }

    /// Parse decoded content bytes. Anything that parses as a primitive is
    /// an operand; the next bare keyword closes the operation.
    pub fn parse_from(data: &[u8], resolve: &impl Resolve) -> Result<Content> {
        let mut scanner = Scanner::new(data);
        let mut operations = Vec::new();
        let mut operands = Vec::new();

        loop {
            let backup = scanner.get_pos();
            match parse_with_context(
                &mut scanner,
                resolve,
                None,
                ParseFlags::ANY & !ParseFlags::STREAM & !ParseFlags::REF,
                resolve.options().max_parse_depth,
            ) {
                Ok(operand) => operands.push(operand),
                Err(e) if e.is_eof() => break,
                Err(_) => {
                    // not an operand: an operator closing the operation
                    scanner.set_pos(backup);
                    let operator = match scanner.next() {
                        Ok(word) => word.to_string(),
                        Err(e) if e.is_eof() => break,
                        Err(e) => return Err(e),
                    };
                    operations.push(Op::new(operator, std::mem::take(&mut operands)));
                }
            }
            if scanner.get_pos() >= data.len() {
                break;
            }
        }
        Ok(Content { operations })
    }

    pub fn serialize_ops(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        for op in &self.operations {
            for operand in &op.operands {
                operand.serialize(&mut data)?;
                data.push(b' ');
            }
            data.write_all(op.operator.as_bytes())?;
            data.push(b'\n');
        }
        Ok(data)
    }
}

impl Object for Content {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        type ContentStream = Stream<()>;
        match p {
            Primitive::Array(parts) => {
                let mut data = Vec::new();
                for (i, part) in parts.into_iter().enumerate() {
                    let stream = t!(ContentStream::from_primitive(part, resolve), i);
                    data.extend_from_slice(&t!(stream.data(resolve)));
                    // streams split mid-token concatenate across whitespace
                    data.push(b'\n');
                }
                Content::parse_from(&data, resolve)
            }
            p => Content::parse_from(&t!(ContentStream::from_primitive(p, resolve).and_then(
                |stream| stream.data(resolve).map(|data| data.to_vec())
            )), resolve),
        }
    }
}

impl ObjectWrite for Content {
    fn to_primitive(&self, update: &mut impl Updater) -> Result<Primitive> {
        let data = self.serialize_ops()?;
        let stream: Stream<()> = Stream::new((), data);
        Ok(Primitive::Reference(
            update.create(stream)?.get_ref().get_inner(),
        ))
    }
}

impl Display for Content {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for op in &self.operations {
            writeln!(f, "  {}", op)?;
        }
        Ok(())
    }
}
impl Display for Op {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} {}", self.operands.iter().format(" "), self.operator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::NoResolve;
    use crate::primitive::PdfString;

    #[test]
    fn parses_text_program() {
        let content =
            Content::parse_from(b"BT /F1 12 Tf 100 700 Td (Hello) Tj ET", &NoResolve).unwrap();
        let ops: Vec<&str> = content
            .operations
            .iter()
            .map(|op| op.operator.as_str())
            .collect();
        assert_eq!(ops, vec!["BT", "Tf", "Td", "Tj", "ET"]);
        assert_eq!(
            content.operations[3].operands,
            vec![Primitive::String(PdfString::new(&b"Hello"[..]))]
        );
    }

    #[test]
    fn round_trips_through_bytes() {
        let content =
            Content::parse_from(b"q 1 0 0 1 10 20 cm (x) Tj Q", &NoResolve).unwrap();
        let bytes = content.serialize_ops().unwrap();
        let reparsed = Content::parse_from(&bytes, &NoResolve).unwrap();
        assert_eq!(content, reparsed);
    }
}
