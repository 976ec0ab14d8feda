//! Objects stored inside `/Type /ObjStm` streams (PDF 1.5+)

use super::lexer::Token;
use super::objects::ObjectParser;
use super::xref::decode_stream;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object};

/// Decoded object stream with its `(number, offset)` header pairs
#[derive(Debug)]
pub struct ObjectStream {
    data: Vec<u8>,
    first: usize,
    offsets: Vec<(u32, usize)>,
}

impl ObjectStream {
    pub fn parse(dict: &Dictionary, raw: &[u8]) -> Result<Self> {
        if dict.get_name("Type") != Some("ObjStm") {
            return Err(PdfError::InvalidStructure(
                "stream is not an object stream".to_string(),
            ));
        }
        let required = |key: &str| {
            dict.get_integer(key)
                .and_then(|value| usize::try_from(value).ok())
                .ok_or_else(|| PdfError::InvalidStructure(format!("object stream without {key}")))
        };
        let count = required("N")?;
        let first = required("First")?;

        let data = decode_stream(dict, raw)?;
        if first > data.len() {
            return Err(PdfError::InvalidStructure(format!(
                "object stream First {first} is beyond its {} bytes",
                data.len()
            )));
        }

        let mut parser = ObjectParser::new(&data[..first]);
        let lexer = parser.lexer_mut();
        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            match (lexer.next_token()?, lexer.next_token()?) {
                (Token::Integer(number), Token::Integer(offset)) if number >= 0 && offset >= 0 => {
                    offsets.push((number as u32, offset as usize));
                }
                other => {
                    return Err(PdfError::ParseError(format!(
                        "bad object stream header entry {other:?}"
                    )))
                }
            }
        }

        Ok(Self {
            data,
            first,
            offsets,
        })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Object at position `index`, checked against the expected `number`.
    pub fn get(&self, index: u32, number: u32) -> Result<Object> {
        let (stored, offset) = self
            .offsets
            .get(index as usize)
            .copied()
            .filter(|(stored, _)| *stored == number)
            .or_else(|| self.offsets.iter().copied().find(|(stored, _)| *stored == number))
            .ok_or(PdfError::InvalidObjectReference(number, 0))?;
        let start = self.first + offset;
        if start > self.data.len() {
            return Err(PdfError::InvalidObjectReference(stored, 0));
        }
        ObjectParser::at(&self.data, start).parse_object()
    }
}
