//! PDF object parser
//!
//! Builds [`Object`] values from the token stream, including indirect
//! object headers and stream bodies.

use super::lexer::{Lexer, Token};
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};

/// Upper bound on array/dictionary nesting
const MAX_DEPTH: usize = 128;

pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> ObjectParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
        }
    }

    pub fn at(data: &'a [u8], position: usize) -> Self {
        Self {
            lexer: Lexer::at(data, position),
        }
    }

    pub fn lexer_mut(&mut self) -> &mut Lexer<'a> {
        &mut self.lexer
    }

    pub fn parse_object(&mut self) -> Result<Object> {
        self.parse_with_depth(0)
    }

    /// Parse `N G obj <value> [stream ... endstream] endobj`
    pub fn parse_indirect_object(&mut self) -> Result<(ObjectId, Object)> {
        let number = self.expect_integer("object number")?;
        let generation = self.expect_integer("generation number")?;
        self.lexer.expect_keyword("obj")?;
        let id = ObjectId::new(number as u32, generation as u16);

        let value = self.parse_object()?;
        let value = match (value, self.lexer.peek_token()?) {
            (Object::Dictionary(dict), Token::Keyword(word)) if word == "stream" => {
                self.lexer.next_token()?;
                let length = dict
                    .get_integer("Length")
                    .and_then(|len| usize::try_from(len).ok());
                let data = self.lexer.read_stream_data(length)?;
                Object::Stream(dict, data)
            }
            (value, _) => value,
        };

        match self.lexer.next_token()? {
            Token::Keyword(word) if word == "endobj" => {}
            // tolerate a missing endobj at end of file
            Token::Eof => {}
            other => {
                return Err(PdfError::ParseError(format!(
                    "expected endobj after object {id}, found {other:?}"
                )))
            }
        }

        Ok((id, value))
    }

    fn expect_integer(&mut self, what: &str) -> Result<i64> {
        match self.lexer.next_token()? {
            Token::Integer(value) if value >= 0 => Ok(value),
            other => Err(PdfError::ParseError(format!(
                "expected {what}, found {other:?}"
            ))),
        }
    }

    fn parse_with_depth(&mut self, depth: usize) -> Result<Object> {
        if depth > MAX_DEPTH {
            return Err(PdfError::ParseError("objects nested too deeply".to_string()));
        }

        match self.lexer.next_token()? {
            Token::Null => Ok(Object::Null),
            Token::Boolean(b) => Ok(Object::Boolean(b)),
            Token::Real(r) => Ok(Object::Real(r)),
            Token::String(s) => Ok(Object::String(s)),
            Token::HexString(s) => Ok(Object::HexString(s)),
            Token::Name(n) => Ok(Object::Name(n)),
            Token::Integer(first) => self.parse_integer_or_reference(first),
            Token::ArrayStart => {
                let mut items = Vec::new();
                loop {
                    match self.lexer.next_token()? {
                        Token::ArrayEnd => break,
                        Token::Eof => {
                            return Err(PdfError::ParseError("unterminated array".to_string()))
                        }
                        token => {
                            self.lexer.push_token(token);
                            items.push(self.parse_with_depth(depth + 1)?);
                        }
                    }
                }
                Ok(Object::Array(items))
            }
            Token::DictStart => {
                let mut dict = Dictionary::new();
                loop {
                    match self.lexer.next_token()? {
                        Token::DictEnd => break,
                        Token::Name(key) => {
                            let value = self.parse_with_depth(depth + 1)?;
                            dict.set(key, value);
                        }
                        other => {
                            return Err(PdfError::ParseError(format!(
                                "expected dictionary key, found {other:?}"
                            )))
                        }
                    }
                }
                Ok(Object::Dictionary(dict))
            }
            other => Err(PdfError::ParseError(format!(
                "unexpected token {other:?}"
            ))),
        }
    }

    fn parse_integer_or_reference(&mut self, first: i64) -> Result<Object> {
        let second = self.lexer.next_token()?;
        if let Token::Integer(generation) = second {
            let third = self.lexer.next_token()?;
            if matches!(&third, Token::Keyword(word) if word == "R") {
                if first < 0 || generation < 0 {
                    return Err(PdfError::ParseError(format!(
                        "invalid reference {first} {generation} R"
                    )));
                }
                return Ok(Object::Reference(ObjectId::new(
                    first as u32,
                    generation as u16,
                )));
            }
            self.lexer.push_token(third);
        }
        self.lexer.push_token(second);
        Ok(Object::Integer(first))
    }
}
