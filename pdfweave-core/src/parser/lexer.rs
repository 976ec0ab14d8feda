//! PDF Lexer
//!
//! Tokenizes PDF syntax according to ISO 32000-1 Section 7.2

use crate::error::{PdfError, Result};

/// PDF Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    /// Literal string, escapes already resolved
    String(Vec<u8>),
    /// Hexadecimal string, already decoded
    HexString(Vec<u8>),
    /// Name object without the leading slash, `#xx` resolved
    Name(String),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    Null,
    /// Any other bare word: `obj`, `endobj`, `stream`, `R`, `trailer`, ...
    Keyword(String),
    Eof,
}

/// Lexer over an in-memory byte slice
pub struct Lexer<'a> {
    data: &'a [u8],
    position: usize,
    token_buffer: Vec<Token>,
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n' | b'\x0C' | b'\0')
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    /// Lexer starting at byte offset `position`
    pub fn at(data: &'a [u8], position: usize) -> Self {
        Self {
            data,
            position: position.min(data.len()),
            token_buffer: Vec::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Push back a token; pushed tokens are returned last-in first-out
    pub fn push_token(&mut self, token: Token) {
        self.token_buffer.push(token);
    }

    pub fn peek_token(&mut self) -> Result<Token> {
        let token = self.next_token()?;
        self.push_token(token.clone());
        Ok(token)
    }

    /// Get the next token, comments are skipped
    pub fn next_token(&mut self) -> Result<Token> {
        if let Some(token) = self.token_buffer.pop() {
            return Ok(token);
        }

        loop {
            self.skip_whitespace();
            match self.peek_byte() {
                Some(b'%') => self.skip_comment(),
                _ => break,
            }
        }

        let ch = match self.peek_byte() {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        match ch {
            b'/' => self.read_name(),
            b'(' => self.read_literal_string(),
            b'<' => {
                if self.data.get(self.position + 1) == Some(&b'<') {
                    self.position += 2;
                    Ok(Token::DictStart)
                } else {
                    self.read_hex_string()
                }
            }
            b'>' => {
                if self.data.get(self.position + 1) == Some(&b'>') {
                    self.position += 2;
                    Ok(Token::DictEnd)
                } else {
                    Err(self.syntax_error("expected '>' after '>'"))
                }
            }
            b'[' => {
                self.position += 1;
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.position += 1;
                Ok(Token::ArrayEnd)
            }
            b'+' | b'-' | b'0'..=b'9' | b'.' => self.read_number(),
            _ if ch.is_ascii_alphabetic() => {
                let word = self.read_word();
                Ok(match word.as_str() {
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    "null" => Token::Null,
                    _ => Token::Keyword(word),
                })
            }
            _ => Err(self.syntax_error(&format!("unexpected character '{}'", ch as char))),
        }
    }

    /// Consume `keyword` or fail
    pub fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        match self.next_token()? {
            Token::Keyword(word) if word == keyword => Ok(()),
            other => Err(PdfError::ParseError(format!(
                "expected '{keyword}' at offset {}, found {other:?}",
                self.position
            ))),
        }
    }

    /// Read stream bytes right after the `stream` keyword.
    ///
    /// Uses `length` when it lands on `endstream`, otherwise scans forward.
    pub fn read_stream_data(&mut self, length: Option<usize>) -> Result<Vec<u8>> {
        self.token_buffer.clear();
        if self.data[self.position..].starts_with(b"\r\n") {
            self.position += 2;
        } else if matches!(self.peek_byte(), Some(b'\n') | Some(b'\r')) {
            self.position += 1;
        }
        let start = self.position;

        if let Some(length) = length {
            let end = start.saturating_add(length);
            if end <= self.data.len() {
                let mut probe = end;
                while probe < self.data.len() && is_whitespace(self.data[probe]) {
                    probe += 1;
                }
                if self.data[probe..].starts_with(b"endstream") {
                    self.position = probe + b"endstream".len();
                    return Ok(self.data[start..end].to_vec());
                }
            }
        }

        let found = find(&self.data[start..], b"endstream")
            .ok_or_else(|| self.syntax_error("stream without endstream"))?;
        let mut end = start + found;
        if end > start && self.data[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && self.data[end - 1] == b'\r' {
            end -= 1;
        }
        self.position = start + found + b"endstream".len();
        Ok(self.data[start..end].to_vec())
    }

    fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_byte() {
            if !is_whitespace(ch) {
                break;
            }
            self.position += 1;
        }
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek_byte() {
            if ch == b'\n' || ch == b'\r' {
                break;
            }
            self.position += 1;
        }
    }

    fn read_word(&mut self) -> String {
        let start = self.position;
        while let Some(ch) = self.peek_byte() {
            if is_whitespace(ch) || is_delimiter(ch) {
                break;
            }
            self.position += 1;
        }
        String::from_utf8_lossy(&self.data[start..self.position]).into_owned()
    }

    fn read_name(&mut self) -> Result<Token> {
        self.position += 1; // '/'
        let mut name = Vec::new();
        while let Some(ch) = self.peek_byte() {
            if is_whitespace(ch) || is_delimiter(ch) {
                break;
            }
            self.position += 1;
            if ch == b'#' {
                let hex_digits = self
                    .data
                    .get(self.position..self.position + 2)
                    .ok_or_else(|| self.syntax_error("truncated name escape"))?;
                let decoded = hex::decode(hex_digits)
                    .map_err(|_| self.syntax_error("invalid name escape"))?;
                name.extend_from_slice(&decoded);
                self.position += 2;
            } else {
                name.push(ch);
            }
        }
        Ok(Token::Name(String::from_utf8_lossy(&name).into_owned()))
    }

    fn read_literal_string(&mut self) -> Result<Token> {
        self.position += 1; // '('
        let mut result = Vec::new();
        let mut depth = 1;

        loop {
            let ch = self
                .peek_byte()
                .ok_or_else(|| self.syntax_error("unterminated string"))?;
            self.position += 1;
            match ch {
                b'(' => {
                    depth += 1;
                    result.push(ch);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    result.push(ch);
                }
                b'\\' => self.read_escape(&mut result)?,
                _ => result.push(ch),
            }
        }

        Ok(Token::String(result))
    }

    fn read_escape(&mut self, result: &mut Vec<u8>) -> Result<()> {
        let ch = self
            .peek_byte()
            .ok_or_else(|| self.syntax_error("unterminated escape"))?;
        self.position += 1;
        match ch {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(0x08),
            b'f' => result.push(0x0C),
            b'\r' => {
                // line continuation
                if self.peek_byte() == Some(b'\n') {
                    self.position += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut value = (ch - b'0') as u32;
                for _ in 0..2 {
                    match self.peek_byte() {
                        Some(digit @ b'0'..=b'7') => {
                            value = value * 8 + (digit - b'0') as u32;
                            self.position += 1;
                        }
                        _ => break,
                    }
                }
                result.push((value & 0xFF) as u8);
            }
            other => result.push(other),
        }
        Ok(())
    }

    fn read_hex_string(&mut self) -> Result<Token> {
        self.position += 1; // '<'
        let mut digits = Vec::new();
        loop {
            let ch = self
                .peek_byte()
                .ok_or_else(|| self.syntax_error("unterminated hex string"))?;
            self.position += 1;
            match ch {
                b'>' => break,
                _ if is_whitespace(ch) => {}
                _ if ch.is_ascii_hexdigit() => digits.push(ch),
                _ => return Err(self.syntax_error("invalid hex digit")),
            }
        }
        if digits.len() % 2 == 1 {
            digits.push(b'0');
        }
        let decoded = hex::decode(&digits).map_err(|e| PdfError::ParseError(e.to_string()))?;
        Ok(Token::HexString(decoded))
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.position;
        if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
            self.position += 1;
        }
        let mut has_dot = false;
        while let Some(ch) = self.peek_byte() {
            match ch {
                b'0'..=b'9' => self.position += 1,
                b'.' if !has_dot => {
                    has_dot = true;
                    self.position += 1;
                }
                _ => break,
            }
        }

        let text = std::str::from_utf8(&self.data[start..self.position])
            .map_err(|_| self.syntax_error("invalid number"))?;
        if has_dot {
            let normalized = if text.ends_with('.') {
                format!("{text}0")
            } else {
                text.to_string()
            };
            normalized
                .parse::<f64>()
                .map(Token::Real)
                .map_err(|_| self.syntax_error(&format!("invalid real '{text}'")))
        } else {
            text.parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| self.syntax_error(&format!("invalid integer '{text}'")))
        }
    }

    fn syntax_error(&self, message: &str) -> PdfError {
        PdfError::ParseError(format!("{message} at offset {}", self.position))
    }
}

/// First occurrence of `needle` in `haystack`
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Last occurrence of `needle` in `haystack`
pub(crate) fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    #[test]
    fn test_lexer_basic_tokens() {
        assert_eq!(
            tokens(b"true false null 123 -456 2.25 .5 /Name"),
            vec![
                Token::Boolean(true),
                Token::Boolean(false),
                Token::Null,
                Token::Integer(123),
                Token::Integer(-456),
                Token::Real(2.25),
                Token::Real(0.5),
                Token::Name("Name".to_string()),
            ]
        );
    }

    #[test]
    fn test_lexer_dictionaries_and_arrays() {
        assert_eq!(
            tokens(b"<< /Kids [1 0 R] >>"),
            vec![
                Token::DictStart,
                Token::Name("Kids".to_string()),
                Token::ArrayStart,
                Token::Integer(1),
                Token::Integer(0),
                Token::Keyword("R".to_string()),
                Token::ArrayEnd,
                Token::DictEnd,
            ]
        );
    }

    #[test]
    fn test_lexer_string_literal_escapes() {
        assert_eq!(
            tokens(b"(a\\(b\\)c\\n\\101 (nested))"),
            vec![Token::String(b"a(b)c\nA (nested)".to_vec())]
        );
    }

    #[test]
    fn test_lexer_hexadecimal_strings() {
        assert_eq!(
            tokens(b"<FEFF 0041> <ABC>"),
            vec![
                Token::HexString(vec![0xFE, 0xFF, 0x00, 0x41]),
                Token::HexString(vec![0xAB, 0xC0]),
            ]
        );
    }

    #[test]
    fn test_lexer_names_with_escapes() {
        assert_eq!(
            tokens(b"/A#20B/C"),
            vec![Token::Name("A B".to_string()), Token::Name("C".to_string())]
        );
    }

    #[test]
    fn test_lexer_comments_are_skipped() {
        assert_eq!(
            tokens(b"%PDF-1.7\n% binary\n1 0 obj"),
            vec![
                Token::Integer(1),
                Token::Integer(0),
                Token::Keyword("obj".to_string()),
            ]
        );
    }

    #[test]
    fn test_push_back_is_lifo() {
        let mut lexer = Lexer::new(b"7");
        lexer.push_token(Token::Integer(2));
        lexer.push_token(Token::Integer(1));
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(1));
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(2));
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(7));
    }

    #[test]
    fn test_stream_data_with_length() {
        let input = b"stream\r\nabc endstream";
        let mut lexer = Lexer::new(input);
        lexer.expect_keyword("stream").unwrap();
        assert_eq!(lexer.read_stream_data(Some(3)).unwrap(), b"abc");
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_stream_data_with_wrong_length_scans() {
        let input = b"stream\nhello\nendstream\nendobj";
        let mut lexer = Lexer::new(input);
        lexer.expect_keyword("stream").unwrap();
        assert_eq!(lexer.read_stream_data(Some(99)).unwrap(), b"hello");
        assert_eq!(
            lexer.next_token().unwrap(),
            Token::Keyword("endobj".to_string())
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(Lexer::new(b"(unterminated").next_token().is_err());
        assert!(Lexer::new(b"<XY>").next_token().is_err());
        assert!(Lexer::new(b">").next_token().is_err());
    }

    #[test]
    fn test_find_helpers() {
        assert_eq!(find(b"abcabc", b"bc"), Some(1));
        assert_eq!(rfind(b"abcabc", b"bc"), Some(4));
        assert_eq!(find(b"abc", b"x"), None);
    }
}
