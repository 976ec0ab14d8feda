//! Cross-reference section reading
//!
//! Tables and streams are walked from the latest section back through
//! `Prev`, so the first entry seen for an object number is the current one.
//! Only the location of compressed objects is kept; everything else is found
//! by scanning object headers.

use super::lexer::Token;
use super::objects::ObjectParser;
use crate::compression;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One row of a cross-reference section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossReference {
    Free,
    InUse { offset: u64, generation: u16 },
    /// Object `index` of object stream `stream`
    Compressed { stream: u32, index: u32 },
}

/// Where compressed objects live, keyed by object number.
pub type CompressedObjects = HashMap<u32, (u32, u32)>;

/// Walk every cross-reference section reachable from `start`.
///
/// A damaged older section ends the walk with a warning; objects it
/// describes stay reachable through the header scan when they are not
/// compressed.
pub fn index_compressed_objects(data: &[u8], start: u64) -> Result<CompressedObjects> {
    let mut compressed = CompressedObjects::new();
    let mut seen = HashSet::new();
    let mut visited = HashSet::new();
    let mut next = Some(start);
    let mut latest = true;

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            warn!(offset, "cross-reference sections form a loop");
            break;
        }
        let section = read_section(data, offset).and_then(|(entries, trailer)| {
            // hybrid files list their compressed objects in a side stream
            let mut entries = entries;
            if let Some(side) = trailer.get_integer("XRefStm") {
                entries.extend(read_section(data, side as u64)?.0);
            }
            Ok((entries, trailer))
        });
        let (entries, trailer) = match section {
            Ok(section) => section,
            Err(error) if !latest => {
                warn!(offset, %error, "ignoring unreadable cross-reference section");
                break;
            }
            Err(error) => return Err(error),
        };

        for (number, entry) in entries {
            if !seen.insert(number) {
                continue;
            }
            if let CrossReference::Compressed { stream, index } = entry {
                compressed.insert(number, (stream, index));
            }
        }
        next = trailer
            .get_integer("Prev")
            .and_then(|prev| u64::try_from(prev).ok());
        latest = false;
    }

    debug!(compressed = compressed.len(), "indexed cross-reference sections");
    Ok(compressed)
}

/// Entries and trailer of the table or stream at `offset`.
///
/// Free rows in a table are left out, a hybrid file marks its compressed
/// objects free there.
pub fn read_section(data: &[u8], offset: u64) -> Result<(Vec<(u32, CrossReference)>, Dictionary)> {
    let at = usize::try_from(offset)
        .ok()
        .filter(|at| *at < data.len())
        .ok_or_else(|| {
            PdfError::ParseError(format!("cross-reference offset {offset} is beyond end of file"))
        })?;

    if data[at..].starts_with(b"xref") {
        return read_table(data, at);
    }

    let mut parser = ObjectParser::at(data, at);
    match parser.parse_indirect_object()? {
        (_, Object::Stream(dict, raw)) if dict.get_name("Type") == Some("XRef") => {
            let entries = read_stream_entries(&dict, &decode_stream(&dict, &raw)?)?;
            Ok((entries, dict))
        }
        (id, _) => Err(PdfError::ParseError(format!(
            "object {id} at {offset} is not a cross-reference stream"
        ))),
    }
}

fn read_table(data: &[u8], at: usize) -> Result<(Vec<(u32, CrossReference)>, Dictionary)> {
    let mut parser = ObjectParser::at(data, at);
    let lexer = parser.lexer_mut();
    lexer.expect_keyword("xref")?;

    let mut entries = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::Integer(first) => {
                let count = table_integer(lexer.next_token()?)?;
                let first = u32::try_from(first)
                    .map_err(|_| PdfError::ParseError(format!("bad subsection start {first}")))?;
                for number in first..first.saturating_add(count as u32) {
                    let offset = table_integer(lexer.next_token()?)?;
                    let generation = table_integer(lexer.next_token()?)?;
                    match lexer.next_token()? {
                        Token::Keyword(kind) if kind == "n" => entries.push((
                            number,
                            CrossReference::InUse {
                                offset: offset as u64,
                                generation: generation as u16,
                            },
                        )),
                        Token::Keyword(kind) if kind == "f" => {}
                        other => {
                            return Err(PdfError::ParseError(format!(
                                "bad cross-reference entry type {other:?}"
                            )))
                        }
                    }
                }
            }
            Token::Keyword(word) if word == "trailer" => break,
            other => {
                return Err(PdfError::ParseError(format!(
                    "unexpected {other:?} in cross-reference table"
                )))
            }
        }
    }

    match parser.parse_object()? {
        Object::Dictionary(trailer) => Ok((entries, trailer)),
        other => Err(PdfError::ParseError(format!(
            "trailer is not a dictionary: {other:?}"
        ))),
    }
}

fn table_integer(token: Token) -> Result<i64> {
    match token {
        Token::Integer(value) if value >= 0 => Ok(value),
        other => Err(PdfError::ParseError(format!(
            "expected a cross-reference number, found {other:?}"
        ))),
    }
}

/// Rows of a decoded cross-reference stream, following `W` and `Index`.
pub fn read_stream_entries(dict: &Dictionary, rows: &[u8]) -> Result<Vec<(u32, CrossReference)>> {
    let widths: Vec<usize> = dict
        .get_array("W")
        .map(|w| {
            w.iter()
                .filter_map(Object::as_integer)
                .filter_map(|w| usize::try_from(w).ok())
                .collect()
        })
        .unwrap_or_default();
    let [type_width, field2_width, field3_width] = widths[..] else {
        return Err(PdfError::ParseError(
            "cross-reference stream needs three field widths".to_string(),
        ));
    };
    if type_width > 8 || field2_width > 8 || field3_width > 8 {
        return Err(PdfError::ParseError(format!("field widths {widths:?} are too wide")));
    }
    let row_width = type_width + field2_width + field3_width;
    if row_width == 0 {
        return Err(PdfError::ParseError("empty cross-reference rows".to_string()));
    }

    let subsections: Vec<(u32, u32)> = match dict.get_array("Index") {
        Some(index) => index
            .chunks(2)
            .filter_map(|pair| match pair {
                [start, count] => Some((
                    u32::try_from(start.as_integer()?).ok()?,
                    u32::try_from(count.as_integer()?).ok()?,
                )),
                _ => None,
            })
            .collect(),
        None => {
            let size = dict.get_integer("Size").unwrap_or(0);
            vec![(0, u32::try_from(size).unwrap_or(0))]
        }
    };

    let mut entries = Vec::new();
    let mut rows = rows.chunks_exact(row_width);
    for (start, count) in subsections {
        for number in start..start.saturating_add(count) {
            let Some(row) = rows.next() else {
                return Err(PdfError::ParseError(format!(
                    "cross-reference stream ends before object {number}"
                )));
            };
            let (kind, rest) = row.split_at(type_width);
            let (field2, field3) = rest.split_at(field2_width);
            // a zero-width type field means every row is in use
            let kind = if type_width == 0 { 1 } else { read_field(kind) };
            let entry = match kind {
                0 => CrossReference::Free,
                1 => CrossReference::InUse {
                    offset: read_field(field2),
                    generation: read_field(field3) as u16,
                },
                2 => CrossReference::Compressed {
                    stream: read_field(field2) as u32,
                    index: read_field(field3) as u32,
                },
                // unknown types are treated as null references
                _ => CrossReference::Free,
            };
            entries.push((number, entry));
        }
    }
    Ok(entries)
}

/// Big-endian unsigned field
fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |value, byte| (value << 8) | u64::from(*byte))
}

/// Apply the stream's `Filter` and `DecodeParms`.
///
/// Only unfiltered and `FlateDecode` streams are supported, with optional
/// PNG predictors.
pub fn decode_stream(dict: &Dictionary, raw: &[u8]) -> Result<Vec<u8>> {
    let filter = match dict.get("Filter") {
        Some(Object::Array(filters)) if filters.len() == 1 => filters[0].as_name(),
        Some(Object::Array(filters)) if filters.is_empty() => None,
        Some(Object::Name(name)) => Some(name.as_str()),
        None => None,
        Some(other) => {
            return Err(PdfError::InvalidStructure(format!(
                "unsupported stream filter {other:?}"
            )))
        }
    };

    match filter {
        None => Ok(raw.to_vec()),
        Some("FlateDecode") => {
            let inflated = compression::decompress(raw)?;
            let params = match dict.get("DecodeParms") {
                Some(Object::Array(params)) => params.first().and_then(Object::as_dict),
                Some(params) => params.as_dict(),
                None => None,
            };
            match params {
                Some(params) => undo_predictor(&inflated, params),
                None => Ok(inflated),
            }
        }
        Some(other) => Err(PdfError::InvalidStructure(format!(
            "unsupported stream filter {other}"
        ))),
    }
}

/// Reverse a PNG predictor (10 to 15). Predictor 1 leaves the data alone.
fn undo_predictor(data: &[u8], params: &Dictionary) -> Result<Vec<u8>> {
    let predictor = params.get_integer("Predictor").unwrap_or(1);
    if predictor == 1 {
        return Ok(data.to_vec());
    }
    if !(10..=15).contains(&predictor) {
        return Err(PdfError::InvalidStructure(format!(
            "unsupported predictor {predictor}"
        )));
    }

    let param = |key: &str, default: i64| {
        usize::try_from(params.get_integer(key).unwrap_or(default).max(1)).unwrap_or(1)
    };
    let colors = param("Colors", 1);
    let bits = param("BitsPerComponent", 8);
    let columns = param("Columns", 1);
    let pixel_bytes = (colors * bits).div_ceil(8);
    let row_bytes = (columns * colors * bits).div_ceil(8);

    let mut output = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_bytes];
    for chunk in data.chunks(row_bytes + 1) {
        let (tag, encoded) = chunk.split_first().ok_or_else(|| {
            PdfError::InvalidStructure("empty predictor row".to_string())
        })?;
        let mut row = encoded.to_vec();
        row.resize(row_bytes, 0);
        for i in 0..row_bytes {
            let left = if i >= pixel_bytes { row[i - pixel_bytes] } else { 0 };
            let up = previous[i];
            let up_left = if i >= pixel_bytes { previous[i - pixel_bytes] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(PdfError::InvalidStructure(format!(
                        "invalid PNG predictor tag {other}"
                    )))
                }
            };
            row[i] = row[i].wrapping_add(predicted);
        }
        output.extend_from_slice(&row[..encoded.len().min(row_bytes)]);
        previous = row;
    }
    Ok(output)
}

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let estimate = i16::from(left) + i16::from(up) - i16::from(up_left);
    let to_left = (estimate - i16::from(left)).abs();
    let to_up = (estimate - i16::from(up)).abs();
    let to_up_left = (estimate - i16::from(up_left)).abs();
    if to_left <= to_up && to_left <= to_up_left {
        left
    } else if to_up <= to_up_left {
        up
    } else {
        up_left
    }
}
