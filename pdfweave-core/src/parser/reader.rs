//! In-memory reader for complete PDF files

use super::lexer::{find, rfind, Token};
use super::object_stream::ObjectStream;
use super::objects::ObjectParser;
use super::xref::{decode_stream, index_compressed_objects, CompressedObjects};
use super::SourceDocument;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::version::PdfVersion;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Reader over the full bytes of an existing document.
///
/// Plain objects are located by scanning for `N G obj` headers, so later
/// revisions of an object win. Objects the cross-reference sections place
/// in object streams are read from there.
pub struct PdfReader {
    data: Vec<u8>,
    header_version: PdfVersion,
    xref_position: u64,
    trailer: Dictionary,
    offsets: HashMap<u32, usize>,
    compressed: CompressedObjects,
}

impl PdfReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let header_version = parse_header(&data)?;
        let offsets = scan_objects(&data);
        let xref_position = find_startxref(&data)?;

        let mut reader = Self {
            data,
            header_version,
            xref_position,
            trailer: Dictionary::new(),
            offsets,
            compressed: CompressedObjects::new(),
        };
        reader.trailer = reader.read_trailer()?;
        reader.compressed = index_compressed_objects(&reader.data, xref_position)
            .unwrap_or_else(|error| {
                warn!(%error, "cannot read cross-reference entries, using object headers only");
                CompressedObjects::new()
            });
        debug!(
            objects = reader.object_count(),
            compressed = reader.compressed.len(),
            xref = reader.xref_position,
            "parsed source document"
        );
        Ok(reader)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn header_version(&self) -> PdfVersion {
        self.header_version
    }

    pub fn object_count(&self) -> usize {
        self.offsets.len()
            + self
                .compressed
                .keys()
                .filter(|number| !self.offsets.contains_key(number))
                .count()
    }

    /// Dereference `object` if it is a reference, otherwise clone it.
    pub fn resolve(&self, object: &Object) -> Result<Object> {
        match object {
            Object::Reference(id) => self.parse_object(id.number()),
            other => Ok(other.clone()),
        }
    }

    /// Catalog dictionary named by the trailer `Root`
    pub fn catalog(&self) -> Result<Dictionary> {
        let root = self
            .trailer
            .get_reference("Root")
            .ok_or_else(|| PdfError::ConsistencyFault("trailer has no Root".to_string()))?;
        self.parse_object(root.number())?
            .as_dict()
            .cloned()
            .ok_or_else(|| PdfError::InvalidStructure(format!("catalog {root} is not a dictionary")))
    }

    /// `Count` of the root page tree node, 0 when the document has no page tree
    pub fn page_count(&self) -> Result<u64> {
        let catalog = self.catalog()?;
        let Some(pages) = catalog.get("Pages") else {
            return Ok(0);
        };
        let pages = self.resolve(pages)?;
        Ok(pages
            .as_dict()
            .and_then(|dict| dict.get_integer("Count"))
            .map(|count| count.max(0) as u64)
            .unwrap_or(0))
    }

    /// Decoded data of stream object `number`.
    ///
    /// Only unfiltered and `FlateDecode` streams are supported.
    pub fn stream_data(&self, number: u32) -> Result<Vec<u8>> {
        match self.parse_object(number)? {
            Object::Stream(dict, data) => decode_stream(&dict, &data),
            other => Err(PdfError::InvalidStructure(format!(
                "object {number} is not a stream: {other:?}"
            ))),
        }
    }

    fn parse_plain_object(&self, number: u32) -> Result<Object> {
        let offset = *self
            .offsets
            .get(&number)
            .ok_or(PdfError::InvalidObjectReference(number, 0))?;
        let mut parser = ObjectParser::at(&self.data, offset);
        let (id, object) = parser.parse_indirect_object()?;
        if id.number() != number {
            return Err(PdfError::InvalidObjectReference(number, id.generation()));
        }
        Ok(object)
    }

    fn read_trailer(&self) -> Result<Dictionary> {
        let offset = self.xref_position as usize;
        if offset >= self.data.len() {
            return Err(PdfError::ParseError(format!(
                "startxref offset {offset} is beyond end of file"
            )));
        }

        if self.data[offset..].starts_with(b"xref") {
            let keyword = find(&self.data[offset..], b"trailer").ok_or_else(|| {
                PdfError::ParseError("cross-reference table without trailer".to_string())
            })?;
            let mut parser = ObjectParser::at(&self.data, offset + keyword);
            parser.lexer_mut().expect_keyword("trailer")?;
            return match parser.parse_object()? {
                Object::Dictionary(dict) => Ok(dict),
                other => Err(PdfError::ParseError(format!(
                    "trailer is not a dictionary: {other:?}"
                ))),
            };
        }

        let mut parser = ObjectParser::at(&self.data, offset);
        match parser.parse_indirect_object()? {
            (_, Object::Stream(dict, _)) if dict.get_name("Type") == Some("XRef") => Ok(dict),
            (id, _) => Err(PdfError::ParseError(format!(
                "object {id} at startxref is not a cross-reference stream"
            ))),
        }
    }
}

impl SourceDocument for PdfReader {
    fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    fn parse_object(&self, number: u32) -> Result<Object> {
        if let Some(&(stream, index)) = self.compressed.get(&number) {
            return match self.parse_plain_object(stream)? {
                Object::Stream(dict, raw) => ObjectStream::parse(&dict, &raw)?.get(index, number),
                other => Err(PdfError::InvalidStructure(format!(
                    "object {stream} holding object {number} is not a stream: {other:?}"
                ))),
            };
        }
        self.parse_plain_object(number)
    }

    fn generation_of(&self, number: u32) -> Option<u16> {
        if self.compressed.contains_key(&number) {
            return Some(0);
        }
        let offset = *self.offsets.get(&number)?;
        let mut parser = ObjectParser::at(&self.data, offset);
        let lexer = parser.lexer_mut();
        lexer.next_token().ok()?;
        match lexer.next_token().ok()? {
            Token::Integer(generation) => u16::try_from(generation).ok(),
            _ => None,
        }
    }

    /// Header version, raised by a higher catalog `Version` entry.
    fn version(&self) -> PdfVersion {
        let catalog_version = self
            .catalog()
            .ok()
            .and_then(|catalog| catalog.get_name("Version").map(str::to_string))
            .and_then(|name| name.parse::<PdfVersion>().ok());
        match catalog_version {
            Some(version) if version > self.header_version => version,
            _ => self.header_version,
        }
    }

    fn xref_position(&self) -> u64 {
        self.xref_position
    }
}

fn parse_header(data: &[u8]) -> Result<PdfVersion> {
    let window = &data[..data.len().min(1024)];
    let start = find(window, b"%PDF-")
        .ok_or_else(|| PdfError::ParseError("missing %PDF- header".to_string()))?;
    let version: String = window[start + 5..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|b| *b as char)
        .collect();
    version.parse()
}

fn find_startxref(data: &[u8]) -> Result<u64> {
    let keyword = rfind(data, b"startxref")
        .ok_or_else(|| PdfError::ParseError("missing startxref".to_string()))?;
    let mut parser = ObjectParser::at(data, keyword + b"startxref".len());
    match parser.lexer_mut().next_token()? {
        Token::Integer(offset) if offset >= 0 => Ok(offset as u64),
        other => Err(PdfError::ParseError(format!(
            "startxref is not followed by an offset: {other:?}"
        ))),
    }
}

/// Index every `N G obj` header, keyed by object number.
fn scan_objects(data: &[u8]) -> HashMap<u32, usize> {
    let mut offsets = HashMap::new();
    let mut pos = 0;
    while let Some(found) = find(&data[pos..], b"obj") {
        let at = pos + found;
        pos = at + 3;
        if let Some((number, start)) = parse_object_header(data, at) {
            offsets.insert(number, start);
        }
    }
    offsets
}

/// Walk backwards from the `obj` keyword at `at` over `N G `.
fn parse_object_header(data: &[u8], at: usize) -> Option<(u32, usize)> {
    if let Some(next) = data.get(at + 3) {
        if !(next.is_ascii_whitespace() || matches!(next, b'<' | b'[' | b'(' | b'/')) {
            return None;
        }
    }

    let mut cursor = at;
    let skip_spaces = |cursor: &mut usize| -> bool {
        let before = *cursor;
        while *cursor > 0 && matches!(data[*cursor - 1], b' ' | b'\t' | b'\r' | b'\n') {
            *cursor -= 1;
        }
        *cursor < before
    };
    let digits = |cursor: &mut usize| -> Option<(usize, usize)> {
        let end = *cursor;
        while *cursor > 0 && data[*cursor - 1].is_ascii_digit() {
            *cursor -= 1;
        }
        (*cursor < end).then_some((*cursor, end))
    };

    if !skip_spaces(&mut cursor) {
        return None;
    }
    digits(&mut cursor)?;
    if !skip_spaces(&mut cursor) {
        return None;
    }
    let (start, end) = digits(&mut cursor)?;
    if start > 0 && !data[start - 1].is_ascii_whitespace() {
        return None;
    }

    let number = std::str::from_utf8(&data[start..end]).ok()?.parse().ok()?;
    Some((number, start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let catalog = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let pages = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(
            format!(
                "xref\n0 3\n0000000000 65535 f \n{catalog:010} 00000 n \n{pages:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n"
            )
            .as_bytes(),
        );
        pdf
    }

    /// Objects 1..=n inside object stream n+1, indexed by xref stream n+2.
    fn object_stream_sample(objects: &[&str]) -> Vec<u8> {
        let stream_number = objects.len() as u32 + 1;
        let mut header = String::new();
        let mut body = String::new();
        for (index, object) in objects.iter().enumerate() {
            header.push_str(&format!("{} {} ", index + 1, body.len()));
            body.push_str(object);
            body.push(' ');
        }

        let mut pdf = b"%PDF-1.5\n".to_vec();
        let object_stream = pdf.len();
        pdf.extend_from_slice(
            format!(
                "{stream_number} 0 obj\n<< /Type /ObjStm /N {} /First {} /Length {} >>\nstream\n{header}{body}\nendstream\nendobj\n",
                objects.len(),
                header.len(),
                header.len() + body.len()
            )
            .as_bytes(),
        );

        let xref = pdf.len();
        let mut rows = vec![0u8, 0, 0, 255];
        for index in 0..objects.len() {
            rows.extend_from_slice(&[2, 0, stream_number as u8, index as u8]);
        }
        rows.extend_from_slice(&[1, (object_stream >> 8) as u8, object_stream as u8, 0]);
        rows.extend_from_slice(&[1, (xref >> 8) as u8, xref as u8, 0]);
        pdf.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Type /XRef /Size {} /W [1 2 1] /Root 1 0 R /Length {} >>\nstream\n",
                stream_number + 1,
                stream_number + 2,
                rows.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(&rows);
        pdf.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{xref}\n%%EOF\n").as_bytes());
        pdf
    }

    #[test]
    fn test_reads_classic_trailer() {
        let reader = PdfReader::from_bytes(sample()).unwrap();
        assert_eq!(reader.header_version(), PdfVersion::V1_4);
        assert_eq!(reader.trailer().get_integer("Size"), Some(3));
        assert_eq!(
            reader.trailer().get_reference("Root"),
            Some(ObjectId::new(1, 0))
        );
        assert_eq!(reader.object_count(), 2);
        assert_eq!(reader.page_count().unwrap(), 0);
        assert!(!reader.is_encrypted());
    }

    #[test]
    fn test_parse_object_by_number() {
        let reader = PdfReader::from_bytes(sample()).unwrap();
        let pages = reader.parse_object(2).unwrap();
        assert_eq!(pages.as_dict().unwrap().get_name("Type"), Some("Pages"));
        assert_eq!(reader.generation_of(2), Some(0));
        assert!(matches!(
            reader.parse_object(9),
            Err(PdfError::InvalidObjectReference(9, 0))
        ));
    }

    #[test]
    fn test_catalog_version_overrides_header() {
        let data = sample();
        let text = String::from_utf8(data).unwrap();
        let patched = text.replace("/Type /Catalog", "/Type /Catalog /Version /1.6");
        // offsets after the catalog shift; the scanner does not depend on them
        let xref = patched.find("xref\n").unwrap();
        let patched = patched.replace(
            &format!("startxref\n{}", text.find("xref\n").unwrap()),
            &format!("startxref\n{xref}"),
        );
        let reader = PdfReader::from_bytes(patched.into_bytes()).unwrap();
        assert_eq!(reader.header_version(), PdfVersion::V1_4);
        assert_eq!(reader.version(), PdfVersion::V1_6);
    }

    #[test]
    fn test_later_revision_wins() {
        let mut data = sample();
        let updated = data.len();
        data.extend_from_slice(
            b"2 0 obj\n<< /Type /Pages /Kids [] /Count 5 >>\nendobj\n",
        );
        let xref = data.len();
        data.extend_from_slice(
            format!(
                "xref\n0 1\n0000000000 65535 f \n2 1\n{updated:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R /Prev 9 >>\nstartxref\n{xref}\n%%EOF"
            )
            .as_bytes(),
        );
        let reader = PdfReader::from_bytes(data).unwrap();
        assert_eq!(reader.page_count().unwrap(), 5);
        assert_eq!(reader.trailer().get_integer("Prev"), Some(9));
        assert_eq!(reader.xref_position(), xref as u64);
    }

    #[test]
    fn test_reads_pdf_2_0_header() {
        let data = String::from_utf8(sample())
            .unwrap()
            .replacen("%PDF-1.4", "%PDF-2.0", 1);
        let reader = PdfReader::from_bytes(data.into_bytes()).unwrap();
        assert_eq!(reader.header_version(), PdfVersion::V2_0);
        assert_eq!(reader.version(), PdfVersion::V2_0);
        assert_eq!(reader.page_count().unwrap(), 0);
    }

    #[test]
    fn test_catalog_version_2_0_raises_version() {
        let data = object_stream_sample(&[
            "<< /Type /Catalog /Version /2.0 /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [] /Count 0 >>",
        ]);
        let reader = PdfReader::from_bytes(data).unwrap();
        assert_eq!(reader.header_version(), PdfVersion::V1_5);
        assert_eq!(reader.version(), PdfVersion::V2_0);
    }

    #[test]
    fn test_reads_objects_from_object_stream() {
        let data = object_stream_sample(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        ]);
        let reader = PdfReader::from_bytes(data).unwrap();

        assert!(reader.uses_xref_stream());
        assert_eq!(reader.object_count(), 4);
        assert_eq!(reader.catalog().unwrap().get_name("Type"), Some("Catalog"));
        assert_eq!(reader.page_count().unwrap(), 1);
        assert_eq!(reader.generation_of(2), Some(0));
        assert!(matches!(
            reader.parse_object(7),
            Err(PdfError::InvalidObjectReference(7, 0))
        ));
    }

    #[test]
    fn test_later_plain_revision_replaces_compressed_object() {
        let mut data = object_stream_sample(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [] /Count 0 >>",
        ]);
        let previous = find_startxref(&data).unwrap();
        let updated = data.len();
        data.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 8 >>\nendobj\n");
        let xref = data.len();
        data.extend_from_slice(
            format!(
                "xref\n2 1\n{updated:010} 00000 n \ntrailer\n<< /Size 5 /Root 1 0 R /Prev {previous} >>\nstartxref\n{xref}\n%%EOF\n"
            )
            .as_bytes(),
        );

        let reader = PdfReader::from_bytes(data).unwrap();
        assert!(!reader.uses_xref_stream());
        assert_eq!(reader.page_count().unwrap(), 8);
        assert_eq!(
            reader.catalog().unwrap().get_reference("Pages"),
            Some(ObjectId::new(2, 0))
        );
    }

    #[test]
    fn test_missing_header_is_rejected() {
        assert!(PdfReader::from_bytes(b"not a pdf".to_vec()).is_err());
    }

    #[test]
    fn test_missing_startxref_is_rejected() {
        assert!(PdfReader::from_bytes(b"%PDF-1.7\n1 0 obj\nnull\nendobj\n".to_vec()).is_err());
    }

    #[test]
    fn test_endobj_is_not_indexed() {
        let data = b"%PDF-1.7\n10 0 obj\n(endobj obj)\nendobj\n".to_vec();
        let offsets = scan_objects(&data);
        assert_eq!(offsets.len(), 1);
        assert_eq!(offsets.get(&10), Some(&9));
    }
}
