//! Trailer information, the document information dictionary and document
//! identifiers.

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeZone};
use indexmap::IndexMap;

/// Value of the info dictionary `Trapped` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trapped {
    #[default]
    Unknown,
    True,
    False,
}

impl Trapped {
    pub fn as_str(self) -> &'static str {
        match self {
            Trapped::Unknown => "Unknown",
            Trapped::True => "True",
            Trapped::False => "False",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "True" => Trapped::True,
            "False" => Trapped::False,
            _ => Trapped::Unknown,
        }
    }
}

/// Document information dictionary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoDictionary {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<DateTime<FixedOffset>>,
    pub mod_date: Option<DateTime<FixedOffset>>,
    pub trapped: Trapped,
    additional: IndexMap<String, String>,
}

impl InfoDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn add_additional_info_entry(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.additional.insert(key.into(), value.into());
    }

    pub fn remove_additional_info_entry(&mut self, key: &str) -> Option<String> {
        self.additional.shift_remove(key)
    }

    pub fn additional_info_entry(&self, key: &str) -> Option<&str> {
        self.additional.get(key).map(String::as_str)
    }

    pub fn additional_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.additional
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn clear_additional_info_entries(&mut self) {
        self.additional.clear();
    }

    /// The six text fields with their dictionary keys
    pub fn text_fields(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("Title", self.title.as_deref()),
            ("Author", self.author.as_deref()),
            ("Subject", self.subject.as_deref()),
            ("Keywords", self.keywords.as_deref()),
            ("Creator", self.creator.as_deref()),
            ("Producer", self.producer.as_deref()),
        ]
    }

    /// No field would be written
    pub fn is_empty(&self) -> bool {
        self.text_fields().iter().all(|(_, value)| value.is_none())
            && self.creation_date.is_none()
            && self.mod_date.is_none()
            && self.trapped == Trapped::Unknown
            && self.additional.is_empty()
    }

    pub fn to_dict(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        for (key, value) in self.text_fields() {
            if let Some(value) = value {
                dict.set(key, Object::text(value));
            }
        }
        if let Some(date) = &self.creation_date {
            dict.set("CreationDate", Object::text(&format_pdf_date(date)));
        }
        if let Some(date) = &self.mod_date {
            dict.set("ModDate", Object::text(&format_pdf_date(date)));
        }
        if self.trapped != Trapped::Unknown {
            dict.set("Trapped", Object::name(self.trapped.as_str()));
        }
        for (key, value) in &self.additional {
            dict.set(key.clone(), Object::text(value));
        }
        dict
    }

    /// Text fields, dates and trapping read back from an existing dictionary.
    ///
    /// Values of other types are ignored.
    pub fn from_dict(dict: &Dictionary) -> Self {
        let mut info = InfoDictionary::new();
        for (key, value) in dict.iter() {
            match key.as_str() {
                "Title" => info.title = value.as_text(),
                "Author" => info.author = value.as_text(),
                "Subject" => info.subject = value.as_text(),
                "Keywords" => info.keywords = value.as_text(),
                "Creator" => info.creator = value.as_text(),
                "Producer" => info.producer = value.as_text(),
                "CreationDate" => {
                    info.creation_date = value.as_text().and_then(|s| parse_pdf_date(&s))
                }
                "ModDate" => info.mod_date = value.as_text().and_then(|s| parse_pdf_date(&s)),
                "Trapped" => {
                    info.trapped = value.as_name().map(Trapped::from_name).unwrap_or_default()
                }
                _ => {
                    if let Some(text) = value.as_text() {
                        info.additional.insert(key.clone(), text);
                    }
                }
            }
        }
        info
    }
}

/// Everything the trailer of the document being written refers to.
#[derive(Debug, Clone, Default)]
pub struct TrailerInformation {
    prev: Option<u64>,
    root: Option<ObjectId>,
    encrypt: Option<ObjectId>,
    info_reference: Option<ObjectId>,
    info: InfoDictionary,
}

impl TrailerInformation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prev(&self) -> Option<u64> {
        self.prev
    }

    pub fn set_prev(&mut self, prev: u64) {
        self.prev = Some(prev);
    }

    pub fn root(&self) -> Option<ObjectId> {
        self.root
    }

    pub fn set_root(&mut self, root: ObjectId) {
        self.root = Some(root);
    }

    pub fn encrypt(&self) -> Option<ObjectId> {
        self.encrypt
    }

    pub fn set_encrypt(&mut self, encrypt: ObjectId) {
        self.encrypt = Some(encrypt);
    }

    pub fn info_reference(&self) -> Option<ObjectId> {
        self.info_reference
    }

    pub fn set_info_reference(&mut self, info: ObjectId) {
        self.info_reference = Some(info);
    }

    pub fn info(&self) -> &InfoDictionary {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut InfoDictionary {
        &mut self.info
    }

    pub(crate) fn restore(
        &mut self,
        prev: Option<u64>,
        root: Option<ObjectId>,
        encrypt: Option<ObjectId>,
        info_reference: Option<ObjectId>,
        info: InfoDictionary,
    ) {
        self.prev = prev;
        self.root = root;
        self.encrypt = encrypt;
        self.info_reference = info_reference;
        self.info = info;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The two entries of the trailer `ID` array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentId {
    pub original: Vec<u8>,
    pub current: Vec<u8>,
}

impl DocumentId {
    /// A new document uses the same value for both entries
    pub fn fresh(generated: Vec<u8>) -> Self {
        Self {
            original: generated.clone(),
            current: generated,
        }
    }

    pub fn to_array(&self) -> Object {
        Object::Array(vec![
            Object::HexString(self.original.clone()),
            Object::HexString(self.current.clone()),
        ])
    }
}

/// MD5 over the time, the output location, the current write offset and
/// every info field.
pub fn generate_document_id(
    info: &InfoDictionary,
    output_path: &str,
    position: u64,
    now: &DateTime<FixedOffset>,
) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(now.to_rfc3339().as_bytes());
    buffer.extend_from_slice(output_path.as_bytes());
    buffer.extend_from_slice(position.to_string().as_bytes());
    for value in info.text_fields().into_iter().filter_map(|(_, value)| value) {
        buffer.extend_from_slice(value.as_bytes());
    }
    for date in [&info.creation_date, &info.mod_date].into_iter().flatten() {
        buffer.extend_from_slice(format_pdf_date(date).as_bytes());
    }
    buffer.extend_from_slice(info.trapped.as_str().as_bytes());
    for (key, value) in &info.additional {
        buffer.extend_from_slice(key.as_bytes());
        buffer.extend_from_slice(value.as_bytes());
    }
    md5::compute(&buffer).0.to_vec()
}

/// Trailer dictionary for the current session.
///
/// Fails with a consistency fault when no root was set.
pub fn trailer_dictionary(
    trailer: &TrailerInformation,
    size: u32,
    id: &DocumentId,
) -> Result<Dictionary> {
    let root = trailer.root().ok_or_else(|| {
        PdfError::ConsistencyFault("trailer has no Root reference".to_string())
    })?;

    let mut dict = Dictionary::new();
    dict.set("Size", Object::Integer(i64::from(size)));
    if let Some(prev) = trailer.prev() {
        dict.set("Prev", Object::Integer(prev as i64));
    }
    dict.set("Root", root);
    if let Some(encrypt) = trailer.encrypt() {
        dict.set("Encrypt", encrypt);
    }
    if let Some(info) = trailer.info_reference() {
        dict.set("Info", info);
    }
    dict.set("ID", id.to_array());
    Ok(dict)
}

/// Current local time with its offset
pub fn now() -> DateTime<FixedOffset> {
    let now = Local::now();
    now.with_timezone(now.offset())
}

/// `D:YYYYMMDDHHmmSSOHH'mm`
pub fn format_pdf_date(date: &DateTime<FixedOffset>) -> String {
    let formatted = date.format("D:%Y%m%d%H%M%S");
    let offset = date.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.abs() / 60;
    format!("{formatted}{sign}{:02}'{:02}", minutes / 60, minutes % 60)
}

/// Lenient reader for `D:` dates; missing trailing components default to
/// their minimum and a missing offset means UTC.
pub fn parse_pdf_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.strip_prefix("D:").unwrap_or(text);
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    if digits.len() < 4 {
        return None;
    }
    let field = |start: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + len) {
            Some(part) => part.parse().ok(),
            None => Some(default),
        }
    };
    let year = field(0, 4, 0)? as i32;
    let month = field(4, 2, 1)?;
    let day = field(6, 2, 1)?;
    let hour = field(8, 2, 0)?;
    let minute = field(10, 2, 0)?;
    let second = field(12, 2, 0)?;

    let rest = &text[digits.len()..];
    let offset_seconds = match rest.chars().next() {
        Some(sign @ ('+' | '-')) => {
            let numbers: Vec<i32> = rest[1..]
                .split('\'')
                .filter(|part| !part.is_empty())
                .filter_map(|part| part.parse().ok())
                .collect();
            let hours = numbers.first().copied().unwrap_or(0);
            let minutes = numbers.get(1).copied().unwrap_or(0);
            let seconds = hours * 3600 + minutes * 60;
            if sign == '-' {
                -seconds
            } else {
                seconds
            }
        }
        _ => 0,
    };

    let offset = FixedOffset::east_opt(offset_seconds)?;
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    offset.from_local_datetime(&naive).single()
}
