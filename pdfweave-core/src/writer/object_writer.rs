use crate::compression;
use crate::error::Result;
use crate::objects::{Dictionary, Object, ObjectId};
use crate::writer::registry::{IndirectObjectRegistry, RegistryState};
use crate::writer::xref_stream_writer::XRefStreamWriter;
use std::io::Write;

/// Capability surface handed to extensions, deferred tasks and collaborators.
///
/// Allocation is always safe to call. Framing an object appends it to the
/// output immediately, so callers must not frame an identity twice.
pub trait ObjectSink {
    fn allocate_id(&mut self) -> ObjectId;

    fn write_indirect(&mut self, id: ObjectId, object: &Object) -> Result<()>;

    fn position(&self) -> u64;

    /// Allocate a fresh identity and frame `object` under it.
    fn write_new(&mut self, object: &Object) -> Result<ObjectId> {
        let id = self.allocate_id();
        self.write_indirect(id, object)?;
        Ok(id)
    }
}

/// Append-only object serializer with offset tracking.
pub struct ObjectWriter<W: Write> {
    writer: W,
    current_position: u64,
    registry: IndirectObjectRegistry,
}

impl<W: Write> ObjectWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            current_position: 0,
            registry: IndirectObjectRegistry::new(),
        }
    }

    /// Writer whose output already holds `position` bytes.
    pub fn at_position(writer: W, position: u64) -> Self {
        Self {
            writer,
            current_position: position,
            registry: IndirectObjectRegistry::new(),
        }
    }

    /// Resume a suspended session from a saved registry state.
    pub fn resume(writer: W, state: &RegistryState) -> Self {
        Self {
            writer,
            current_position: state.position,
            registry: IndirectObjectRegistry::from_state(state),
        }
    }

    pub fn registry(&self) -> &IndirectObjectRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut IndirectObjectRegistry {
        &mut self.registry
    }

    pub fn registry_state(&self) -> RegistryState {
        self.registry.state(self.current_position)
    }

    pub fn restore_registry(&mut self, state: &RegistryState) {
        self.registry = IndirectObjectRegistry::from_state(state);
        self.current_position = state.position;
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// `%` comment followed by a newline.
    pub fn write_comment(&mut self, comment: &str) -> Result<()> {
        self.write_bytes(b"%")?;
        self.write_bytes(comment.as_bytes())?;
        self.write_bytes(b"\n")
    }

    pub fn write_keyword(&mut self, keyword: &str) -> Result<()> {
        self.write_bytes(keyword.as_bytes())?;
        self.write_bytes(b"\n")
    }

    /// Raw bytes, no framing.
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.write_bytes(data)
    }

    pub fn write_object_value(&mut self, object: &Object) -> Result<()> {
        match object {
            Object::Null => self.write_bytes(b"null")?,
            Object::Boolean(b) => self.write_bytes(if *b { b"true" } else { b"false" })?,
            Object::Integer(i) => self.write_bytes(i.to_string().as_bytes())?,
            Object::Real(f) => self.write_bytes(format_real(*f).as_bytes())?,
            Object::String(s) => {
                self.write_bytes(b"(")?;
                self.write_bytes(&escape_literal(s))?;
                self.write_bytes(b")")?;
            }
            Object::HexString(s) => {
                self.write_bytes(b"<")?;
                self.write_bytes(hex::encode_upper(s).as_bytes())?;
                self.write_bytes(b">")?;
            }
            Object::Name(n) => {
                self.write_bytes(b"/")?;
                self.write_bytes(escape_name(n).as_bytes())?;
            }
            Object::Array(arr) => {
                self.write_bytes(b"[")?;
                for (i, obj) in arr.iter().enumerate() {
                    if i > 0 {
                        self.write_bytes(b" ")?;
                    }
                    self.write_object_value(obj)?;
                }
                self.write_bytes(b"]")?;
            }
            Object::Dictionary(dict) => self.write_dictionary(dict)?,
            Object::Stream(dict, data) => {
                let mut dict = dict.clone();
                dict.set("Length", Object::Integer(data.len() as i64));
                self.write_dictionary(&dict)?;
                self.write_bytes(b"\nstream\n")?;
                self.write_bytes(data)?;
                self.write_bytes(b"\nendstream")?;
            }
            Object::Reference(id) => {
                let ref_str = format!("{} {} R", id.number(), id.generation());
                self.write_bytes(ref_str.as_bytes())?;
            }
        }
        Ok(())
    }

    fn write_dictionary(&mut self, dict: &Dictionary) -> Result<()> {
        self.write_bytes(b"<<")?;
        for (key, value) in dict.iter() {
            self.write_bytes(b"\n/")?;
            self.write_bytes(escape_name(key).as_bytes())?;
            self.write_bytes(b" ")?;
            self.write_object_value(value)?;
        }
        self.write_bytes(b"\n>>")
    }

    /// Frame `object` as `N G obj ... endobj` and record its offset.
    pub fn write_object(&mut self, id: ObjectId, object: &Object) -> Result<()> {
        self.registry.mark_written(id, self.current_position)?;

        let header = format!("{} {} obj\n", id.number(), id.generation());
        self.write_bytes(header.as_bytes())?;

        self.write_object_value(object)?;

        self.write_bytes(b"\nendobj\n")?;
        Ok(())
    }

    /// Classic cross-reference table over the objects written in this session.
    ///
    /// Returns the offset of the `xref` keyword.
    pub fn write_xref_table(&mut self) -> Result<u64> {
        let xref_position = self.current_position;
        self.write_bytes(b"xref\n")?;

        let mut rows: Vec<(u32, String)> = vec![(0, "0000000000 65535 f \n".to_string())];
        rows.extend(self.registry.written().map(|(id, offset)| {
            (
                id.number(),
                format!("{:010} {:05} n \n", offset, id.generation()),
            )
        }));

        let mut start = 0;
        while start < rows.len() {
            let mut end = start + 1;
            while end < rows.len() && rows[end].0 == rows[end - 1].0 + 1 {
                end += 1;
            }
            let subsection = format!("{} {}\n", rows[start].0, end - start);
            self.write_bytes(subsection.as_bytes())?;
            for (_, row) in &rows[start..end] {
                self.write_bytes(row.as_bytes())?;
            }
            start = end;
        }

        Ok(xref_position)
    }

    pub fn write_trailer_dictionary(&mut self, trailer: &Dictionary) -> Result<()> {
        self.write_bytes(b"trailer\n")?;
        self.write_dictionary(trailer)?;
        self.write_bytes(b"\n")
    }

    /// Cross-reference stream object carrying the trailer keys.
    ///
    /// Allocates the stream's own identity and includes it in the table.
    /// Returns the offset of the stream object.
    pub fn write_xref_stream(&mut self, trailer: &Dictionary) -> Result<u64> {
        let stream_id = self.registry.allocate();
        let xref_position = self.current_position;

        let mut table = XRefStreamWriter::new();
        table.add_free_entry(0, 0, 65535);
        for (id, offset) in self.registry.written() {
            table.add_in_use_entry(id.number(), offset, id.generation());
        }
        table.add_in_use_entry(stream_id.number(), xref_position, 0);

        let mut dict = table.create_dictionary(trailer, self.registry.objects_count());
        let encoded = table.encode_entries();
        let data = if compression::is_available() {
            dict.set("Filter", Object::name("FlateDecode"));
            compression::compress(&encoded)?
        } else {
            encoded
        };

        self.write_object(stream_id, &Object::Stream(dict, data))?;
        Ok(xref_position)
    }

    pub fn write_startxref(&mut self, xref_position: u64) -> Result<()> {
        self.write_bytes(b"startxref\n")?;
        self.write_bytes(xref_position.to_string().as_bytes())?;
        self.write_bytes(b"\n")
    }

    /// The 5-byte end marker.
    pub fn write_eof(&mut self) -> Result<()> {
        self.write_bytes(b"%%EOF")
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.current_position += data.len() as u64;
        Ok(())
    }
}

impl<W: Write> ObjectSink for ObjectWriter<W> {
    fn allocate_id(&mut self) -> ObjectId {
        self.registry.allocate()
    }

    fn write_indirect(&mut self, id: ObjectId, object: &Object) -> Result<()> {
        self.write_object(id, object)
    }

    fn position(&self) -> u64 {
        self.current_position
    }
}

fn format_real(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let formatted = format!("{value:.6}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn escape_literal(data: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(data.len());
    for &byte in data {
        match byte {
            b'(' | b')' | b'\\' => {
                escaped.push(b'\\');
                escaped.push(byte);
            }
            b'\r' => escaped.extend_from_slice(b"\\r"),
            _ => escaped.push(byte),
        }
    }
    escaped
}

fn escape_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for byte in name.bytes() {
        let delimiter = matches!(
            byte,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#'
        );
        if (0x21..=0x7E).contains(&byte) && !delimiter {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("#{byte:02X}"));
        }
    }
    escaped
}
