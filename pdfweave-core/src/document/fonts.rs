use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::parser::SourceDocument;
use crate::writer::ObjectSink;

/// Font handling collaborator.
///
/// The engine calls `write_definitions` first during finalization and
/// hands it its own slot in every checkpoint.
pub trait FontRepository {
    /// Write the font objects used so far
    fn write_definitions(&mut self, sink: &mut dyn ObjectSink) -> Result<()>;

    /// Frame the repository state under `id`
    fn write_state(&self, sink: &mut dyn ObjectSink, id: ObjectId) -> Result<()>;

    fn read_state(&mut self, source: &dyn SourceDocument, id: ObjectId) -> Result<()>;

    fn reset(&mut self);
}

/// Repository for documents without embedded fonts
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyFontRepository;

impl FontRepository for EmptyFontRepository {
    fn write_definitions(&mut self, _sink: &mut dyn ObjectSink) -> Result<()> {
        Ok(())
    }

    fn write_state(&self, sink: &mut dyn ObjectSink, id: ObjectId) -> Result<()> {
        let mut dict = Dictionary::typed("FontRepository");
        dict.set("Fonts", Object::Array(Vec::new()));
        sink.write_indirect(id, &Object::Dictionary(dict))
    }

    fn read_state(&mut self, source: &dyn SourceDocument, id: ObjectId) -> Result<()> {
        let object = source.parse_object(id.number())?;
        match object.as_dict().and_then(|dict| dict.get_name("Type")) {
            Some("FontRepository") => Ok(()),
            _ => Err(PdfError::ConsistencyFault(format!(
                "font repository state {id} is missing"
            ))),
        }
    }

    fn reset(&mut self) {}
}
