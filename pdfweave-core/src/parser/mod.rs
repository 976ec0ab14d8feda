//! PDF Parser Module
//!
//! Reads the parts of an existing file that document modification and
//! checkpoint restore need: the trailer, arbitrary indirect objects and
//! the declared format version.

pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod reader;
pub mod xref;

pub use self::lexer::{Lexer, Token};
pub use self::object_stream::ObjectStream;
pub use self::objects::ObjectParser;
pub use self::reader::PdfReader;
pub use self::xref::CrossReference;

use crate::error::Result;
use crate::objects::{Dictionary, Object};
use crate::version::PdfVersion;

/// Read access to an already written document.
pub trait SourceDocument {
    /// Trailer dictionary of the latest revision.
    ///
    /// For files finalized with a cross-reference stream this is the stream
    /// dictionary, so `Type` is `XRef`.
    fn trailer(&self) -> &Dictionary;

    fn parse_object(&self, number: u32) -> Result<Object>;

    /// Generation of the latest revision of object `number`
    fn generation_of(&self, number: u32) -> Option<u16>;

    fn version(&self) -> PdfVersion;

    /// Offset of the latest cross-reference section
    fn xref_position(&self) -> u64;

    fn is_encrypted(&self) -> bool {
        self.trailer().contains_key("Encrypt")
    }

    /// Whether the latest revision ends with a cross-reference stream
    fn uses_xref_stream(&self) -> bool {
        self.trailer().get_name("Type") == Some("XRef")
    }
}
