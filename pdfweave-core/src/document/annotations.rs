//! Link annotations attached to pages.

use crate::error::{PdfError, Result};
use crate::geometry::Rectangle;
use crate::objects::{Dictionary, Object};
use bitflags::bitflags;

bitflags! {
    /// Annotation flags (`F` entry)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AnnotationFlags: u32 {
        const INVISIBLE = 1 << 0;
        const HIDDEN = 1 << 1;
        /// Print the annotation with the page
        const PRINT = 1 << 2;
        const NO_ZOOM = 1 << 3;
        const NO_ROTATE = 1 << 4;
        const NO_VIEW = 1 << 5;
        const READ_ONLY = 1 << 6;
        const LOCKED = 1 << 7;
        const TOGGLE_NO_VIEW = 1 << 8;
        const LOCKED_CONTENTS = 1 << 9;
    }
}

/// Link annotation opening a URI
#[derive(Debug, Clone, PartialEq)]
pub struct UriLink {
    uri: String,
    rect: Rectangle,
    flags: AnnotationFlags,
}

impl UriLink {
    /// Fails with an encoding error when `uri` is not 7-bit ASCII.
    pub fn new(uri: &str, rect: Rectangle) -> Result<Self> {
        if !uri.is_ascii() {
            return Err(PdfError::EncodingError(format!(
                "link target {uri:?} contains characters outside ASCII"
            )));
        }
        Ok(Self {
            uri: uri.to_string(),
            rect,
            flags: AnnotationFlags::PRINT,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn rect(&self) -> Rectangle {
        self.rect
    }

    pub fn flags(&self) -> AnnotationFlags {
        self.flags
    }

    pub fn to_dict(&self) -> Dictionary {
        let mut border = Dictionary::new();
        border.set("W", Object::Integer(0));

        let mut action = Dictionary::typed("Action");
        action.set("S", Object::name("URI"));
        action.set("URI", Object::String(self.uri.as_bytes().to_vec()));

        let mut dict = Dictionary::typed("Annot");
        dict.set("Subtype", Object::name("Link"));
        dict.set("Rect", self.rect.to_array());
        dict.set("F", Object::Integer(i64::from(self.flags.bits())));
        dict.set("BS", border);
        dict.set("A", action);
        dict
    }
}
