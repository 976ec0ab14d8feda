mod object_writer;
mod registry;
mod xref_stream_writer;

pub use object_writer::{ObjectSink, ObjectWriter};
pub use registry::{IndirectObjectRegistry, RegistryState};
pub use xref_stream_writer::{XRefEntry, XRefStreamWriter};

use crate::version::PdfVersion;

/// Configuration for document output
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Header version for new documents, target version for modified ones
    pub pdf_version: PdfVersion,
    /// Use a cross-reference stream instead of a table (new documents only)
    pub use_xref_streams: bool,
    /// Flate-compress content and form streams
    pub compress_streams: bool,
    /// Maximum number of kids per page tree node
    pub max_page_tree_kids: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            pdf_version: PdfVersion::V1_7,
            use_xref_streams: false,
            compress_streams: crate::compression::is_available(),
            max_page_tree_kids: 10,
        }
    }
}

impl WriterConfig {
    pub fn with_version(mut self, version: PdfVersion) -> Self {
        self.pdf_version = version;
        self
    }

    pub fn with_xref_streams(mut self, enabled: bool) -> Self {
        self.use_xref_streams = enabled;
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress_streams = enabled && crate::compression::is_available();
        self
    }

    /// Fan-out below 2 cannot form a tree, so it is raised to 2.
    pub fn with_max_page_tree_kids(mut self, max_kids: usize) -> Self {
        self.max_page_tree_kids = max_kids.max(2);
        self
    }
}
