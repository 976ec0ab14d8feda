//! # pdfweave
//!
//! Document assembly and incremental update engine for PDF files.
//!
//! ## Features
//!
//! - **Page trees**: balanced page tree growth with bottom-up emission and exact `Count` values
//! - **Incremental updates**: append pages to an existing file, splicing the original page tree
//!   under a new root and chaining cross-reference sections through `Prev`
//! - **Extensions**: hook into catalog, page, resources and form writes
//! - **Deferred resources**: reserve a resource name now, write the object when the resources
//!   dictionary is serialized
//! - **Checkpoints**: suspend a session to a snapshot file and resume it later
//!
//! ## Quick Start
//!
//! ### Creating PDFs
//!
//! ```rust
//! use pdfweave::{DocumentContext, Page, Result, WriterConfig};
//!
//! # fn main() -> Result<()> {
//! let mut context = DocumentContext::new(Vec::new(), WriterConfig::default());
//! context.info_mut().title = Some("My PDF".to_string());
//! context.write_header()?;
//!
//! for _ in 0..3 {
//!     context.write_page(&Page::a4())?;
//! }
//! context.finalize_new_pdf()?;
//!
//! let bytes = context.into_inner();
//! assert!(bytes.ends_with(b"%%EOF"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Appending to an existing PDF
//!
//! ```rust,no_run
//! use pdfweave::parser::PdfReader;
//! use pdfweave::{DocumentContext, Page, WriterConfig};
//! use std::fs::File;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = PdfReader::open("input.pdf")?;
//! let output = File::create("output.pdf")?;
//!
//! let mut context = DocumentContext::append_to(output, source.data(), WriterConfig::default())?;
//! context.setup_modified_file(&source)?;
//! context.write_page(&Page::letter())?;
//! context.finalize_modified_pdf(&source)?;
//! # Ok(())
//! # }
//! ```

pub mod compression;
pub mod document;
pub mod error;
pub mod geometry;
pub mod objects;
pub mod parser;
pub mod version;
pub mod writer;

// Re-export generation types
pub use document::checkpoint::{read_state_file, write_state_file};
pub use document::{
    DocumentContext, DocumentExtension, ExtensionId, FormEndWritingTask, FormXObject,
    InfoDictionary, Page, PageTreeUpdate, PreserveCatalogEntries, ResourceCategory,
    ResourceWritingTask, ResourcesDictionary, Trapped,
};
pub use error::{PdfError, Result};
pub use geometry::{Matrix, Point, Rectangle};
pub use objects::{Dictionary, Object, ObjectId, ObjectReference};
pub use version::PdfVersion;
pub use writer::{ObjectSink, WriterConfig};

// Re-export parsing types
pub use parser::{PdfReader, SourceDocument};

/// Current version of pdfweave
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
