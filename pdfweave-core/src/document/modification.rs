//! Incremental update of an existing document.
//!
//! The original bytes stay untouched. New objects are appended after them,
//! followed by a cross-reference section whose `Prev` points at the
//! original one. When pages were added and the original already has a page
//! tree, both trees are joined under a fresh root:
//!
//! ```text
//!            new root (Count = original + added)
//!           /                                \
//!   original root (Parent rewritten)    new subtree
//! ```

use super::catalog::{write_catalog, CatalogInformation};
use super::extension::VersionUpdate;
use super::page_tree::{write_page_tree, PageTree};
use super::trailer::{self, InfoDictionary};
use super::DocumentContext;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::parser::SourceDocument;
use crate::writer::ObjectSink;
use std::io::Write;
use tracing::{debug, info, warn};

/// How the page tree of a modified document is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTreeUpdate {
    /// No page was added; the original tree stays as it is
    NoNewPages,
    /// The original has no pages; the session tree is written on its own
    NewPagesNoOriginalRoot,
    /// Both trees are joined under a new root
    NewPagesWithOriginalRoot {
        original_root: ObjectId,
        original_count: u64,
    },
}

impl PageTreeUpdate {
    /// Decide from the source catalog and whether the session added pages.
    pub fn plan(source: &dyn SourceDocument, has_new_pages: bool) -> Result<Self> {
        if !has_new_pages {
            return Ok(PageTreeUpdate::NoNewPages);
        }

        let Some(original_root) = original_page_tree_root(source)? else {
            return Ok(PageTreeUpdate::NewPagesNoOriginalRoot);
        };
        let original_count = source
            .parse_object(original_root.number())?
            .as_dict()
            .and_then(|dict| dict.get_integer("Count"))
            .unwrap_or(0)
            .max(0) as u64;

        if original_count == 0 {
            Ok(PageTreeUpdate::NewPagesNoOriginalRoot)
        } else {
            Ok(PageTreeUpdate::NewPagesWithOriginalRoot {
                original_root,
                original_count,
            })
        }
    }

    pub fn changes_page_tree(&self) -> bool {
        !matches!(self, PageTreeUpdate::NoNewPages)
    }
}

fn source_catalog(source: &dyn SourceDocument) -> Result<Dictionary> {
    let root = source
        .trailer()
        .get_reference("Root")
        .ok_or_else(|| PdfError::ConsistencyFault("source trailer has no Root".to_string()))?;
    source
        .parse_object(root.number())?
        .as_dict()
        .cloned()
        .ok_or_else(|| PdfError::InvalidStructure(format!("source catalog {root} is not a dictionary")))
}

/// `Pages` reference of the source catalog
pub fn original_page_tree_root(source: &dyn SourceDocument) -> Result<Option<ObjectId>> {
    Ok(source_catalog(source)?.get_reference("Pages"))
}

/// Join `tree` and the original tree under a freshly allocated root.
///
/// The original root is rewritten under its own identity with `Parent`
/// pointing at the new root. Returns the new root's identity.
pub fn splice_page_trees(
    sink: &mut dyn ObjectSink,
    source: &dyn SourceDocument,
    tree: &PageTree,
    original_root: ObjectId,
    original_count: u64,
) -> Result<ObjectId> {
    if source.is_encrypted() {
        warn!(root = %original_root, "cannot copy the page tree root of an encrypted document");
        return Err(PdfError::ProtectedDocument(format!(
            "page tree root {original_root} of an encrypted document cannot be copied"
        )));
    }

    let new_root = sink.allocate_id();
    let new_count = write_page_tree(sink, tree, tree.root(), Some(new_root))?;

    let original = source.parse_object(original_root.number())?;
    let original = original.as_dict().ok_or_else(|| {
        PdfError::InvalidStructure(format!("page tree root {original_root} is not a dictionary"))
    })?;
    let mut copy: Dictionary = original
        .iter()
        .filter(|(key, _)| key.as_str() != "Parent")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    copy.set("Parent", new_root);
    sink.write_indirect(original_root, &Object::Dictionary(copy))?;

    let mut root = Dictionary::typed("Pages");
    root.set(
        "Kids",
        Object::Array(vec![
            Object::Reference(original_root),
            Object::Reference(tree.root_id()),
        ]),
    );
    root.set("Count", Object::Integer((original_count + new_count) as i64));
    sink.write_indirect(new_root, &Object::Dictionary(root))?;

    debug!(
        root = %new_root,
        original = original_count,
        added = new_count,
        "spliced page trees"
    );
    Ok(new_root)
}

impl<W: Write> DocumentContext<W> {
    /// Prepare the session to append to `source`.
    ///
    /// Takes over the root, chains the cross-reference sections through
    /// `Prev`, keeps the original info entries, stamps `ModDate` and
    /// remembers the first entry of the original ID.
    pub fn setup_modified_file(&mut self, source: &dyn SourceDocument) -> Result<()> {
        let source_trailer = source.trailer();
        let root = source_trailer.get_reference("Root").ok_or_else(|| {
            warn!("source document trailer has no Root");
            PdfError::ConsistencyFault("source trailer has no Root".to_string())
        })?;
        let size = source_trailer
            .get_integer("Size")
            .and_then(|size| u32::try_from(size).ok())
            .ok_or_else(|| {
                PdfError::ConsistencyFault("source trailer has no valid Size".to_string())
            })?;

        self.trailer.set_root(root);
        self.trailer.set_prev(source.xref_position());
        if let Some(encrypt) = source_trailer.get_reference("Encrypt") {
            self.trailer.set_encrypt(encrypt);
        }
        self.writer.registry_mut().reserve(size);

        if !source.is_encrypted() {
            if let Some(info) = source_trailer.get_reference("Info") {
                let info = source.parse_object(info.number())?;
                if let Some(dict) = info.as_dict() {
                    *self.trailer.info_mut() = InfoDictionary::from_dict(dict);
                }
            }
        }
        self.trailer.info_mut().mod_date = Some(trailer::now());

        self.modified_document_id = match source_trailer.get_array("ID") {
            Some(ids) if ids.len() == 2 => ids[0].as_bytes().map(<[u8]>::to_vec),
            _ => None,
        };

        debug!(root = %root, size, prev = source.xref_position(), "set up modification");
        Ok(())
    }

    /// Finish the incremental update of `source`.
    ///
    /// Writes font definitions, the page tree update, a new catalog when the
    /// page tree changed, the version must rise or an extension asks for it,
    /// then the info dictionary and a cross-reference section of the same
    /// form as the source's latest one.
    pub fn finalize_modified_pdf(&mut self, source: &dyn SourceDocument) -> Result<()> {
        self.fonts.write_definitions(&mut self.writer)?;

        let update = PageTreeUpdate::plan(source, self.catalog.has_pages())?;
        let pages = match update {
            PageTreeUpdate::NoNewPages => original_page_tree_root(source)?,
            PageTreeUpdate::NewPagesNoOriginalRoot => {
                let tree = session_tree(&self.catalog)?;
                write_page_tree(&mut self.writer, tree, tree.root(), None)?;
                Some(tree.root_id())
            }
            PageTreeUpdate::NewPagesWithOriginalRoot {
                original_root,
                original_count,
            } => {
                let tree = session_tree(&self.catalog)?;
                Some(splice_page_trees(
                    &mut self.writer,
                    source,
                    tree,
                    original_root,
                    original_count,
                )?)
            }
        };

        let version_raised = self.config.pdf_version > source.version();
        let rewrite_catalog = update.changes_page_tree()
            || version_raised
            || self.extensions.is_catalog_update_required(source);

        if rewrite_catalog {
            let version_update = version_raised
                .then(|| self.extensions.add(Box::new(VersionUpdate(self.config.pdf_version))));
            let written = write_catalog(&mut self.writer, &self.catalog, pages, &mut self.extensions);
            if let Some(id) = version_update {
                self.extensions.remove(id);
            }
            self.trailer.set_root(written?);
        }

        self.write_info_dictionary()?;

        let preserved_id = self.modified_document_id.clone();

        let use_stream = source.uses_xref_stream();
        self.write_cross_reference_section(preserved_id.as_deref(), use_stream)?;

        info!(
            update = ?update,
            catalog_rewritten = rewrite_catalog,
            xref_stream = use_stream,
            "finalized modified document"
        );
        Ok(())
    }
}

fn session_tree(catalog: &CatalogInformation) -> Result<&PageTree> {
    catalog.page_tree().ok_or_else(|| {
        PdfError::ConsistencyFault("session has pages but no page tree".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Page;
    use crate::parser::PdfReader;
    use crate::version::PdfVersion;
    use crate::writer::WriterConfig;

    fn source_with_pages(pages: usize, config: WriterConfig) -> PdfReader {
        let mut context = DocumentContext::new(Vec::new(), config);
        context.write_header().unwrap();
        for _ in 0..pages {
            context.write_page(&Page::letter()).unwrap();
        }
        context.finalize_new_pdf().unwrap();
        PdfReader::from_bytes(context.into_inner()).unwrap()
    }

    fn config() -> WriterConfig {
        WriterConfig::default()
            .with_compression(false)
            .with_version(PdfVersion::V1_4)
    }

    #[test]
    fn test_plan_without_new_pages() {
        let source = source_with_pages(2, config());
        assert_eq!(
            PageTreeUpdate::plan(&source, false).unwrap(),
            PageTreeUpdate::NoNewPages
        );
    }

    #[test]
    fn test_plan_for_empty_source() {
        let source = source_with_pages(0, config());
        assert_eq!(
            PageTreeUpdate::plan(&source, true).unwrap(),
            PageTreeUpdate::NewPagesNoOriginalRoot
        );
    }

    #[test]
    fn test_plan_for_populated_source() {
        let source = source_with_pages(3, config());
        match PageTreeUpdate::plan(&source, true).unwrap() {
            PageTreeUpdate::NewPagesWithOriginalRoot { original_count, .. } => {
                assert_eq!(original_count, 3)
            }
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[test]
    fn test_setup_requires_root() {
        let source = source_with_pages(1, config());
        let mut bytes = source.into_bytes();
        let trailer = bytes
            .windows(5)
            .rposition(|window| window == b"/Root")
            .unwrap();
        bytes[trailer + 1..trailer + 5].copy_from_slice(b"Roox");
        let source = PdfReader::from_bytes(bytes).unwrap();

        let mut context = DocumentContext::append_to(Vec::new(), source.data(), config()).unwrap();
        assert!(matches!(
            context.setup_modified_file(&source),
            Err(PdfError::ConsistencyFault(_))
        ));
    }

    #[test]
    fn test_setup_keeps_original_id_and_info() {
        let mut context = DocumentContext::new(Vec::new(), config());
        context.info_mut().title = Some("Original".to_string());
        context.write_header().unwrap();
        context.write_page(&Page::letter()).unwrap();
        context.finalize_new_pdf().unwrap();
        let source = PdfReader::from_bytes(context.into_inner()).unwrap();
        let original_id = source.trailer().get_array("ID").unwrap()[0]
            .as_bytes()
            .unwrap()
            .to_vec();

        let mut context = DocumentContext::append_to(Vec::new(), source.data(), config()).unwrap();
        context.setup_modified_file(&source).unwrap();

        assert_eq!(context.modified_document_id.as_deref(), Some(&original_id[..]));
        assert_eq!(context.info().title.as_deref(), Some("Original"));
        assert!(context.info().mod_date.is_some());
        assert_eq!(context.trailer().prev(), Some(source.xref_position()));
        let size = source.trailer().get_integer("Size").unwrap() as u32;
        assert_eq!(context.registry().objects_count(), size);
    }
}
