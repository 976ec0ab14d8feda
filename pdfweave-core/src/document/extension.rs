//! Pluggable document extensions.
//!
//! An extension observes fixed write points and may add keys to the
//! dictionary being built or write objects of its own through the sink.
//! Returning an error aborts the enclosing write.

use super::catalog::CatalogInformation;
use super::page::Page;
use super::resources::{ResourceCategory, ResourcesDictionary};
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::parser::SourceDocument;
use crate::version::PdfVersion;
use crate::writer::ObjectSink;
use tracing::warn;

#[allow(unused_variables)]
pub trait DocumentExtension {
    fn on_catalog_write(
        &mut self,
        catalog: &CatalogInformation,
        dict: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        Ok(())
    }

    fn on_page_write(
        &mut self,
        page: &Page,
        dict: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        Ok(())
    }

    fn on_resources_write(
        &mut self,
        resources: &ResourcesDictionary,
        dict: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        Ok(())
    }

    /// Called once per emitted category sub-dictionary (`Font`, `XObject`, ...)
    fn on_resource_dictionary_write(
        &mut self,
        category: ResourceCategory,
        dict: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        Ok(())
    }

    fn on_form_xobject_write(
        &mut self,
        form_id: ObjectId,
        resources_id: ObjectId,
        dict: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        Ok(())
    }

    /// Whether finishing a modification must write a new catalog
    fn is_catalog_update_required(&self, source: &dyn SourceDocument) -> bool {
        false
    }
}

/// Handle returned by [`ExtensionSet::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionId(u64);

/// Extensions in registration order
#[derive(Default)]
pub struct ExtensionSet {
    extensions: Vec<(ExtensionId, Box<dyn DocumentExtension>)>,
    next_id: u64,
}

impl ExtensionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, extension: Box<dyn DocumentExtension>) -> ExtensionId {
        let id = ExtensionId(self.next_id);
        self.next_id += 1;
        self.extensions.push((id, extension));
        id
    }

    pub fn remove(&mut self, id: ExtensionId) -> Option<Box<dyn DocumentExtension>> {
        let position = self.extensions.iter().position(|(e, _)| *e == id)?;
        Some(self.extensions.remove(position).1)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn clear(&mut self) {
        self.extensions.clear();
    }

    fn each(
        &mut self,
        hook: &'static str,
        mut call: impl FnMut(&mut dyn DocumentExtension) -> Result<()>,
    ) -> Result<()> {
        for (id, extension) in &mut self.extensions {
            if let Err(error) = call(extension.as_mut()) {
                warn!(hook, extension = id.0, %error, "extension declared failure");
                return Err(PdfError::extension(hook, error));
            }
        }
        Ok(())
    }

    pub fn on_catalog_write(
        &mut self,
        catalog: &CatalogInformation,
        dict: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        self.each("catalog", |e| e.on_catalog_write(catalog, dict, sink))
    }

    pub fn on_page_write(
        &mut self,
        page: &Page,
        dict: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        self.each("page", |e| e.on_page_write(page, dict, sink))
    }

    pub fn on_resources_write(
        &mut self,
        resources: &ResourcesDictionary,
        dict: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        self.each("resources", |e| e.on_resources_write(resources, dict, sink))
    }

    pub fn on_resource_dictionary_write(
        &mut self,
        category: ResourceCategory,
        dict: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        self.each("resource-category", |e| {
            e.on_resource_dictionary_write(category, dict, sink)
        })
    }

    pub fn on_form_xobject_write(
        &mut self,
        form_id: ObjectId,
        resources_id: ObjectId,
        dict: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        self.each("form-xobject", |e| {
            e.on_form_xobject_write(form_id, resources_id, dict, sink)
        })
    }

    pub fn is_catalog_update_required(&self, source: &dyn SourceDocument) -> bool {
        self.extensions
            .iter()
            .any(|(_, e)| e.is_catalog_update_required(source))
    }
}

/// Writes the catalog `Version` key. Registered only while a modified
/// document's catalog is being rewritten for a newer format version.
pub(crate) struct VersionUpdate(pub PdfVersion);

impl DocumentExtension for VersionUpdate {
    fn on_catalog_write(
        &mut self,
        _catalog: &CatalogInformation,
        dict: &mut Dictionary,
        _sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        dict.set("Version", Object::Name(self.0.as_name()));
        Ok(())
    }
}

/// Carries the entries of a modified document's original catalog over to
/// the rewritten one.
///
/// `Type`, `Pages` and `Version` are left to the writer. Values are copied
/// as they are, so references keep pointing at the original objects.
pub struct PreserveCatalogEntries {
    entries: Dictionary,
}

impl PreserveCatalogEntries {
    pub fn new(original_catalog: &Dictionary) -> Self {
        let entries = original_catalog
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "Type" | "Pages" | "Version"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { entries }
    }

    /// Read the catalog of `source`; encrypted sources cannot be copied
    pub fn from_source(source: &dyn SourceDocument) -> Result<Self> {
        if source.is_encrypted() {
            return Err(PdfError::ProtectedDocument(
                "catalog entries of an encrypted document cannot be copied".to_string(),
            ));
        }
        let root = source
            .trailer()
            .get_reference("Root")
            .ok_or_else(|| PdfError::ConsistencyFault("source trailer has no Root".to_string()))?;
        let catalog = source.parse_object(root.number())?;
        let catalog = catalog.as_dict().ok_or_else(|| {
            PdfError::InvalidStructure(format!("catalog {root} is not a dictionary"))
        })?;
        Ok(Self::new(catalog))
    }
}

impl DocumentExtension for PreserveCatalogEntries {
    fn on_catalog_write(
        &mut self,
        _catalog: &CatalogInformation,
        dict: &mut Dictionary,
        _sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        for (key, value) in self.entries.iter() {
            if !dict.contains_key(key) {
                dict.set(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}
