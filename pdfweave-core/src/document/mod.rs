//! Document assembly.
//!
//! [`DocumentContext`] owns the session state of one output document: the
//! page tree, trailer information, registered extensions and the deferred
//! task queues. It writes a fresh document through [`write_header`] and
//! [`finalize_new_pdf`], or appends an incremental update to an existing
//! one through [`DocumentContext::append_to`], [`setup_modified_file`] and
//! [`finalize_modified_pdf`].
//!
//! [`write_header`]: DocumentContext::write_header
//! [`finalize_new_pdf`]: DocumentContext::finalize_new_pdf
//! [`setup_modified_file`]: DocumentContext::setup_modified_file
//! [`finalize_modified_pdf`]: DocumentContext::finalize_modified_pdf

pub mod annotations;
pub mod catalog;
pub mod checkpoint;
pub mod extension;
pub mod fonts;
pub mod form;
pub mod modification;
pub mod page;
pub mod page_tree;
pub mod resources;
pub mod tasks;
pub mod trailer;

pub use annotations::{AnnotationFlags, UriLink};
pub use catalog::{write_catalog, CatalogInformation};
pub use extension::{DocumentExtension, ExtensionId, ExtensionSet, PreserveCatalogEntries};
pub use fonts::{EmptyFontRepository, FontRepository};
pub use form::FormXObject;
pub use modification::PageTreeUpdate;
pub use page::Page;
pub use page_tree::{write_page_tree, NodeIndex, PageTree, PageTreeKids, PageTreeNode};
pub use resources::{write_resources_dictionary, ResourceCategory, ResourcesDictionary, ResourcesId};
pub use tasks::{DeferredTasks, FormEndWritingTask, ResourceTaskKey, ResourceWritingTask};
pub use trailer::{DocumentId, InfoDictionary, TrailerInformation, Trapped};

use crate::compression;
use crate::error::Result;
use crate::geometry::{Matrix, Rectangle};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::writer::{IndirectObjectRegistry, ObjectSink, ObjectWriter, WriterConfig};
use chrono::{DateTime, FixedOffset};
use std::io::Write;
use tracing::{debug, info, warn};

/// Bytes following the header comment; marks the file as binary.
const BINARY_MARKER: [u8; 6] = [b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'];

/// Session state of one output document.
pub struct DocumentContext<W: Write> {
    writer: ObjectWriter<W>,
    config: WriterConfig,
    output_path: String,
    trailer: TrailerInformation,
    catalog: CatalogInformation,
    extensions: ExtensionSet,
    tasks: DeferredTasks,
    fonts: Box<dyn FontRepository>,
    annotations: Vec<ObjectId>,
    modified_document_id: Option<Vec<u8>>,
    clock: fn() -> DateTime<FixedOffset>,
}

impl<W: Write> DocumentContext<W> {
    /// Context for a new document written to `writer` from its first byte.
    pub fn new(writer: W, config: WriterConfig) -> Self {
        Self::with_writer(ObjectWriter::new(writer), config)
    }

    /// Context for an incremental update: copies `original` to `writer`
    /// and positions the session after it.
    pub fn append_to(writer: W, original: &[u8], config: WriterConfig) -> Result<Self> {
        let mut writer = ObjectWriter::new(writer);
        writer.write_raw(original)?;
        if !matches!(original.last(), Some(b'\n') | Some(b'\r')) {
            writer.write_raw(b"\n")?;
        }
        Ok(Self::with_writer(writer, config))
    }

    fn with_writer(writer: ObjectWriter<W>, config: WriterConfig) -> Self {
        let max_kids = config.max_page_tree_kids;
        Self {
            writer,
            config,
            output_path: String::new(),
            trailer: TrailerInformation::new(),
            catalog: CatalogInformation::new(max_kids),
            extensions: ExtensionSet::new(),
            tasks: DeferredTasks::new(),
            fonts: Box::new(EmptyFontRepository),
            annotations: Vec::new(),
            modified_document_id: None,
            clock: trailer::now,
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Output location, used only as document ID input
    pub fn set_output_file_information(&mut self, path: impl Into<String>) {
        self.output_path = path.into();
    }

    pub fn trailer(&self) -> &TrailerInformation {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut TrailerInformation {
        &mut self.trailer
    }

    pub fn info(&self) -> &InfoDictionary {
        self.trailer.info()
    }

    pub fn info_mut(&mut self) -> &mut InfoDictionary {
        self.trailer.info_mut()
    }

    pub fn catalog(&self) -> &CatalogInformation {
        &self.catalog
    }

    pub fn tasks(&self) -> &DeferredTasks {
        &self.tasks
    }

    pub fn registry(&self) -> &IndirectObjectRegistry {
        self.writer.registry()
    }

    /// Number of bytes written so far, copied original included
    pub fn position(&self) -> u64 {
        self.writer.position()
    }

    /// Annotations waiting for the next page write
    pub fn pending_annotations(&self) -> &[ObjectId] {
        &self.annotations
    }

    /// Direct access to the object writer, for callers that frame objects
    /// of their own.
    pub fn objects(&mut self) -> &mut ObjectWriter<W> {
        &mut self.writer
    }

    pub fn add_extension(&mut self, extension: Box<dyn DocumentExtension>) -> ExtensionId {
        self.extensions.add(extension)
    }

    pub fn remove_extension(&mut self, id: ExtensionId) -> Option<Box<dyn DocumentExtension>> {
        self.extensions.remove(id)
    }

    pub fn set_font_repository(&mut self, fonts: Box<dyn FontRepository>) {
        self.fonts = fonts;
    }

    /// `%PDF-1.x` followed by the binary marker
    pub fn write_header(&mut self) -> Result<()> {
        self.writer
            .write_comment(&self.config.pdf_version.header_comment())?;
        self.writer.write_raw(&BINARY_MARKER)
    }

    /// Frame `content` as a content stream and append it to `page`.
    pub fn write_page_content(&mut self, page: &mut Page, content: &[u8]) -> Result<ObjectId> {
        let stream = self.stream_object(Dictionary::new(), content)?;
        let id = self.writer.write_new(&stream)?;
        page.add_content(id);
        Ok(id)
    }

    /// Add `page` to the page tree and frame its dictionary.
    ///
    /// Annotations attached since the previous page write go into `Annots`.
    pub fn write_page(&mut self, page: &Page) -> Result<ObjectId> {
        let page_id = self.writer.allocate_id();
        let parent = self
            .catalog
            .add_page_to_page_tree(page_id, self.writer.registry_mut())?;

        let mut dict = Dictionary::typed("Page");
        dict.set("Parent", parent);
        dict.set("MediaBox", page.media_box().to_array());

        let crop_box = page.effective_crop_box();
        if crop_box != page.media_box() {
            dict.set("CropBox", crop_box.to_array());
        }
        for (key, rect) in [
            ("BleedBox", page.bleed_box()),
            ("TrimBox", page.trim_box()),
            ("ArtBox", page.art_box()),
        ] {
            if let Some(rect) = rect.filter(|rect| *rect != crop_box) {
                dict.set(key, rect.to_array());
            }
        }
        if let Some(rotate) = page.rotate() {
            dict.set("Rotate", Object::Integer(i64::from(rotate)));
        }

        let resources = write_resources_dictionary(
            page.resources(),
            &mut self.tasks,
            &mut self.extensions,
            &mut self.writer,
        )?;
        dict.set("Resources", resources);

        if !self.annotations.is_empty() {
            let annots = self.annotations.iter().map(|id| Object::Reference(*id));
            dict.set("Annots", Object::Array(annots.collect()));
        }

        match page.contents() {
            [] => {}
            [single] => dict.set("Contents", *single),
            many => dict.set(
                "Contents",
                Object::Array(many.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        }

        self.extensions
            .on_page_write(page, &mut dict, &mut self.writer)?;

        self.writer
            .write_object(page_id, &Object::Dictionary(dict))?;
        self.annotations.clear();
        debug!(page = %page_id, parent = %parent, "wrote page");
        Ok(page_id)
    }

    /// Resources dictionary of `resources`, deferred tasks flushed
    pub fn write_resources_dictionary(
        &mut self,
        resources: &ResourcesDictionary,
    ) -> Result<Dictionary> {
        write_resources_dictionary(
            resources,
            &mut self.tasks,
            &mut self.extensions,
            &mut self.writer,
        )
    }

    /// Reserve a name in `category` now and resolve it later through `task`.
    ///
    /// The task runs when `resources` is written.
    pub fn add_extended_resource_mapping(
        &mut self,
        resources: &mut ResourcesDictionary,
        category: ResourceCategory,
        task: Box<dyn ResourceWritingTask>,
    ) -> String {
        let name = resources.allocate_placeholder(category);
        self.tasks.register_resource_task(
            ResourceTaskKey::new(resources.id(), category),
            name.clone(),
            task,
        );
        name
    }

    /// Run `task` once `form` has been closed
    pub fn register_form_end_writing_task(
        &mut self,
        form: &FormXObject,
        task: Box<dyn FormEndWritingTask>,
    ) {
        self.tasks.register_form_end_task(form.id(), task);
    }

    pub fn start_form_xobject(&mut self, bbox: Rectangle, matrix: Matrix) -> Result<FormXObject> {
        let id = self.writer.allocate_id();
        self.start_form_xobject_with_id(id, bbox, matrix)
    }

    /// Open a form under a caller-allocated identity.
    pub fn start_form_xobject_with_id(
        &mut self,
        id: ObjectId,
        bbox: Rectangle,
        matrix: Matrix,
    ) -> Result<FormXObject> {
        let resources_id = self.writer.allocate_id();
        let mut form = FormXObject::new(id, resources_id, bbox, matrix);
        self.extensions.on_form_xobject_write(
            id,
            resources_id,
            form.dictionary_mut(),
            &mut self.writer,
        )?;
        Ok(form)
    }

    /// Write the form stream and its resources, then run the form's end tasks.
    pub fn end_form_xobject(&mut self, form: FormXObject) -> Result<ObjectId> {
        let stream = self.stream_object(form.dictionary().clone(), form.content())?;
        self.writer.write_object(form.id(), &stream)?;

        let resources = write_resources_dictionary(
            form.resources(),
            &mut self.tasks,
            &mut self.extensions,
            &mut self.writer,
        )?;
        self.writer
            .write_object(form.resources_id(), &Object::Dictionary(resources))?;

        self.tasks.flush_form_end_tasks(&form, &mut self.writer)?;
        Ok(form.id())
    }

    /// Frame a URI link annotation and queue it for the next page write.
    ///
    /// A URL outside 7-bit ASCII fails with an encoding error before
    /// anything is written; the document stays usable.
    pub fn attach_url_link_to_current_page(
        &mut self,
        url: &str,
        rect: Rectangle,
    ) -> Result<ObjectId> {
        let link = UriLink::new(url, rect).inspect_err(|error| {
            warn!(%error, "rejected link annotation");
        })?;
        let id = self
            .writer
            .write_new(&Object::Dictionary(link.to_dict()))?;
        self.annotations.push(id);
        Ok(id)
    }

    /// Finish a new document: fonts, page tree, catalog, info, cross-reference
    /// section, trailer and end marker.
    pub fn finalize_new_pdf(&mut self) -> Result<()> {
        self.fonts.write_definitions(&mut self.writer)?;

        let tree: &PageTree = self.catalog.page_tree_root(self.writer.registry_mut());
        let page_count = write_page_tree(&mut self.writer, tree, tree.root(), None)?;
        let pages = tree.root_id();

        let root = write_catalog(
            &mut self.writer,
            &self.catalog,
            Some(pages),
            &mut self.extensions,
        )?;
        self.trailer.set_root(root);

        self.write_info_dictionary()?;

        let mut use_stream = self.config.use_xref_streams;
        if use_stream && !self.config.pdf_version.supports_xref_streams() {
            warn!(
                version = %self.config.pdf_version,
                "cross-reference streams need PDF 1.5, writing a table"
            );
            use_stream = false;
        }
        self.write_cross_reference_section(None, use_stream)?;

        info!(
            pages = page_count,
            objects = self.writer.registry().written_count(),
            "finalized new document"
        );
        Ok(())
    }

    fn write_info_dictionary(&mut self) -> Result<()> {
        if self.trailer.info().is_empty() {
            return Ok(());
        }
        let dict = self.trailer.info().to_dict();
        let id = self.writer.write_new(&Object::Dictionary(dict))?;
        self.trailer.set_info_reference(id);
        Ok(())
    }

    /// Identifier pair hashed at the current write position. A preserved
    /// non-empty first entry is kept.
    fn document_id(&self, preserved: Option<&[u8]>) -> DocumentId {
        let generated = trailer::generate_document_id(
            self.trailer.info(),
            &self.output_path,
            self.writer.position(),
            &(self.clock)(),
        );
        match preserved.filter(|id| !id.is_empty()) {
            Some(original) => DocumentId {
                original: original.to_vec(),
                current: generated,
            },
            None => DocumentId::fresh(generated),
        }
    }

    fn write_cross_reference_section(
        &mut self,
        preserved_id: Option<&[u8]>,
        use_stream: bool,
    ) -> Result<()> {
        let size = self.writer.registry().objects_count();
        let mut trailer_dict =
            trailer::trailer_dictionary(&self.trailer, size, &self.document_id(preserved_id))
                .inspect_err(|error| warn!(%error, "cannot write trailer"))?;

        let xref_position = if use_stream {
            self.writer.write_xref_stream(&trailer_dict)?
        } else {
            let position = self.writer.write_xref_table()?;
            // a table trailer's identifier covers the table
            trailer_dict.set("ID", self.document_id(preserved_id).to_array());
            self.writer.write_trailer_dictionary(&trailer_dict)?;
            position
        };

        self.writer.write_startxref(xref_position)?;
        self.writer.write_eof()?;
        self.writer.flush()
    }

    fn stream_object(&self, mut dict: Dictionary, data: &[u8]) -> Result<Object> {
        if self.config.compress_streams && compression::is_available() {
            dict.set("Filter", Object::name("FlateDecode"));
            Ok(Object::Stream(dict, compression::compress(data)?))
        } else {
            Ok(Object::Stream(dict, data.to_vec()))
        }
    }

    /// Drop all session state. Pending deferred tasks are discarded
    /// without running.
    pub fn reset(&mut self) {
        self.trailer.reset();
        self.catalog.reset();
        self.extensions.clear();
        self.tasks.clear();
        self.fonts.reset();
        self.annotations.clear();
        self.modified_document_id = None;
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}
