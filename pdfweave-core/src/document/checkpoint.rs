//! Suspend and resume of a document session.
//!
//! The session is stored as a graph of indirect objects rooted at one
//! identity, written through any [`ObjectSink`] and read back through any
//! [`SourceDocument`]. Snapshot identities come from the sink, never from
//! the document being written. Layout:
//!
//! ```text
//! DocumentContext      TrailerInformation, CatalogInformation, FontRepository,
//!                      ObjectRegistry (refs), ModifiedDocumentIDExists,
//!                      ModifiedDocumentID, Annotations
//! TrailerInformation   Prev, Root, Encrypt, InfoDictionaryReference,
//!                      InfoDictionary (ref)
//! InfoDictionary       text fields, CreationDate/ModDate (Date), Trapped,
//!                      Additional
//! CatalogInformation   PageTreeRoot, CurrentPageTreeNode (refs, only with a tree)
//! PageTree             NodeID, NodeGeneration, IsLeafParent, Kids | KidNodes
//! ObjectRegistry       NextObjectNumber, Position, Offsets
//! ```

use super::page_tree::{NodeIndex, PageTree, PageTreeKids};
use super::trailer::{InfoDictionary, Trapped};
use super::DocumentContext;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::parser::{PdfReader, SourceDocument};
use crate::version::PdfVersion;
use crate::writer::{ObjectSink, ObjectWriter, RegistryState};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Timelike};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tracing::debug;

impl<W: Write> DocumentContext<W> {
    /// Serialize the session under `root_id`, allocating every other
    /// snapshot object from `sink`.
    pub fn write_state(&self, sink: &mut dyn ObjectSink, root_id: ObjectId) -> Result<()> {
        let trailer_id = sink.allocate_id();
        let catalog_id = sink.allocate_id();
        let fonts_id = sink.allocate_id();
        let registry_id = sink.allocate_id();

        let mut root = Dictionary::typed("DocumentContext");
        root.set("TrailerInformation", trailer_id);
        root.set("CatalogInformation", catalog_id);
        root.set("FontRepository", fonts_id);
        root.set("ObjectRegistry", registry_id);
        root.set(
            "ModifiedDocumentIDExists",
            Object::Boolean(self.modified_document_id.is_some()),
        );
        if let Some(id) = &self.modified_document_id {
            root.set("ModifiedDocumentID", Object::HexString(id.clone()));
        }
        root.set(
            "Annotations",
            Object::Array(self.annotations.iter().map(|id| reference_state(*id)).collect()),
        );
        sink.write_indirect(root_id, &Object::Dictionary(root))?;

        self.write_trailer_state(sink, trailer_id)?;
        self.write_catalog_state(sink, catalog_id)?;
        self.fonts.write_state(sink, fonts_id)?;
        write_registry_state(sink, registry_id, &self.writer.registry_state())?;

        debug!(root = %root_id, "wrote session state");
        Ok(())
    }

    fn write_trailer_state(&self, sink: &mut dyn ObjectSink, id: ObjectId) -> Result<()> {
        let info_id = sink.allocate_id();

        let mut dict = Dictionary::typed("TrailerInformation");
        if let Some(prev) = self.trailer.prev() {
            dict.set("Prev", Object::Integer(prev as i64));
        }
        if let Some(root) = self.trailer.root() {
            dict.set("Root", reference_state(root));
        }
        if let Some(encrypt) = self.trailer.encrypt() {
            dict.set("Encrypt", reference_state(encrypt));
        }
        if let Some(info) = self.trailer.info_reference() {
            dict.set("InfoDictionaryReference", reference_state(info));
        }
        dict.set("InfoDictionary", info_id);
        sink.write_indirect(id, &Object::Dictionary(dict))?;

        sink.write_indirect(info_id, &Object::Dictionary(info_state(self.trailer.info())))
    }

    fn write_catalog_state(&self, sink: &mut dyn ObjectSink, id: ObjectId) -> Result<()> {
        let mut dict = Dictionary::typed("CatalogInformation");
        let Some(tree) = self.catalog.page_tree() else {
            return sink.write_indirect(id, &Object::Dictionary(dict));
        };

        // One snapshot object per node, preallocated so parents can refer
        // to children written after them.
        let order = tree.preorder();
        let state_ids: HashMap<NodeIndex, ObjectId> = order
            .iter()
            .map(|index| (*index, sink.allocate_id()))
            .collect();

        dict.set("PageTreeRoot", state_ids[&tree.root()]);
        if let Some(current) = self.catalog.current_node() {
            dict.set("CurrentPageTreeNode", state_ids[&current]);
        }
        sink.write_indirect(id, &Object::Dictionary(dict))?;

        for index in order {
            let node = tree.node(index);
            let mut node_dict = Dictionary::typed("PageTree");
            node_dict.set("NodeID", Object::Integer(i64::from(node.id().number())));
            node_dict.set(
                "NodeGeneration",
                Object::Integer(i64::from(node.id().generation())),
            );
            node_dict.set("IsLeafParent", Object::Boolean(node.is_leaf_parent()));
            match node.kids() {
                PageTreeKids::Pages(pages) => node_dict.set(
                    "Kids",
                    Object::Array(pages.iter().map(|page| reference_state(*page)).collect()),
                ),
                PageTreeKids::Nodes(children) => node_dict.set(
                    "KidNodes",
                    Object::Array(
                        children
                            .iter()
                            .map(|child| Object::Reference(state_ids[child]))
                            .collect(),
                    ),
                ),
            }
            sink.write_indirect(state_ids[&index], &Object::Dictionary(node_dict))?;
        }
        Ok(())
    }

    /// Restore a session written by [`write_state`](Self::write_state).
    ///
    /// The page tree is rebuilt node by node and the open node is found by
    /// the identity of its snapshot object. The object registry, and with
    /// it the output position, is restored as well.
    pub fn read_state(&mut self, source: &dyn SourceDocument, root_id: ObjectId) -> Result<()> {
        let root = state_dict(source, root_id, "DocumentContext")?;

        let trailer_id = required_reference(&root, "TrailerInformation")?;
        self.read_trailer_state(source, trailer_id)?;

        let catalog_id = required_reference(&root, "CatalogInformation")?;
        self.read_catalog_state(source, catalog_id)?;

        let registry_id = required_reference(&root, "ObjectRegistry")?;
        let registry = read_registry_state(source, registry_id)?;
        self.writer.restore_registry(&registry);

        self.modified_document_id = if root.get_bool("ModifiedDocumentIDExists") == Some(true) {
            Some(
                root.get("ModifiedDocumentID")
                    .and_then(Object::as_bytes)
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default(),
            )
        } else {
            None
        };

        self.annotations = match root.get_array("Annotations") {
            Some(items) => items
                .iter()
                .map(reference_from_state)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let fonts_id = required_reference(&root, "FontRepository")?;
        self.fonts.read_state(source, fonts_id)?;

        debug!(root = %root_id, "restored session state");
        Ok(())
    }

    fn read_trailer_state(&mut self, source: &dyn SourceDocument, id: ObjectId) -> Result<()> {
        let dict = state_dict(source, id, "TrailerInformation")?;

        let prev = dict.get_integer("Prev").map(|prev| prev.max(0) as u64);
        let root = optional_reference(&dict, "Root")?;
        let encrypt = optional_reference(&dict, "Encrypt")?;
        let info_reference = optional_reference(&dict, "InfoDictionaryReference")?;

        let info_id = required_reference(&dict, "InfoDictionary")?;
        let info = info_from_state(&state_dict(source, info_id, "InfoDictionary")?)?;

        self.trailer
            .restore(prev, root, encrypt, info_reference, info);
        Ok(())
    }

    fn read_catalog_state(&mut self, source: &dyn SourceDocument, id: ObjectId) -> Result<()> {
        let dict = state_dict(source, id, "CatalogInformation")?;
        let Some(root_state) = dict.get_reference("PageTreeRoot") else {
            self.catalog.restore(None, None);
            return Ok(());
        };

        let root = state_dict(source, root_state, "PageTree")?;
        let mut tree = PageTree::with_root(
            node_id(&root)?,
            is_leaf_parent(&root)?,
            self.config.max_page_tree_kids,
        );
        let mut by_state = HashMap::new();
        by_state.insert(root_state, tree.root());
        let tree_root = tree.root();
        rebuild_node(source, &root, &mut tree, tree_root, &mut by_state)?;

        let current = match dict.get_reference("CurrentPageTreeNode") {
            Some(state) => Some(*by_state.get(&state).ok_or_else(|| {
                PdfError::ConsistencyFault(format!(
                    "current page tree node {state} is not part of the saved tree"
                ))
            })?),
            None => None,
        };

        self.catalog.restore(Some(tree), current);
        Ok(())
    }
}

/// Write the session to `writer` as a standalone snapshot file.
///
/// The trailer `Root` of the file is the snapshot root, so
/// [`read_state_file`] needs nothing else.
pub fn write_state_file<W: Write, S: Write>(
    context: &DocumentContext<W>,
    writer: S,
) -> Result<S> {
    let mut state = ObjectWriter::new(writer);
    state.write_comment(&PdfVersion::V1_7.header_comment())?;

    let root = state.allocate_id();
    context.write_state(&mut state, root)?;

    let xref_position = state.write_xref_table()?;
    let mut trailer = Dictionary::new();
    trailer.set("Size", Object::Integer(i64::from(state.registry().objects_count())));
    trailer.set("Root", root);
    state.write_trailer_dictionary(&trailer)?;
    state.write_startxref(xref_position)?;
    state.write_eof()?;
    state.flush()?;
    Ok(state.into_inner())
}

/// Restore `context` from a file written by [`write_state_file`].
pub fn read_state_file<W: Write>(
    context: &mut DocumentContext<W>,
    path: impl AsRef<Path>,
) -> Result<()> {
    let snapshot = PdfReader::open(path)?;
    let root = snapshot.trailer().get_reference("Root").ok_or_else(|| {
        PdfError::ConsistencyFault("state file trailer has no Root".to_string())
    })?;
    context.read_state(&snapshot, root)
}

fn rebuild_node(
    source: &dyn SourceDocument,
    dict: &Dictionary,
    tree: &mut PageTree,
    index: NodeIndex,
    by_state: &mut HashMap<ObjectId, NodeIndex>,
) -> Result<()> {
    if is_leaf_parent(dict)? {
        for kid in dict.get_array("Kids").map(Vec::as_slice).unwrap_or_default() {
            tree.push_page(index, reference_from_state(kid)?)?;
        }
        return Ok(());
    }

    for kid in dict.get_array("KidNodes").map(Vec::as_slice).unwrap_or_default() {
        let state = kid.as_reference().ok_or_else(|| {
            PdfError::ConsistencyFault("page tree kid node is not a reference".to_string())
        })?;
        let child_dict = state_dict(source, state, "PageTree")?;
        let child = tree.add_child_node(index, node_id(&child_dict)?, is_leaf_parent(&child_dict)?)?;
        by_state.insert(state, child);
        rebuild_node(source, &child_dict, tree, child, by_state)?;
    }
    Ok(())
}

fn node_id(dict: &Dictionary) -> Result<ObjectId> {
    let number = required_integer(dict, "NodeID")?;
    let generation = dict.get_integer("NodeGeneration").unwrap_or(0);
    Ok(ObjectId::new(
        u32::try_from(number).map_err(|_| invalid_value("NodeID"))?,
        u16::try_from(generation).map_err(|_| invalid_value("NodeGeneration"))?,
    ))
}

fn is_leaf_parent(dict: &Dictionary) -> Result<bool> {
    dict.get_bool("IsLeafParent")
        .ok_or_else(|| missing_key("IsLeafParent"))
}

fn state_dict(source: &dyn SourceDocument, id: ObjectId, type_name: &str) -> Result<Dictionary> {
    let object = source.parse_object(id.number())?;
    match object {
        Object::Dictionary(dict) if dict.get_name("Type") == Some(type_name) => Ok(dict),
        _ => Err(PdfError::ConsistencyFault(format!(
            "state object {id} is not a {type_name}"
        ))),
    }
}

fn reference_state(id: ObjectId) -> Object {
    let mut dict = Dictionary::new();
    dict.set("ObjectID", Object::Integer(i64::from(id.number())));
    dict.set("GenerationNumber", Object::Integer(i64::from(id.generation())));
    Object::Dictionary(dict)
}

fn reference_from_state(object: &Object) -> Result<ObjectId> {
    let dict = object
        .as_dict()
        .ok_or_else(|| PdfError::ConsistencyFault("reference state is not a dictionary".to_string()))?;
    let number = required_integer(dict, "ObjectID")?;
    let generation = required_integer(dict, "GenerationNumber")?;
    Ok(ObjectId::new(
        u32::try_from(number).map_err(|_| invalid_value("ObjectID"))?,
        u16::try_from(generation).map_err(|_| invalid_value("GenerationNumber"))?,
    ))
}

fn optional_reference(dict: &Dictionary, key: &str) -> Result<Option<ObjectId>> {
    dict.get(key).map(reference_from_state).transpose()
}

fn required_reference(dict: &Dictionary, key: &str) -> Result<ObjectId> {
    dict.get_reference(key).ok_or_else(|| missing_key(key))
}

fn required_integer(dict: &Dictionary, key: &str) -> Result<i64> {
    dict.get_integer(key).ok_or_else(|| missing_key(key))
}

fn missing_key(key: &str) -> PdfError {
    PdfError::ConsistencyFault(format!("state object lacks {key}"))
}

fn invalid_value(key: &str) -> PdfError {
    PdfError::ConsistencyFault(format!("state value {key} is out of range"))
}

fn info_state(info: &InfoDictionary) -> Dictionary {
    let mut dict = Dictionary::typed("InfoDictionary");
    for (key, value) in info.text_fields() {
        if let Some(value) = value {
            dict.set(key, Object::text(value));
        }
    }
    if let Some(date) = &info.creation_date {
        dict.set("CreationDate", date_state(date));
    }
    if let Some(date) = &info.mod_date {
        dict.set("ModDate", date_state(date));
    }
    let trapped = match info.trapped {
        Trapped::Unknown => 0,
        Trapped::True => 1,
        Trapped::False => 2,
    };
    dict.set("Trapped", Object::Integer(trapped));

    let additional: Dictionary = info
        .additional_entries()
        .map(|(key, value)| (key.to_string(), Object::text(value)))
        .collect();
    dict.set("Additional", additional);
    dict
}

fn info_from_state(dict: &Dictionary) -> Result<InfoDictionary> {
    let mut info = InfoDictionary::new();
    info.title = dict.get_text("Title");
    info.author = dict.get_text("Author");
    info.subject = dict.get_text("Subject");
    info.keywords = dict.get_text("Keywords");
    info.creator = dict.get_text("Creator");
    info.producer = dict.get_text("Producer");
    info.creation_date = dict.get_dict("CreationDate").map(date_from_state).transpose()?;
    info.mod_date = dict.get_dict("ModDate").map(date_from_state).transpose()?;
    info.trapped = match dict.get_integer("Trapped") {
        Some(1) => Trapped::True,
        Some(2) => Trapped::False,
        _ => Trapped::Unknown,
    };
    if let Some(additional) = dict.get_dict("Additional") {
        for (key, value) in additional.iter() {
            if let Some(text) = value.as_text() {
                info.add_additional_info_entry(key.clone(), text);
            }
        }
    }
    Ok(info)
}

/// `UTC` is 0 for UTC, 1 for ahead of UTC and 2 for behind.
fn date_state(date: &DateTime<FixedOffset>) -> Object {
    let offset = date.offset().local_minus_utc();
    let minutes = offset.abs() / 60;

    let mut dict = Dictionary::typed("Date");
    dict.set("Year", Object::Integer(i64::from(date.year())));
    dict.set("Month", Object::Integer(i64::from(date.month())));
    dict.set("Day", Object::Integer(i64::from(date.day())));
    dict.set("Hour", Object::Integer(i64::from(date.hour())));
    dict.set("Minute", Object::Integer(i64::from(date.minute())));
    dict.set("Second", Object::Integer(i64::from(date.second())));
    dict.set(
        "UTC",
        Object::Integer(match offset {
            0 => 0,
            o if o > 0 => 1,
            _ => 2,
        }),
    );
    dict.set("HourFromUTC", Object::Integer(i64::from(minutes / 60)));
    dict.set("MinuteFromUTC", Object::Integer(i64::from(minutes % 60)));
    Object::Dictionary(dict)
}

fn date_from_state(dict: &Dictionary) -> Result<DateTime<FixedOffset>> {
    let field = |key: &str| -> Result<u32> {
        u32::try_from(required_integer(dict, key)?).map_err(|_| invalid_value(key))
    };
    let year = i32::try_from(required_integer(dict, "Year")?).map_err(|_| invalid_value("Year"))?;

    let magnitude = (field("HourFromUTC")? * 3600 + field("MinuteFromUTC")? * 60) as i32;
    let offset_seconds = match dict.get_integer("UTC") {
        Some(2) => -magnitude,
        Some(1) => magnitude,
        _ => 0,
    };
    let offset = FixedOffset::east_opt(offset_seconds).ok_or_else(|| invalid_value("HourFromUTC"))?;

    let naive = NaiveDate::from_ymd_opt(year, field("Month")?, field("Day")?)
        .and_then(|date| date.and_hms_opt(field("Hour").ok()?, field("Minute").ok()?, field("Second").ok()?))
        .ok_or_else(|| invalid_value("Date"))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| invalid_value("Date"))
}

fn write_registry_state(
    sink: &mut dyn ObjectSink,
    id: ObjectId,
    state: &RegistryState,
) -> Result<()> {
    let mut offsets = Vec::with_capacity(state.written.len() * 3);
    for (object, offset) in &state.written {
        offsets.push(Object::Integer(i64::from(object.number())));
        offsets.push(Object::Integer(i64::from(object.generation())));
        offsets.push(Object::Integer(*offset as i64));
    }

    let mut dict = Dictionary::typed("ObjectRegistry");
    dict.set("NextObjectNumber", Object::Integer(i64::from(state.next_number)));
    dict.set("Position", Object::Integer(state.position as i64));
    dict.set("Offsets", Object::Array(offsets));
    sink.write_indirect(id, &Object::Dictionary(dict))
}

fn read_registry_state(source: &dyn SourceDocument, id: ObjectId) -> Result<RegistryState> {
    let dict = state_dict(source, id, "ObjectRegistry")?;
    let next_number = u32::try_from(required_integer(&dict, "NextObjectNumber")?)
        .map_err(|_| invalid_value("NextObjectNumber"))?;
    let position = u64::try_from(required_integer(&dict, "Position")?)
        .map_err(|_| invalid_value("Position"))?;

    let values = dict
        .get_array("Offsets")
        .ok_or_else(|| missing_key("Offsets"))?
        .iter()
        .map(|value| value.as_integer().ok_or_else(|| invalid_value("Offsets")))
        .collect::<Result<Vec<_>>>()?;
    if values.len() % 3 != 0 {
        return Err(invalid_value("Offsets"));
    }
    let written = values
        .chunks_exact(3)
        .map(|entry| {
            let number = u32::try_from(entry[0]).map_err(|_| invalid_value("Offsets"))?;
            let generation = u16::try_from(entry[1]).map_err(|_| invalid_value("Offsets"))?;
            let offset = u64::try_from(entry[2]).map_err(|_| invalid_value("Offsets"))?;
            Ok((ObjectId::new(number, generation), offset))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RegistryState {
        next_number,
        position,
        written,
    })
}
