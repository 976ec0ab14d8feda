//! Resource dictionaries and their serialization.

use super::extension::ExtensionSet;
use super::tasks::{DeferredTasks, ResourceTaskKey};
use crate::error::Result;
use crate::objects::{Dictionary, Object, ObjectId};
use crate::writer::ObjectSink;
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Resource categories, in the order they are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceCategory {
    XObject,
    ExtGState,
    Font,
    ColorSpace,
    Pattern,
    Shading,
    Properties,
}

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 7] = [
        ResourceCategory::XObject,
        ResourceCategory::ExtGState,
        ResourceCategory::Font,
        ResourceCategory::ColorSpace,
        ResourceCategory::Pattern,
        ResourceCategory::Shading,
        ResourceCategory::Properties,
    ];

    /// Key of the category sub-dictionary
    pub fn key(self) -> &'static str {
        match self {
            ResourceCategory::XObject => "XObject",
            ResourceCategory::ExtGState => "ExtGState",
            ResourceCategory::Font => "Font",
            ResourceCategory::ColorSpace => "ColorSpace",
            ResourceCategory::Pattern => "Pattern",
            ResourceCategory::Shading => "Shading",
            ResourceCategory::Properties => "Properties",
        }
    }

    /// Prefix of generated resource names
    pub fn prefix(self) -> &'static str {
        match self {
            ResourceCategory::XObject => "Fm",
            ResourceCategory::ExtGState => "GS",
            ResourceCategory::Font => "F",
            ResourceCategory::ColorSpace => "CS",
            ResourceCategory::Pattern => "Pt",
            ResourceCategory::Shading => "Sh",
            ResourceCategory::Properties => "Prop",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

static NEXT_RESOURCES_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`ResourcesDictionary`], used to key deferred tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourcesId(u64);

impl ResourcesId {
    fn next() -> Self {
        ResourcesId(NEXT_RESOURCES_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
struct CategoryNames {
    bound: IndexMap<ObjectId, String>,
    next_index: u32,
}

impl CategoryNames {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next_index += 1;
        format!("{prefix}{}", self.next_index)
    }
}

/// Resources of a page or form: named object bindings per category plus
/// the procedure sets.
///
/// Every instance has its own identity; it is not `Clone` so that two
/// dictionaries never share a task queue.
#[derive(Debug)]
pub struct ResourcesDictionary {
    id: ResourcesId,
    proc_sets: IndexSet<String>,
    categories: [CategoryNames; 7],
}

impl ResourcesDictionary {
    pub fn new() -> Self {
        Self {
            id: ResourcesId::next(),
            proc_sets: IndexSet::new(),
            categories: Default::default(),
        }
    }

    pub fn id(&self) -> ResourcesId {
        self.id
    }

    pub fn add_proc_set(&mut self, name: impl Into<String>) {
        self.proc_sets.insert(name.into());
    }

    pub fn proc_sets(&self) -> impl Iterator<Item = &str> {
        self.proc_sets.iter().map(String::as_str)
    }

    /// Name bound to `object`, allocating one on first use
    pub fn add_mapping(&mut self, category: ResourceCategory, object: ObjectId) -> String {
        let names = &mut self.categories[category.slot()];
        if let Some(name) = names.bound.get(&object) {
            return name.clone();
        }
        let name = names.allocate(category.prefix());
        names.bound.insert(object, name.clone());
        name
    }

    /// A fresh name with no object behind it yet
    pub fn allocate_placeholder(&mut self, category: ResourceCategory) -> String {
        self.categories[category.slot()].allocate(category.prefix())
    }

    pub fn mapping(&self, category: ResourceCategory, object: ObjectId) -> Option<&str> {
        self.categories[category.slot()]
            .bound
            .get(&object)
            .map(String::as_str)
    }

    /// Bound names of `category` in allocation order
    pub fn mappings(&self, category: ResourceCategory) -> impl Iterator<Item = (&str, ObjectId)> {
        self.categories[category.slot()]
            .bound
            .iter()
            .map(|(id, name)| (name.as_str(), *id))
    }

    pub fn has_mappings(&self, category: ResourceCategory) -> bool {
        !self.categories[category.slot()].bound.is_empty()
    }

    pub fn add_font_mapping(&mut self, font: ObjectId) -> String {
        self.add_mapping(ResourceCategory::Font, font)
    }

    pub fn add_xobject_mapping(&mut self, xobject: ObjectId) -> String {
        self.add_mapping(ResourceCategory::XObject, xobject)
    }

    pub fn add_ext_gstate_mapping(&mut self, state: ObjectId) -> String {
        self.add_mapping(ResourceCategory::ExtGState, state)
    }
}

impl Default for ResourcesDictionary {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the resources dictionary, flushing deferred tasks per category.
///
/// A category is emitted when it has bound names or queued tasks. Bound
/// names go first, then the queued tasks, then the per-category extension
/// hook. Any failure aborts the whole dictionary.
pub fn write_resources_dictionary(
    resources: &ResourcesDictionary,
    tasks: &mut DeferredTasks,
    extensions: &mut ExtensionSet,
    sink: &mut dyn ObjectSink,
) -> Result<Dictionary> {
    let mut dict = Dictionary::new();

    if !resources.proc_sets.is_empty() {
        let proc_sets = resources.proc_sets().map(Object::name).collect::<Vec<_>>();
        dict.set("ProcSet", Object::Array(proc_sets));
    }

    for category in ResourceCategory::ALL {
        let key = ResourceTaskKey::new(resources.id(), category);
        if !resources.has_mappings(category) && !tasks.has_resource_tasks(key) {
            continue;
        }

        let mut category_dict = Dictionary::new();
        for (name, id) in resources.mappings(category) {
            category_dict.set(name, id);
        }
        tasks.flush_resource_tasks(key, &mut category_dict, sink)?;
        extensions.on_resource_dictionary_write(category, &mut category_dict, sink)?;

        dict.set(category.key(), category_dict);
    }

    extensions.on_resources_write(resources, &mut dict, sink)?;
    Ok(dict)
}
