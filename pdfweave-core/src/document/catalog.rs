use super::extension::ExtensionSet;
use super::page_tree::{NodeIndex, PageTree};
use crate::error::Result;
use crate::objects::{Dictionary, Object, ObjectId};
use crate::writer::{IndirectObjectRegistry, ObjectSink};
use tracing::debug;

/// Session-wide catalog state: the page tree and the node new pages go to.
#[derive(Debug, Clone)]
pub struct CatalogInformation {
    page_tree: Option<PageTree>,
    current: Option<NodeIndex>,
    max_kids: usize,
}

impl CatalogInformation {
    pub fn new(max_kids: usize) -> Self {
        Self {
            page_tree: None,
            current: None,
            max_kids,
        }
    }

    pub fn page_tree(&self) -> Option<&PageTree> {
        self.page_tree.as_ref()
    }

    /// The tree, created with an empty root on first use.
    pub fn page_tree_root(&mut self, registry: &mut IndirectObjectRegistry) -> &mut PageTree {
        let max_kids = self.max_kids;
        self.page_tree
            .get_or_insert_with(|| PageTree::new(registry.allocate(), max_kids))
    }

    pub fn current_node(&self) -> Option<NodeIndex> {
        self.current
    }

    pub fn current_node_id(&self) -> Option<ObjectId> {
        let tree = self.page_tree.as_ref()?;
        self.current.map(|index| tree.node(index).id())
    }

    /// At least one page was added during this session
    pub fn has_pages(&self) -> bool {
        self.page_tree.as_ref().is_some_and(|tree| !tree.is_empty())
    }

    pub fn page_count(&self) -> u64 {
        self.page_tree
            .as_ref()
            .map(|tree| tree.leaf_count(tree.root()))
            .unwrap_or(0)
    }

    /// Register `page_id` in the tree and return the ID of its parent node.
    pub fn add_page_to_page_tree(
        &mut self,
        page_id: ObjectId,
        registry: &mut IndirectObjectRegistry,
    ) -> Result<ObjectId> {
        let current = self.current;
        let tree = self.page_tree_root(registry);
        let at = current.unwrap_or_else(|| tree.root());
        let leaf = tree.add_page(at, page_id, registry)?;
        let parent = tree.node(leaf).id();
        self.current = Some(leaf);
        Ok(parent)
    }

    /// Replace the tree with one rebuilt from a checkpoint
    pub fn restore(&mut self, page_tree: Option<PageTree>, current: Option<NodeIndex>) {
        self.page_tree = page_tree;
        self.current = current;
    }

    pub fn reset(&mut self) {
        self.page_tree = None;
        self.current = None;
    }
}

/// Frame the catalog object and return its identity.
///
/// Extensions run in registration order and may add keys; the first
/// failure aborts the write before anything is framed.
pub fn write_catalog(
    sink: &mut dyn ObjectSink,
    catalog: &CatalogInformation,
    pages: Option<ObjectId>,
    extensions: &mut ExtensionSet,
) -> Result<ObjectId> {
    let mut dict = Dictionary::typed("Catalog");
    if let Some(pages) = pages {
        dict.set("Pages", pages);
    }

    extensions.on_catalog_write(catalog, &mut dict, sink)?;

    let id = sink.write_new(&Object::Dictionary(dict))?;
    debug!(catalog = %id, "wrote catalog");
    Ok(id)
}
