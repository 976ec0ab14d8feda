//! Page tree construction and bottom-up emission.
//!
//! Nodes live in an arena and are addressed by [`NodeIndex`]. A node either
//! holds page object IDs directly (a leaf parent) or owns child nodes. Parent
//! links are plain indices, so there is no shared ownership anywhere.

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::writer::{IndirectObjectRegistry, ObjectSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum PageTreeKids {
    Pages(Vec<ObjectId>),
    Nodes(Vec<NodeIndex>),
}

#[derive(Debug, Clone)]
pub struct PageTreeNode {
    id: ObjectId,
    parent: Option<NodeIndex>,
    kids: PageTreeKids,
}

impl PageTreeNode {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    pub fn kids(&self) -> &PageTreeKids {
        &self.kids
    }

    pub fn is_leaf_parent(&self) -> bool {
        matches!(self.kids, PageTreeKids::Pages(_))
    }

    fn kids_len(&self) -> usize {
        match &self.kids {
            PageTreeKids::Pages(pages) => pages.len(),
            PageTreeKids::Nodes(nodes) => nodes.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageTree {
    nodes: Vec<PageTreeNode>,
    root: NodeIndex,
    max_kids: usize,
}

impl PageTree {
    /// Tree with a single empty leaf parent as root
    pub fn new(root_id: ObjectId, max_kids: usize) -> Self {
        Self::with_root(root_id, true, max_kids)
    }

    pub fn with_root(root_id: ObjectId, is_leaf_parent: bool, max_kids: usize) -> Self {
        Self {
            nodes: vec![PageTreeNode {
                id: root_id,
                parent: None,
                kids: empty_kids(is_leaf_parent),
            }],
            root: NodeIndex(0),
            max_kids: max_kids.max(2),
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn root_id(&self) -> ObjectId {
        self.nodes[self.root.0].id
    }

    pub fn max_kids(&self) -> usize {
        self.max_kids
    }

    pub fn node(&self, index: NodeIndex) -> &PageTreeNode {
        &self.nodes[index.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count(self.root) == 0
    }

    pub fn find_by_id(&self, id: ObjectId) -> Option<NodeIndex> {
        self.nodes.iter().position(|n| n.id == id).map(NodeIndex)
    }

    /// Number of pages reachable beneath `index`
    pub fn leaf_count(&self, index: NodeIndex) -> u64 {
        match &self.nodes[index.0].kids {
            PageTreeKids::Pages(pages) => pages.len() as u64,
            PageTreeKids::Nodes(nodes) => nodes.iter().map(|n| self.leaf_count(*n)).sum(),
        }
    }

    /// Depth-first, parents before their children
    pub fn preorder(&self) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            order.push(index);
            if let PageTreeKids::Nodes(nodes) = &self.nodes[index.0].kids {
                stack.extend(nodes.iter().rev().copied());
            }
        }
        order
    }

    /// Append a page under the leaf parent `at`, growing the tree when full.
    ///
    /// Returns the leaf parent that received the page. New nodes take their
    /// identities from `registry`.
    pub fn add_page(
        &mut self,
        at: NodeIndex,
        page_id: ObjectId,
        registry: &mut IndirectObjectRegistry,
    ) -> Result<NodeIndex> {
        let node = &self.nodes[at.0];
        if !node.is_leaf_parent() {
            return Err(PdfError::InvalidStructure(format!(
                "page tree node {} holds nodes, pages cannot be added to it",
                node.id
            )));
        }

        if node.kids_len() < self.max_kids {
            self.push_page(at, page_id)?;
            return Ok(at);
        }

        let leaf = self.push_node(registry.allocate(), PageTreeKids::Pages(vec![page_id]));
        self.attach_sibling(at, leaf, registry);
        Ok(leaf)
    }

    /// Place `new` next to `node`, overflowing upwards and growing a new
    /// root when the top is full.
    fn attach_sibling(
        &mut self,
        node: NodeIndex,
        new: NodeIndex,
        registry: &mut IndirectObjectRegistry,
    ) {
        match self.nodes[node.0].parent {
            Some(parent) if self.nodes[parent.0].kids_len() < self.max_kids => {
                self.link(parent, new);
            }
            Some(parent) => {
                let holder = self.push_node(registry.allocate(), PageTreeKids::Nodes(Vec::new()));
                self.link(holder, new);
                self.attach_sibling(parent, holder, registry);
            }
            None => {
                let root = self.push_node(registry.allocate(), PageTreeKids::Nodes(Vec::new()));
                self.link(root, node);
                self.link(root, new);
                self.root = root;
            }
        }
    }

    fn push_node(&mut self, id: ObjectId, kids: PageTreeKids) -> NodeIndex {
        self.nodes.push(PageTreeNode {
            id,
            parent: None,
            kids,
        });
        NodeIndex(self.nodes.len() - 1)
    }

    fn link(&mut self, parent: NodeIndex, child: NodeIndex) {
        if let PageTreeKids::Nodes(nodes) = &mut self.nodes[parent.0].kids {
            nodes.push(child);
        }
        self.nodes[child.0].parent = Some(parent);
    }

    /// Rebuild support: attach a new node under `parent` without fan-out checks
    pub fn add_child_node(
        &mut self,
        parent: NodeIndex,
        id: ObjectId,
        is_leaf_parent: bool,
    ) -> Result<NodeIndex> {
        if self.nodes[parent.0].is_leaf_parent() {
            return Err(PdfError::InvalidStructure(format!(
                "page tree node {} is a leaf parent and cannot own nodes",
                self.nodes[parent.0].id
            )));
        }
        let child = self.push_node(id, empty_kids(is_leaf_parent));
        self.link(parent, child);
        Ok(child)
    }

    /// Rebuild support: append a page ID without fan-out checks
    pub fn push_page(&mut self, leaf: NodeIndex, page_id: ObjectId) -> Result<()> {
        match &mut self.nodes[leaf.0].kids {
            PageTreeKids::Pages(pages) => {
                pages.push(page_id);
                Ok(())
            }
            PageTreeKids::Nodes(_) => Err(PdfError::InvalidStructure(format!(
                "page tree node {} does not hold pages",
                self.nodes[leaf.0].id
            ))),
        }
    }
}

fn empty_kids(is_leaf_parent: bool) -> PageTreeKids {
    if is_leaf_parent {
        PageTreeKids::Pages(Vec::new())
    } else {
        PageTreeKids::Nodes(Vec::new())
    }
}

/// Write the subtree under `index`, children before their parent.
///
/// `parent` becomes the `Parent` entry of the node at `index`; nested nodes
/// point at their arena parent. Returns the number of pages written beneath.
pub fn write_page_tree(
    sink: &mut dyn ObjectSink,
    tree: &PageTree,
    index: NodeIndex,
    parent: Option<ObjectId>,
) -> Result<u64> {
    let node = tree.node(index);

    let (count, kids) = match node.kids() {
        PageTreeKids::Pages(pages) => (
            pages.len() as u64,
            pages.iter().map(|id| Object::Reference(*id)).collect(),
        ),
        PageTreeKids::Nodes(children) => {
            let mut count = 0;
            let mut kids = Vec::with_capacity(children.len());
            for child in children {
                count += write_page_tree(sink, tree, *child, Some(node.id()))?;
                kids.push(Object::Reference(tree.node(*child).id()));
            }
            (count, kids)
        }
    };

    let mut dict = Dictionary::typed("Pages");
    if let Some(parent) = parent {
        dict.set("Parent", parent);
    }
    dict.set("Kids", Object::Array(kids));
    dict.set("Count", Object::Integer(count as i64));

    sink.write_indirect(node.id(), &Object::Dictionary(dict))?;
    Ok(count)
}
