//! Ordered n-ary tree with parent links, depth tracking and pruning.
//!
//! Nodes live in an arena owned by [`Tree`] and are addressed by [`NodeId`].
//! Children keep their insertion order and are keyed by the display form of
//! their value, so two siblings can never share a key. A node without a value
//! is a placeholder: traversal and rendering skip it.

use std::fmt;

/// Key carried by placeholder nodes.
pub const PLACEHOLDER_KEY: &str = "nil";

/// Id of the root node of every tree.
const ROOT: NodeId = NodeId(0);

/// Handle to a node inside a [`Tree`].
///
/// Ids are only meaningful for the tree that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Node<V> {
    value: Option<V>,
    key: String,
    parent: Option<NodeId>,
    depth: usize,
    children: Vec<NodeId>,
}

/// Nested-list form of a tree, used to build trees from literals and to
/// compare them structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nested<V> {
    /// A placeholder node.
    Nil,
    /// A node with a value and ordered children.
    Node { value: V, children: Vec<Nested<V>> },
}

impl<V> Nested<V> {
    /// A node with the given children.
    #[must_use]
    pub fn node(value: V, children: Vec<Nested<V>>) -> Self {
        Self::Node { value, children }
    }

    /// A node without children.
    #[must_use]
    pub fn leaf(value: V) -> Self {
        Self::Node {
            value,
            children: Vec::new(),
        }
    }
}

/// Ordered tree of values.
#[derive(Debug, Clone)]
pub struct Tree<V> {
    nodes: Vec<Node<V>>,
}

impl<V> Default for Tree<V> {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl<V> Tree<V> {
    /// Create a tree whose root is a placeholder.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::with_root(None, PLACEHOLDER_KEY.to_string())
    }

    fn with_root(value: Option<V>, key: String) -> Self {
        Self {
            nodes: vec![Node {
                value,
                key,
                parent: None,
                depth: 0,
                children: Vec::new(),
            }],
        }
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// Value stored at `id`, `None` for placeholders.
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<&V> {
        self.nodes[id.0].value.as_ref()
    }

    #[must_use]
    pub fn key(&self, id: NodeId) -> &str {
        &self.nodes[id.0].key
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    #[must_use]
    pub fn depth(&self, id: NodeId) -> usize {
        self.nodes[id.0].depth
    }

    #[must_use]
    pub fn is_placeholder(&self, id: NodeId) -> bool {
        self.nodes[id.0].value.is_none()
    }

    /// Children of `id` in insertion order, placeholders included.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.0].children.iter().copied()
    }

    /// Child of `id` with the given key.
    #[must_use]
    pub fn child(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.children(id).find(|c| self.nodes[c.0].key == key)
    }

    /// Walk up `k` parent links from `id`, stopping at the topmost node.
    #[must_use]
    pub fn ascend(&self, id: NodeId, k: usize) -> NodeId {
        let mut current = id;
        for _ in 0..k {
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Depth-first pre-order traversal from the root.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, V> {
        self.descendants(ROOT)
    }

    /// Depth-first pre-order traversal from `id`.
    ///
    /// `id` itself is yielded unless it is a placeholder; placeholder
    /// children are skipped together with their subtrees.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Iter<'_, V> {
        Iter {
            tree: self,
            stack: vec![id],
        }
    }

    /// Values in traversal order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().filter_map(|id| self.value(id))
    }

    /// Number of visited (non-placeholder) nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Graft `subtree` under `parent`, keeping its structure.
    ///
    /// Depths of every grafted node are recomputed relative to `parent`.
    pub fn add_tree(&mut self, parent: NodeId, mut subtree: Tree<V>) -> NodeId {
        let value = subtree.nodes[ROOT.0].value.take();
        let key = std::mem::take(&mut subtree.nodes[ROOT.0].key);
        let id = self.attach(parent, value, key);
        subtree.move_children(ROOT, self, id);
        id
    }

    /// Split the tree into one tree per root child, dropping the root.
    #[must_use]
    pub fn into_children(mut self) -> Vec<Tree<V>> {
        let children = std::mem::take(&mut self.nodes[ROOT.0].children);
        children
            .into_iter()
            .map(|child| {
                let value = self.nodes[child.0].value.take();
                let key = std::mem::take(&mut self.nodes[child.0].key);
                let mut out = Tree::with_root(value, key);
                self.move_children(child, &mut out, ROOT);
                out
            })
            .collect()
    }

    /// Remove every node with fewer than `threshold` children.
    ///
    /// Nodes are checked top-down; a removed node takes its subtree with it.
    /// The walk does not descend below `max_depth`. The root is never removed.
    pub fn prune(&mut self, max_depth: usize, threshold: usize) {
        if self.nodes[ROOT.0].depth >= max_depth {
            return;
        }
        for child in self.nodes[ROOT.0].children.clone() {
            self.prune_at(child, max_depth, threshold);
        }
    }

    fn prune_at(&mut self, id: NodeId, max_depth: usize, threshold: usize) {
        if self.nodes[id.0].children.len() < threshold {
            tracing::debug!(key = %self.nodes[id.0].key, "Pruning node");
            self.detach(id);
            return;
        }
        if self.nodes[id.0].depth < max_depth {
            for child in self.nodes[id.0].children.clone() {
                self.prune_at(child, max_depth, threshold);
            }
        }
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    fn attach(&mut self, parent: NodeId, value: Option<V>, key: String) -> NodeId {
        let id = NodeId(self.nodes.len());
        let depth = self.nodes[parent.0].depth + 1;
        let existing = self.child(parent, &key);

        self.nodes.push(Node {
            value,
            key,
            parent: Some(parent),
            depth,
            children: Vec::new(),
        });

        match existing {
            Some(old) => {
                tracing::debug!(key = %self.nodes[id.0].key, "Replacing sibling with identical key");
                self.nodes[old.0].parent = None;
                let siblings = &mut self.nodes[parent.0].children;
                if let Some(slot) = siblings.iter_mut().find(|c| **c == old) {
                    *slot = id;
                }
            }
            None => self.nodes[parent.0].children.push(id),
        }
        id
    }

    fn move_children(&mut self, from: NodeId, dest: &mut Tree<V>, dest_parent: NodeId) {
        let children = std::mem::take(&mut self.nodes[from.0].children);
        for child in children {
            let value = self.nodes[child.0].value.take();
            let key = std::mem::take(&mut self.nodes[child.0].key);
            let id = dest.attach(dest_parent, value, key);
            self.move_children(child, dest, id);
        }
    }
}

impl<V: fmt::Display> Tree<V> {
    /// Create a tree with a single root node.
    #[must_use]
    pub fn new(value: V) -> Self {
        let key = value.to_string();
        Self::with_root(Some(value), key)
    }

    /// Append `value` as the last child of `parent` and return its id.
    ///
    /// A sibling with the same key is replaced in place.
    pub fn add(&mut self, parent: NodeId, value: V) -> NodeId {
        let key = value.to_string();
        self.attach(parent, Some(value), key)
    }

    /// Build a tree from its nested-list form.
    #[must_use]
    pub fn from_nested(nested: Nested<V>) -> Self {
        match nested {
            Nested::Nil => Self::placeholder(),
            Nested::Node { value, children } => {
                let mut tree = Self::new(value);
                for child in children {
                    tree.add_nested(ROOT, child);
                }
                tree
            }
        }
    }

    fn add_nested(&mut self, parent: NodeId, nested: Nested<V>) {
        match nested {
            Nested::Nil => {
                self.attach(parent, None, PLACEHOLDER_KEY.to_string());
            }
            Nested::Node { value, children } => {
                let id = self.add(parent, value);
                for child in children {
                    self.add_nested(id, child);
                }
            }
        }
    }

    /// Render the subtree at `id`, one `+-- value` line per visited node,
    /// indented by four spaces per level below `id`.
    #[must_use]
    pub fn render(&self, id: NodeId) -> String {
        let base = self.depth(id);
        let mut out = String::new();
        for node in self.descendants(id) {
            if let Some(value) = self.value(node) {
                let indent = "    ".repeat(self.depth(node).saturating_sub(base));
                out.push_str(&format!("{indent}+-- {value}\n"));
            }
        }
        out
    }
}

impl<V: Clone> Tree<V> {
    /// Convert back to nested-list form.
    #[must_use]
    pub fn to_nested(&self) -> Nested<V> {
        self.nested_at(ROOT)
    }

    fn nested_at(&self, id: NodeId) -> Nested<V> {
        match &self.nodes[id.0].value {
            None => Nested::Nil,
            Some(value) => Nested::Node {
                value: value.clone(),
                children: self.children(id).map(|c| self.nested_at(c)).collect(),
            },
        }
    }
}

impl<V: fmt::Display> fmt::Display for Tree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(ROOT))
    }
}

/// Pre-order iterator over node ids.
pub struct Iter<'t, V> {
    tree: &'t Tree<V>,
    stack: Vec<NodeId>,
}

impl<V> Iterator for Iter<'_, V> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let nodes = &self.tree.nodes;
        loop {
            let id = self.stack.pop()?;
            let node = &nodes[id.0];
            self.stack.extend(
                node.children
                    .iter()
                    .rev()
                    .filter(|c| nodes[c.0].value.is_some())
                    .copied(),
            );
            if node.value.is_some() {
                return Some(id);
            }
        }
    }
}
