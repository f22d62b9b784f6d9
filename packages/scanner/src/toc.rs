//! Table-of-contents extraction.
//!
//! The front matter of a manual lists, per peripheral, every register with
//! its offset and the page describing it. Two levels are enough to recover
//! that: peripheral headings and register rows below them.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use regscan_tree::{Level, NodeId, Step, Tree, TreeBuilder};

use crate::error::{Result, ScanError};
use crate::types::{Device, Peripheral, RegNode, RegisterEntry};

/// Device tree built from the table of contents, with a cursor over its
/// registers.
#[derive(Debug)]
pub struct TableOfContents {
    tree: Tree<RegNode>,
    extras: BTreeMap<String, Vec<RegisterEntry>>,
    pending: Vec<NodeId>,
    extended: HashSet<NodeId>,
}

impl TableOfContents {
    /// Scan `text` for peripheral headings (`section`) and register rows
    /// (`register`).
    ///
    /// `extras` lists registers missing from the text, per peripheral name;
    /// they are added when iteration reaches their peripheral.
    pub fn build(
        device: &str,
        text: &str,
        section: &Regex,
        register: &Regex,
        extras: BTreeMap<String, Vec<RegisterEntry>>,
    ) -> Result<Self> {
        let levels = vec![
            Level::new(section.clone(), |_, caps| {
                let peripheral = Peripheral::from_captures(caps)?;
                tracing::debug!(peripheral = %peripheral.name, "Peripheral");
                Ok::<_, ScanError>(Step::node(RegNode::Peripheral(peripheral)))
            }),
            Level::new(register.clone(), |_, caps| {
                let entry = RegisterEntry::from_captures(caps)?;
                tracing::debug!(register = %entry.name, page = entry.page, "Register");
                Ok(Step::node(RegNode::Register(entry)))
            }),
        ];

        let root = Tree::new(RegNode::Device(Device::new(device)));
        let mut builder: TreeBuilder<'_, (), RegNode, ScanError> = TreeBuilder::new(root, levels);
        builder.build(text)?;

        Ok(Self::from_tree(builder.into_tree(), extras))
    }

    /// Wrap an already built device tree.
    #[must_use]
    pub fn from_tree(tree: Tree<RegNode>, extras: BTreeMap<String, Vec<RegisterEntry>>) -> Self {
        let mut toc = Self {
            tree,
            extras,
            pending: Vec::new(),
            extended: HashSet::new(),
        };
        toc.rewind();
        toc
    }

    /// Restart iteration from the first register.
    pub fn rewind(&mut self) {
        self.pending = vec![self.tree.root()];
    }

    /// Next register in document order.
    ///
    /// Reaching a peripheral for the first time appends its configured extra
    /// registers as its last children; those are yielded like scanned ones.
    /// Nodes added under a register after it was yielded are not visited.
    pub fn next_register(&mut self) -> Option<NodeId> {
        while let Some(id) = self.pending.pop() {
            let peripheral = match self.tree.value(id) {
                Some(RegNode::Register(_)) => return Some(id),
                Some(RegNode::Peripheral(p)) => Some(p.name.clone()),
                _ => None,
            };
            if let Some(name) = peripheral.filter(|_| self.extended.insert(id)) {
                for entry in self.extras.get(&name).cloned().unwrap_or_default() {
                    tracing::debug!(register = %entry.name, "Adding configured register");
                    self.tree.add(id, RegNode::Register(entry));
                }
            }
            let children: Vec<NodeId> = self
                .tree
                .children(id)
                .filter(|c| !self.tree.is_placeholder(*c))
                .collect();
            self.pending.extend(children.into_iter().rev());
        }
        None
    }

    /// Register stored at `id`.
    #[must_use]
    pub fn register(&self, id: NodeId) -> Option<&RegisterEntry> {
        self.tree.value(id).and_then(RegNode::as_register)
    }

    /// Number of registers currently in the tree.
    #[must_use]
    pub fn register_count(&self) -> usize {
        self.tree
            .values()
            .filter(|v| matches!(v, RegNode::Register(_)))
            .count()
    }

    #[must_use]
    pub fn tree(&self) -> &Tree<RegNode> {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree<RegNode> {
        &mut self.tree
    }

    #[must_use]
    pub fn into_tree(self) -> Tree<RegNode> {
        self.tree
    }
}
