//! Typed traversal of scan trees.
//!
//! Back ends implement [`NodeVisitor`] and hand it to [`walk`], which calls
//! the method matching each node's kind in document order and
//! [`NodeVisitor::leave`] once a node's children are done.

use regscan_tree::{NodeId, Tree};

use crate::types::{BitfieldEntry, Device, Peripheral, RegNode, RegisterEntry};

/// Callbacks for each kind of node. Every method defaults to doing nothing.
pub trait NodeVisitor {
    fn visit_device(&mut self, _device: &Device) {}

    fn visit_peripheral(&mut self, _peripheral: &Peripheral) {}

    fn visit_register(&mut self, _register: &RegisterEntry) {}

    fn visit_bitfield(&mut self, _bitfield: &BitfieldEntry) {}

    /// Called after all children of `node` have been visited.
    fn leave(&mut self, _node: &RegNode) {}
}

/// Visit every node of `tree` in pre-order, skipping placeholders.
pub fn walk<V: NodeVisitor + ?Sized>(tree: &Tree<RegNode>, visitor: &mut V) {
    walk_from(tree, tree.root(), visitor);
}

fn walk_from<V: NodeVisitor + ?Sized>(tree: &Tree<RegNode>, id: NodeId, visitor: &mut V) {
    let Some(node) = tree.value(id) else {
        // placeholder root: its children still belong to the tree
        if id == tree.root() {
            for child in tree.children(id) {
                walk_from(tree, child, visitor);
            }
        }
        return;
    };

    match node {
        RegNode::Device(d) => visitor.visit_device(d),
        RegNode::Peripheral(p) => visitor.visit_peripheral(p),
        RegNode::Register(r) => visitor.visit_register(r),
        RegNode::Bitfield(b) => visitor.visit_bitfield(b),
    }
    for child in tree.children(id) {
        walk_from(tree, child, visitor);
    }
    visitor.leave(node);
}

/// Node counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub peripherals: usize,
    pub registers: usize,
    pub bitfields: usize,
    /// Registers that ended up without any bit-field.
    pub empty_registers: usize,
    open_register_fields: Option<usize>,
}

impl Summary {
    #[must_use]
    pub fn of(tree: &Tree<RegNode>) -> Self {
        let mut summary = Self::default();
        walk(tree, &mut summary);
        summary
    }
}

impl NodeVisitor for Summary {
    fn visit_peripheral(&mut self, _: &Peripheral) {
        self.peripherals += 1;
    }

    fn visit_register(&mut self, _: &RegisterEntry) {
        self.registers += 1;
        self.open_register_fields = Some(0);
    }

    fn visit_bitfield(&mut self, _: &BitfieldEntry) {
        self.bitfields += 1;
        if let Some(n) = self.open_register_fields.as_mut() {
            *n += 1;
        }
    }

    fn leave(&mut self, node: &RegNode) {
        if matches!(node, RegNode::Register(_)) && self.open_register_fields.take() == Some(0) {
            self.empty_registers += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BitRange;
    use pretty_assertions::assert_eq;

    fn register(name: &str) -> RegNode {
        RegNode::Register(RegisterEntry {
            name: name.to_string(),
            offset: 0,
            reset: 0,
            page: 1,
        })
    }

    fn bitfield(name: &str) -> RegNode {
        RegNode::Bitfield(BitfieldEntry {
            name: name.to_string(),
            bits: BitRange::new(7, 0),
            logical_bits: BitRange::new(7, 0),
            reset: 0,
        })
    }

    fn sample() -> Tree<RegNode> {
        let mut tree = Tree::new(RegNode::Device(Device::new("DEV")));
        let abc = tree.add(
            tree.root(),
            RegNode::Peripheral(Peripheral {
                name: "ABC".to_string(),
            }),
        );
        let ctrl = tree.add(abc, register("ABC_CTRL"));
        tree.add(ctrl, bitfield("MODE"));
        tree.add(ctrl, bitfield("VALUE"));
        tree.add(abc, register("ABC_STAT"));
        tree
    }

    #[derive(Default)]
    struct Trace(Vec<String>);

    impl NodeVisitor for Trace {
        fn visit_device(&mut self, d: &Device) {
            self.0.push(format!("device {}", d.name));
        }
        fn visit_peripheral(&mut self, p: &Peripheral) {
            self.0.push(format!("peripheral {}", p.name));
        }
        fn visit_register(&mut self, r: &RegisterEntry) {
            self.0.push(format!("register {}", r.name));
        }
        fn visit_bitfield(&mut self, b: &BitfieldEntry) {
            self.0.push(format!("bitfield {}", b.name));
        }
        fn leave(&mut self, node: &RegNode) {
            self.0.push(format!("leave {}", node.name()));
        }
    }

    #[test]
    fn test_walk_order() {
        let mut trace = Trace::default();
        walk(&sample(), &mut trace);

        assert_eq!(
            trace.0,
            vec![
                "device DEV",
                "peripheral ABC",
                "register ABC_CTRL",
                "bitfield MODE",
                "leave MODE",
                "bitfield VALUE",
                "leave VALUE",
                "leave ABC_CTRL",
                "register ABC_STAT",
                "leave ABC_STAT",
                "leave ABC",
                "leave DEV",
            ]
        );
    }

    #[test]
    fn test_walk_placeholder_root() {
        let mut tree: Tree<RegNode> = Tree::placeholder();
        tree.add(tree.root(), bitfield("ONLY"));
        let mut trace = Trace::default();
        walk(&tree, &mut trace);
        assert_eq!(trace.0, vec!["bitfield ONLY", "leave ONLY"]);
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            Summary::of(&sample()),
            Summary {
                peripherals: 1,
                registers: 2,
                bitfields: 2,
                empty_registers: 1,
                open_register_fields: None,
            }
        );
    }
}
