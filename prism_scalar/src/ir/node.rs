//! Value-graph nodes.

use smallvec::SmallVec;

use super::arena::Id;
use super::operators::{Operator, ScalarKind};
use super::types::Type;

/// Handle to a node in a [`Graph`](super::graph::Graph).
pub type NodeId = Id<Node>;

/// Ordered operand list. No operator takes more than four inputs.
pub type InputList = SmallVec<[NodeId; 4]>;

bitflags::bitflags! {
    /// Per-node state bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Reclaimed; the slot is kept so IDs stay stable.
        const DEAD = 0b0000_0001;
        /// Division whose divisor is not provably nonzero. Such a node is
        /// a root: it stays alive for its trap even with no value uses.
        const MAY_TRAP = 0b0000_0010;
        /// Present in the hash-consing table.
        const HASHED = 0b0000_0100;
    }
}

/// A node: operator, result kind, operands and the lattice type of its value.
#[derive(Debug, Clone)]
pub struct Node {
    pub op: Operator,
    pub kind: ScalarKind,
    pub inputs: InputList,
    pub ty: Type,
    pub flags: NodeFlags,
}

impl Node {
    pub fn new(op: Operator, kind: ScalarKind, inputs: &[NodeId], ty: Type) -> Self {
        Node {
            op,
            kind,
            inputs: InputList::from_slice(inputs),
            ty,
            flags: NodeFlags::empty(),
        }
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.flags.contains(NodeFlags::DEAD)
    }

    #[inline]
    pub fn may_trap(&self) -> bool {
        self.flags.contains(NodeFlags::MAY_TRAP)
    }

    /// Roots survive reclamation regardless of their use count.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.may_trap() || matches!(self.op, Operator::Return | Operator::Parameter(_))
    }

    #[inline]
    pub fn input(&self, index: usize) -> NodeId {
        self.inputs[index]
    }
}
