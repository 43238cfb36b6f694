//! The value graph store.
//!
//! Nodes are hash-consed: [`Graph::intern`] returns the existing node for a
//! structurally identical `(operator, kind, inputs)` tuple, so structural
//! equality is node identity. Besides construction, [`Graph::replace_all_uses`]
//! is the only way to change the graph's shape; it un-hashes every consumer it
//! rewires and queues it on the dirty list so the driver can re-canonicalize
//! it and merge it with any node it now duplicates.
//!
//! Dead nodes are reclaimed lazily by [`Graph::reclaim`], never in the middle
//! of a rewrite.

use log::warn;
use rustc_hash::FxHashMap;

use super::arena::{Arena, SecondaryMap};
use super::node::{InputList, Node, NodeFlags, NodeId};
use super::operators::{BitwiseOp, Operator, ScalarKind};
use super::range::transfer;
use super::types::{from_f64, FloatValue, IntRange, Type};
use crate::error::GraphError;

/// Hash-consing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NodeKey {
    op: Operator,
    kind: ScalarKind,
    inputs: InputList,
}

/// A hash-consed, acyclic value graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Arena<Node>,
    /// One entry per input slot that reads the node.
    uses: SecondaryMap<Node, Vec<NodeId>>,
    table: FxHashMap<NodeKey, NodeId>,
    dirty: Vec<NodeId>,
    live: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(node_capacity: usize) -> Self {
        Graph {
            nodes: Arena::with_capacity(node_capacity),
            ..Self::default()
        }
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Get a node. Panics on an ID from another graph.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Number of allocated slots, dead ones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of nodes that have not been reclaimed.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_live(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|n| !n.is_dead())
    }

    /// Live nodes in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().filter(|(_, n)| !n.is_dead())
    }

    /// Live node IDs in ID order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.iter().map(|(id, _)| id)
    }

    #[inline]
    pub fn uses(&self, id: NodeId) -> &[NodeId] {
        self.uses.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub fn use_count(&self, id: NodeId) -> usize {
        self.uses(id).len()
    }

    #[inline]
    pub fn op(&self, id: NodeId) -> Operator {
        self.nodes[id].op
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> ScalarKind {
        self.nodes[id].kind
    }

    #[inline]
    pub fn ty(&self, id: NodeId) -> Type {
        self.nodes[id].ty
    }

    #[inline]
    pub fn input(&self, id: NodeId, index: usize) -> NodeId {
        self.nodes[id].inputs[index]
    }

    /// The integer singleton of the node's type, if any.
    #[inline]
    pub fn int_constant(&self, id: NodeId) -> Option<i64> {
        self.nodes[id].ty.int_constant()
    }

    #[inline]
    pub fn is_int_constant(&self, id: NodeId, value: i64) -> bool {
        self.int_constant(id) == Some(value)
    }

    #[inline]
    pub fn int_range(&self, id: NodeId) -> Option<IntRange> {
        self.nodes[id].ty.int()
    }

    /// The exact float value of the node's type, if any.
    #[inline]
    pub fn float_constant(&self, id: NodeId) -> Option<FloatValue> {
        match self.nodes[id].ty.float()? {
            value @ (FloatValue::Const(_) | FloatValue::NaN) => Some(value),
            _ => None,
        }
    }

    /// Whether the node's type is an exact singleton.
    #[inline]
    pub fn is_constant(&self, id: NodeId) -> bool {
        self.nodes[id].ty.is_constant()
    }

    /// `x ^ -1`, the canonical bitwise complement.
    pub fn as_not(&self, id: NodeId) -> Option<NodeId> {
        let node = &self.nodes[id];
        match node.op {
            Operator::Bitwise(BitwiseOp::Xor)
                if node.kind.is_integer() && self.is_int_constant(node.input(1), -1) =>
            {
                Some(node.input(0))
            }
            _ => None,
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Return the node for `(op, kind, inputs)`, allocating it if absent.
    ///
    /// A new node gets its type from its inputs, the trap marker if it is a
    /// division by a possibly-zero divisor, and a place on the dirty list.
    pub fn intern(&mut self, op: Operator, kind: ScalarKind, inputs: &[NodeId]) -> NodeId {
        debug_assert_eq!(op.arity(), inputs.len(), "arity mismatch for {op:?}");
        let key = NodeKey {
            op,
            kind,
            inputs: InputList::from_slice(inputs),
        };
        if let Some(&existing) = self.table.get(&key) {
            return existing;
        }

        let ty = self.compute_type(op, kind, inputs, Type::top(kind));
        let mut node = Node::new(op, kind, inputs, ty);
        node.flags.insert(NodeFlags::HASHED);
        if self.division_may_trap(op, inputs) {
            node.flags.insert(NodeFlags::MAY_TRAP);
        }
        let id = self.nodes.alloc(node);
        for &input in inputs {
            self.uses.entry(input).push(id);
        }
        self.table.insert(key, id);
        self.dirty.push(id);
        self.live += 1;
        id
    }

    pub fn const_int(&mut self, kind: ScalarKind, value: i64) -> NodeId {
        self.intern(Operator::ConstInt(kind.wrap(value)), kind, &[])
    }

    pub fn const_bool(&mut self, value: bool) -> NodeId {
        self.intern(Operator::ConstInt(value as i64), ScalarKind::Bool, &[])
    }

    pub fn const_float(&mut self, kind: ScalarKind, value: f64) -> NodeId {
        self.intern(Operator::ConstFloat(from_f64(kind, value)), kind, &[])
    }

    /// Parameter `index`, optionally narrowed by a profiling seed.
    ///
    /// Seeding an existing parameter again narrows it to the intersection
    /// of both seeds. A seed disjoint from the current type is ignored.
    pub fn parameter(&mut self, index: u16, kind: ScalarKind, seed: Option<Type>) -> NodeId {
        let id = self.intern(Operator::Parameter(index), kind, &[]);
        if let Some(seed) = seed {
            let current = self.nodes[id].ty;
            match current.meet(&seed) {
                Some(narrowed) => self.nodes[id].ty = narrowed,
                None => warn!(
                    "parameter {}: seed {:?} conflicts with {:?}, ignored",
                    index, seed, current
                ),
            }
        }
        id
    }

    // =========================================================================
    // Types
    // =========================================================================

    fn compute_type(
        &self,
        op: Operator,
        kind: ScalarKind,
        inputs: &[NodeId],
        current: Type,
    ) -> Type {
        let typed: InputTypes = inputs
            .iter()
            .map(|&i| (self.nodes[i].kind, self.nodes[i].ty))
            .collect();
        transfer(op, kind, &typed, current)
    }

    fn division_may_trap(&self, op: Operator, inputs: &[NodeId]) -> bool {
        op.is_int_division()
            && inputs
                .get(1)
                .and_then(|&d| self.nodes[d].ty.int())
                .map_or(true, |range| range.contains(0))
    }

    /// Recompute a node's type and trap marker from its inputs.
    /// Returns `true` if the type changed.
    pub fn refresh_type(&mut self, id: NodeId) -> bool {
        let node = &self.nodes[id];
        let (op, kind, current) = (node.op, node.kind, node.ty);
        let inputs = node.inputs.clone();
        let ty = self.compute_type(op, kind, &inputs, current);
        let may_trap = self.division_may_trap(op, &inputs);

        let node = &mut self.nodes[id];
        node.flags.set(NodeFlags::MAY_TRAP, may_trap);
        if node.ty == ty {
            return false;
        }
        node.ty = ty;
        true
    }

    // =========================================================================
    // Rewiring
    // =========================================================================

    /// Rewire every consumer of `old` to read `new` instead.
    ///
    /// Consumers are removed from the hash-consing table before their inputs
    /// change and are pushed on the dirty list; `old` is left without uses.
    pub fn replace_all_uses(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        let users = std::mem::take(self.uses.entry(old));
        for &user in &users {
            if !self.nodes[user].inputs.contains(&old) {
                // Second slot of a consumer that reads `old` twice.
                continue;
            }
            self.unhash(user);
            let mut rewired = 0;
            for slot in self.nodes[user].inputs.iter_mut() {
                if *slot == old {
                    *slot = new;
                    rewired += 1;
                }
            }
            let new_uses = self.uses.entry(new);
            new_uses.extend(std::iter::repeat(user).take(rewired));
            self.dirty.push(user);
        }
    }

    fn key_of(&self, id: NodeId) -> NodeKey {
        let node = &self.nodes[id];
        NodeKey {
            op: node.op,
            kind: node.kind,
            inputs: node.inputs.clone(),
        }
    }

    fn unhash(&mut self, id: NodeId) {
        if !self.nodes[id].flags.contains(NodeFlags::HASHED) {
            return;
        }
        let key = self.key_of(id);
        if self.table.get(&key) == Some(&id) {
            self.table.remove(&key);
        }
        self.nodes[id].flags.remove(NodeFlags::HASHED);
    }

    /// Put an un-hashed node back into the table.
    ///
    /// Returns the node it duplicates if an identical one already exists;
    /// the caller must then replace this node by that one.
    pub fn rehash(&mut self, id: NodeId) -> Option<NodeId> {
        let node = &self.nodes[id];
        if node.is_dead() || node.flags.contains(NodeFlags::HASHED) {
            return None;
        }
        let key = self.key_of(id);
        match self.table.get(&key) {
            Some(&existing) if existing != id => Some(existing),
            _ => {
                self.table.insert(key, id);
                self.nodes[id].flags.insert(NodeFlags::HASHED);
                None
            }
        }
    }

    /// Drain the dirty list.
    pub fn take_dirty(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.dirty)
    }

    // =========================================================================
    // Reclamation
    // =========================================================================

    /// Reclaim `id` if it is an unused non-root, then cascade into inputs
    /// that become unused. Returns the number of nodes reclaimed.
    pub fn reclaim(&mut self, id: NodeId) -> usize {
        let mut reclaimed = 0;
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let node = &self.nodes[n];
            if node.is_dead() || node.is_root() || self.use_count(n) > 0 {
                continue;
            }
            stack.extend(self.kill(n));
            reclaimed += 1;
        }
        reclaimed
    }

    /// Remove a node unconditionally, dropping its input edges.
    /// Returns the inputs it used to read.
    pub(crate) fn kill(&mut self, id: NodeId) -> InputList {
        self.unhash(id);
        let node = &mut self.nodes[id];
        node.flags.insert(NodeFlags::DEAD);
        let inputs = node.inputs.clone();
        self.live -= 1;
        for &input in &inputs {
            let uses = self.uses.entry(input);
            if let Some(pos) = uses.iter().position(|&u| u == id) {
                uses.swap_remove(pos);
            }
            self.dirty.push(input);
        }
        self.uses.entry(id).clear();
        inputs
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Check arity, operand liveness, operand kinds and acyclicity.
    pub fn verify(&self) -> Result<(), GraphError> {
        for (id, node) in self.iter() {
            let expected = node.op.arity();
            if node.inputs.len() != expected {
                return Err(GraphError::Arity {
                    node: id,
                    op: node.op,
                    expected,
                    found: node.inputs.len(),
                });
            }
            for (index, &input) in node.inputs.iter().enumerate() {
                if !self.is_live(input) {
                    return Err(GraphError::MissingInput {
                        node: id,
                        index,
                        input,
                    });
                }
            }
            self.verify_kinds(id, node)?;
        }
        self.verify_acyclic()
    }

    fn verify_kinds(&self, id: NodeId, node: &Node) -> Result<(), GraphError> {
        use ScalarKind::{Bool, Int};

        let kind = node.kind;
        let input_kind = |i: usize| self.nodes[node.inputs[i]].kind;
        let expect_kind = |index: usize, expected: ScalarKind| {
            let found = input_kind(index);
            if found == expected {
                Ok(())
            } else {
                Err(GraphError::KindMismatch {
                    node: id,
                    index,
                    expected,
                    found,
                })
            }
        };
        let result_ok = match node.op {
            Operator::ConstInt(_) => kind.is_integral(),
            Operator::ConstFloat(_) => kind.is_float(),
            Operator::Parameter(_) => true,
            Operator::IntOp(_) => {
                expect_kind(0, kind)?;
                expect_kind(1, kind)?;
                kind.is_integer()
            }
            Operator::FloatOp(op) => {
                expect_kind(0, kind)?;
                expect_kind(1, kind)?;
                kind.is_float() && !op.is_integer_only()
            }
            Operator::Bitwise(op) if op.is_shift() => {
                expect_kind(0, kind)?;
                expect_kind(1, Int)?;
                kind.is_integer()
            }
            Operator::Bitwise(_) => {
                expect_kind(0, kind)?;
                expect_kind(1, kind)?;
                kind.is_integral()
            }
            Operator::IntCmp(_) => {
                expect_kind(1, input_kind(0))?;
                kind == Bool && input_kind(0).is_integral()
            }
            Operator::FloatCmp(_) => {
                expect_kind(1, input_kind(0))?;
                kind == Bool && input_kind(0).is_float()
            }
            Operator::Convert(conv) => {
                expect_kind(0, conv.source())?;
                kind == conv.result()
            }
            Operator::Ternary => {
                expect_kind(0, Bool)?;
                expect_kind(1, kind)?;
                expect_kind(2, kind)?;
                true
            }
            Operator::CMove(_) => {
                expect_kind(1, input_kind(0))?;
                expect_kind(2, kind)?;
                expect_kind(3, kind)?;
                true
            }
            Operator::Return => {
                expect_kind(0, kind)?;
                true
            }
        };
        if result_ok {
            Ok(())
        } else {
            Err(GraphError::BadResultKind {
                node: id,
                op: node.op,
                kind,
            })
        }
    }

    fn verify_acyclic(&self) -> Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        let mut marks = vec![Mark::New; self.nodes.len()];
        for root in self.ids() {
            if marks[root.as_usize()] != Mark::New {
                continue;
            }
            let mut stack = vec![(root, 0usize)];
            marks[root.as_usize()] = Mark::Active;
            while let Some((id, next)) = stack.pop() {
                let inputs = &self.nodes[id].inputs;
                if next == inputs.len() {
                    marks[id.as_usize()] = Mark::Done;
                    continue;
                }
                stack.push((id, next + 1));
                let input = inputs[next];
                match marks[input.as_usize()] {
                    Mark::Active => return Err(GraphError::Cycle(input)),
                    Mark::New => {
                        marks[input.as_usize()] = Mark::Active;
                        stack.push((input, 0));
                    }
                    Mark::Done => {}
                }
            }
        }
        Ok(())
    }

    /// Rewire a single input slot without hash-consing. Only used to build
    /// malformed graphs in tests of [`Graph::verify`].
    #[cfg(test)]
    pub(crate) fn set_input_unchecked(&mut self, id: NodeId, index: usize, input: NodeId) {
        self.unhash(id);
        self.nodes[id].inputs[index] = input;
        self.uses.entry(input).push(id);
    }
}

type InputTypes = smallvec::SmallVec<[(ScalarKind, Type); 4]>;

// =============================================================================
// Tests
// =============================================================================
