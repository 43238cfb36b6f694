//! Rewrite worklist.
//!
//! FIFO of node ids with membership deduplication: a node queued twice is
//! visited once. The driver feeds it from the graph's dirty list after every
//! mutation, so nothing the store marks for re-canonicalization is lost.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use crate::ir::graph::Graph;
use crate::ir::node::NodeId;

// =============================================================================
// Worklist
// =============================================================================

#[derive(Debug, Default)]
pub struct Worklist {
    queue: VecDeque<NodeId>,
    /// Ids currently queued.
    queued: FxHashSet<NodeId>,
    total_added: usize,
    total_processed: usize,
}

impl Worklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Worklist holding every live node of `graph` in id order.
    pub fn seeded(graph: &Graph) -> Self {
        let mut worklist = Self {
            queue: VecDeque::with_capacity(graph.live_count()),
            ..Self::default()
        };
        worklist.push_all(graph.ids());
        worklist
    }

    /// Queue `node` unless it is already queued.
    pub fn push(&mut self, node: NodeId) -> bool {
        if !self.queued.insert(node) {
            return false;
        }
        self.queue.push_back(node);
        self.total_added += 1;
        true
    }

    pub fn push_all(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        for node in nodes {
            self.push(node);
        }
    }

    /// Move the graph's dirty list onto the queue.
    pub fn absorb_dirty(&mut self, graph: &mut Graph) {
        self.push_all(graph.take_dirty());
    }

    pub fn pop(&mut self) -> Option<NodeId> {
        let node = self.queue.pop_front()?;
        self.queued.remove(&node);
        self.total_processed += 1;
        Some(node)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.queued.contains(&node)
    }

    /// Nodes ever queued, duplicates excluded.
    pub fn total_added(&self) -> usize {
        self.total_added
    }

    pub fn total_processed(&self) -> usize {
        self.total_processed
    }
}

// =============================================================================
// Tests
// =============================================================================
