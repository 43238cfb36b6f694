//! Dead Code Elimination (DCE) optimization pass.
//!
//! The rewrite driver reclaims nodes as they lose their last use, so after
//! it converges DCE only finds what it never got to: nodes left behind by a
//! cancelled or budget-limited run, and unused nodes of a graph that was
//! never combined.
//!
//! # Algorithm
//!
//! 1. Mark every root (returns, parameters, trapping divisions) as live
//! 2. Propagate liveness backwards through input edges
//! 3. Remove every live-in-arena node that was not marked

use log::debug;

use super::OptimizationPass;
use crate::ir::arena::BitSet;
use crate::ir::graph::Graph;

// =============================================================================
// DCE Pass
// =============================================================================

/// Dead Code Elimination pass.
#[derive(Debug, Default)]
pub struct Dce {
    /// Number of nodes removed by the last run.
    removed: usize,
}

impl Dce {
    pub fn new() -> Self {
        Dce { removed: 0 }
    }

    pub fn removed(&self) -> usize {
        self.removed
    }
}

impl OptimizationPass for Dce {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&mut self, graph: &mut Graph) -> bool {
        self.removed = 0;

        let mut live = BitSet::with_capacity(graph.len());
        let mut worklist: Vec<_> = graph
            .iter()
            .filter(|(_, node)| node.is_root())
            .map(|(id, _)| id)
            .collect();
        for &id in &worklist {
            live.insert(id.as_usize());
        }

        while let Some(id) = worklist.pop() {
            for &input in graph.node(id).inputs.iter() {
                if live.insert(input.as_usize()) {
                    worklist.push(input);
                }
            }
        }

        let dead: Vec<_> = graph.ids().filter(|id| !live.contains(id.as_usize())).collect();
        for &id in &dead {
            graph.kill(id);
        }
        // Killed nodes queue their inputs; nothing downstream consumes that.
        graph.take_dirty();

        self.removed = dead.len();
        if self.removed > 0 {
            debug!("dce: removed {} nodes", self.removed);
        }
        self.removed > 0
    }
}

// =============================================================================
// Tests
// =============================================================================
