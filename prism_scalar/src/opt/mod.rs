//! Optimization passes for the scalar value graph.
//!
//! - **InstCombine**: the rewrite driver. Identities, reassociation,
//!   comparison canonicalization, division strength reduction and
//!   comparison fusion, all applied to one fixpoint
//! - **DCE (Dead Code Elimination)**: sweeps whatever the driver left
//!   unreachable
//!
//! # Optimization Pipeline
//!
//! 1. **Verify**: reject malformed graphs before touching them
//! 2. **InstCombine**: canonicalize to a fixpoint
//! 3. **DCE**: remove dead nodes
//!
//! InstCombine converges on its own, so unlike a classic pass pipeline
//! there is no outer iteration.

pub mod dce;
pub mod fusion;
pub mod instcombine;
pub mod strength_reduce;

pub use dce::Dce;
pub use fusion::{FusionPatterns, MinMaxPatterns};
pub use instcombine::{InstCombine, InstCombineConfig, InstCombineStats, PatternCategory};
pub use strength_reduce::{StrengthReduce, StrengthReduceConfig, StrengthReduceStats};

use log::debug;

use crate::error::OptResult;
use crate::ir::graph::Graph;

// =============================================================================
// Optimization Pass Trait
// =============================================================================

/// A single optimization pass over the value graph.
pub trait OptimizationPass {
    /// The name of this pass (for debugging/logging).
    fn name(&self) -> &'static str;

    /// Run the optimization pass on the graph.
    /// Returns true if the graph was modified.
    fn run(&mut self, graph: &mut Graph) -> bool;
}

// =============================================================================
// Optimization Pipeline
// =============================================================================

/// Configuration for the optimization pipeline.
#[derive(Debug, Clone)]
pub struct OptConfig {
    /// Enable the rewrite driver.
    pub enable_instcombine: bool,
    /// Enable DCE.
    pub enable_dce: bool,
    pub instcombine: InstCombineConfig,
}

impl Default for OptConfig {
    fn default() -> Self {
        OptConfig {
            enable_instcombine: true,
            enable_dce: true,
            instcombine: InstCombineConfig::default(),
        }
    }
}

/// Statistics from the optimization pipeline.
#[derive(Debug, Default, Clone)]
pub struct OptStats {
    pub instcombine: InstCombineStats,
    /// Division and modulo rewrites.
    pub strength: StrengthReduceStats,
    /// Number of nodes removed by DCE.
    pub dce_removed: usize,
}

impl OptStats {
    /// Whether the rewrite driver reached its fixpoint.
    pub fn converged(&self) -> bool {
        self.instcombine.converged()
    }
}

/// Canonicalize `graph` in place.
///
/// The graph is verified first; a malformed graph is returned untouched
/// as [`OptError::InvalidGraph`](crate::error::OptError::InvalidGraph).
/// A cancelled or budget-limited run still returns `Ok`, with the early
/// exit recorded in the statistics.
pub fn optimize(graph: &mut Graph, config: &OptConfig) -> OptResult<OptStats> {
    graph.verify()?;
    let mut stats = OptStats::default();

    if config.enable_instcombine {
        let mut pass = InstCombine::with_config(config.instcombine.clone());
        pass.run(graph);
        stats.instcombine = pass.stats().clone();
        stats.strength = pass.strength_stats().clone();
    }

    if config.enable_dce {
        let mut pass = Dce::new();
        pass.run(graph);
        stats.dce_removed = pass.removed();
    }

    debug!(
        "optimize: {} live nodes, {} rules applied, {} divisions reduced, {} swept",
        graph.live_count(),
        stats.instcombine.patterns_applied,
        stats.strength.total,
        stats.dce_removed
    );
    Ok(stats)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GraphError, OptError};
    use crate::ir::builder::GraphBuilder;
    use crate::ir::inspect::count_nodes_of_kind;
    use crate::ir::operators::{ArithOp, Opcode, Operator, ScalarKind};

    #[test]
    fn test_default_config() {
        let config = OptConfig::default();
        assert!(config.enable_instcombine);
        assert!(config.enable_dce);
        assert_eq!(config.instcombine.max_iterations, 10000);
    }

    #[test]
    fn test_optimize_simple() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Int);
        let zero = b.int(0);
        let sum = b.add(x, zero);
        let ret = b.ret(sum);
        let mut graph = b.finish();

        let stats = optimize(&mut graph, &OptConfig::default()).unwrap();
        assert!(stats.converged());
        assert!(stats.instcombine.patterns_applied >= 1);
        assert_eq!(graph.input(ret, 0), x);
        assert_eq!(count_nodes_of_kind(&graph, Opcode::Add), 0);
    }

    #[test]
    fn test_optimize_rejects_malformed_graph() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Int);
        let y = b.parameter(1, ScalarKind::Long);
        let mut graph = b.finish();
        // Int + Long is not a well-kinded node.
        let bad = graph.intern(Operator::IntOp(ArithOp::Add), ScalarKind::Int, &[x, y]);
        graph.intern(Operator::Return, ScalarKind::Int, &[bad]);
        let before = graph.live_count();

        let err = optimize(&mut graph, &OptConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            OptError::InvalidGraph(GraphError::KindMismatch { .. })
        ));
        assert_eq!(graph.live_count(), before);
    }

    #[test]
    fn test_optimize_with_passes_disabled() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Int);
        let one = b.int(1);
        let product = b.mul(x, one);
        b.ret(product);
        let dangling = b.sub(x, one);
        let mut graph = b.finish();

        let config = OptConfig {
            enable_instcombine: false,
            ..OptConfig::default()
        };
        let stats = optimize(&mut graph, &config).unwrap();
        assert_eq!(stats.instcombine.patterns_applied, 0);
        assert_eq!(stats.dce_removed, 1);
        assert!(graph.is_live(product));
        assert!(!graph.is_live(dangling));
    }

    #[test]
    fn test_optimize_reports_strength_reduction() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Int);
        let seven = b.int(7);
        let q = b.div(x, seven);
        b.ret(q);
        let mut graph = b.finish();

        let stats = optimize(&mut graph, &OptConfig::default()).unwrap();
        assert_eq!(stats.strength.div_signed_replaced, 1);
        assert_eq!(count_nodes_of_kind(&graph, Opcode::Div), 0);
        assert!(!graph.is_live(q));
    }
}
