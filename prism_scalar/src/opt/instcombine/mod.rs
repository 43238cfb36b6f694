//! Instruction Combining (InstCombine): the rewrite driver.
//!
//! Canonicalizes the value graph with a worklist fixpoint over every rule
//! category, strength reduction and comparison fusion included.
//!
//! # Algorithm Overview
//!
//! 1. Seed the worklist with every live node in id order
//! 2. Pop a node and re-insert it into the hash-consing table, merging it
//!    into an existing twin if rewiring made it a duplicate
//! 3. Reclaim it if it lost its last use, refresh its type, and fold it to
//!    a constant if the type became a singleton
//! 4. Otherwise apply at most one rule from the enabled categories
//! 5. Queue everything the store marked dirty and repeat until the
//!    worklist is empty, the iteration budget runs out, or the pass is
//!    cancelled
//! 6. Sweep the whole graph again if the last sweep rewrote anything
//!
//! Each rule application (node creation plus rewiring) completes before
//! the next pop, so stopping early always leaves a valid graph.
//!
//! # Pattern Categories
//!
//! - Arithmetic: x + 0, (x + c1) + c2, (x - y) + y, x * 1, x / 1, etc.
//! - Bitwise: x & 0, x | -1, x ^ x, ~(x + c), etc.
//! - Shift: amount masking, shift chains, shift pairs to masks
//! - Comparison: x < x, operand order, sign-bit bias removal
//! - Division: magic-number strength reduction
//! - Fusion: ternary to CMove/Min/Max, Min/Max identities

mod patterns;
mod worklist;

pub use patterns::{
    ArithmeticPatterns, BitwisePatterns, ComparisonPatterns, Pattern, PatternMatch,
    PatternRegistry, ShiftPatterns,
};
pub use worklist::Worklist;

pub(crate) use patterns::{binary, commute};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::ir::graph::Graph;
use crate::ir::node::NodeId;
use crate::ir::operators::Operator;
use crate::opt::strength_reduce::{StrengthReduce, StrengthReduceConfig, StrengthReduceStats};
use crate::opt::OptimizationPass;

// =============================================================================
// InstCombine Statistics
// =============================================================================

/// Statistics from instruction combining.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstCombineStats {
    /// Rules successfully applied.
    pub patterns_applied: usize,
    /// Nodes reclaimed after losing their last use.
    pub instructions_eliminated: usize,
    /// Nodes replaced by a rule.
    pub instructions_simplified: usize,
    /// Nodes allocated by rules and folds.
    pub instructions_created: usize,
    /// Nodes in the initial worklist.
    pub instructions_analyzed: usize,
    /// Duplicates merged on rehash.
    pub nodes_merged: usize,
    /// Nodes replaced by a constant because their type was a singleton.
    pub constants_folded: usize,
    /// Worklist pops.
    pub iterations: usize,
    /// Passes over the whole graph; the last one applies nothing.
    pub sweeps: usize,
    /// The pass stopped on the cancellation flag.
    pub cancelled: bool,
    /// The pass stopped on `max_iterations`.
    pub budget_exhausted: bool,
}

impl InstCombineStats {
    /// Net node reduction.
    pub fn net_reduction(&self) -> isize {
        self.instructions_eliminated as isize - self.instructions_created as isize
    }

    /// Merge statistics.
    pub fn merge(&mut self, other: &InstCombineStats) {
        self.patterns_applied += other.patterns_applied;
        self.instructions_eliminated += other.instructions_eliminated;
        self.instructions_simplified += other.instructions_simplified;
        self.instructions_created += other.instructions_created;
        self.instructions_analyzed += other.instructions_analyzed;
        self.nodes_merged += other.nodes_merged;
        self.constants_folded += other.constants_folded;
        self.iterations += other.iterations;
        self.sweeps += other.sweeps;
        self.cancelled |= other.cancelled;
        self.budget_exhausted |= other.budget_exhausted;
    }

    /// Whether the pass ran to its fixpoint.
    pub fn converged(&self) -> bool {
        !self.cancelled && !self.budget_exhausted
    }
}

// =============================================================================
// InstCombine Configuration
// =============================================================================

/// Configuration for instruction combining.
#[derive(Debug, Clone)]
pub struct InstCombineConfig {
    /// Maximum worklist pops.
    pub max_iterations: usize,
    pub enable_arithmetic: bool,
    pub enable_bitwise: bool,
    pub enable_shift: bool,
    pub enable_comparison: bool,
    /// Strength reduction of division and modulo by constants.
    pub enable_division: bool,
    /// Ternary and Min/Max fusion.
    pub enable_fusion: bool,
    pub strength_reduce: StrengthReduceConfig,
    /// Polled between worklist steps; setting it stops the pass.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for InstCombineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            enable_arithmetic: true,
            enable_bitwise: true,
            enable_shift: true,
            enable_comparison: true,
            enable_division: true,
            enable_fusion: true,
            strength_reduce: StrengthReduceConfig::default(),
            cancel: None,
        }
    }
}

impl InstCombineConfig {
    /// Whether a category's rules are tried.
    pub fn is_enabled(&self, category: PatternCategory) -> bool {
        match category {
            PatternCategory::Arithmetic => self.enable_arithmetic,
            PatternCategory::Bitwise => self.enable_bitwise,
            PatternCategory::Shift => self.enable_shift,
            PatternCategory::Comparison => self.enable_comparison,
            PatternCategory::Division => self.enable_division,
            PatternCategory::Fusion => self.enable_fusion,
        }
    }
}

// =============================================================================
// InstCombine Pass
// =============================================================================

/// Instruction combining optimization pass.
#[derive(Debug)]
pub struct InstCombine {
    config: InstCombineConfig,
    /// Statistics from the last run.
    stats: InstCombineStats,
    patterns: PatternRegistry,
    strength: StrengthReduce,
}

impl InstCombine {
    pub fn new() -> Self {
        Self::with_config(InstCombineConfig::default())
    }

    pub fn with_config(config: InstCombineConfig) -> Self {
        Self {
            strength: StrengthReduce::with_config(config.strength_reduce.clone()),
            config,
            stats: InstCombineStats::default(),
            patterns: PatternRegistry::new(),
        }
    }

    pub fn stats(&self) -> &InstCombineStats {
        &self.stats
    }

    /// Division rewrites of the last run.
    pub fn strength_stats(&self) -> &StrengthReduceStats {
        self.strength.stats()
    }

    pub fn config(&self) -> &InstCombineConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.config
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Run instruction combining to a fixpoint.
    fn run_instcombine(&mut self, graph: &mut Graph) -> bool {
        self.stats = InstCombineStats::default();
        self.strength.reset_stats();

        let mut changed = false;
        'sweeps: loop {
            let progress = self.progress();
            let mut worklist = Worklist::seeded(graph);
            graph.take_dirty();
            if self.stats.sweeps == 0 {
                self.stats.instructions_analyzed = worklist.len();
            }
            self.stats.sweeps += 1;

            while let Some(node) = worklist.pop() {
                if self.is_cancelled() {
                    warn!("instcombine: cancelled after {} iterations", self.stats.iterations);
                    self.stats.cancelled = true;
                    break 'sweeps;
                }
                if self.stats.iterations >= self.config.max_iterations {
                    warn!(
                        "instcombine: iteration budget of {} exhausted, {} nodes still queued",
                        self.config.max_iterations,
                        worklist.len() + 1
                    );
                    self.stats.budget_exhausted = true;
                    break 'sweeps;
                }
                self.stats.iterations += 1;
                changed |= self.visit(graph, node, &mut worklist);
            }

            // Rules that read past their operands are not requeued when a
            // deeper node changes, so sweep until nothing applies.
            if self.progress() == progress {
                break;
            }
        }

        debug!(
            "instcombine: {} rules, {} merged, {} folded, {} eliminated, {} created in {} iterations ({} sweeps)",
            self.stats.patterns_applied,
            self.stats.nodes_merged,
            self.stats.constants_folded,
            self.stats.instructions_eliminated,
            self.stats.instructions_created,
            self.stats.iterations,
            self.stats.sweeps
        );
        changed
    }

    /// Rewrites so far. Reclaiming garbage is not progress.
    fn progress(&self) -> usize {
        self.stats.patterns_applied + self.stats.nodes_merged + self.stats.constants_folded
    }

    /// Canonicalize one node. Returns `true` if the graph changed.
    fn visit(&mut self, graph: &mut Graph, node: NodeId, worklist: &mut Worklist) -> bool {
        if !graph.is_live(node) {
            return false;
        }

        // Merge-on-rehash. Distinct outputs stay distinct even if they
        // return the same value.
        if let Some(existing) = graph.rehash(node) {
            if graph.op(node) != Operator::Return {
                trace!("instcombine: merge {node} into {existing}");
                graph.replace_all_uses(node, existing);
                graph.kill(node);
                worklist.push(existing);
                worklist.absorb_dirty(graph);
                self.stats.nodes_merged += 1;
                return true;
            }
        }

        if !graph.node(node).is_root() && graph.use_count(node) == 0 {
            let reclaimed = graph.reclaim(node);
            self.stats.instructions_eliminated += reclaimed;
            worklist.absorb_dirty(graph);
            return reclaimed > 0;
        }

        let mut changed = false;
        if graph.refresh_type(node) {
            worklist.push_all(graph.uses(node).to_vec());
            changed = true;
        }
        if graph.use_count(node) == 0 {
            return changed;
        }

        let allocated = graph.len();
        let kind = graph.kind(node);
        let op = graph.op(node);
        if !op.is_constant() {
            if let Some(constant) = graph.ty(node).to_constant_operator(kind) {
                let folded = graph.intern(constant, kind, &[]);
                trace!("instcombine: fold {node} to constant {folded}");
                self.stats.constants_folded += 1;
                self.rewire(graph, node, folded, allocated, worklist);
                return true;
            }
        }

        match self.find_match(graph, node, op) {
            Some(matched) => {
                trace!(
                    "instcombine: {} {} -> {}",
                    matched.pattern_name(),
                    matched.target(),
                    matched.replacement()
                );
                self.stats.patterns_applied += 1;
                self.rewire(graph, matched.target(), matched.replacement(), allocated, worklist);
                true
            }
            None => {
                // A rule may have interned nodes before declining.
                self.stats.instructions_created += graph.len() - allocated;
                worklist.absorb_dirty(graph);
                changed
            }
        }
    }

    /// First non-trivial match among the enabled categories.
    fn find_match(&mut self, graph: &mut Graph, node: NodeId, op: Operator) -> Option<PatternMatch> {
        for pattern in self.patterns.iter() {
            if !self.config.is_enabled(pattern.category()) {
                continue;
            }
            if let Some(matched) = pattern.try_match(graph, node, op, &mut self.strength) {
                if !matched.is_identity() {
                    return Some(matched);
                }
            }
        }
        None
    }

    /// Replace `target` by `replacement` and reclaim what died.
    fn rewire(
        &mut self,
        graph: &mut Graph,
        target: NodeId,
        replacement: NodeId,
        allocated: usize,
        worklist: &mut Worklist,
    ) {
        self.stats.instructions_created += graph.len() - allocated;
        self.stats.instructions_simplified += 1;
        graph.replace_all_uses(target, replacement);
        worklist.push(replacement);
        worklist.absorb_dirty(graph);
        self.stats.instructions_eliminated += graph.reclaim(target);
        worklist.absorb_dirty(graph);
    }
}

impl Default for InstCombine {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizationPass for InstCombine {
    fn name(&self) -> &'static str {
        "instcombine"
    }

    fn run(&mut self, graph: &mut Graph) -> bool {
        self.run_instcombine(graph)
    }
}

// =============================================================================
// Pattern Category
// =============================================================================

/// Categories of patterns, in the order the driver tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternCategory {
    Arithmetic,
    Bitwise,
    Shift,
    Comparison,
    /// Division and modulo by constants.
    Division,
    /// Ternary, CMove, Min and Max.
    Fusion,
}

impl PatternCategory {
    pub const fn name(self) -> &'static str {
        match self {
            PatternCategory::Arithmetic => "arithmetic",
            PatternCategory::Bitwise => "bitwise",
            PatternCategory::Shift => "shift",
            PatternCategory::Comparison => "comparison",
            PatternCategory::Division => "division",
            PatternCategory::Fusion => "fusion",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
