//! Pattern matching for instruction combining.
//!
//! Every pattern is a function of the graph and one node that either
//! declines or returns the node that should replace it. Replacements are
//! built only through [`Graph::intern`], so a pattern can never break
//! hash-consing; the driver performs the rewiring.
//!
//! - `arithmetic`: additive reassociation, multiplicative and division
//!   identities, exact float identities
//! - `bitwise`: `And`/`Or`/`Xor` identities and complement rewrites
//! - `shift`: amount normalization and shift chains
//! - `comparison`: operand canonicalization and unsigned normalization

mod arithmetic;
mod bitwise;
mod comparison;
mod shift;

pub use arithmetic::ArithmeticPatterns;
pub use bitwise::BitwisePatterns;
pub use comparison::ComparisonPatterns;
pub use shift::ShiftPatterns;

use crate::ir::graph::Graph;
use crate::ir::node::NodeId;
use crate::ir::operators::{ArithOp, Operator, ScalarKind};
use crate::opt::fusion::FusionPatterns;
use crate::opt::strength_reduce::StrengthReduce;

use super::PatternCategory;

// =============================================================================
// Pattern Match
// =============================================================================

/// A matched rewrite: `target` is to be replaced by `replacement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    target: NodeId,
    replacement: NodeId,
    pattern_name: &'static str,
}

impl PatternMatch {
    pub fn replace(target: NodeId, replacement: NodeId, pattern_name: &'static str) -> Self {
        Self {
            target,
            replacement,
            pattern_name,
        }
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn replacement(&self) -> NodeId {
        self.replacement
    }

    pub fn pattern_name(&self) -> &'static str {
        self.pattern_name
    }

    /// A match whose replacement is its own target changes nothing.
    pub fn is_identity(&self) -> bool {
        self.target == self.replacement
    }
}

// =============================================================================
// Pattern
// =============================================================================

/// One pattern category as registered with the driver.
#[derive(Debug)]
pub struct Pattern {
    category: PatternCategory,
    name: &'static str,
}

impl Pattern {
    pub fn new(category: PatternCategory) -> Self {
        Self {
            category,
            name: category.name(),
        }
    }

    pub fn category(&self) -> PatternCategory {
        self.category
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Try this category's rules on `node`.
    pub fn try_match(
        &self,
        graph: &mut Graph,
        node: NodeId,
        op: Operator,
        divisions: &mut StrengthReduce,
    ) -> Option<PatternMatch> {
        match self.category {
            PatternCategory::Arithmetic => ArithmeticPatterns::try_match(graph, node, op),
            PatternCategory::Bitwise => BitwisePatterns::try_match(graph, node, op),
            PatternCategory::Shift => ShiftPatterns::try_match(graph, node, op),
            PatternCategory::Comparison => ComparisonPatterns::try_match(graph, node, op),
            PatternCategory::Division => divisions.try_match(graph, node, op),
            PatternCategory::Fusion => FusionPatterns::try_match(graph, node, op),
        }
    }
}

// =============================================================================
// Pattern Registry
// =============================================================================

/// Categories in the order the driver tries them.
#[derive(Debug)]
pub struct PatternRegistry {
    patterns: Vec<Pattern>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        let patterns = [
            PatternCategory::Arithmetic,
            PatternCategory::Bitwise,
            PatternCategory::Shift,
            PatternCategory::Comparison,
            PatternCategory::Division,
            PatternCategory::Fusion,
        ]
        .into_iter()
        .map(Pattern::new)
        .collect();
        Self { patterns }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Matching Helpers
// =============================================================================

/// The two inputs of `id` if its operator is `op`.
#[inline]
pub(crate) fn binary(graph: &Graph, id: NodeId, op: Operator) -> Option<(NodeId, NodeId)> {
    (graph.op(id) == op).then(|| (graph.input(id, 0), graph.input(id, 1)))
}

/// `(x, c)` if `id` is `x op c` with an integer constant `c`.
#[inline]
pub(crate) fn with_constant(graph: &Graph, id: NodeId, op: Operator) -> Option<(NodeId, i64)> {
    let (x, c) = binary(graph, id, op)?;
    Some((x, graph.int_constant(c)?))
}

/// Canonical operand order of a commutative operator: a constant goes
/// right, an operand with the same operator goes left, otherwise the lower
/// id goes left. Returns `true` if `(lhs, rhs)` must be swapped.
pub(crate) fn should_swap(graph: &Graph, op: Operator, lhs: NodeId, rhs: NodeId) -> bool {
    match (graph.is_constant(lhs), graph.is_constant(rhs)) {
        (true, false) => return true,
        (false, true) | (true, true) => return false,
        (false, false) => {}
    }
    match (graph.op(lhs) == op, graph.op(rhs) == op) {
        (false, true) => true,
        (true, false) => false,
        _ => lhs > rhs,
    }
}

/// Rebuild `node` with swapped operands if they are out of order.
pub(crate) fn commute(
    graph: &mut Graph,
    node: NodeId,
    op: Operator,
    lhs: NodeId,
    rhs: NodeId,
) -> Option<PatternMatch> {
    if !should_swap(graph, op, lhs, rhs) {
        return None;
    }
    let kind = graph.kind(node);
    let swapped = graph.intern(op, kind, &[rhs, lhs]);
    Some(PatternMatch::replace(node, swapped, "commute"))
}

/// Integer binary arithmetic node.
#[inline]
pub(crate) fn int_op(graph: &mut Graph, op: ArithOp, kind: ScalarKind, lhs: NodeId, rhs: NodeId) -> NodeId {
    graph.intern(Operator::IntOp(op), kind, &[lhs, rhs])
}

// =============================================================================
// Tests
// =============================================================================
