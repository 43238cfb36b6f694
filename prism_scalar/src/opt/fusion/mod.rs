//! Comparison fusion.
//!
//! Turns `cmp(a, b) ? t : f` into dataflow: a `CMove` in general, and `Min`,
//! `Max` or a plain operand when the arms are the compared values.
//!
//! ```text
//! Ternary(Gt(a, b), a, b)  ->  CMove[Gt](a, b, a, b)  ->  Max(a, b)
//! Ternary(Lt(b, a), a, b)  ->  CMove[Lt](b, a, a, b)  ->  CMove[Gt](a, b, a, b)
//! ```
//!
//! `CMove` operands are ordered like comparisons (constant right, lower id
//! left) so every spelling of the same select reaches one node.
//!
//! Only integer selects become `Min`/`Max`: `Math.min` and `Math.max`
//! return NaN for a NaN operand and order `-0.0` below `+0.0`, while a
//! compare-select returns whichever arm the (false) comparison picks.

mod minmax;

pub use minmax::MinMaxPatterns;

use crate::ir::graph::Graph;
use crate::ir::node::NodeId;
use crate::ir::operators::{ArithOp, CmpOp, Operator};
use crate::ir::range::decide;
use crate::opt::instcombine::PatternMatch;

// =============================================================================
// Fusion Patterns
// =============================================================================

/// Ternary, `CMove`, `Min` and `Max` rules.
pub struct FusionPatterns;

impl FusionPatterns {
    pub fn try_match(graph: &mut Graph, node: NodeId, op: Operator) -> Option<PatternMatch> {
        match op {
            Operator::Ternary => Self::try_ternary(graph, node),
            Operator::CMove(cmp) => Self::try_cmove(graph, node, cmp),
            Operator::IntOp(ArithOp::Min | ArithOp::Max)
            | Operator::FloatOp(ArithOp::Min | ArithOp::Max) => {
                MinMaxPatterns::try_match(graph, node, op)
            }
            _ => None,
        }
    }

    // =========================================================================
    // Ternary
    // =========================================================================

    fn try_ternary(graph: &mut Graph, node: NodeId) -> Option<PatternMatch> {
        let cond = graph.input(node, 0);
        let (t, f) = (graph.input(node, 1), graph.input(node, 2));
        if t == f {
            return Some(PatternMatch::replace(node, t, "ternary_same_arms"));
        }
        if let Some(c) = graph.int_constant(cond) {
            let taken = if c != 0 { t } else { f };
            return Some(PatternMatch::replace(node, taken, "ternary_constant_condition"));
        }
        let cmp = match graph.op(cond) {
            Operator::IntCmp(cmp) | Operator::FloatCmp(cmp) => cmp,
            _ => return None,
        };
        let (a, b) = (graph.input(cond, 0), graph.input(cond, 1));
        let kind = graph.kind(node);
        let select = graph.intern(Operator::CMove(cmp), kind, &[a, b, t, f]);
        Some(PatternMatch::replace(node, select, "ternary_to_cmove"))
    }

    // =========================================================================
    // CMove
    // =========================================================================

    fn try_cmove(graph: &mut Graph, node: NodeId, cmp: CmpOp) -> Option<PatternMatch> {
        let (a, b) = (graph.input(node, 0), graph.input(node, 1));
        let (t, f) = (graph.input(node, 2), graph.input(node, 3));
        let replace = |with: NodeId, name| Some(PatternMatch::replace(node, with, name));
        if t == f {
            return replace(t, "cmove_same_arms");
        }

        let typed = |id: NodeId| (graph.kind(id), graph.ty(id));
        if let Some(taken) = decide(cmp, &typed(a), &typed(b)) {
            return replace(if taken { t } else { f }, "cmove_decided");
        }
        let integral = !graph.kind(a).is_float();
        if a == b && integral {
            let taken = if cmp.reflexive_result() { t } else { f };
            return replace(taken, "cmove_self_compare");
        }

        let swap = match (graph.is_constant(a), graph.is_constant(b)) {
            (true, false) => true,
            (false, false) => a > b,
            _ => false,
        };
        if swap {
            let kind = graph.kind(node);
            let swapped = graph.intern(Operator::CMove(cmp.swap()), kind, &[b, a, t, f]);
            return replace(swapped, "cmove_swap_operands");
        }

        let arms_are_operands = (t == a && f == b) || (t == b && f == a);
        if !integral || !arms_are_operands {
            return None;
        }
        let kind = graph.kind(node);
        match cmp {
            CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge if kind.is_integer() => {
                let picks_smaller = matches!(cmp, CmpOp::Lt | CmpOp::Le) == (t == a);
                let (op, name) = if picks_smaller {
                    (ArithOp::Min, "cmove_to_min")
                } else {
                    (ArithOp::Max, "cmove_to_max")
                };
                let fused = graph.intern(Operator::IntOp(op), kind, &[a, b]);
                replace(fused, name)
            }
            // a == b ? a : b is b either way, and a != b ? a : b is a.
            CmpOp::Eq => replace(f, "cmove_eq_operands"),
            CmpOp::Ne => replace(t, "cmove_ne_operands"),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
