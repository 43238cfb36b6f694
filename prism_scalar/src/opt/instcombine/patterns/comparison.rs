//! Comparison patterns for instruction combining.
//!
//! Patterns include:
//! - x cmp x -> reflexive result (integers only; NaN breaks it for floats)
//! - c cmp x -> x cmp' c, and operands ordered by id otherwise
//! - (x + MIN) cmp (y + MIN) -> x cmp_u y for signed orderings
//! - (x + MIN) cmp c -> x cmp_u (c ^ MIN)
//!
//! Adding the sign bit is the same as flipping it, which maps signed order
//! onto unsigned order.

use crate::ir::graph::Graph;
use crate::ir::node::NodeId;
use crate::ir::operators::{ArithOp, BitwiseOp, CmpOp, Operator, ScalarKind};

use super::PatternMatch;

// =============================================================================
// Comparison Patterns
// =============================================================================

/// Comparison pattern matcher.
pub struct ComparisonPatterns;

impl ComparisonPatterns {
    pub fn try_match(graph: &mut Graph, node: NodeId, op: Operator) -> Option<PatternMatch> {
        let (Operator::IntCmp(cmp) | Operator::FloatCmp(cmp)) = op else {
            return None;
        };
        let (lhs, rhs) = (graph.input(node, 0), graph.input(node, 1));
        match op {
            Operator::IntCmp(_) => {
                if lhs == rhs {
                    let folded = graph.const_bool(cmp.reflexive_result());
                    return Some(PatternMatch::replace(node, folded, "cmp_self"));
                }
                if let Some(m) = Self::order_operands(graph, node, cmp, lhs, rhs, Operator::IntCmp) {
                    return Some(m);
                }
                Self::unbias(graph, node, cmp, lhs, rhs)
            }
            _ => Self::order_operands(graph, node, cmp, lhs, rhs, Operator::FloatCmp),
        }
    }

    /// Constant on the right, otherwise the lower id on the left.
    fn order_operands(
        graph: &mut Graph,
        node: NodeId,
        cmp: CmpOp,
        lhs: NodeId,
        rhs: NodeId,
        make: fn(CmpOp) -> Operator,
    ) -> Option<PatternMatch> {
        let swap = match (graph.is_constant(lhs), graph.is_constant(rhs)) {
            (true, false) => true,
            (false, false) => lhs > rhs,
            _ => false,
        };
        if !swap {
            return None;
        }
        let swapped = graph.intern(make(cmp.swap()), ScalarKind::Bool, &[rhs, lhs]);
        Some(PatternMatch::replace(node, swapped, "cmp_swap_operands"))
    }

    /// Strip a sign-bit bias from both sides of a signed comparison.
    fn unbias(
        graph: &mut Graph,
        node: NodeId,
        cmp: CmpOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> Option<PatternMatch> {
        if !cmp.is_signed_ordering() && !matches!(cmp, CmpOp::Eq | CmpOp::Ne) {
            return None;
        }
        let kind = graph.kind(lhs);
        if !kind.is_integer() {
            return None;
        }
        let x = biased(graph, lhs)?;
        let y = match biased(graph, rhs) {
            Some(y) => y,
            None => {
                let c = graph.int_constant(rhs)?;
                graph.const_int(kind, c ^ kind.sign_bit())
            }
        };
        let unsigned = graph.intern(Operator::IntCmp(cmp.to_unsigned()), ScalarKind::Bool, &[x, y]);
        Some(PatternMatch::replace(node, unsigned, "cmp_unbias"))
    }
}

/// `x` if `id` is `x + MIN` or `x ^ MIN`.
fn biased(graph: &Graph, id: NodeId) -> Option<NodeId> {
    let kind = graph.kind(id);
    let is_bias_op = matches!(
        graph.op(id),
        Operator::IntOp(ArithOp::Add) | Operator::Bitwise(BitwiseOp::Xor)
    );
    if !is_bias_op {
        return None;
    }
    graph
        .is_int_constant(graph.input(id, 1), kind.sign_bit())
        .then(|| graph.input(id, 0))
}

// =============================================================================
// Tests
// =============================================================================
