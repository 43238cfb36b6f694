//! `Min` and `Max` identities.
//!
//! - min(a, a) -> a
//! - min(a, min(a, b)) -> min(a, b), for every kind
//! - min(a, max(a, b)) -> a, integers only (NaN breaks it for floats)
//! - max(x + c0, x + c1) -> x + max(c0, c1) when neither add can wrap
//! - max(x + c0, max(x + c1, z)) -> max(x + max(c0, c1), z), same condition
//!
//! Each rule also holds with `min` and `max` exchanged.

use crate::ir::graph::Graph;
use crate::ir::node::NodeId;
use crate::ir::operators::{ArithOp, Operator};
use crate::opt::instcombine::{binary, commute, PatternMatch};

/// `Min`/`Max` pattern matcher.
pub struct MinMaxPatterns;

impl MinMaxPatterns {
    pub fn try_match(graph: &mut Graph, node: NodeId, op: Operator) -> Option<PatternMatch> {
        let (arith, integer) = match op {
            Operator::IntOp(arith @ (ArithOp::Min | ArithOp::Max)) => (arith, true),
            Operator::FloatOp(arith @ (ArithOp::Min | ArithOp::Max)) => (arith, false),
            _ => return None,
        };
        let (lhs, rhs) = (graph.input(node, 0), graph.input(node, 1));
        if let Some(m) = commute(graph, node, op, lhs, rhs) {
            return Some(m);
        }
        let replace = |with: NodeId, name| Some(PatternMatch::replace(node, with, name));
        if lhs == rhs {
            return replace(lhs, "minmax_self");
        }

        // Operands are ordered with a nested same-op operand on the left.
        if let Some((p, q)) = binary(graph, lhs, op) {
            if p == rhs || q == rhs {
                return replace(lhs, "minmax_absorb_same");
            }
        }
        if !integer {
            return None;
        }

        let dual = Operator::IntOp(match arith {
            ArithOp::Min => ArithOp::Max,
            _ => ArithOp::Min,
        });
        for (nested, other) in [(lhs, rhs), (rhs, lhs)] {
            if let Some((p, q)) = binary(graph, nested, dual) {
                if p == other || q == other {
                    return replace(other, "minmax_absorb_dual");
                }
            }
        }

        let pick = |c0: i64, c1: i64| match arith {
            ArithOp::Min => c0.min(c1),
            _ => c0.max(c1),
        };
        let kind = graph.kind(node);
        if let (Some((x, c0)), Some((y, c1))) = (exact_offset(graph, lhs), exact_offset(graph, rhs)) {
            if x == y {
                let c = graph.const_int(kind, pick(c0, c1));
                let sum = graph.intern(Operator::IntOp(ArithOp::Add), kind, &[x, c]);
                return replace(sum, "minmax_common_base");
            }
        }

        // Nested form: op(op(p, q), x + c0) with x + c1 among p and q.
        let (p, q) = binary(graph, lhs, op)?;
        let (x, c0) = exact_offset(graph, rhs)?;
        for (inner, rest) in [(p, q), (q, p)] {
            if let Some((y, c1)) = exact_offset(graph, inner) {
                if y == x {
                    let c = graph.const_int(kind, pick(c0, c1));
                    let sum = graph.intern(Operator::IntOp(ArithOp::Add), kind, &[x, c]);
                    let folded = graph.intern(op, kind, &[sum, rest]);
                    return replace(folded, "minmax_nested_common_base");
                }
            }
        }
        None
    }
}

/// `(x, c)` if `id` is `x + c` and the addition provably does not wrap.
fn exact_offset(graph: &Graph, id: NodeId) -> Option<(NodeId, i64)> {
    let (x, c) = binary(graph, id, Operator::IntOp(ArithOp::Add))?;
    let c = graph.int_constant(c)?;
    let exact = graph.int_range(id).is_some_and(|r| !r.may_overflow);
    exact.then_some((x, c))
}

// =============================================================================
// Tests
// =============================================================================
