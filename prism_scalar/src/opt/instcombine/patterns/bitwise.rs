//! Bitwise patterns for instruction combining.
//!
//! Patterns include:
//! - x & 0 -> 0, x & -1 -> x, x & x -> x
//! - x | 0 -> x, x | -1 -> -1, x | x -> x
//! - x ^ 0 -> x, x ^ x -> 0
//! - (x op c1) op c2 -> x op (c1 op c2)
//! - x & (2^k - 1) -> x when x is known to fit in k bits
//! - ~(x + c) -> (-c - 1) - x, ~(c - x) -> x + (-c - 1)

use crate::ir::graph::Graph;
use crate::ir::node::NodeId;
use crate::ir::operators::{ArithOp, BitwiseOp, Operator};

use super::{binary, commute, int_op, with_constant, PatternMatch};

// =============================================================================
// Bitwise Patterns
// =============================================================================

/// Bitwise pattern matcher.
pub struct BitwisePatterns;

impl BitwisePatterns {
    pub fn try_match(graph: &mut Graph, node: NodeId, op: Operator) -> Option<PatternMatch> {
        let Operator::Bitwise(bitwise_op) = op else {
            return None;
        };
        if bitwise_op.is_shift() {
            return None;
        }
        let (lhs, rhs) = (graph.input(node, 0), graph.input(node, 1));
        if let Some(m) = commute(graph, node, op, lhs, rhs) {
            return Some(m);
        }
        match bitwise_op {
            BitwiseOp::And => Self::try_and(graph, node, lhs, rhs),
            BitwiseOp::Or => Self::try_or(graph, node, lhs, rhs),
            BitwiseOp::Xor => Self::try_xor(graph, node, lhs, rhs),
            _ => None,
        }
    }

    /// `(x op c1) op c2 -> x op (c1 op c2)`.
    fn fold_constants(
        graph: &mut Graph,
        node: NodeId,
        op: BitwiseOp,
        lhs: NodeId,
        c2: i64,
        name: &'static str,
    ) -> Option<PatternMatch> {
        let operator = Operator::Bitwise(op);
        let (x, c1) = with_constant(graph, lhs, operator)?;
        let kind = graph.kind(node);
        let folded = match op {
            BitwiseOp::And => c1 & c2,
            BitwiseOp::Or => c1 | c2,
            _ => c1 ^ c2,
        };
        let c = graph.const_int(kind, folded);
        let replacement = graph.intern(operator, kind, &[x, c]);
        Some(PatternMatch::replace(node, replacement, name))
    }

    // =========================================================================
    // And
    // =========================================================================

    fn try_and(graph: &mut Graph, node: NodeId, lhs: NodeId, rhs: NodeId) -> Option<PatternMatch> {
        let kind = graph.kind(node);
        if lhs == rhs {
            return Some(PatternMatch::replace(node, lhs, "and_self"));
        }
        let c = graph.int_constant(rhs)?;
        if c == 0 {
            let zero = graph.const_int(kind, 0);
            return Some(PatternMatch::replace(node, zero, "and_zero"));
        }
        if c == kind.wrap(-1) {
            return Some(PatternMatch::replace(node, lhs, "and_all_ones"));
        }
        if let Some(m) = Self::fold_constants(graph, node, BitwiseOp::And, lhs, c, "and_fold_constants") {
            return Some(m);
        }
        // A low mask that keeps every bit the operand can have.
        let is_low_mask = c > 0 && c & c.wrapping_add(1) == 0;
        let fits = graph
            .int_range(lhs)
            .is_some_and(|r| r.is_non_negative() && r.hi <= c);
        if is_low_mask && fits {
            return Some(PatternMatch::replace(node, lhs, "and_redundant_mask"));
        }
        None
    }

    // =========================================================================
    // Or
    // =========================================================================

    fn try_or(graph: &mut Graph, node: NodeId, lhs: NodeId, rhs: NodeId) -> Option<PatternMatch> {
        let kind = graph.kind(node);
        if lhs == rhs {
            return Some(PatternMatch::replace(node, lhs, "or_self"));
        }
        let c = graph.int_constant(rhs)?;
        if c == 0 {
            return Some(PatternMatch::replace(node, lhs, "or_zero"));
        }
        if c == kind.wrap(-1) {
            return Some(PatternMatch::replace(node, rhs, "or_all_ones"));
        }
        Self::fold_constants(graph, node, BitwiseOp::Or, lhs, c, "or_fold_constants")
    }

    // =========================================================================
    // Xor
    // =========================================================================

    fn try_xor(graph: &mut Graph, node: NodeId, lhs: NodeId, rhs: NodeId) -> Option<PatternMatch> {
        let kind = graph.kind(node);
        if lhs == rhs {
            let zero = graph.const_int(kind, 0);
            return Some(PatternMatch::replace(node, zero, "xor_self"));
        }
        let c = graph.int_constant(rhs)?;
        if c == 0 {
            return Some(PatternMatch::replace(node, lhs, "xor_zero"));
        }
        if let Some(m) = Self::fold_constants(graph, node, BitwiseOp::Xor, lhs, c, "xor_fold_constants") {
            return Some(m);
        }
        if c != -1 || !kind.is_integer() {
            return None;
        }

        // ~(x + k) -> (-k - 1) - x
        if let Some((x, k)) = with_constant(graph, lhs, Operator::IntOp(ArithOp::Add)) {
            let folded = k.wrapping_neg().wrapping_sub(1);
            if kind.wrap(folded) != -1 {
                let c = graph.const_int(kind, folded);
                let replacement = int_op(graph, ArithOp::Sub, kind, c, x);
                return Some(PatternMatch::replace(node, replacement, "not_of_add"));
            }
        }
        // ~(k - x) -> x + (-k - 1)
        if let Some((k, x)) = binary(graph, lhs, Operator::IntOp(ArithOp::Sub)) {
            if let Some(k) = graph.int_constant(k) {
                let c = graph.const_int(kind, k.wrapping_neg().wrapping_sub(1));
                let replacement = int_op(graph, ArithOp::Add, kind, x, c);
                return Some(PatternMatch::replace(node, replacement, "not_of_sub"));
            }
        }
        None
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::GraphBuilder;
    use crate::ir::operators::ScalarKind;

    fn rewrite(g: &mut Graph, node: NodeId) -> Option<PatternMatch> {
        let op = g.op(node);
        BitwisePatterns::try_match(g, node, op)
    }

    #[test]
    fn test_xor_self_int_and_bool() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Int);
        let p = b.parameter(1, ScalarKind::Bool);
        let xi = b.xor(x, x);
        let xb = b.xor(p, p);
        let mut g = b.finish();
        let zi = rewrite(&mut g, xi).unwrap().replacement();
        let zb = rewrite(&mut g, xb).unwrap().replacement();
        assert!(g.is_int_constant(zi, 0));
        assert!(g.is_int_constant(zb, 0));
        assert_eq!(g.kind(zb), ScalarKind::Bool);
    }

    #[test]
    fn test_and_or_identities() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Long);
        let zero = b.long(0);
        let ones = b.long(-1);
        let a0 = b.and(x, zero);
        let a1 = b.and(x, ones);
        let o0 = b.or(x, zero);
        let o1 = b.or(x, ones);
        let mut g = b.finish();
        assert_eq!(rewrite(&mut g, a0).unwrap().replacement(), zero);
        assert_eq!(rewrite(&mut g, a1).unwrap().replacement(), x);
        assert_eq!(rewrite(&mut g, o0).unwrap().replacement(), x);
        assert_eq!(rewrite(&mut g, o1).unwrap().replacement(), ones);
    }

    #[test]
    fn test_bool_all_ones_is_one() {
        let mut b = GraphBuilder::new();
        let p = b.parameter(0, ScalarKind::Bool);
        let t = b.boolean(true);
        let and = b.and(p, t);
        let mut g = b.finish();
        assert_eq!(rewrite(&mut g, and).unwrap().replacement(), p);
    }

    #[test]
    fn test_fold_constant_masks() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Int);
        let c1 = b.int(0xff0);
        let c2 = b.int(0x0ff);
        let inner = b.and(x, c1);
        let outer = b.and(inner, c2);
        let mut g = b.finish();
        let r = rewrite(&mut g, outer).unwrap().replacement();
        assert_eq!(g.input(r, 0), x);
        assert!(g.is_int_constant(g.input(r, 1), 0x0f0));
    }

    #[test]
    fn test_redundant_mask() {
        let mut b = GraphBuilder::new();
        let x = b.parameter_in(0, ScalarKind::Int, 0, 200);
        let y = b.parameter_in(1, ScalarKind::Int, -1, 200);
        let mask = b.int(0xff);
        let kept = b.and(x, mask);
        let needed = b.and(y, mask);
        let mut g = b.finish();
        assert_eq!(rewrite(&mut g, kept).unwrap().replacement(), x);
        assert!(rewrite(&mut g, needed).is_none());
    }

    #[test]
    fn test_not_of_add() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Int);
        let c = b.int(5);
        let sum = b.add(x, c);
        let not = b.not(sum);
        let mut g = b.finish();
        let r = rewrite(&mut g, not).unwrap().replacement();
        assert_eq!(g.op(r), Operator::IntOp(ArithOp::Sub));
        assert!(g.is_int_constant(g.input(r, 0), -6));
        assert_eq!(g.input(r, 1), x);
    }

    #[test]
    fn test_not_of_sub() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Long);
        let c = b.long(10);
        let diff = b.sub(c, x);
        let not = b.not(diff);
        let mut g = b.finish();
        let r = rewrite(&mut g, not).unwrap().replacement();
        assert_eq!(g.op(r), Operator::IntOp(ArithOp::Add));
        assert!(g.is_int_constant(g.input(r, 1), -11));
    }

    #[test]
    fn test_double_not_folds_to_xor_zero() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Int);
        let n1 = b.not(x);
        let n2 = b.not(n1);
        let mut g = b.finish();
        let r = rewrite(&mut g, n2).unwrap().replacement();
        assert_eq!(g.input(r, 0), x);
        assert!(g.is_int_constant(g.input(r, 1), 0));
    }
}
