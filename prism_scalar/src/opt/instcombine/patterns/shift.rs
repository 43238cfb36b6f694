//! Shift patterns for instruction combining.
//!
//! Shift amounts are `Int` constants taken modulo the operand width, so the
//! first rule rewrites every constant amount into `[0, width)`. With
//! normalized amounts:
//!
//! - x << 0 -> x (likewise for >> and >>>)
//! - (x << a) << b -> x << (a + b), or 0 once a + b reaches the width
//! - (x >> a) << a -> x & (-1 << a), and differing amounts become one shift
//!   plus a mask
//! - (x >> a) >> b -> x >> min(a + b, w - 1)
//! - (x >>> a) >>> b -> x >>> (a + b), or 0 once a + b reaches the width
//! - (x >> w-1) >>> w-1 -> x >>> w-1

use crate::ir::graph::Graph;
use crate::ir::node::NodeId;
use crate::ir::operators::{BitwiseOp, Operator, ScalarKind};

use super::PatternMatch;

// =============================================================================
// Shift Patterns
// =============================================================================

/// Shift pattern matcher.
pub struct ShiftPatterns;

impl ShiftPatterns {
    pub fn try_match(graph: &mut Graph, node: NodeId, op: Operator) -> Option<PatternMatch> {
        let Operator::Bitwise(shift) = op else {
            return None;
        };
        if !shift.is_shift() {
            return None;
        }
        let kind = graph.kind(node);
        let value = graph.input(node, 0);
        let raw = graph.int_constant(graph.input(node, 1))?;
        let amount = (raw & kind.shift_mask()) as u32;

        if amount == 0 {
            return Some(PatternMatch::replace(node, value, "shift_zero"));
        }
        if raw != amount as i64 {
            let replacement = shift_by(graph, shift, kind, value, amount);
            return Some(PatternMatch::replace(node, replacement, "shift_mask_amount"));
        }

        let width = kind.bits();
        let (inner_op, inner_value, inner_amount) = constant_shift(graph, value)?;
        let replace = |with: NodeId, name| Some(PatternMatch::replace(node, with, name));

        match (shift, inner_op) {
            (BitwiseOp::Shl, BitwiseOp::Shl) => {
                let total = inner_amount + amount;
                if total >= width {
                    return replace(graph.const_int(kind, 0), "shl_shl_overflow");
                }
                replace(shift_by(graph, BitwiseOp::Shl, kind, inner_value, total), "shl_shl")
            }
            (BitwiseOp::Shl, BitwiseOp::Shr | BitwiseOp::UShr) => {
                // Clear the low `amount` bits of the realigned value.
                let mask = graph.const_int(kind, -1i64 << amount);
                let realigned = if inner_amount > amount {
                    shift_by(graph, inner_op, kind, inner_value, inner_amount - amount)
                } else if inner_amount < amount {
                    shift_by(graph, BitwiseOp::Shl, kind, inner_value, amount - inner_amount)
                } else {
                    inner_value
                };
                let and = graph.intern(Operator::Bitwise(BitwiseOp::And), kind, &[realigned, mask]);
                replace(and, "shr_shl_mask")
            }
            (BitwiseOp::Shr, BitwiseOp::Shr) => {
                let total = (inner_amount + amount).min(width - 1);
                replace(shift_by(graph, BitwiseOp::Shr, kind, inner_value, total), "shr_shr")
            }
            (BitwiseOp::UShr, BitwiseOp::UShr) => {
                let total = inner_amount + amount;
                if total >= width {
                    return replace(graph.const_int(kind, 0), "ushr_ushr_overflow");
                }
                replace(shift_by(graph, BitwiseOp::UShr, kind, inner_value, total), "ushr_ushr")
            }
            (BitwiseOp::UShr, BitwiseOp::Shr) if amount == width - 1 && inner_amount == width - 1 => {
                replace(
                    shift_by(graph, BitwiseOp::UShr, kind, inner_value, width - 1),
                    "sign_bit_extract",
                )
            }
            _ => None,
        }
    }
}

/// `(op, x, amount)` if `id` is a shift of `x` by a normalized constant.
fn constant_shift(graph: &Graph, id: NodeId) -> Option<(BitwiseOp, NodeId, u32)> {
    let Operator::Bitwise(op) = graph.op(id) else {
        return None;
    };
    if !op.is_shift() {
        return None;
    }
    let kind = graph.kind(id);
    let amount = graph.int_constant(graph.input(id, 1))?;
    if amount <= 0 || amount > kind.shift_mask() {
        return None;
    }
    Some((op, graph.input(id, 0), amount as u32))
}

fn shift_by(graph: &mut Graph, op: BitwiseOp, kind: ScalarKind, value: NodeId, amount: u32) -> NodeId {
    let amount = graph.const_int(ScalarKind::Int, amount as i64);
    graph.intern(Operator::Bitwise(op), kind, &[value, amount])
}

// =============================================================================
// Tests
// =============================================================================
