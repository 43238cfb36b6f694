//! Front-end construction API.
//!
//! `GraphBuilder` picks operators from operand kinds (integer vs. float) so
//! callers write `b.add(x, y)` regardless of width. All nodes go through
//! [`Graph::intern`], so a builder never creates duplicates.

use super::graph::Graph;
use super::node::NodeId;
use super::operators::{ArithOp, BitwiseOp, CmpOp, ConvOp, Operator, ScalarKind};
use super::types::{IntRange, Type};

/// Incremental graph construction.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish construction and hand over the graph.
    pub fn finish(self) -> Graph {
        self.graph
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    fn kind_of(&self, id: NodeId) -> ScalarKind {
        self.graph.kind(id)
    }

    // =========================================================================
    // Leaves
    // =========================================================================

    /// Parameter with an unknown value.
    pub fn parameter(&mut self, index: u16, kind: ScalarKind) -> NodeId {
        self.graph.parameter(index, kind, None)
    }

    /// Integer parameter known to lie in `[lo, hi]`.
    pub fn parameter_in(&mut self, index: u16, kind: ScalarKind, lo: i64, hi: i64) -> NodeId {
        self.graph
            .parameter(index, kind, Some(Type::Int(IntRange::new(lo, hi))))
    }

    pub fn int(&mut self, value: i32) -> NodeId {
        self.graph.const_int(ScalarKind::Int, value as i64)
    }

    pub fn long(&mut self, value: i64) -> NodeId {
        self.graph.const_int(ScalarKind::Long, value)
    }

    /// Integer constant of the given kind.
    pub fn constant(&mut self, kind: ScalarKind, value: i64) -> NodeId {
        self.graph.const_int(kind, value)
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.graph.const_bool(value)
    }

    pub fn float(&mut self, value: f32) -> NodeId {
        self.graph.const_float(ScalarKind::Float, value as f64)
    }

    pub fn double(&mut self, value: f64) -> NodeId {
        self.graph.const_float(ScalarKind::Double, value)
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    /// Binary arithmetic; integer or float operator chosen by `lhs` kind.
    pub fn arith(&mut self, op: ArithOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let kind = self.kind_of(lhs);
        let op = if kind.is_float() {
            Operator::FloatOp(op)
        } else {
            Operator::IntOp(op)
        };
        self.graph.intern(op, kind, &[lhs, rhs])
    }

    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.arith(ArithOp::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.arith(ArithOp::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.arith(ArithOp::Mul, lhs, rhs)
    }

    pub fn div(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.arith(ArithOp::Div, lhs, rhs)
    }

    pub fn rem(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.arith(ArithOp::Mod, lhs, rhs)
    }

    pub fn udiv(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.arith(ArithOp::UDiv, lhs, rhs)
    }

    pub fn urem(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.arith(ArithOp::UMod, lhs, rhs)
    }

    pub fn min(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.arith(ArithOp::Min, lhs, rhs)
    }

    pub fn max(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.arith(ArithOp::Max, lhs, rhs)
    }

    /// `0 - value`.
    pub fn neg(&mut self, value: NodeId) -> NodeId {
        let kind = self.kind_of(value);
        let zero = if kind.is_float() {
            self.graph.const_float(kind, 0.0)
        } else {
            self.graph.const_int(kind, 0)
        };
        self.sub(zero, value)
    }

    // =========================================================================
    // Bitwise
    // =========================================================================

    pub fn bitwise(&mut self, op: BitwiseOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let kind = self.kind_of(lhs);
        self.graph.intern(Operator::Bitwise(op), kind, &[lhs, rhs])
    }

    pub fn and(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.bitwise(BitwiseOp::And, lhs, rhs)
    }

    pub fn or(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.bitwise(BitwiseOp::Or, lhs, rhs)
    }

    pub fn xor(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.bitwise(BitwiseOp::Xor, lhs, rhs)
    }

    /// `value ^ -1`.
    pub fn not(&mut self, value: NodeId) -> NodeId {
        let kind = self.kind_of(value);
        let ones = self.graph.const_int(kind, -1);
        self.xor(value, ones)
    }

    /// Shift by a constant amount.
    pub fn shift(&mut self, op: BitwiseOp, value: NodeId, amount: i32) -> NodeId {
        let amount = self.int(amount);
        self.bitwise(op, value, amount)
    }

    pub fn shl(&mut self, value: NodeId, amount: i32) -> NodeId {
        self.shift(BitwiseOp::Shl, value, amount)
    }

    pub fn shr(&mut self, value: NodeId, amount: i32) -> NodeId {
        self.shift(BitwiseOp::Shr, value, amount)
    }

    pub fn ushr(&mut self, value: NodeId, amount: i32) -> NodeId {
        self.shift(BitwiseOp::UShr, value, amount)
    }

    // =========================================================================
    // Comparisons and Selects
    // =========================================================================

    /// Comparison producing a `Bool`.
    pub fn cmp(&mut self, op: CmpOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let op = if self.kind_of(lhs).is_float() {
            Operator::FloatCmp(op)
        } else {
            Operator::IntCmp(op)
        };
        self.graph.intern(op, ScalarKind::Bool, &[lhs, rhs])
    }

    /// `cond ? if_true : if_false`.
    pub fn ternary(&mut self, cond: NodeId, if_true: NodeId, if_false: NodeId) -> NodeId {
        let kind = self.kind_of(if_true);
        self.graph
            .intern(Operator::Ternary, kind, &[cond, if_true, if_false])
    }

    /// `cmp(a, b) ? if_true : if_false` as a branchless select.
    pub fn cmove(
        &mut self,
        op: CmpOp,
        a: NodeId,
        b: NodeId,
        if_true: NodeId,
        if_false: NodeId,
    ) -> NodeId {
        let kind = self.kind_of(if_true);
        self.graph
            .intern(Operator::CMove(op), kind, &[a, b, if_true, if_false])
    }

    pub fn convert(&mut self, conv: ConvOp, value: NodeId) -> NodeId {
        self.graph
            .intern(Operator::Convert(conv), conv.result(), &[value])
    }

    /// Mark `value` as an output of the unit.
    pub fn ret(&mut self, value: NodeId) -> NodeId {
        let kind = self.kind_of(value);
        self.graph.intern(Operator::Return, kind, &[value])
    }
}
