//! Scalar semantics and a reference evaluator.
//!
//! The free functions here define what every operator computes (Java scalar
//! semantics: wrapping integers, masked shift amounts, `MIN / -1 == MIN`,
//! IEEE floats, `Math.min`/`Math.max`). Constant folding in the lattice and
//! the [`evaluate`] interpreter share them, so a rewrite is correct exactly
//! when the evaluator cannot tell the graphs apart.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::graph::Graph;
use super::node::NodeId;
use super::operators::{ArithOp, BitwiseOp, Operator, ScalarKind};
use super::types::to_f64;
use crate::error::EvalError;

// =============================================================================
// Scalar Semantics
// =============================================================================

/// Integer arithmetic on sign-extended values. `None` means the operation
/// traps (division or remainder by zero).
pub fn int_binary(op: ArithOp, kind: ScalarKind, a: i64, b: i64) -> Option<i64> {
    let wide = kind == ScalarKind::Long;
    let result = match op {
        ArithOp::Add => a.wrapping_add(b),
        ArithOp::Sub => a.wrapping_sub(b),
        ArithOp::Mul => a.wrapping_mul(b),
        ArithOp::MulHigh if wide => ((a as i128 * b as i128) >> 64) as i64,
        ArithOp::MulHigh => (a * b) >> 32,
        ArithOp::UMulHigh if wide => ((a as u64 as u128 * b as u64 as u128) >> 64) as i64,
        ArithOp::UMulHigh => ((kind.to_unsigned(a) * kind.to_unsigned(b)) >> 32) as i64,
        ArithOp::Div | ArithOp::Mod | ArithOp::UDiv | ArithOp::UMod if b == 0 => return None,
        ArithOp::Div if wide => a.wrapping_div(b),
        ArithOp::Div => (a as i32).wrapping_div(b as i32) as i64,
        ArithOp::Mod if wide => a.wrapping_rem(b),
        ArithOp::Mod => (a as i32).wrapping_rem(b as i32) as i64,
        ArithOp::UDiv => (kind.to_unsigned(a) / kind.to_unsigned(b)) as i64,
        ArithOp::UMod => (kind.to_unsigned(a) % kind.to_unsigned(b)) as i64,
        ArithOp::Min => a.min(b),
        ArithOp::Max => a.max(b),
    };
    Some(kind.wrap(result))
}

/// Bitwise operators and shifts. Shift amounts are masked to `width - 1`.
pub fn bitwise(op: BitwiseOp, kind: ScalarKind, a: i64, b: i64) -> i64 {
    let amount = (b & kind.shift_mask()) as u32;
    let result = match op {
        BitwiseOp::And => a & b,
        BitwiseOp::Or => a | b,
        BitwiseOp::Xor => a ^ b,
        BitwiseOp::Shl => a.wrapping_shl(amount),
        BitwiseOp::Shr => a >> amount,
        BitwiseOp::UShr => (kind.to_unsigned(a) >> amount) as i64,
    };
    kind.wrap(result)
}

/// `Math.min`: NaN if either operand is NaN, and `-0.0 < +0.0`.
pub fn java_min(a: f64, b: f64) -> f64 {
    if a.is_nan() {
        return a;
    }
    if a == 0.0 && b == 0.0 && b.is_sign_negative() {
        return b;
    }
    if a <= b { a } else { b }
}

/// `Math.max`: NaN if either operand is NaN, and `+0.0 > -0.0`.
pub fn java_max(a: f64, b: f64) -> f64 {
    if a.is_nan() {
        return a;
    }
    if a == 0.0 && b == 0.0 && a.is_sign_negative() {
        return b;
    }
    if a >= b { a } else { b }
}

/// Float arithmetic on raw bit patterns of the given kind.
pub fn float_binary(op: ArithOp, kind: ScalarKind, a: u64, b: u64) -> u64 {
    if kind == ScalarKind::Float {
        let (x, y) = (f32::from_bits(a as u32), f32::from_bits(b as u32));
        let r = match op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div => x / y,
            ArithOp::Mod => x % y,
            ArithOp::Min => java_min(x as f64, y as f64) as f32,
            ArithOp::Max => java_max(x as f64, y as f64) as f32,
            _ => f32::NAN,
        };
        r.to_bits() as u64
    } else {
        let (x, y) = (f64::from_bits(a), f64::from_bits(b));
        let r = match op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div => x / y,
            ArithOp::Mod => x % y,
            ArithOp::Min => java_min(x, y),
            ArithOp::Max => java_max(x, y),
            _ => f64::NAN,
        };
        r.to_bits()
    }
}

// =============================================================================
// Values
// =============================================================================

/// A runtime scalar.
///
/// Equality is bit-exact (`-0.0 != +0.0`) except that any two NaNs are
/// equal.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Value {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Value::Bool(_) => ScalarKind::Bool,
            Value::Int(_) => ScalarKind::Int,
            Value::Long(_) => ScalarKind::Long,
            Value::Float(_) => ScalarKind::Float,
            Value::Double(_) => ScalarKind::Double,
        }
    }

    fn to_raw(self) -> u64 {
        match self {
            Value::Bool(b) => b as u64,
            Value::Int(v) => v as i64 as u64,
            Value::Long(v) => v as u64,
            Value::Float(v) => v.to_bits() as u64,
            Value::Double(v) => v.to_bits(),
        }
    }

    fn from_raw(kind: ScalarKind, raw: u64) -> Value {
        match kind {
            ScalarKind::Bool => Value::Bool(raw & 1 != 0),
            ScalarKind::Int => Value::Int(raw as i32),
            ScalarKind::Long => Value::Long(raw as i64),
            ScalarKind::Float => Value::Float(f32::from_bits(raw as u32)),
            ScalarKind::Double => Value::Double(f64::from_bits(raw)),
        }
    }

    fn is_nan(&self) -> bool {
        match self {
            Value::Float(v) => v.is_nan(),
            Value::Double(v) => v.is_nan(),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
            && ((self.is_nan() && other.is_nan()) || self.to_raw() == other.to_raw())
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// Evaluate `output` for the given parameter values.
///
/// The graph models a straight-line region: every live trapping division is
/// executed (in node order) before the output is read, so a division kept
/// only for its trap still faults.
pub fn evaluate(graph: &Graph, output: NodeId, params: &[Value]) -> Result<Value, EvalError> {
    let mut evaluator = Evaluator {
        graph,
        params,
        memo: FxHashMap::default(),
    };
    for (id, node) in graph.iter() {
        if node.may_trap() {
            evaluator.value_of(id)?;
        }
    }
    let raw = evaluator.value_of(output)?;
    Ok(Value::from_raw(graph.node(output).kind, raw))
}

struct Evaluator<'a> {
    graph: &'a Graph,
    params: &'a [Value],
    memo: FxHashMap<NodeId, u64>,
}

impl Evaluator<'_> {
    fn value_of(&mut self, root: NodeId) -> Result<u64, EvalError> {
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if self.memo.contains_key(&id) {
                continue;
            }
            let node = self.graph.node(id);
            if node.is_dead() {
                return Err(EvalError::DeadNode(id));
            }
            if !expanded {
                stack.push((id, true));
                stack.extend(
                    node.inputs
                        .iter()
                        .filter(|input| !self.memo.contains_key(input))
                        .map(|&input| (input, false)),
                );
                continue;
            }
            let args = node
                .inputs
                .iter()
                .map(|input| self.memo.get(input).copied().ok_or(EvalError::NoValue(*input)))
                .collect::<Result<SmallVec<[u64; 4]>, _>>()?;
            let value = self.compute(id, &args)?;
            self.memo.insert(id, value);
        }
        self.memo.get(&root).copied().ok_or(EvalError::NoValue(root))
    }

    fn compute(&self, id: NodeId, args: &[u64]) -> Result<u64, EvalError> {
        let node = self.graph.node(id);
        let kind = node.kind;
        let operand_kind = |i: usize| self.graph.node(node.input(i)).kind;
        let value = match node.op {
            Operator::ConstInt(v) => v as u64,
            Operator::ConstFloat(bits) => bits,
            Operator::Parameter(index) => {
                let value = self
                    .params
                    .get(index as usize)
                    .ok_or(EvalError::MissingParameter { index })?;
                if value.kind() != kind {
                    return Err(EvalError::ParameterKind {
                        index,
                        expected: kind,
                        found: value.kind(),
                    });
                }
                value.to_raw()
            }
            Operator::IntOp(op) => int_binary(op, kind, args[0] as i64, args[1] as i64)
                .ok_or(EvalError::DivisionByZero(id))? as u64,
            Operator::FloatOp(op) => float_binary(op, kind, args[0], args[1]),
            Operator::Bitwise(op) => bitwise(op, kind, args[0] as i64, args[1] as i64) as u64,
            Operator::IntCmp(op) => op.eval_int(operand_kind(0), args[0] as i64, args[1] as i64) as u64,
            Operator::FloatCmp(op) => {
                let k = operand_kind(0);
                op.eval_float(to_f64(k, args[0]), to_f64(k, args[1])) as u64
            }
            Operator::Convert(conv) => conv.apply(args[0] as i64) as u64,
            Operator::Ternary => {
                if args[0] != 0 {
                    args[1]
                } else {
                    args[2]
                }
            }
            Operator::CMove(op) => {
                let k = operand_kind(0);
                let taken = if k.is_float() {
                    op.eval_float(to_f64(k, args[0]), to_f64(k, args[1]))
                } else {
                    op.eval_int(k, args[0] as i64, args[1] as i64)
                };
                if taken { args[2] } else { args[3] }
            }
            Operator::Return => args[0],
        };
        Ok(value)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::GraphBuilder;
    use crate::ir::operators::CmpOp;

    #[test]
    fn test_int_division_edge_cases() {
        let int = ScalarKind::Int;
        let min = i32::MIN as i64;
        assert_eq!(int_binary(ArithOp::Div, int, min, -1), Some(min));
        assert_eq!(int_binary(ArithOp::Mod, int, min, -1), Some(0));
        assert_eq!(int_binary(ArithOp::Div, int, -7, 2), Some(-3));
        assert_eq!(int_binary(ArithOp::Mod, int, -7, 2), Some(-1));
        assert_eq!(int_binary(ArithOp::Div, int, 5, 0), None);
        assert_eq!(int_binary(ArithOp::UDiv, int, -1, 2), Some(i32::MAX as i64));
    }

    #[test]
    fn test_int_wrapping() {
        let int = ScalarKind::Int;
        assert_eq!(
            int_binary(ArithOp::Add, int, i32::MAX as i64, 1),
            Some(i32::MIN as i64)
        );
        assert_eq!(
            int_binary(ArithOp::Mul, ScalarKind::Long, i64::MAX, 2),
            Some(-2)
        );
    }

    #[test]
    fn test_mul_high() {
        assert_eq!(int_binary(ArithOp::MulHigh, ScalarKind::Long, -1, 1), Some(-1));
        assert_eq!(int_binary(ArithOp::UMulHigh, ScalarKind::Long, -1, 2), Some(1));
        assert_eq!(
            int_binary(ArithOp::MulHigh, ScalarKind::Int, 1 << 30, 8),
            Some(2)
        );
        assert_eq!(int_binary(ArithOp::UMulHigh, ScalarKind::Int, -1, -1), Some(-2));
    }

    #[test]
    fn test_shift_amount_masked() {
        assert_eq!(bitwise(BitwiseOp::Shl, ScalarKind::Int, 1, 33), 2);
        assert_eq!(bitwise(BitwiseOp::Shl, ScalarKind::Long, 1, 65), 2);
        assert_eq!(bitwise(BitwiseOp::Shr, ScalarKind::Int, -8, 1), -4);
        assert_eq!(
            bitwise(BitwiseOp::UShr, ScalarKind::Int, -1, 28),
            0xF
        );
    }

    #[test]
    fn test_java_min_max_semantics() {
        assert!(java_min(f64::NAN, 1.0).is_nan());
        assert!(java_min(1.0, f64::NAN).is_nan());
        assert!(java_max(f64::NAN, 1.0).is_nan());
        assert!(java_max(1.0, f64::NAN).is_nan());
        assert_eq!(java_min(0.0, -0.0).to_bits(), (-0.0f64).to_bits());
        assert_eq!(java_min(-0.0, 0.0).to_bits(), (-0.0f64).to_bits());
        assert_eq!(java_max(0.0, -0.0).to_bits(), 0.0f64.to_bits());
        assert_eq!(java_max(-0.0, 0.0).to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(-f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
        assert_ne!(Value::Int(1), Value::Long(1));
    }

    #[test]
    fn test_evaluate_simple_graph() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Int);
        let y = b.parameter(1, ScalarKind::Int);
        let lt = b.cmp(CmpOp::Lt, x, y);
        let sel = b.ternary(lt, x, y);
        let ret = b.ret(sel);
        let graph = b.finish();

        let got = evaluate(&graph, ret, &[Value::Int(3), Value::Int(-9)]).unwrap();
        assert_eq!(got, Value::Int(-9));
    }

    #[test]
    fn test_evaluate_unused_division_still_traps() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Long);
        let y = b.parameter(1, ScalarKind::Long);
        let _ = b.div(x, y);
        let ret = b.ret(x);
        let graph = b.finish();

        let err = evaluate(&graph, ret, &[Value::Long(1), Value::Long(0)]).unwrap_err();
        assert!(matches!(err, EvalError::DivisionByZero(_)));
        assert_eq!(
            evaluate(&graph, ret, &[Value::Long(1), Value::Long(2)]),
            Ok(Value::Long(1))
        );
    }

    #[test]
    fn test_evaluate_missing_parameter() {
        let mut b = GraphBuilder::new();
        let x = b.parameter(0, ScalarKind::Int);
        let ret = b.ret(x);
        let graph = b.finish();
        assert_eq!(
            evaluate(&graph, ret, &[]),
            Err(EvalError::MissingParameter { index: 0 })
        );
    }
}
