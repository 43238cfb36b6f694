//! Transfer functions of the type lattice.
//!
//! Given an operator and the types of its operands, compute a sound
//! over-approximation of the result. Integer bounds are computed exactly in
//! `i128` and saturate to the full kind (setting `may_overflow`) when the
//! exact bounds leave the kind's range. Singletons are folded through the
//! same scalar semantics the evaluator uses.

use super::eval::{bitwise, float_binary, int_binary};
use super::operators::{ArithOp, BitwiseOp, CmpOp, ConvOp, Operator, ScalarKind};
use super::types::{FloatValue, IntRange, Type, DOUBLE_NAN_BITS, FLOAT_NAN_BITS};

/// Compute the type of a node.
///
/// `inputs` pairs each operand's kind with its current type; `current` is
/// the node's present type, which parameters keep as their seed.
pub fn transfer(
    op: Operator,
    kind: ScalarKind,
    inputs: &[(ScalarKind, Type)],
    current: Type,
) -> Type {
    match op {
        Operator::ConstInt(value) => return Type::int_constant_of(value),
        Operator::ConstFloat(bits) => return Type::Float(FloatValue::from_bits(kind, bits)),
        Operator::Parameter(_) => return current,
        _ => {}
    }
    if inputs.len() != op.arity() {
        return Type::top(kind);
    }
    if inputs.iter().any(|(_, ty)| *ty == Type::Bottom) {
        return Type::Bottom;
    }

    let int_at = |i: usize| inputs[i].1.int();
    let top = Type::top(kind);
    match op {
        Operator::IntOp(arith) => match (int_at(0), int_at(1)) {
            (Some(a), Some(b)) => int_arith(arith, kind, a, b),
            _ => top,
        },
        Operator::FloatOp(arith) => match (inputs[0].1.float(), inputs[1].1.float()) {
            (Some(a), Some(b)) => Type::Float(float_arith(arith, kind, a, b)),
            _ => top,
        },
        Operator::Bitwise(bop) => match (int_at(0), int_at(1)) {
            (Some(a), Some(b)) => Type::Int(int_bitwise(bop, kind, a, b)),
            _ => top,
        },
        Operator::IntCmp(cmp) | Operator::FloatCmp(cmp) => {
            match decide(cmp, &inputs[0], &inputs[1]) {
                Some(result) => Type::int_constant_of(result as i64),
                None => Type::Int(IntRange::full(ScalarKind::Bool)),
            }
        }
        Operator::Convert(conv) => match int_at(0) {
            Some(a) => Type::Int(convert(conv, a)),
            None => top,
        },
        Operator::Ternary => match inputs[0].1.int_constant() {
            Some(0) => inputs[2].1,
            Some(_) => inputs[1].1,
            None => inputs[1].1.join(&inputs[2].1),
        },
        Operator::CMove(cmp) => match decide(cmp, &inputs[0], &inputs[1]) {
            Some(true) => inputs[2].1,
            Some(false) => inputs[3].1,
            None => inputs[2].1.join(&inputs[3].1),
        },
        Operator::Return => inputs[0].1,
        Operator::ConstInt(_) | Operator::ConstFloat(_) | Operator::Parameter(_) => top,
    }
}

// =============================================================================
// Integer Arithmetic
// =============================================================================

fn hull(values: [i128; 4]) -> (i128, i128) {
    let lo = values.iter().copied().min().unwrap_or(0);
    let hi = values.iter().copied().max().unwrap_or(0);
    (lo, hi)
}

fn corners(a: IntRange, b: IntRange, f: impl Fn(i128, i128) -> i128) -> (i128, i128) {
    let (al, ah, bl, bh) = (a.lo as i128, a.hi as i128, b.lo as i128, b.hi as i128);
    hull([f(al, bl), f(al, bh), f(ah, bl), f(ah, bh)])
}

/// Whether the exact result of a constant operation leaves the kind.
fn exact_overflows(op: ArithOp, kind: ScalarKind, x: i64, y: i64) -> bool {
    let (x, y) = (x as i128, y as i128);
    let exact = match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div if y != 0 => x / y,
        _ => return false,
    };
    exact < kind.min_value() as i128 || exact > kind.max_value() as i128
}

fn int_arith(op: ArithOp, kind: ScalarKind, a: IntRange, b: IntRange) -> Type {
    if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
        return match int_binary(op, kind, x, y) {
            Some(value) => Type::Int(IntRange {
                may_overflow: exact_overflows(op, kind, x, y),
                ..IntRange::constant(value)
            }),
            None => Type::Bottom,
        };
    }
    if op.is_division() && b.as_constant() == Some(0) {
        return Type::Bottom;
    }

    let width = kind.bits();
    let range = match op {
        ArithOp::Add => {
            IntRange::from_wide(a.lo as i128 + b.lo as i128, a.hi as i128 + b.hi as i128, kind)
        }
        ArithOp::Sub => {
            IntRange::from_wide(a.lo as i128 - b.hi as i128, a.hi as i128 - b.lo as i128, kind)
        }
        ArithOp::Mul => {
            let (lo, hi) = corners(a, b, |x, y| x * y);
            IntRange::from_wide(lo, hi, kind)
        }
        ArithOp::MulHigh => {
            let (lo, hi) = corners(a, b, |x, y| (x * y) >> width);
            IntRange::new(lo as i64, hi as i64)
        }
        ArithOp::UMulHigh if a.is_non_negative() && b.is_non_negative() => {
            let (lo, hi) = corners(a, b, |x, y| (x * y) >> width);
            IntRange::new(lo as i64, hi as i64)
        }
        ArithOp::UMulHigh => IntRange::full(kind),
        ArithOp::Div => signed_div_range(a, b, kind),
        ArithOp::Mod => signed_mod_range(a, b),
        ArithOp::UDiv => unsigned_div_range(a, b, kind),
        ArithOp::UMod => unsigned_mod_range(a, b, kind),
        ArithOp::Min => IntRange::new(a.lo.min(b.lo), a.hi.min(b.hi)),
        ArithOp::Max => IntRange::new(a.lo.max(b.lo), a.hi.max(b.hi)),
    };
    Type::Int(range)
}

fn signed_div_range(a: IntRange, b: IntRange, kind: ScalarKind) -> IntRange {
    if b.lo > 0 || b.hi < 0 {
        // Truncating division is monotone in each operand when the divisor
        // keeps one sign, so the extremes sit on the corners.
        let (lo, hi) = corners(a, b, |x, y| x / y);
        return IntRange::from_wide(lo, hi, kind);
    }
    // Any non-trapping divisor has magnitude >= 1.
    let m = (a.lo as i128).abs().max((a.hi as i128).abs());
    IntRange::from_wide(-m, m, kind)
}

fn signed_mod_range(a: IntRange, b: IntRange) -> IntRange {
    let m = (b.lo as i128).abs().max((b.hi as i128).abs()) - 1;
    let lo = if a.lo >= 0 { 0 } else { (a.lo as i128).max(-m) };
    let hi = if a.hi <= 0 { 0 } else { (a.hi as i128).min(m) };
    IntRange::new(lo as i64, hi as i64)
}

fn unsigned_div_range(a: IntRange, b: IntRange, kind: ScalarKind) -> IntRange {
    if a.is_non_negative() && b.lo > 0 {
        let (lo, hi) = corners(a, b, |x, y| x / y);
        return IntRange::new(lo as i64, hi as i64);
    }
    if b.hi < 0 {
        // Divisor at or above the sign-bit threshold: quotient is 0 or 1.
        return IntRange::new(0, 1);
    }
    if a.is_non_negative() {
        return IntRange::new(0, a.hi);
    }
    IntRange::full(kind)
}

fn unsigned_mod_range(a: IntRange, b: IntRange, kind: ScalarKind) -> IntRange {
    match (a.is_non_negative(), b.lo > 0) {
        (true, true) => IntRange::new(0, a.hi.min(b.hi - 1)),
        (true, false) => IntRange::new(0, a.hi),
        (false, true) => IntRange::new(0, b.hi - 1),
        (false, false) => IntRange::full(kind),
    }
}

// =============================================================================
// Bitwise
// =============================================================================

/// All-ones mask covering the highest set bit of a non-negative value.
fn fill_mask(value: i64) -> i64 {
    if value <= 0 {
        0
    } else {
        (u64::MAX >> value.leading_zeros()) as i64
    }
}

fn int_bitwise(op: BitwiseOp, kind: ScalarKind, a: IntRange, b: IntRange) -> IntRange {
    if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
        return IntRange::constant(bitwise(op, kind, x, y));
    }
    let amount = b.as_constant().map(|s| (s & kind.shift_mask()) as u32);
    match op {
        BitwiseOp::And => match (a.is_non_negative(), b.is_non_negative()) {
            (true, true) => IntRange::new(0, a.hi.min(b.hi)),
            (true, false) => IntRange::new(0, a.hi),
            (false, true) => IntRange::new(0, b.hi),
            (false, false) => IntRange::full(kind),
        },
        BitwiseOp::Or if a.is_non_negative() && b.is_non_negative() => {
            IntRange::new(a.lo.max(b.lo), fill_mask(a.hi.max(b.hi)))
        }
        BitwiseOp::Xor if a.is_non_negative() && b.is_non_negative() => {
            IntRange::new(0, fill_mask(a.hi.max(b.hi)))
        }
        BitwiseOp::Or | BitwiseOp::Xor => IntRange::full(kind),
        BitwiseOp::Shl => match amount {
            Some(0) => IntRange::new(a.lo, a.hi),
            Some(s) => IntRange::from_wide((a.lo as i128) << s, (a.hi as i128) << s, kind),
            None => IntRange::full(kind),
        },
        BitwiseOp::Shr => match amount {
            Some(s) => IntRange::new(a.lo >> s, a.hi >> s),
            // Arithmetic shifts move every value towards 0 or -1.
            None => IntRange::new(a.lo.min(0), if a.hi < 0 { -1 } else { a.hi }),
        },
        BitwiseOp::UShr => match amount {
            Some(0) => IntRange::new(a.lo, a.hi),
            Some(s) if a.is_non_negative() => IntRange::new(a.lo >> s, a.hi >> s),
            Some(s) => IntRange::new(0, (kind.to_unsigned(-1) >> s) as i64),
            None if a.is_non_negative() => IntRange::new(0, a.hi),
            None => IntRange::full(kind),
        },
    }
}

fn convert(conv: ConvOp, a: IntRange) -> IntRange {
    match conv {
        ConvOp::I2L => IntRange::new(a.lo, a.hi),
        ConvOp::L2I if a.lo >= i32::MIN as i64 && a.hi <= i32::MAX as i64 => {
            IntRange::new(a.lo, a.hi)
        }
        ConvOp::L2I => match a.as_constant() {
            Some(v) => IntRange::constant(conv.apply(v)),
            None => IntRange::full(ScalarKind::Int),
        },
        ConvOp::UI2L if a.is_non_negative() || a.hi < 0 => {
            IntRange::new(conv.apply(a.lo), conv.apply(a.hi))
        }
        ConvOp::UI2L => IntRange::new(0, u32::MAX as i64),
    }
}

// =============================================================================
// Comparisons
// =============================================================================

/// Map a range onto the unsigned number line, if it does not straddle zero.
fn unsigned_view(range: IntRange, kind: ScalarKind) -> Option<(i128, i128)> {
    if range.is_non_negative() || range.hi < 0 {
        Some((
            kind.to_unsigned(range.lo) as i128,
            kind.to_unsigned(range.hi) as i128,
        ))
    } else {
        None
    }
}

fn decide_int(op: CmpOp, kind: ScalarKind, a: IntRange, b: IntRange) -> Option<bool> {
    if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
        return Some(op.eval_int(kind, x, y));
    }
    let ((al, ah), (bl, bh)) = if op.is_unsigned() {
        (unsigned_view(a, kind)?, unsigned_view(b, kind)?)
    } else {
        ((a.lo as i128, a.hi as i128), (b.lo as i128, b.hi as i128))
    };
    let disjoint = ah < bl || bh < al;
    match op {
        CmpOp::Eq if disjoint => Some(false),
        CmpOp::Ne if disjoint => Some(true),
        CmpOp::Eq | CmpOp::Ne => None,
        CmpOp::Lt | CmpOp::ULt if ah < bl => Some(true),
        CmpOp::Lt | CmpOp::ULt if al >= bh => Some(false),
        CmpOp::Le | CmpOp::ULe if ah <= bl => Some(true),
        CmpOp::Le | CmpOp::ULe if al > bh => Some(false),
        CmpOp::Gt | CmpOp::UGt if al > bh => Some(true),
        CmpOp::Gt | CmpOp::UGt if ah <= bl => Some(false),
        CmpOp::Ge | CmpOp::UGe if al >= bh => Some(true),
        CmpOp::Ge | CmpOp::UGe if ah < bl => Some(false),
        _ => None,
    }
}

fn decide_float(op: CmpOp, kind: ScalarKind, a: FloatValue, b: FloatValue) -> Option<bool> {
    match (a.as_f64(kind), b.as_f64(kind)) {
        (Some(x), Some(y)) => Some(op.eval_float(x, y)),
        _ if a == FloatValue::NaN || b == FloatValue::NaN => Some(op == CmpOp::Ne),
        _ => None,
    }
}

/// Decide `cmp(a, b)` from operand types alone.
pub fn decide(op: CmpOp, a: &(ScalarKind, Type), b: &(ScalarKind, Type)) -> Option<bool> {
    let kind = a.0;
    match (a.1, b.1) {
        (Type::Int(x), Type::Int(y)) => decide_int(op, kind, x, y),
        (Type::Float(x), Type::Float(y)) => decide_float(op, kind, x, y),
        _ => None,
    }
}

// =============================================================================
// Floats
// =============================================================================

fn exact_bits(kind: ScalarKind, value: FloatValue) -> Option<u64> {
    match value {
        FloatValue::Const(bits) => Some(bits),
        FloatValue::NaN if kind == ScalarKind::Float => Some(FLOAT_NAN_BITS),
        FloatValue::NaN => Some(DOUBLE_NAN_BITS),
        _ => None,
    }
}

fn float_arith(op: ArithOp, kind: ScalarKind, a: FloatValue, b: FloatValue) -> FloatValue {
    if a == FloatValue::Bottom || b == FloatValue::Bottom {
        return FloatValue::Bottom;
    }
    if let (Some(x), Some(y)) = (exact_bits(kind, a), exact_bits(kind, b)) {
        return FloatValue::from_bits(kind, float_binary(op, kind, x, y));
    }
    // NaN is absorbing for arithmetic and for Math.min/max alike.
    if a == FloatValue::NaN || b == FloatValue::NaN {
        return FloatValue::NaN;
    }
    FloatValue::Top
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const INT: ScalarKind = ScalarKind::Int;
    const LONG: ScalarKind = ScalarKind::Long;

    fn int(lo: i64, hi: i64) -> (ScalarKind, Type) {
        (INT, Type::Int(IntRange::new(lo, hi)))
    }

    fn long(lo: i64, hi: i64) -> (ScalarKind, Type) {
        (LONG, Type::Int(IntRange::new(lo, hi)))
    }

    fn range_of(ty: Type) -> IntRange {
        ty.int().expect("integer type")
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    #[test]
    fn test_add_constants_wrap() {
        let ty = transfer(
            Operator::IntOp(ArithOp::Add),
            INT,
            &[int(i32::MAX as i64, i32::MAX as i64), int(1, 1)],
            Type::top(INT),
        );
        let r = range_of(ty);
        assert_eq!(r.as_constant(), Some(i32::MIN as i64));
        assert!(r.may_overflow);
    }

    #[test]
    fn test_add_ranges_without_overflow() {
        let ty = transfer(
            Operator::IntOp(ArithOp::Add),
            INT,
            &[int(0, 100), int(5, 5)],
            Type::top(INT),
        );
        assert_eq!(range_of(ty), IntRange::new(5, 105));
    }

    #[test]
    fn test_add_full_range_may_overflow() {
        let ty = transfer(
            Operator::IntOp(ArithOp::Add),
            LONG,
            &[long(i64::MIN, i64::MAX), long(1, 1)],
            Type::top(LONG),
        );
        assert!(range_of(ty).may_overflow);
    }

    #[test]
    fn test_mul_corners() {
        let ty = transfer(
            Operator::IntOp(ArithOp::Mul),
            INT,
            &[int(-3, 2), int(-5, 4)],
            Type::top(INT),
        );
        assert_eq!(range_of(ty), IntRange::new(-12, 15));
    }

    #[test]
    fn test_div_by_constant_zero_is_bottom() {
        let ty = transfer(
            Operator::IntOp(ArithOp::Div),
            INT,
            &[int(-3, 2), int(0, 0)],
            Type::top(INT),
        );
        assert_eq!(ty, Type::Bottom);
    }

    #[test]
    fn test_div_positive_divisor() {
        let ty = transfer(
            Operator::IntOp(ArithOp::Div),
            INT,
            &[int(-100, 50), int(2, 5)],
            Type::top(INT),
        );
        assert_eq!(range_of(ty), IntRange::new(-50, 25));
    }

    #[test]
    fn test_div_min_by_minus_one_overflows() {
        let ty = transfer(
            Operator::IntOp(ArithOp::Div),
            INT,
            &[int(i32::MIN as i64, 0), int(-1, -1)],
            Type::top(INT),
        );
        assert!(range_of(ty).may_overflow);
    }

    #[test]
    fn test_mod_range_follows_dividend_sign() {
        let ty = transfer(
            Operator::IntOp(ArithOp::Mod),
            INT,
            &[int(0, 1000), int(-7, 7)],
            Type::top(INT),
        );
        assert_eq!(range_of(ty), IntRange::new(0, 6));
    }

    #[test]
    fn test_unsigned_div_large_divisor() {
        let ty = transfer(
            Operator::IntOp(ArithOp::UDiv),
            INT,
            &[int(i32::MIN as i64, i32::MAX as i64), int(-5, -5)],
            Type::top(INT),
        );
        assert_eq!(range_of(ty), IntRange::new(0, 1));
    }

    // =========================================================================
    // Bitwise
    // =========================================================================

    #[test]
    fn test_and_with_non_negative_mask() {
        let ty = transfer(
            Operator::Bitwise(BitwiseOp::And),
            INT,
            &[int(i32::MIN as i64, i32::MAX as i64), int(255, 255)],
            Type::top(INT),
        );
        assert_eq!(range_of(ty), IntRange::new(0, 255));
    }

    #[test]
    fn test_sign_extraction_of_non_negative_is_zero() {
        let ty = transfer(
            Operator::Bitwise(BitwiseOp::Shr),
            LONG,
            &[long(0, 1 << 40), int(63, 63)],
            Type::top(LONG),
        );
        assert_eq!(ty.int_constant(), Some(0));
    }

    #[test]
    fn test_ushr_of_negative() {
        let ty = transfer(
            Operator::Bitwise(BitwiseOp::UShr),
            INT,
            &[int(-10, -1), int(28, 28)],
            Type::top(INT),
        );
        assert_eq!(range_of(ty), IntRange::new(0, 15));
    }

    #[test]
    fn test_or_fill_mask() {
        assert_eq!(fill_mask(0), 0);
        assert_eq!(fill_mask(1), 1);
        assert_eq!(fill_mask(5), 7);
        assert_eq!(fill_mask(i64::MAX), i64::MAX);
    }

    // =========================================================================
    // Comparisons
    // =========================================================================

    #[test]
    fn test_compare_disjoint_ranges() {
        let ty = transfer(
            Operator::IntCmp(CmpOp::Lt),
            ScalarKind::Bool,
            &[int(0, 5), int(6, 9)],
            Type::top(ScalarKind::Bool),
        );
        assert_eq!(ty.int_constant(), Some(1));
    }

    #[test]
    fn test_compare_overlapping_ranges_unknown() {
        let ty = transfer(
            Operator::IntCmp(CmpOp::Lt),
            ScalarKind::Bool,
            &[int(0, 6), int(6, 9)],
            Type::top(ScalarKind::Bool),
        );
        assert_eq!(range_of(ty), IntRange::new(0, 1));
    }

    #[test]
    fn test_unsigned_compare_negative_vs_positive() {
        // Every negative value is above every non-negative one unsigned.
        assert_eq!(
            decide(CmpOp::ULt, &int(0, 10), &int(-5, -1)),
            Some(true)
        );
        assert_eq!(decide(CmpOp::ULt, &int(-5, 10), &int(-5, -1)), None);
    }

    #[test]
    fn test_float_compare_with_nan() {
        let nan = (ScalarKind::Double, Type::Float(FloatValue::NaN));
        let top = (ScalarKind::Double, Type::Float(FloatValue::Top));
        assert_eq!(decide(CmpOp::Eq, &nan, &top), Some(false));
        assert_eq!(decide(CmpOp::Ne, &top, &nan), Some(true));
        assert_eq!(decide(CmpOp::Lt, &top, &top), None);
    }

    // =========================================================================
    // Floats and Selects
    // =========================================================================

    #[test]
    fn test_float_nan_propagates() {
        let ty = transfer(
            Operator::FloatOp(ArithOp::Add),
            ScalarKind::Double,
            &[
                (ScalarKind::Double, Type::Float(FloatValue::NaN)),
                (ScalarKind::Double, Type::Float(FloatValue::Top)),
            ],
            Type::top(ScalarKind::Double),
        );
        assert_eq!(ty, Type::Float(FloatValue::NaN));
    }

    #[test]
    fn test_float_fold_producing_nan() {
        let inf = (
            ScalarKind::Double,
            Type::Float(FloatValue::Const(f64::INFINITY.to_bits())),
        );
        let ty = transfer(
            Operator::FloatOp(ArithOp::Sub),
            ScalarKind::Double,
            &[inf, inf],
            Type::top(ScalarKind::Double),
        );
        assert_eq!(ty, Type::Float(FloatValue::NaN));
    }

    #[test]
    fn test_ternary_join() {
        let cond = (ScalarKind::Bool, Type::Int(IntRange::new(0, 1)));
        let ty = transfer(
            Operator::Ternary,
            INT,
            &[cond, int(1, 3), int(10, 12)],
            Type::top(INT),
        );
        assert_eq!(range_of(ty), IntRange::new(1, 12));
    }

    #[test]
    fn test_parameter_keeps_seed() {
        let seed = Type::Int(IntRange::new(0, 7));
        assert_eq!(transfer(Operator::Parameter(0), INT, &[], seed), seed);
    }

    #[test]
    fn test_conversions() {
        let narrowed = transfer(
            Operator::Convert(ConvOp::L2I),
            INT,
            &[long(0, 1 << 40)],
            Type::top(INT),
        );
        assert_eq!(range_of(narrowed), IntRange::full(INT));

        let widened = transfer(
            Operator::Convert(ConvOp::UI2L),
            LONG,
            &[int(-2, -1)],
            Type::top(LONG),
        );
        assert_eq!(
            range_of(widened),
            IntRange::new(u32::MAX as i64 - 1, u32::MAX as i64)
        );
    }
}
