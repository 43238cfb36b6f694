//! Type lattice for scalar values.
//!
//! Integers (and booleans) are tracked as closed intervals with a
//! may-overflow bit; floats use a four-point lattice so that a NaN result is
//! a constant in its own right rather than an unknown.
//!
//! ```text
//!        Top (full range / any float)
//!      /     |      \
//!  [lo,hi]  NaN   ...
//!     |
//!  constant
//!      \     |      /
//!          Bottom (no value)
//! ```

use super::operators::{Operator, ScalarKind};

/// Canonical quiet NaN for `Float`.
pub const FLOAT_NAN_BITS: u64 = 0x7fc0_0000;
/// Canonical quiet NaN for `Double`.
pub const DOUBLE_NAN_BITS: u64 = 0x7ff8_0000_0000_0000;

// =============================================================================
// Integer Ranges
// =============================================================================

/// Closed interval of sign-extended values.
///
/// `may_overflow` is set when the operation producing the value can wrap;
/// the interval is then widened to the whole kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntRange {
    pub lo: i64,
    pub hi: i64,
    pub may_overflow: bool,
}

impl IntRange {
    #[inline]
    pub const fn new(lo: i64, hi: i64) -> Self {
        IntRange {
            lo,
            hi,
            may_overflow: false,
        }
    }

    #[inline]
    pub const fn constant(value: i64) -> Self {
        Self::new(value, value)
    }

    /// Every value of the kind.
    #[inline]
    pub const fn full(kind: ScalarKind) -> Self {
        Self::new(kind.min_value(), kind.max_value())
    }

    /// Build from exact wide bounds, saturating to the full kind (with the
    /// overflow bit) when the bounds leave the representable range.
    pub fn from_wide(lo: i128, hi: i128, kind: ScalarKind) -> Self {
        if lo >= kind.min_value() as i128 && hi <= kind.max_value() as i128 {
            Self::new(lo as i64, hi as i64)
        } else {
            IntRange {
                may_overflow: true,
                ..Self::full(kind)
            }
        }
    }

    #[inline]
    pub const fn as_constant(&self) -> Option<i64> {
        if self.lo == self.hi { Some(self.lo) } else { None }
    }

    #[inline]
    pub const fn contains(&self, value: i64) -> bool {
        self.lo <= value && value <= self.hi
    }

    #[inline]
    pub const fn excludes_zero(&self) -> bool {
        !self.contains(0)
    }

    #[inline]
    pub const fn is_non_negative(&self) -> bool {
        self.lo >= 0
    }

    /// Smallest hull containing both intervals. Either side's overflow
    /// flag carries over.
    pub fn join(&self, other: &IntRange) -> IntRange {
        IntRange {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
            may_overflow: self.may_overflow || other.may_overflow,
        }
    }

    /// Intersection, or `None` when the intervals are disjoint.
    pub fn meet(&self, other: &IntRange) -> Option<IntRange> {
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        (lo <= hi).then_some(IntRange {
            lo,
            hi,
            may_overflow: self.may_overflow && other.may_overflow,
        })
    }

    /// Smallest `n` such that every value fits an `n`-bit signed integer.
    pub fn signed_bits(&self) -> u32 {
        let bits_for = |v: i64| {
            if v >= 0 {
                65 - v.leading_zeros()
            } else {
                65 - (!v).leading_zeros()
            }
        };
        bits_for(self.lo).max(bits_for(self.hi)).min(64)
    }
}

// =============================================================================
// Float Lattice
// =============================================================================

/// Four-point lattice for `Float` and `Double`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatValue {
    Bottom,
    /// Exactly this non-NaN bit pattern.
    Const(u64),
    /// Exactly NaN (payload not tracked).
    NaN,
    Top,
}

impl FloatValue {
    /// Classify a raw constant of the given kind.
    pub fn from_bits(kind: ScalarKind, bits: u64) -> Self {
        if to_f64(kind, bits).is_nan() {
            FloatValue::NaN
        } else {
            FloatValue::Const(bits)
        }
    }

    /// The value as `f64`, if exact. NaN is reported as `f64::NAN`.
    pub fn as_f64(&self, kind: ScalarKind) -> Option<f64> {
        match *self {
            FloatValue::Const(bits) => Some(to_f64(kind, bits)),
            FloatValue::NaN => Some(f64::NAN),
            _ => None,
        }
    }

    pub fn meet(&self, other: &FloatValue) -> Option<FloatValue> {
        match (*self, *other) {
            (FloatValue::Top, x) | (x, FloatValue::Top) => Some(x),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }

    pub fn join(&self, other: &FloatValue) -> FloatValue {
        match (*self, *other) {
            (FloatValue::Bottom, x) | (x, FloatValue::Bottom) => x,
            (a, b) if a == b => a,
            _ => FloatValue::Top,
        }
    }
}

/// Widen a stored float constant to `f64` (exact for `Float`).
pub fn to_f64(kind: ScalarKind, bits: u64) -> f64 {
    match kind {
        ScalarKind::Float => f32::from_bits(bits as u32) as f64,
        _ => f64::from_bits(bits),
    }
}

/// Store an `f64` as a constant payload of the given kind.
pub fn from_f64(kind: ScalarKind, value: f64) -> u64 {
    match kind {
        ScalarKind::Float => (value as f32).to_bits() as u64,
        _ => value.to_bits(),
    }
}

// =============================================================================
// Type
// =============================================================================

/// Lattice element attached to every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// The node never yields a value (e.g. division by constant zero).
    Bottom,
    Int(IntRange),
    Float(FloatValue),
}

impl Type {
    /// The least precise type of a kind.
    pub const fn top(kind: ScalarKind) -> Type {
        if kind.is_float() {
            Type::Float(FloatValue::Top)
        } else {
            Type::Int(IntRange::full(kind))
        }
    }

    pub const fn int_constant_of(value: i64) -> Type {
        Type::Int(IntRange::constant(value))
    }

    #[inline]
    pub fn int(&self) -> Option<IntRange> {
        match *self {
            Type::Int(range) => Some(range),
            _ => None,
        }
    }

    #[inline]
    pub fn float(&self) -> Option<FloatValue> {
        match *self {
            Type::Float(value) => Some(value),
            _ => None,
        }
    }

    /// The integer singleton, if the type is one.
    #[inline]
    pub fn int_constant(&self) -> Option<i64> {
        self.int().and_then(|r| r.as_constant())
    }

    /// Whether the type denotes exactly one value.
    pub fn is_constant(&self) -> bool {
        match self {
            Type::Int(range) => range.lo == range.hi,
            Type::Float(value) => matches!(value, FloatValue::Const(_) | FloatValue::NaN),
            Type::Bottom => false,
        }
    }

    /// The constant operator that materializes a singleton type.
    pub fn to_constant_operator(&self, kind: ScalarKind) -> Option<Operator> {
        match *self {
            Type::Int(range) => range.as_constant().map(Operator::ConstInt),
            Type::Float(FloatValue::Const(bits)) => Some(Operator::ConstFloat(bits)),
            Type::Float(FloatValue::NaN) => Some(Operator::ConstFloat(match kind {
                ScalarKind::Float => FLOAT_NAN_BITS,
                _ => DOUBLE_NAN_BITS,
            })),
            _ => None,
        }
    }

    /// Greatest type below both, or `None` when they share no value.
    pub fn meet(&self, other: &Type) -> Option<Type> {
        match (self, other) {
            (Type::Int(a), Type::Int(b)) => a.meet(b).map(Type::Int),
            (Type::Float(a), Type::Float(b)) => a.meet(b).map(Type::Float),
            _ => None,
        }
    }

    pub fn join(&self, other: &Type) -> Type {
        match (self, other) {
            (Type::Bottom, x) | (x, Type::Bottom) => *x,
            (Type::Int(a), Type::Int(b)) => Type::Int(a.join(b)),
            (Type::Float(a), Type::Float(b)) => Type::Float(a.join(b)),
            // Mixed kinds only arise from malformed graphs; stay sound.
            (Type::Int(_), Type::Float(_)) | (Type::Float(_), Type::Int(_)) => {
                Type::Float(FloatValue::Top)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
