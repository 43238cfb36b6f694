//! Operators and scalar kinds of the value graph.
//!
//! An [`Operator`] together with a [`ScalarKind`] and an input tuple is the
//! full identity of a node: the hash-consing table keys on exactly these
//! three things.

// =============================================================================
// Scalar Kinds
// =============================================================================

/// Machine representation of a node's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ScalarKind {
    /// Boolean, represented as an integer in `{0, 1}`.
    Bool = 0,
    /// 32-bit two's-complement integer.
    Int = 1,
    /// 64-bit two's-complement integer.
    Long = 2,
    /// IEEE-754 binary32.
    Float = 3,
    /// IEEE-754 binary64.
    Double = 4,
}

impl ScalarKind {
    /// Bit width of the representation.
    #[inline]
    pub const fn bits(self) -> u32 {
        match self {
            ScalarKind::Bool => 1,
            ScalarKind::Int | ScalarKind::Float => 32,
            ScalarKind::Long | ScalarKind::Double => 64,
        }
    }

    /// Two's-complement integer kinds (excludes `Bool`).
    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::Long)
    }

    /// Kinds whose values live in the integer range lattice.
    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(self, ScalarKind::Bool | ScalarKind::Int | ScalarKind::Long)
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, ScalarKind::Float | ScalarKind::Double)
    }

    /// Smallest representable integer value.
    #[inline]
    pub const fn min_value(self) -> i64 {
        match self {
            ScalarKind::Bool => 0,
            ScalarKind::Int => i32::MIN as i64,
            _ => i64::MIN,
        }
    }

    /// Largest representable integer value.
    #[inline]
    pub const fn max_value(self) -> i64 {
        match self {
            ScalarKind::Bool => 1,
            ScalarKind::Int => i32::MAX as i64,
            _ => i64::MAX,
        }
    }

    /// The sign-bit constant (`MIN`) for integer kinds.
    #[inline]
    pub const fn sign_bit(self) -> i64 {
        self.min_value()
    }

    /// Mask applied to shift amounts.
    #[inline]
    pub const fn shift_mask(self) -> i64 {
        self.bits() as i64 - 1
    }

    /// Truncate `value` to this kind's width and sign-extend it back.
    #[inline]
    pub const fn wrap(self, value: i64) -> i64 {
        match self {
            ScalarKind::Bool => value & 1,
            ScalarKind::Int => value as i32 as i64,
            _ => value,
        }
    }

    /// The unsigned interpretation of a (wrapped) integer value.
    #[inline]
    pub const fn to_unsigned(self, value: i64) -> u64 {
        match self {
            ScalarKind::Bool => (value & 1) as u64,
            ScalarKind::Int => value as u32 as u64,
            _ => value as u64,
        }
    }
}

// =============================================================================
// Arithmetic Operators
// =============================================================================

/// Arithmetic operator kind, shared by integer and float nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ArithOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    /// High half of the signed double-width product.
    MulHigh = 3,
    /// High half of the unsigned double-width product.
    UMulHigh = 4,
    /// Truncating signed division.
    Div = 5,
    /// Signed remainder (sign follows the dividend).
    Mod = 6,
    UDiv = 7,
    UMod = 8,
    Min = 9,
    Max = 10,
}

impl ArithOp {
    #[inline]
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            ArithOp::Add
                | ArithOp::Mul
                | ArithOp::MulHigh
                | ArithOp::UMulHigh
                | ArithOp::Min
                | ArithOp::Max
        )
    }

    /// Division and remainder, the only operators that can trap.
    #[inline]
    pub const fn is_division(self) -> bool {
        matches!(
            self,
            ArithOp::Div | ArithOp::Mod | ArithOp::UDiv | ArithOp::UMod
        )
    }

    /// Operators defined only on integers.
    #[inline]
    pub const fn is_integer_only(self) -> bool {
        matches!(
            self,
            ArithOp::MulHigh | ArithOp::UMulHigh | ArithOp::UDiv | ArithOp::UMod
        )
    }
}

// =============================================================================
// Bitwise Operators
// =============================================================================

/// Bitwise and shift operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BitwiseOp {
    And = 0,
    Or = 1,
    Xor = 2,
    /// Left shift, amount masked to `width - 1`.
    Shl = 3,
    /// Arithmetic right shift.
    Shr = 4,
    /// Logical right shift.
    UShr = 5,
}

impl BitwiseOp {
    #[inline]
    pub const fn is_shift(self) -> bool {
        matches!(self, BitwiseOp::Shl | BitwiseOp::Shr | BitwiseOp::UShr)
    }

    #[inline]
    pub const fn is_commutative(self) -> bool {
        !self.is_shift()
    }
}

// =============================================================================
// Comparison Operators
// =============================================================================

/// Comparator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CmpOp {
    Eq = 0,
    Ne = 1,
    Lt = 2,
    Le = 3,
    Gt = 4,
    Ge = 5,
    ULt = 6,
    ULe = 7,
    UGt = 8,
    UGe = 9,
}

impl CmpOp {
    /// The comparator that gives the same answer with swapped operands.
    #[inline]
    pub const fn swap(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            CmpOp::ULt => CmpOp::UGt,
            CmpOp::ULe => CmpOp::UGe,
            CmpOp::UGt => CmpOp::ULt,
            CmpOp::UGe => CmpOp::ULe,
        }
    }

    /// The unsigned counterpart of a signed ordering comparator.
    #[inline]
    pub const fn to_unsigned(self) -> Self {
        match self {
            CmpOp::Lt => CmpOp::ULt,
            CmpOp::Le => CmpOp::ULe,
            CmpOp::Gt => CmpOp::UGt,
            CmpOp::Ge => CmpOp::UGe,
            other => other,
        }
    }

    #[inline]
    pub const fn is_unsigned(self) -> bool {
        matches!(self, CmpOp::ULt | CmpOp::ULe | CmpOp::UGt | CmpOp::UGe)
    }

    /// Signed `<`, `<=`, `>`, `>=`.
    #[inline]
    pub const fn is_signed_ordering(self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge)
    }

    /// Result of comparing a value against itself (integers only).
    #[inline]
    pub const fn reflexive_result(self) -> bool {
        matches!(
            self,
            CmpOp::Eq | CmpOp::Le | CmpOp::Ge | CmpOp::ULe | CmpOp::UGe
        )
    }

    /// Evaluate on two integer values of the given kind.
    pub const fn eval_int(self, kind: ScalarKind, a: i64, b: i64) -> bool {
        let (ua, ub) = (kind.to_unsigned(a), kind.to_unsigned(b));
        match self {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
            CmpOp::ULt => ua < ub,
            CmpOp::ULe => ua <= ub,
            CmpOp::UGt => ua > ub,
            CmpOp::UGe => ua >= ub,
        }
    }

    /// Evaluate with IEEE semantics; every comparison with NaN is false
    /// except `Ne`.
    pub fn eval_float(self, a: f64, b: f64) -> bool {
        match self {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt | CmpOp::ULt => a < b,
            CmpOp::Le | CmpOp::ULe => a <= b,
            CmpOp::Gt | CmpOp::UGt => a > b,
            CmpOp::Ge | CmpOp::UGe => a >= b,
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// Integer width conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConvOp {
    /// Sign-extend `Int` to `Long`.
    I2L = 0,
    /// Truncate `Long` to `Int`.
    L2I = 1,
    /// Zero-extend `Int` to `Long`.
    UI2L = 2,
}

impl ConvOp {
    pub const fn source(self) -> ScalarKind {
        match self {
            ConvOp::I2L | ConvOp::UI2L => ScalarKind::Int,
            ConvOp::L2I => ScalarKind::Long,
        }
    }

    pub const fn result(self) -> ScalarKind {
        match self {
            ConvOp::I2L | ConvOp::UI2L => ScalarKind::Long,
            ConvOp::L2I => ScalarKind::Int,
        }
    }

    pub const fn apply(self, value: i64) -> i64 {
        match self {
            ConvOp::I2L => value as i32 as i64,
            ConvOp::L2I => value as i32 as i64,
            ConvOp::UI2L => value as u32 as i64,
        }
    }
}

// =============================================================================
// Operator
// =============================================================================

/// Node operator. Constants carry their payload so that structurally equal
/// constants hash-cons to one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Integer or boolean constant, sign-extended to 64 bits.
    ConstInt(i64),
    /// Float or double constant as raw IEEE bits.
    ConstFloat(u64),
    /// Incoming value of the compilation unit.
    Parameter(u16),
    IntOp(ArithOp),
    FloatOp(ArithOp),
    Bitwise(BitwiseOp),
    IntCmp(CmpOp),
    FloatCmp(CmpOp),
    Convert(ConvOp),
    /// `cond ? t : f` before fusion.
    Ternary,
    /// Branchless select: `cmp(a, b) ? t : f`.
    CMove(CmpOp),
    /// Observable output of the compilation unit.
    Return,
}

impl Operator {
    /// Number of inputs the operator takes.
    pub const fn arity(&self) -> usize {
        match self {
            Operator::ConstInt(_) | Operator::ConstFloat(_) | Operator::Parameter(_) => 0,
            Operator::Convert(_) | Operator::Return => 1,
            Operator::IntOp(_)
            | Operator::FloatOp(_)
            | Operator::Bitwise(_)
            | Operator::IntCmp(_)
            | Operator::FloatCmp(_) => 2,
            Operator::Ternary => 3,
            Operator::CMove(_) => 4,
        }
    }

    #[inline]
    pub const fn is_constant(&self) -> bool {
        matches!(self, Operator::ConstInt(_) | Operator::ConstFloat(_))
    }

    /// Whether input order is irrelevant to the result.
    pub const fn is_commutative(&self) -> bool {
        match self {
            Operator::IntOp(op) => op.is_commutative(),
            Operator::FloatOp(op) => matches!(op, ArithOp::Add | ArithOp::Mul),
            Operator::Bitwise(op) => op.is_commutative(),
            _ => false,
        }
    }

    /// Integer division or remainder.
    #[inline]
    pub const fn is_int_division(&self) -> bool {
        matches!(self, Operator::IntOp(op) if op.is_division())
    }

    /// The payload-free tag used by graph inspection.
    pub const fn opcode(&self) -> Opcode {
        match self {
            Operator::ConstInt(_) | Operator::ConstFloat(_) => Opcode::Const,
            Operator::Parameter(_) => Opcode::Parameter,
            Operator::IntOp(op) | Operator::FloatOp(op) => match op {
                ArithOp::Add => Opcode::Add,
                ArithOp::Sub => Opcode::Sub,
                ArithOp::Mul => Opcode::Mul,
                ArithOp::MulHigh => Opcode::MulHigh,
                ArithOp::UMulHigh => Opcode::UMulHigh,
                ArithOp::Div => Opcode::Div,
                ArithOp::Mod => Opcode::Mod,
                ArithOp::UDiv => Opcode::UDiv,
                ArithOp::UMod => Opcode::UMod,
                ArithOp::Min => Opcode::Min,
                ArithOp::Max => Opcode::Max,
            },
            Operator::Bitwise(op) => match op {
                BitwiseOp::And => Opcode::And,
                BitwiseOp::Or => Opcode::Or,
                BitwiseOp::Xor => Opcode::Xor,
                BitwiseOp::Shl => Opcode::Shl,
                BitwiseOp::Shr => Opcode::Shr,
                BitwiseOp::UShr => Opcode::UShr,
            },
            Operator::IntCmp(op) if op.is_unsigned() => Opcode::UCmp,
            Operator::IntCmp(_) | Operator::FloatCmp(_) => Opcode::Cmp,
            Operator::Convert(_) => Opcode::Convert,
            Operator::Ternary => Opcode::Ternary,
            Operator::CMove(_) => Opcode::CMove,
            Operator::Return => Opcode::Return,
        }
    }
}

/// Operator family without payload, as seen by shape assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Const,
    Parameter,
    Add,
    Sub,
    Mul,
    MulHigh,
    UMulHigh,
    Div,
    Mod,
    UDiv,
    UMod,
    Min,
    Max,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    UShr,
    /// Signed integer or float comparison.
    Cmp,
    /// Unsigned integer comparison.
    UCmp,
    Convert,
    Ternary,
    CMove,
    Return,
}

// =============================================================================
// Tests
// =============================================================================
