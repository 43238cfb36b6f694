//! Strength Reduction of Division and Modulo
//!
//! Replaces integer division and remainder by a compile-time constant with
//! multiply-high, shift and add sequences that compute the exact truncating
//! result for every dividend, the most negative value included.
//!
//! # Transformations
//!
//! ## Signed Division
//!
//! - **Power of 2**: `x / 2^k` → `(x + ((x >> w-1) >>> (w-k))) >> k`
//! - **Constants**: `mulhi(x, M) >> s` minus the sign term `x >> w-1`
//!   (Hacker's Delight 10-4). A magic that needs the add fixup is widened to
//!   a 64-bit multiply for `Int`; for `Long` a reduced-width magic is used
//!   when range analysis bounds the dividend.
//!
//! ## Unsigned Division
//!
//! - **Power of 2**: `x / 2^k` → `x >>> k`
//! - **Large divisors** (`d >= 2^(w-1)`): `x >=u d ? 1 : 0`
//! - **Constants**: round-up magic, or the Granlund-Montgomery
//!   `((x - t) >>> 1) + t` sequence when the multiplier needs `w+1` bits.
//!
//! ## Modulo
//!
//! - **Power of 2**: `x & (2^k - 1)` for a non-negative dividend, otherwise
//!   `x - ((x + bias) & -2^k)`
//! - **Constants**: `x - (x / c) * c`, sharing the quotient nodes with any
//!   division by the same constant through hash-consing.
//!
//! Divisors `0`, `1` and `-1` are never handled here: zero must keep its
//! trap and the unit divisors are plain identities.

pub mod magic;

use log::debug;

use crate::ir::graph::Graph;
use crate::ir::node::NodeId;
use crate::ir::operators::{ArithOp, BitwiseOp, CmpOp, ConvOp, Operator, ScalarKind};
use crate::opt::instcombine::PatternMatch;

pub use magic::{SignedMagic, UnsignedMagic};

use magic::{signed_power_of_two, unsigned_power_of_two};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for strength reduction.
#[derive(Clone, Debug)]
pub struct StrengthReduceConfig {
    /// Rewrite `Div` and `UDiv` by constants.
    pub optimize_division: bool,
    /// Rewrite `Mod` and `UMod` by constants.
    pub optimize_modulo: bool,
    /// Allow a smaller magic when the dividend's range is narrower than
    /// its width.
    pub reduced_width_magic: bool,
}

impl Default for StrengthReduceConfig {
    fn default() -> Self {
        Self {
            optimize_division: true,
            optimize_modulo: true,
            reduced_width_magic: true,
        }
    }
}

impl StrengthReduceConfig {
    /// Only the full-width sequences.
    pub fn conservative() -> Self {
        Self {
            reduced_width_magic: false,
            ..Self::default()
        }
    }
}

/// Statistics from strength reduction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StrengthReduceStats {
    /// Signed divisions replaced.
    pub div_signed_replaced: usize,
    /// Unsigned divisions replaced.
    pub div_unsigned_replaced: usize,
    /// Remainders replaced.
    pub mod_replaced: usize,
    /// Replacements that used a power-of-two sequence.
    pub power_of_two: usize,
    /// Signed divisions that used a reduced-width magic.
    pub reduced_width: usize,
    /// Total transformations.
    pub total: usize,
}

impl StrengthReduceStats {
    pub fn merge(&mut self, other: &StrengthReduceStats) {
        self.div_signed_replaced += other.div_signed_replaced;
        self.div_unsigned_replaced += other.div_unsigned_replaced;
        self.mod_replaced += other.mod_replaced;
        self.power_of_two += other.power_of_two;
        self.reduced_width += other.reduced_width;
        self.total += other.total;
    }
}

// =============================================================================
// Strength Reduction
// =============================================================================

/// Division and remainder synthesizer, run as a pattern category of the
/// rewrite driver.
#[derive(Debug, Default)]
pub struct StrengthReduce {
    config: StrengthReduceConfig,
    stats: StrengthReduceStats,
}

impl StrengthReduce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StrengthReduceConfig) -> Self {
        Self {
            config,
            stats: StrengthReduceStats::default(),
        }
    }

    pub fn config(&self) -> &StrengthReduceConfig {
        &self.config
    }

    pub fn stats(&self) -> &StrengthReduceStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = StrengthReduceStats::default();
    }

    /// Rewrite `node` if it divides by a usable constant.
    pub fn try_match(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        op: Operator,
    ) -> Option<PatternMatch> {
        let Operator::IntOp(arith) = op else {
            return None;
        };
        if !arith.is_division() {
            return None;
        }
        let kind = graph.kind(node);
        let dividend = graph.input(node, 0);
        let divisor = graph.int_constant(graph.input(node, 1))?;

        let (replacement, name) = match arith {
            ArithOp::Div if self.config.optimize_division => {
                let q = self.signed_quotient(graph, kind, dividend, divisor)?;
                self.stats.div_signed_replaced += 1;
                (q, "div_by_constant")
            }
            ArithOp::Mod if self.config.optimize_modulo => {
                let r = self.signed_remainder(graph, kind, dividend, divisor)?;
                self.stats.mod_replaced += 1;
                (r, "mod_by_constant")
            }
            ArithOp::UDiv if self.config.optimize_division => {
                let q = self.unsigned_quotient(graph, kind, dividend, divisor)?;
                self.stats.div_unsigned_replaced += 1;
                (q, "udiv_by_constant")
            }
            ArithOp::UMod if self.config.optimize_modulo => {
                let r = self.unsigned_remainder(graph, kind, dividend, divisor)?;
                self.stats.mod_replaced += 1;
                (r, "umod_by_constant")
            }
            _ => return None,
        };
        self.stats.total += 1;
        debug!("strength_reduce: {node} {arith:?} by {divisor} ({kind:?}) -> {replacement}");
        Some(PatternMatch::replace(node, replacement, name))
    }

    // =========================================================================
    // Signed
    // =========================================================================

    fn signed_quotient(
        &mut self,
        graph: &mut Graph,
        kind: ScalarKind,
        x: NodeId,
        d: i64,
    ) -> Option<NodeId> {
        let mut emit = Emitter { graph, kind };
        if let Some(k) = signed_power_of_two(d) {
            self.stats.power_of_two += 1;
            let q = emit.signed_pow2_quotient(x, k);
            return Some(if d < 0 { emit.neg(q) } else { q });
        }

        let width = kind.bits();
        let magic = SignedMagic::compute(d, width)?;
        let q0 = if !magic.add {
            emit.mulhi_shift(x, magic.multiplier, magic.shift)
        } else if kind == ScalarKind::Int {
            emit.widened_mulhi_shift(x, &magic)
        } else {
            match self.reduced_magic(emit.graph, x, d, width) {
                Some(narrow) => {
                    self.stats.reduced_width += 1;
                    emit.mulhi_shift(x, narrow.multiplier, narrow.shift)
                }
                None => {
                    let hi = emit.arith(ArithOp::MulHigh, x, magic.multiplier);
                    let fixed = emit.node(ArithOp::Add, hi, x);
                    emit.shift_by(BitwiseOp::Shr, fixed, magic.shift)
                }
            }
        };

        let sign = emit.shift_by(BitwiseOp::Shr, x, width - 1);
        Some(if magic.negative_divisor {
            emit.node(ArithOp::Sub, sign, q0)
        } else {
            emit.node(ArithOp::Sub, q0, sign)
        })
    }

    /// A magic without the add fixup for the dividend's proven bit width.
    fn reduced_magic(&self, graph: &Graph, x: NodeId, d: i64, width: u32) -> Option<SignedMagic> {
        if !self.config.reduced_width_magic {
            return None;
        }
        let bits = graph.int_range(x)?.signed_bits();
        if bits >= width {
            return None;
        }
        SignedMagic::compute_for_domain(d, width, bits).filter(|m| !m.add)
    }

    fn signed_remainder(
        &mut self,
        graph: &mut Graph,
        kind: ScalarKind,
        x: NodeId,
        d: i64,
    ) -> Option<NodeId> {
        if let Some(k) = signed_power_of_two(d) {
            self.stats.power_of_two += 1;
            let non_negative = graph.int_range(x).is_some_and(|r| r.is_non_negative());
            let mut emit = Emitter { graph, kind };
            let low_bits = kind.wrap((1i64 << k).wrapping_sub(1));
            if non_negative {
                return Some(emit.arith_bitwise(BitwiseOp::And, x, low_bits));
            }
            let bias = emit.sign_bias(x, k);
            let biased = emit.node(ArithOp::Add, x, bias);
            let rounded = emit.arith_bitwise(BitwiseOp::And, biased, kind.wrap(-(1i128 << k) as i64));
            return Some(emit.node(ArithOp::Sub, x, rounded));
        }
        let q = self.signed_quotient(graph, kind, x, d)?;
        let mut emit = Emitter { graph, kind };
        let product = emit.arith(ArithOp::Mul, q, d);
        Some(emit.node(ArithOp::Sub, x, product))
    }

    // =========================================================================
    // Unsigned
    // =========================================================================

    fn unsigned_quotient(
        &mut self,
        graph: &mut Graph,
        kind: ScalarKind,
        x: NodeId,
        d: i64,
    ) -> Option<NodeId> {
        let width = kind.bits();
        let ud = kind.to_unsigned(d);
        let mut emit = Emitter { graph, kind };
        if let Some(k) = unsigned_power_of_two(ud, width) {
            self.stats.power_of_two += 1;
            return Some(emit.shift_by(BitwiseOp::UShr, x, k));
        }
        if ud >> (width - 1) != 0 {
            // The quotient is 0 or 1.
            let divisor = emit.graph.const_int(kind, d);
            let one = emit.graph.const_int(kind, 1);
            let zero = emit.graph.const_int(kind, 0);
            return Some(emit.graph.intern(
                Operator::CMove(CmpOp::UGe),
                kind,
                &[x, divisor, one, zero],
            ));
        }

        let magic = UnsignedMagic::compute(ud, width)?;
        let multiplier = magic.multiplier as i64;
        let t = emit.arith(ArithOp::UMulHigh, x, multiplier);
        if !magic.add {
            return Some(emit.shift_by(BitwiseOp::UShr, t, magic.shift));
        }
        let diff = emit.node(ArithOp::Sub, x, t);
        let half = emit.shift_by(BitwiseOp::UShr, diff, 1);
        let sum = emit.node(ArithOp::Add, half, t);
        Some(emit.shift_by(BitwiseOp::UShr, sum, magic.shift))
    }

    fn unsigned_remainder(
        &mut self,
        graph: &mut Graph,
        kind: ScalarKind,
        x: NodeId,
        d: i64,
    ) -> Option<NodeId> {
        let width = kind.bits();
        if unsigned_power_of_two(kind.to_unsigned(d), width).is_some() {
            self.stats.power_of_two += 1;
            let mut emit = Emitter { graph, kind };
            return Some(emit.arith_bitwise(BitwiseOp::And, x, d.wrapping_sub(1)));
        }
        let q = self.unsigned_quotient(graph, kind, x, d)?;
        let mut emit = Emitter { graph, kind };
        let product = emit.arith(ArithOp::Mul, q, d);
        Some(emit.node(ArithOp::Sub, x, product))
    }
}

// =============================================================================
// Node Emission
// =============================================================================

/// Interns the nodes of a synthesized sequence of one kind.
struct Emitter<'g> {
    graph: &'g mut Graph,
    kind: ScalarKind,
}

impl Emitter<'_> {
    fn node(&mut self, op: ArithOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.graph.intern(Operator::IntOp(op), self.kind, &[lhs, rhs])
    }

    /// `lhs op constant`.
    fn arith(&mut self, op: ArithOp, lhs: NodeId, constant: i64) -> NodeId {
        let c = self.graph.const_int(self.kind, constant);
        self.node(op, lhs, c)
    }

    fn arith_bitwise(&mut self, op: BitwiseOp, lhs: NodeId, constant: i64) -> NodeId {
        let c = self.graph.const_int(self.kind, constant);
        self.graph.intern(Operator::Bitwise(op), self.kind, &[lhs, c])
    }

    /// Shift by a constant; a zero amount is the identity.
    fn shift_by(&mut self, op: BitwiseOp, value: NodeId, amount: u32) -> NodeId {
        if amount == 0 {
            return value;
        }
        let amount = self.graph.const_int(ScalarKind::Int, amount as i64);
        self.graph
            .intern(Operator::Bitwise(op), self.kind, &[value, amount])
    }

    fn neg(&mut self, value: NodeId) -> NodeId {
        let zero = self.graph.const_int(self.kind, 0);
        self.node(ArithOp::Sub, zero, value)
    }

    /// `mulhi(x, m) >> s`.
    fn mulhi_shift(&mut self, x: NodeId, multiplier: i64, shift: u32) -> NodeId {
        let hi = self.arith(ArithOp::MulHigh, x, multiplier);
        self.shift_by(BitwiseOp::Shr, hi, shift)
    }

    /// `L2I((I2L(x) * m) >> (32 + s))` for an `Int` magic whose multiplier
    /// needs 33 bits. The product cannot overflow 64 bits.
    fn widened_mulhi_shift(&mut self, x: NodeId, magic: &SignedMagic) -> NodeId {
        let multiplier = magic.true_multiplier() as i64;
        let wide = self
            .graph
            .intern(Operator::Convert(ConvOp::I2L), ScalarKind::Long, &[x]);
        let mut long = Emitter {
            graph: &mut *self.graph,
            kind: ScalarKind::Long,
        };
        let product = long.arith(ArithOp::Mul, wide, multiplier);
        let shifted = long.shift_by(BitwiseOp::Shr, product, 32 + magic.shift);
        self.graph
            .intern(Operator::Convert(ConvOp::L2I), ScalarKind::Int, &[shifted])
    }

    /// `2^k - 1` for negative `x`, `0` otherwise.
    fn sign_bias(&mut self, x: NodeId, k: u32) -> NodeId {
        let width = self.kind.bits();
        let sign = self.shift_by(BitwiseOp::Shr, x, width - 1);
        self.shift_by(BitwiseOp::UShr, sign, width - k)
    }

    /// Truncating `x / 2^k`.
    fn signed_pow2_quotient(&mut self, x: NodeId, k: u32) -> NodeId {
        let bias = self.sign_bias(x, k);
        let biased = self.node(ArithOp::Add, x, bias);
        self.shift_by(BitwiseOp::Shr, biased, k)
    }
}

// =============================================================================
// Tests
// =============================================================================
