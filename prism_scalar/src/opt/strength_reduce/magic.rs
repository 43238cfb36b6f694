//! Magic Number Division
//!
//! Computes the constants that replace integer division by a constant with
//! a multiply-high and shifts ("Hacker's Delight", chapter 10, and
//! Granlund & Montgomery, "Division by Invariant Integers using
//! Multiplication").
//!
//! # Theory
//!
//! For a divisor `d` and a chosen `p`, let `m = floor(2^p / |d|) + 1` and
//! `e = |d| - (2^p mod |d|)`. Let `nc` be the largest `N`-bit value with
//! `nc mod |d| == |d| - 1`. If every dividend fits `N` signed bits and
//! `nc * e < 2^p`, then
//!
//! ```text
//! trunc(x / |d|) = floor(x * m / 2^p) + (x < 0 ? 1 : 0)
//! ```
//!
//! With `p >= W` the product is read through a `W`-bit multiply-high and
//! shifted by `s = p - W`. `N` is normally the operand width `W`; a smaller
//! `N` proven by range analysis gives a smaller `m` (a reduced-width magic).
//!
//! All arithmetic is done in `u128`, so widths up to 64 never overflow.

// =============================================================================
// Magic Number Structures
// =============================================================================

/// Magic numbers for signed division of a `width`-bit value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignedMagic {
    /// `m` as a `width`-bit pattern, sign-extended. When `add` is set the
    /// true multiplier is this value plus `2^width`.
    pub multiplier: i64,
    /// Right shift applied to the high product.
    pub shift: u32,
    /// The dividend must be added back to the high product.
    pub add: bool,
    pub negative_divisor: bool,
    pub width: u32,
}

/// Magic numbers for unsigned division of a `width`-bit value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnsignedMagic {
    /// Multiplier as a `width`-bit pattern.
    pub multiplier: u64,
    /// Final right shift. For the add form this is `ceil(log2 d) - 1`.
    pub shift: u32,
    /// Use the `((x - t) >>> 1) + t` fixup.
    pub add: bool,
    pub width: u32,
}

// =============================================================================
// Signed Magic Numbers
// =============================================================================

impl SignedMagic {
    /// Magic for dividends spanning the full `width`.
    ///
    /// Returns `None` for `0`, `±1` and powers of two (in magnitude), which
    /// are handled without a multiply.
    pub fn compute(d: i64, width: u32) -> Option<Self> {
        Self::compute_for_domain(d, width, width)
    }

    /// Magic valid for dividends that fit `domain_bits` signed bits.
    pub fn compute_for_domain(d: i64, width: u32, domain_bits: u32) -> Option<Self> {
        let abs_d = d.unsigned_abs() as u128;
        if abs_d <= 1 || abs_d.is_power_of_two() || domain_bits == 0 || domain_bits > width {
            return None;
        }

        let half_domain = 1u128 << (domain_bits - 1);
        let nc = half_domain - 1 - half_domain % abs_d;
        let two_w = 1u128 << width;
        for p in width..=(width + domain_bits).min(127) {
            let two_p = 1u128 << p;
            let e = abs_d - two_p % abs_d;
            if nc * e >= two_p {
                continue;
            }
            let m = two_p / abs_d + 1;
            if m >= two_w {
                return None;
            }
            let add = m >= two_w >> 1;
            let multiplier = if add {
                (m as i128 - two_w as i128) as i64
            } else {
                m as i64
            };
            return Some(Self {
                multiplier,
                shift: p - width,
                add,
                negative_divisor: d < 0,
                width,
            });
        }
        None
    }

    /// The true (unsigned) multiplier `m`.
    ///
    /// `m < 2^width` always holds, so the low `width` bits of the stored
    /// pattern are `m` whether or not the add fixup is needed.
    #[inline]
    pub fn true_multiplier(&self) -> u128 {
        (self.multiplier as u64 as u128) & ((1u128 << self.width) - 1)
    }

    /// Instruction count of the emitted sequence.
    #[inline]
    pub fn cost(&self) -> u32 {
        // mulhi, sign shift, subtract, plus optional add and shift
        3 + self.add as u32 + (self.shift > 0) as u32
    }
}

// =============================================================================
// Unsigned Magic Numbers
// =============================================================================

impl UnsignedMagic {
    /// Magic for unsigned division by `d` (a `width`-bit pattern).
    ///
    /// Returns `None` for `0`, `1`, powers of two and divisors at or above
    /// `2^(width-1)`, whose quotient is a single comparison.
    pub fn compute(d: u64, width: u32) -> Option<Self> {
        let d = d & width_mask(width);
        if d <= 1 || d.is_power_of_two() || d >> (width - 1) != 0 {
            return None;
        }
        let d = d as u128;
        let l = 128 - d.leading_zeros();

        // Round-up multiplier without fixup when it fits the width.
        for p in 0..=l {
            let two = 1u128 << (width + p);
            let m = two.div_ceil(d);
            let e = m * d - two;
            if m < (1u128 << width) && e <= (1u128 << p) {
                return Some(Self {
                    multiplier: m as u64,
                    shift: p,
                    add: false,
                    width,
                });
            }
        }

        // Otherwise m has width+1 bits; keep the low bits and fix up.
        let two = 1u128 << (width + l);
        let m = two.div_ceil(d) - (1u128 << width);
        Some(Self {
            multiplier: m as u64,
            shift: l - 1,
            add: true,
            width,
        })
    }

    #[inline]
    pub fn cost(&self) -> u32 {
        if self.add {
            5 // mulhi, sub, shr 1, add, shr
        } else {
            1 + (self.shift > 0) as u32
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// All-ones mask of `width` bits.
#[inline]
pub fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// `k` if `|d| == 2^k` with `k >= 1`. The most negative value counts as
/// `2^(width-1)`.
#[inline]
pub fn signed_power_of_two(d: i64) -> Option<u32> {
    let abs = d.unsigned_abs();
    if abs >= 2 && abs.is_power_of_two() {
        Some(abs.trailing_zeros())
    } else {
        None
    }
}

/// `k` if `d == 2^k` (as an unsigned `width`-bit value) with `k >= 1`.
#[inline]
pub fn unsigned_power_of_two(d: u64, width: u32) -> Option<u32> {
    let d = d & width_mask(width);
    if d >= 2 && d.is_power_of_two() {
        Some(d.trailing_zeros())
    } else {
        None
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DIVISORS: [i64; 14] = [3, 5, 6, 7, 9, 10, 11, 13, 15, 19, 25, 100, 641, 1_000_000_007];

    fn samples64() -> Vec<i64> {
        let mut xs = vec![0, 1, -1, 2, -2, i64::MIN, i64::MIN + 1, i64::MAX, i64::MAX - 1];
        let mut v: i64 = 0x1234_5678_9abc_def1;
        for _ in 0..2000 {
            v = v.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            xs.push(v);
            xs.push(v >> 17);
            xs.push(v >> 40);
        }
        xs
    }

    fn samples32() -> Vec<i32> {
        samples64()
            .into_iter()
            .flat_map(|v| [v as i32, (v >> 32) as i32, (v >> 50) as i32])
            .chain([i32::MIN, i32::MAX, i32::MIN + 1, -1, 0, 1])
            .collect()
    }

    // =========================================================================
    // Test Helpers
    // =========================================================================

    /// Simulate the emitted signed sequence for a 64-bit dividend.
    fn apply_signed64(x: i64, magic: &SignedMagic) -> i64 {
        let mut q = ((x as i128 * magic.multiplier as i128) >> 64) as i64;
        if magic.add {
            q = q.wrapping_add(x);
        }
        q >>= magic.shift;
        let q = q.wrapping_sub(x >> 63);
        if magic.negative_divisor { q.wrapping_neg() } else { q }
    }

    /// Simulate the emitted signed sequence for a 32-bit dividend, using the
    /// widened multiply when the magic needs the add fixup.
    fn apply_signed32(x: i32, magic: &SignedMagic) -> i32 {
        let q0 = if magic.add {
            let m = magic.true_multiplier() as i64;
            ((x as i64 * m) >> (32 + magic.shift)) as i32
        } else {
            (((x as i64 * magic.multiplier) >> 32) as i32) >> magic.shift
        };
        let q = q0.wrapping_sub(x >> 31);
        if magic.negative_divisor { q.wrapping_neg() } else { q }
    }

    fn apply_unsigned64(x: u64, magic: &UnsignedMagic) -> u64 {
        let t = ((x as u128 * magic.multiplier as u128) >> 64) as u64;
        if magic.add {
            (((x - t) >> 1) + t) >> magic.shift
        } else {
            t >> magic.shift
        }
    }

    fn apply_unsigned32(x: u32, magic: &UnsignedMagic) -> u32 {
        let t = ((x as u64 * magic.multiplier) >> 32) as u32;
        if magic.add {
            (((x - t) >> 1) + t) >> magic.shift
        } else {
            t >> magic.shift
        }
    }

    // =========================================================================
    // Signed
    // =========================================================================

    #[test]
    fn test_signed_magic_special_cases() {
        for d in [0, 1, -1, 2, -2, 8, -8, 1 << 40, i64::MIN] {
            assert_eq!(SignedMagic::compute(d, 64), None, "d = {d}");
        }
        assert_eq!(SignedMagic::compute(i32::MIN as i64, 32), None);
    }

    #[test]
    fn test_signed_magic_known_constants() {
        // Hacker's Delight table 10-2.
        let seven = SignedMagic::compute(7, 32).unwrap();
        assert_eq!(seven.multiplier as u32, 0x9249_2493);
        assert_eq!(seven.shift, 2);
        assert!(seven.add);

        let three = SignedMagic::compute(3, 32).unwrap();
        assert_eq!(three.multiplier, 0x5555_5556);
        assert_eq!(three.shift, 0);
        assert!(!three.add);

        // x / 19 on 64 bits needs neither the add fixup nor a shift.
        let nineteen = SignedMagic::compute(19, 64).unwrap();
        assert!(!nineteen.add);
        assert_eq!(nineteen.shift, 0);

        let fifteen = SignedMagic::compute(15, 64).unwrap();
        assert!(fifteen.add);
        assert_eq!(fifteen.shift, 3);
    }

    #[test]
    fn test_signed64_magic_correctness() {
        let xs = samples64();
        for &d in &DIVISORS {
            for d in [d, -d] {
                let magic = SignedMagic::compute(d, 64).unwrap();
                for &x in &xs {
                    assert_eq!(apply_signed64(x, &magic), x.wrapping_div(d), "{x} / {d}");
                }
            }
        }
    }

    #[test]
    fn test_signed32_magic_correctness() {
        let xs = samples32();
        for &d in DIVISORS.iter().filter(|&&d| d <= i32::MAX as i64) {
            for d in [d as i32, -(d as i32)] {
                let magic = SignedMagic::compute(d as i64, 32).unwrap();
                for &x in &xs {
                    assert_eq!(apply_signed32(x, &magic), x.wrapping_div(d), "{x} / {d}");
                }
            }
        }
    }

    #[test]
    fn test_signed32_add_form_multiplier() {
        let seven = SignedMagic::compute(7, 32).unwrap();
        assert!(seven.add);
        assert_eq!(seven.true_multiplier(), 0x9249_2493);
        assert_eq!(apply_signed32(429_286_652, &seven), 61_326_664);
    }

    #[test]
    fn test_signed32_magic_divisor_sweep() {
        let xs: Vec<i32> = samples32().into_iter().step_by(7).collect();
        let mut d: i64 = 0x2545_f491;
        let mut divisors: Vec<i32> = (3..=300).collect();
        for _ in 0..300 {
            d = d.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            divisors.push((d >> 33) as i32);
            divisors.push((d >> 45) as i32);
        }
        for d in divisors {
            let Some(magic) = SignedMagic::compute(d as i64, 32) else {
                continue;
            };
            for &x in &xs {
                assert_eq!(apply_signed32(x, &magic), x.wrapping_div(d), "{x} / {d}");
            }
        }
    }

    #[test]
    fn test_signed_magic_reduced_domain() {
        // 15 needs the add fixup at full 64-bit width.
        assert!(SignedMagic::compute(15, 64).unwrap().add);

        let narrow = SignedMagic::compute_for_domain(15, 64, 40).unwrap();
        assert!(!narrow.add);
        let limit = 1i64 << 39;
        for x in [0, 1, -1, limit - 1, -limit, 12345, -987_654_321, limit / 15 * 15] {
            assert_eq!(apply_signed64(x, &narrow), x / 15, "{x}");
        }

        let narrow32 = SignedMagic::compute_for_domain(7, 32, 20).unwrap();
        assert!(!narrow32.add);
        for x in [0, 1, -1, (1 << 19) - 1, -(1 << 19), 4242, -99_999] {
            assert_eq!(apply_signed32(x, &narrow32), x / 7, "{x}");
        }
    }

    #[test]
    fn test_signed_magic_cost() {
        let three = SignedMagic::compute(3, 32).unwrap();
        assert_eq!(three.cost(), 3);
        let seven = SignedMagic::compute(7, 32).unwrap();
        assert_eq!(seven.cost(), 5);
    }

    // =========================================================================
    // Unsigned
    // =========================================================================

    #[test]
    fn test_unsigned_magic_special_cases() {
        assert_eq!(UnsignedMagic::compute(0, 64), None);
        assert_eq!(UnsignedMagic::compute(1, 64), None);
        assert_eq!(UnsignedMagic::compute(16, 64), None);
        assert_eq!(UnsignedMagic::compute(1 << 63, 64), None);
        assert_eq!(UnsignedMagic::compute(0x8000_0001, 32), None);
    }

    #[test]
    fn test_unsigned_magic_known_constants() {
        let three = UnsignedMagic::compute(3, 32).unwrap();
        assert_eq!(three.multiplier, 0xAAAA_AAAB);
        assert_eq!(three.shift, 1);
        assert!(!three.add);

        let seven = UnsignedMagic::compute(7, 32).unwrap();
        assert!(seven.add);
        assert_eq!(seven.multiplier, 0x2492_4925);
        assert_eq!(seven.shift, 2);
    }

    #[test]
    fn test_unsigned64_magic_correctness() {
        let xs: Vec<u64> = samples64().into_iter().map(|x| x as u64).collect();
        for &d in DIVISORS.iter() {
            let magic = UnsignedMagic::compute(d as u64, 64).unwrap();
            for &x in &xs {
                assert_eq!(apply_unsigned64(x, &magic), x / d as u64, "{x} / {d}");
            }
        }
    }

    #[test]
    fn test_unsigned32_magic_correctness() {
        let xs: Vec<u32> = samples32().into_iter().map(|x| x as u32).collect();
        for &d in DIVISORS.iter() {
            let magic = UnsignedMagic::compute(d as u64, 32).unwrap();
            for &x in xs.iter().chain([u32::MAX, u32::MAX - 1].iter()) {
                assert_eq!(apply_unsigned32(x, &magic), x / d as u32, "{x} / {d}");
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn test_signed_power_of_two() {
        assert_eq!(signed_power_of_two(8), Some(3));
        assert_eq!(signed_power_of_two(-8), Some(3));
        assert_eq!(signed_power_of_two(i64::MIN), Some(63));
        assert_eq!(signed_power_of_two(1), None);
        assert_eq!(signed_power_of_two(-1), None);
        assert_eq!(signed_power_of_two(12), None);
    }

    #[test]
    fn test_unsigned_power_of_two() {
        assert_eq!(unsigned_power_of_two(1 << 31, 32), Some(31));
        assert_eq!(unsigned_power_of_two(-8i64 as u64, 32), None);
        assert_eq!(unsigned_power_of_two(2, 64), Some(1));
    }

    #[test]
    fn test_width_mask() {
        assert_eq!(width_mask(32), 0xFFFF_FFFF);
        assert_eq!(width_mask(64), u64::MAX);
    }
}
