//! Numeric domain of path lengths.
//!
//! Every element type of a [`WeightMatrix`](crate::WeightMatrix) carries its
//! own sentinel "infinity" and a saturating addition, so that the min-plus
//! relaxation `a = min(a, b + c)` never overflows:
//!
//! | Type | Sentinel | `sat_add` |
//! |------|----------|-----------|
//! | `f32`, `f64` | `+inf` | IEEE addition (already saturates at `+inf`) |
//! | `i32`, `i64`, `u32`, `u64` | `MAX / 2` | sentinel if either side is unreachable, else clamped sum |
//!
//! The `*_simd` methods are the vectorized inner loops. Their default bodies
//! are the portable lane-chunked loops from [`simd`](crate::simd); `f32`
//! overrides them with AVX on x86_64. All of them must agree bit for bit
//! with [`Weight::relax`] applied element by element.

use std::fmt::Debug;

use crate::simd;

/// A fixed-width path length type.
pub trait Weight: Copy + PartialOrd + Debug + Send + Sync + 'static {
    /// "No known path". Never exceeded by a stored value.
    const INFINITY: Self;
    /// Self-distance.
    const ZERO: Self;

    /// Saturating path concatenation.
    fn sat_add(self, rhs: Self) -> Self;

    /// Canonicalise an input value, or `None` if it cannot be stored.
    fn normalize(self) -> Option<Self>;

    /// `candidate` if it is strictly shorter, else `self`.
    #[inline(always)]
    fn relax(self, candidate: Self) -> Self {
        if candidate < self {
            candidate
        } else {
            self
        }
    }

    #[inline(always)]
    fn is_unreachable(self) -> bool {
        self >= Self::INFINITY
    }

    /// `c[j] = min(c[j], a + b[j])` for every `j`.
    #[inline]
    fn relax_row_simd(c: &mut [Self], a: Self, b: &[Self]) {
        simd::relax_row_lanes(c, a, b);
    }

    /// `c[j] = min(c[j], a + c[j])` for every `j`.
    #[inline]
    fn relax_row_in_place_simd(c: &mut [Self], a: Self) {
        simd::relax_row_in_place_lanes(c, a);
    }

    /// `min(acc, min_k(a[k] + bt[k]))`.
    #[inline]
    fn min_plus_dot_simd(acc: Self, a: &[Self], bt: &[Self]) -> Self {
        simd::min_plus_dot_lanes(acc, a, bt)
    }
}

macro_rules! impl_int_weight {
    ($($t:ty),*) => {$(
        impl Weight for $t {
            const INFINITY: Self = <$t>::MAX / 2;
            const ZERO: Self = 0;

            #[inline(always)]
            fn sat_add(self, rhs: Self) -> Self {
                if self >= Self::INFINITY || rhs >= Self::INFINITY {
                    Self::INFINITY
                } else {
                    self.saturating_add(rhs).min(Self::INFINITY)
                }
            }

            #[inline]
            fn normalize(self) -> Option<Self> {
                Some(self.min(Self::INFINITY))
            }
        }
    )*};
}

impl_int_weight!(i32, i64, u32, u64);

impl Weight for f32 {
    const INFINITY: Self = f32::INFINITY;
    const ZERO: Self = 0.0;

    #[inline(always)]
    fn sat_add(self, rhs: Self) -> Self {
        self + rhs
    }

    #[inline]
    fn normalize(self) -> Option<Self> {
        normalize_float(self, f32::NEG_INFINITY)
    }

    #[inline]
    fn relax_row_simd(c: &mut [Self], a: Self, b: &[Self]) {
        simd::relax_row_f32(c, a, b);
    }

    #[inline]
    fn relax_row_in_place_simd(c: &mut [Self], a: Self) {
        simd::relax_row_in_place_f32(c, a);
    }

    #[inline]
    fn min_plus_dot_simd(acc: Self, a: &[Self], bt: &[Self]) -> Self {
        simd::min_plus_dot_f32(acc, a, bt)
    }
}

impl Weight for f64 {
    const INFINITY: Self = f64::INFINITY;
    const ZERO: Self = 0.0;

    #[inline(always)]
    fn sat_add(self, rhs: Self) -> Self {
        self + rhs
    }

    #[inline]
    fn normalize(self) -> Option<Self> {
        normalize_float(self, f64::NEG_INFINITY)
    }
}

// -0.0 is folded into +0.0 so that min over equal-valued zeros cannot depend
// on the reduction order. NaN and -inf poison every relaxation they touch.
#[inline]
fn normalize_float<F>(x: F, neg_infinity: F) -> Option<F>
where
    F: Copy + PartialEq + PartialOrd + Default,
{
    if x.partial_cmp(&x).is_none() || x == neg_infinity {
        None
    } else if x == F::default() {
        Some(F::default())
    } else {
        Some(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_sentinel_survives_doubling() {
        assert_eq!(i32::INFINITY.sat_add(i32::INFINITY), i32::INFINITY);
        assert_eq!(u64::INFINITY.sat_add(u64::INFINITY), u64::INFINITY);
        assert_eq!(i64::INFINITY.sat_add(-5), i64::INFINITY);
        assert_eq!((-5_i64).sat_add(i64::INFINITY), i64::INFINITY);
    }

    #[test]
    fn int_sum_clamps_to_sentinel() {
        let big = u32::INFINITY - 1;
        assert_eq!(big.sat_add(big), u32::INFINITY);
        assert_eq!(3_u32.sat_add(4), 7);
        assert_eq!((-3_i32).sat_add(1), -2);
    }

    #[test]
    fn float_sentinel_is_ieee_infinity() {
        assert_eq!(f32::INFINITY.sat_add(-1.0e30), f32::INFINITY);
        assert_eq!(f32::MAX.sat_add(f32::MAX), f32::INFINITY);
        assert!(f64::INFINITY.is_unreachable());
        assert!(!1.0e300_f64.is_unreachable());
    }

    #[test]
    fn relax_keeps_current_value_on_ties() {
        assert_eq!(5_i32.relax(5), 5);
        assert_eq!(5_i32.relax(4), 4);
        assert_eq!(5_i32.relax(6), 5);
        assert_eq!(0.0_f32.relax(-0.0).to_bits(), 0.0_f32.to_bits());
    }

    #[test]
    fn normalize_rejects_unusable_floats() {
        assert_eq!(f32::NAN.normalize(), None);
        assert_eq!(f64::NEG_INFINITY.normalize(), None);
        assert_eq!((-0.0_f32).normalize().map(f32::to_bits), Some(0.0_f32.to_bits()));
        assert_eq!(f32::INFINITY.normalize(), Some(f32::INFINITY));
        assert_eq!((-2.5_f64).normalize(), Some(-2.5));
    }

    #[test]
    fn normalize_clamps_large_ints() {
        assert_eq!(u32::MAX.normalize(), Some(u32::INFINITY));
        assert_eq!(i64::MIN.normalize(), Some(i64::MIN));
        assert_eq!(7_u64.normalize(), Some(7));
    }
}
