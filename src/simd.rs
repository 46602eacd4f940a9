//! Vectorized min-plus inner loops.
//!
//! Two shapes of inner loop are needed by the block kernel:
//!
//! - a *row relaxation*, `c[j] = min(c[j], a + b[j])`, where `a` is a
//!   broadcast scalar `B2[i, k]` and `b` is row `k` of `B3`;
//! - a *min-plus dot product*, `min(acc, min_k(a[k] + bt[k]))`, where `a` is
//!   row `i` of `B2` and `bt` is column `j` of `B3`, stored transposed.
//!
//! The portable versions process [`LANES`] elements per step with
//! independent accumulators so the compiler can keep each lane in its own
//! register. On x86_64 the `f32` versions use 256-bit AVX vectors when the
//! CPU supports them.

use crate::weight::Weight;

/// Amount of elements per SIMD step, i.e. f32 elements in a 256-bit vector.
pub const LANES: usize = 8;

/// Portable `c[j] = min(c[j], a + b[j])`.
#[inline]
pub fn relax_row_lanes<T: Weight>(c: &mut [T], a: T, b: &[T]) {
    debug_assert_eq!(c.len(), b.len());
    if a.is_unreachable() {
        // INFINITY + anything is INFINITY, which never beats a stored value
        return;
    }
    let mut c_chunks = c.chunks_exact_mut(LANES);
    let mut b_chunks = b.chunks_exact(LANES);
    for (c_block, b_block) in (&mut c_chunks).zip(&mut b_chunks) {
        for (x, &y) in c_block.iter_mut().zip(b_block) {
            *x = x.relax(a.sat_add(y));
        }
    }
    for (x, &y) in c_chunks.into_remainder().iter_mut().zip(b_chunks.remainder()) {
        *x = x.relax(a.sat_add(y));
    }
}

/// Portable `c[j] = min(c[j], a + c[j])`.
#[inline]
pub fn relax_row_in_place_lanes<T: Weight>(c: &mut [T], a: T) {
    if a.is_unreachable() {
        return;
    }
    let mut c_chunks = c.chunks_exact_mut(LANES);
    for c_block in &mut c_chunks {
        for x in c_block.iter_mut() {
            *x = x.relax(a.sat_add(*x));
        }
    }
    for x in c_chunks.into_remainder() {
        *x = x.relax(a.sat_add(*x));
    }
}

/// Portable `min(acc, min_k(a[k] + bt[k]))`.
#[inline]
pub fn min_plus_dot_lanes<T: Weight>(acc: T, a: &[T], bt: &[T]) -> T {
    debug_assert_eq!(a.len(), bt.len());
    let a_blocks = a.chunks_exact(LANES);
    let bt_blocks = bt.chunks_exact(LANES);
    let tail = a_blocks.remainder().iter().zip(bt_blocks.remainder());
    // Accumulate results in LANES independent lanes
    let mut block = [T::INFINITY; LANES];
    for (a_block, bt_block) in a_blocks.zip(bt_blocks) {
        for (b, (&x, &y)) in block.iter_mut().zip(a_block.iter().zip(bt_block)) {
            *b = b.relax(x.sat_add(y));
        }
    }
    let lanes_min = block.iter().fold(T::INFINITY, |m, &x| m.relax(x));
    let total = tail.fold(lanes_min, |m, (&x, &y)| m.relax(x.sat_add(y)));
    acc.relax(total)
}

/// `f32` row relaxation, AVX when available.
#[inline]
pub fn relax_row_f32(c: &mut [f32], a: f32, b: &[f32]) {
    #[cfg(target_arch = "x86_64")]
    {
        if avx_available() {
            // SAFETY: AVX support was detected at runtime
            unsafe { avx::relax_row(c, a, b) };
            return;
        }
    }
    relax_row_lanes(c, a, b);
}

/// `f32` in-place row relaxation, AVX when available.
#[inline]
pub fn relax_row_in_place_f32(c: &mut [f32], a: f32) {
    #[cfg(target_arch = "x86_64")]
    {
        if avx_available() {
            // SAFETY: AVX support was detected at runtime
            unsafe { avx::relax_row_in_place(c, a) };
            return;
        }
    }
    relax_row_in_place_lanes(c, a);
}

/// `f32` min-plus dot product, AVX when available.
#[inline]
pub fn min_plus_dot_f32(acc: f32, a: &[f32], bt: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if avx_available() {
            // SAFETY: AVX support was detected at runtime
            return unsafe { avx::min_plus_dot(acc, a, bt) };
        }
    }
    min_plus_dot_lanes(acc, a, bt)
}

/// Whether the AVX code paths are taken on this machine.
#[inline]
pub fn avx_available() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        std::is_x86_feature_detected!("avx")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

#[cfg(target_arch = "x86_64")]
mod avx {
    use std::arch::x86_64::*; // Intel SIMD intrinsic mappings

    use super::LANES;
    use crate::weight::Weight;

    /// Return a 256-bit vector containing 8 infinity values
    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn f8infty() -> __m256 {
        _mm256_set1_ps(f32::INFINITY)
    }

    /// Permute 1, 2, or 4 element ranges with their neighbors.
    /// E.g.
    /// swap([0, 1, 2, 3, 4, 5, 6, 7], 1) == [1, 0, 3, 2, 5, 4, 7, 6]
    /// swap([0, 1, 2, 3, 4, 5, 6, 7], 2) == [2, 3, 0, 1, 6, 7, 4, 5]
    /// swap([0, 1, 2, 3, 4, 5, 6, 7], 4) == [4, 5, 6, 7, 0, 1, 2, 3]
    ///
    /// To make sense of the 8-bit shuffle control, read it in binary from right to left
    /// e.g. for width 1, control is 10110001.
    /// Reading from right to left in 2 bit chunks we get (1, 0, 3, 2),
    /// and (5, 4, 7, 6) for the 2nd 128-bit lane.
    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn swap<const WIDTH: usize>(v: __m256) -> __m256 {
        match WIDTH {
            1 => _mm256_shuffle_ps(v, v, 0b_10_11_00_01),
            2 => _mm256_shuffle_ps(v, v, 0b_01_00_11_10),
            _ => _mm256_permute2f128_ps(v, v, 1),
        }
    }

    /// Return the smallest element from a 256-bit float vector
    /// v              = [0, 1, 2, 3, 4, 5, 6, 7]
    /// swap(v, 1)     = [1, 0, 3, 2, 5, 4, 7, 6]
    /// min_1          = [0, 0, 2, 2, 4, 4, 6, 6]
    /// swap(min_1, 2) = [2, 2, 0, 0, 6, 6, 4, 4]
    /// min_2          = [0, 0, 0, 0, 4, 4, 4, 4]
    /// swap(min_2, 4) = [4, 4, 4, 4, 0, 0, 0, 0]
    /// min_4          = [0, 0, 0, 0, 0, 0, 0, 0]
    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn horizontal_min(v: __m256) -> f32 {
        let min_1 = _mm256_min_ps(swap::<1>(v), v);
        let min_2 = _mm256_min_ps(swap::<2>(min_1), min_1);
        let min_4 = _mm256_min_ps(swap::<4>(min_2), min_2);
        // All elements of min_4 are the minimum of v, extract the lowest 32 bits
        _mm256_cvtss_f32(min_4)
    }

    // _mm256_min_ps(z, c) is `z < c ? z : c`, the same tie rule as Weight::relax.

    #[target_feature(enable = "avx")]
    pub(super) unsafe fn relax_row(c: &mut [f32], a: f32, b: &[f32]) {
        let len = c.len().min(b.len());
        let full = len - len % LANES;
        let va = _mm256_set1_ps(a);
        let c_ptr = c.as_mut_ptr();
        let b_ptr = b.as_ptr();
        for off in (0..full).step_by(LANES) {
            let vb = _mm256_loadu_ps(b_ptr.add(off));
            let vc = _mm256_loadu_ps(c_ptr.add(off));
            let z = _mm256_add_ps(va, vb);
            _mm256_storeu_ps(c_ptr.add(off), _mm256_min_ps(z, vc));
        }
        for j in full..len {
            c[j] = c[j].relax(a + b[j]);
        }
    }

    #[target_feature(enable = "avx")]
    pub(super) unsafe fn relax_row_in_place(c: &mut [f32], a: f32) {
        let len = c.len();
        let full = len - len % LANES;
        let va = _mm256_set1_ps(a);
        let c_ptr = c.as_mut_ptr();
        for off in (0..full).step_by(LANES) {
            let vc = _mm256_loadu_ps(c_ptr.add(off));
            let z = _mm256_add_ps(va, vc);
            _mm256_storeu_ps(c_ptr.add(off), _mm256_min_ps(z, vc));
        }
        for x in &mut c[full..] {
            *x = x.relax(a + *x);
        }
    }

    #[target_feature(enable = "avx")]
    pub(super) unsafe fn min_plus_dot(acc: f32, a: &[f32], bt: &[f32]) -> f32 {
        let len = a.len().min(bt.len());
        let full = len - len % LANES;
        let mut tmp = f8infty();
        for off in (0..full).step_by(LANES) {
            let x = _mm256_loadu_ps(a.as_ptr().add(off));
            let y = _mm256_loadu_ps(bt.as_ptr().add(off));
            tmp = _mm256_min_ps(_mm256_add_ps(x, y), tmp);
        }
        let mut m = horizontal_min(tmp);
        for k in full..len {
            m = m.relax(a[k] + bt[k]);
        }
        acc.relax(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_relax_row<T: Weight>(c: &mut [T], a: T, b: &[T]) {
        for (x, &y) in c.iter_mut().zip(b) {
            *x = x.relax(a.sat_add(y));
        }
    }

    #[test]
    fn f32_row_relaxation_matches_scalar_on_ragged_lengths() {
        for len in [0, 1, 7, 8, 9, 16, 23] {
            let b: Vec<f32> = (0..len).map(|j| if j % 3 == 0 { f32::INFINITY } else { j as f32 }).collect();
            let init: Vec<f32> = (0..len).map(|j| (len - j) as f32 * 1.5).collect();
            let mut expected = init.clone();
            scalar_relax_row(&mut expected, 2.0, &b);
            let mut got = init.clone();
            relax_row_f32(&mut got, 2.0, &b);
            assert_eq!(got, expected, "len {len}");
        }
    }

    #[test]
    fn unreachable_broadcast_changes_nothing() {
        let mut c = vec![4_u32, u32::INFINITY, 0];
        relax_row_lanes(&mut c, u32::INFINITY, &[0, 0, 0]);
        assert_eq!(c, vec![4, u32::INFINITY, 0]);
        relax_row_in_place_lanes(&mut c, u32::INFINITY);
        assert_eq!(c, vec![4, u32::INFINITY, 0]);
    }

    #[test]
    fn dot_product_takes_global_minimum() {
        let a: Vec<i32> = (0..19).map(|k| 40 - k).collect();
        let bt: Vec<i32> = (0..19).map(|k| 2 * k).collect();
        // a[k] + bt[k] = 40 + k, minimum at k = 0
        assert_eq!(min_plus_dot_lanes(100, &a, &bt), 40);
        assert_eq!(min_plus_dot_lanes(12, &a, &bt), 12);

        let af: Vec<f32> = a.iter().map(|&x| x as f32).collect();
        let btf: Vec<f32> = bt.iter().map(|&x| x as f32).collect();
        assert_eq!(min_plus_dot_f32(100.0, &af, &btf), 40.0);
    }

    #[test]
    fn in_place_relaxation_with_negative_broadcast() {
        let mut c = vec![10_i64, 3, i64::INFINITY, -1, 0, 5, 6, 7, 8];
        relax_row_in_place_lanes(&mut c, -1);
        assert_eq!(c, vec![9, 2, i64::INFINITY, -2, -1, 4, 5, 6, 7]);

        let mut cf = vec![10.0_f32, 3.0, f32::INFINITY, -1.0, 0.0, 5.0, 6.0, 7.0, 8.0];
        relax_row_in_place_f32(&mut cf, -1.0);
        assert_eq!(cf, vec![9.0, 2.0, f32::INFINITY, -2.0, -1.0, 4.0, 5.0, 6.0, 7.0]);
    }
}
