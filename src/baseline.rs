//! Unblocked reference implementations.
//!
//! Straightforward triple loops over a row-major `n * n` slice, used to check
//! the blocked solver.

use rayon::prelude::*; // Parallel chunks iterator

use crate::weight::Weight;

/// Textbook in-place Floyd-Warshall.
pub fn floyd_warshall<T: Weight>(d: &mut [T], n: usize) {
    assert_eq!(d.len(), n * n);
    for k in 0..n {
        for i in 0..n {
            let x = d[n * i + k];
            for j in 0..n {
                let y = d[n * k + j];
                let z = x.sat_add(y);
                d[n * i + j] = d[n * i + j].relax(z);
            }
        }
    }
}

/// One min-plus product `r = d ⊗ d`: `r[i][j] = min_k(d[i][k] + d[k][j])`.
///
/// With a zero diagonal, `ceil(log2(n - 1))` repeated steps give the
/// shortest paths, which makes it an independent check of
/// [`floyd_warshall`].
pub fn min_plus_step<T: Weight>(r: &mut [T], d: &[T], n: usize) {
    assert_eq!(d.len(), n * n);
    assert_eq!(r.len(), n * n);
    // For some row i in d, compute all results for a row in r
    let step_row = |(i, row): (usize, &mut [T])| {
        for (j, res) in row.iter_mut().enumerate() {
            let mut v = T::INFINITY;
            for k in 0..n {
                let x = d[n * i + k];
                let y = d[n * k + j];
                v = v.relax(x.sat_add(y));
            }
            *res = v;
        }
    };
    // Partition the result slice into n rows, and compute results for each row in separate threads
    r.par_chunks_mut(n).enumerate().for_each(step_row);
}

/// Shortest paths by repeated squaring with [`min_plus_step`].
pub fn repeated_squaring<T: Weight>(d: &[T], n: usize) -> Vec<T> {
    let mut current = d.to_vec();
    let mut next = vec![T::INFINITY; n * n];
    let mut hops = 1;
    while hops < n.saturating_sub(1) {
        min_plus_step(&mut next, &current, n);
        std::mem::swap(&mut current, &mut next);
        hops *= 2;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_graph() {
        #[rustfmt::skip]
        let mut d = vec![
            0., 8., 2.,
            1., 0., 9.,
            4., 5., 0.,
        ];
        floyd_warshall(&mut d, 3);
        #[rustfmt::skip]
        let expected = vec![
            0., 7., 2.,
            1., 0., 3.,
            4., 5., 0.,
        ];
        assert_eq!(d, expected);
    }

    #[test]
    fn squaring_agrees_with_floyd_warshall() {
        let n = 9;
        let inf = u32::INFINITY;
        let mut d = vec![inf; n * n];
        for i in 0..n {
            d[i * n + i] = 0;
            d[i * n + (i + 1) % n] = (i as u32) + 1;
        }
        d[2 * n + 7] = 1;
        let squared = repeated_squaring(&d, n);
        floyd_warshall(&mut d, n);
        assert_eq!(squared, d);
        // ring 0 -> 1 -> 2 costs 1 + 2
        assert_eq!(d[2], 3);
        // 2 -> 7 shortcut, then 7 -> 8 -> 0
        assert_eq!(d[2 * n], 1 + 8 + 9);
    }
}
