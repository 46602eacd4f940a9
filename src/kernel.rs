//! The block kernel.
//!
//! One call applies, for all `i, j, k` in `[0, L)` with `k` outermost,
//!
//! ```text
//! B1[i, j] = min(B1[i, j], B2[i, k] + B3[k, j])
//! ```
//!
//! B1 is the target block. B2 and B3 may alias it, which is what the
//! diagonal and cross phases of a pivot round need, so the aliasing is made
//! explicit with [`Operands`] instead of passing three views.
//!
//! Row `k` and column `k` of the pivot block do not change during step `k`
//! (the diagonal of the pivot block is zero), which is what makes the
//! in-place row updates below equivalent to the textbook triple loop.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockCoord, BlockMut};
use crate::weight::Weight;

/// Inner-loop implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    /// Plain element-wise loops.
    Scalar,
    /// SIMD-width chunks; bit-identical to `Scalar`.
    #[default]
    Vectorized,
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KernelKind::Scalar => "scalar",
            KernelKind::Vectorized => "vectorized",
        })
    }
}

impl FromStr for KernelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scalar" => Ok(KernelKind::Scalar),
            "vectorized" | "simd" => Ok(KernelKind::Vectorized),
            other => Err(format!("unknown kernel kind `{other}` (expected `scalar` or `vectorized`)")),
        }
    }
}

/// The row- and column-source blocks of one kernel call.
#[derive(Debug)]
pub enum Operands<'s, T> {
    /// B1 = B2 = B3: Floyd-Warshall inside the block.
    Diagonal,
    /// B2 = `pivot`, B3 = B1. Blocks `B[p, c]` of the pivot row.
    PivotRow { pivot: &'s Block<'s, T> },
    /// B2 = B1, B3 = `pivot`. Blocks `B[r, p]` of the pivot column.
    PivotColumn { pivot: &'s Block<'s, T> },
    /// B2 = `left` = `B[r, p]`, B3 = `right` = `B[p, c]`, neither aliasing B1.
    Disjoint { left: &'s Block<'s, T>, right: &'s Block<'s, T> },
}

impl<T> Clone for Operands<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Operands<'_, T> {}

/// One unit of scheduled work: a target block and where to read from.
#[derive(Debug)]
pub struct BlockTask<'s, 'a, T> {
    pub coord: BlockCoord,
    pub target: BlockMut<'a, T>,
    pub operands: Operands<'s, T>,
}

/// Run a scheduled task with the given inner loop.
#[inline]
pub fn execute<T: Weight>(mut task: BlockTask<'_, '_, T>, kind: KernelKind) {
    relax(&mut task.target, task.operands, kind);
}

/// Apply one min-plus relaxation pass to `target`.
pub fn relax<T: Weight>(target: &mut BlockMut<'_, T>, operands: Operands<'_, T>, kind: KernelKind) {
    match kind {
        KernelKind::Scalar => relax_with::<T, ScalarLoop>(target, operands),
        KernelKind::Vectorized => relax_with::<T, SimdLoop>(target, operands),
    }
}

trait RowLoop<T: Weight> {
    /// `c[j] = min(c[j], a + b[j])`
    fn relax_row(c: &mut [T], a: T, b: &[T]);
    /// `c[j] = min(c[j], a + c[j])`
    fn relax_row_in_place(c: &mut [T], a: T);
    /// `for i, j: c[i][j] = min(c[i][j], min_k(left[i][k] + right[k][j]))`
    fn relax_disjoint(target: &mut BlockMut<'_, T>, left: &Block<'_, T>, right: &Block<'_, T>);
}

struct ScalarLoop;

impl<T: Weight> RowLoop<T> for ScalarLoop {
    #[inline]
    fn relax_row(c: &mut [T], a: T, b: &[T]) {
        for (x, &y) in c.iter_mut().zip(b) {
            *x = x.relax(a.sat_add(y));
        }
    }

    #[inline]
    fn relax_row_in_place(c: &mut [T], a: T) {
        for x in c.iter_mut() {
            *x = x.relax(a.sat_add(*x));
        }
    }

    fn relax_disjoint(target: &mut BlockMut<'_, T>, left: &Block<'_, T>, right: &Block<'_, T>) {
        let l = target.size();
        for k in 0..l {
            let right_row = right.row(k);
            for i in 0..l {
                let a = left.get(i, k);
                Self::relax_row(target.row_mut(i), a, right_row);
            }
        }
    }
}

struct SimdLoop;

impl<T: Weight> RowLoop<T> for SimdLoop {
    #[inline]
    fn relax_row(c: &mut [T], a: T, b: &[T]) {
        T::relax_row_simd(c, a, b);
    }

    #[inline]
    fn relax_row_in_place(c: &mut [T], a: T) {
        T::relax_row_in_place_simd(c, a);
    }

    // Nothing in the target feeds back into later k here, so the k loop can
    // become the reduction: hold row i of `left`, walk column j of `right`
    // (transposed to be contiguous) and reduce over k in SIMD-width chunks.
    fn relax_disjoint(target: &mut BlockMut<'_, T>, left: &Block<'_, T>, right: &Block<'_, T>) {
        let l = target.size();
        let right_t = right.transposed();
        for i in 0..l {
            let left_row = left.row(i);
            for (res, right_col) in target.row_mut(i).iter_mut().zip(right_t.chunks_exact(l)) {
                *res = T::min_plus_dot_simd(*res, left_row, right_col);
            }
        }
    }
}

fn relax_with<T: Weight, R: RowLoop<T>>(target: &mut BlockMut<'_, T>, operands: Operands<'_, T>) {
    let l = target.size();
    match operands {
        Operands::Diagonal => {
            for k in 0..l {
                for i in 0..l {
                    let a = target.get(i, k);
                    relax_against_row_k::<T, R>(target, i, k, a);
                }
            }
        }
        Operands::PivotRow { pivot } => {
            for k in 0..l {
                for i in 0..l {
                    let a = pivot.get(i, k);
                    relax_against_row_k::<T, R>(target, i, k, a);
                }
            }
        }
        Operands::PivotColumn { pivot } => {
            for k in 0..l {
                let pivot_row = pivot.row(k);
                for i in 0..l {
                    let row = target.row_mut(i);
                    let a = row[k];
                    R::relax_row(row, a, pivot_row);
                }
            }
        }
        Operands::Disjoint { left, right } => R::relax_disjoint(target, left, right),
    }
}

/// `target[i][j] = min(target[i][j], a + target[k][j])`
#[inline]
fn relax_against_row_k<T: Weight, R: RowLoop<T>>(target: &mut BlockMut<'_, T>, i: usize, k: usize, a: T) {
    if i == k {
        R::relax_row_in_place(target.row_mut(i), a);
    } else {
        let (row_i, row_k) = target.row_pair_mut(i, k);
        R::relax_row(row_i, a, row_k);
    }
}
