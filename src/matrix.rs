//! The weight matrix store.
//!
//! One contiguous row-major buffer of `dim * dim` elements, where `dim` is the
//! vertex count rounded up to a multiple of the block size. Rows and columns
//! past `len` are padding vertices: unreachable from every real vertex and
//! never reported.

use std::ops::Index;

use crate::error::{Error, Result};
use crate::weight::Weight;

/// Dense `n × n` distance matrix, updated in place by the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix<T> {
    len: usize,
    dim: usize,
    data: Vec<T>,
}

impl<T: Weight> WeightMatrix<T> {
    /// `n` vertices and no edges.
    pub fn unconnected(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::EmptyGraph);
        }
        Ok(Self { len: n, dim: n, data: identity::<T>(n, cell_count::<T>(n)?) })
    }

    /// Build from a row-major `n * n` buffer.
    ///
    /// Values are normalised with [`Weight::normalize`]. A positive diagonal
    /// entry is replaced by zero, a negative one is rejected.
    pub fn from_dense(n: usize, values: Vec<T>) -> Result<Self> {
        if n == 0 {
            return Err(Error::EmptyGraph);
        }
        let expected = cell_count::<T>(n)?;
        if values.len() != expected {
            return Err(Error::DimensionMismatch { expected, actual: values.len() });
        }
        let mut data = values;
        for (row, line) in data.chunks_mut(n).enumerate() {
            for (col, x) in line.iter_mut().enumerate() {
                *x = checked(row, col, *x)?;
            }
        }
        Ok(Self { len: n, dim: n, data })
    }

    /// Build from an edge list. Parallel edges keep the shortest weight.
    pub fn from_edges<I>(n: usize, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, usize, T)>,
    {
        let mut matrix = Self::unconnected(n)?;
        for (from, to, weight) in edges {
            let weight = checked(from, to, weight)?;
            matrix.check_vertex(from)?;
            matrix.check_vertex(to)?;
            let cell = &mut matrix.data[from * matrix.dim + to];
            *cell = cell.relax(weight);
        }
        Ok(matrix)
    }

    /// Overwrite the edge `from → to`.
    pub fn set_edge(&mut self, from: usize, to: usize, weight: T) -> Result<()> {
        self.check_vertex(from)?;
        self.check_vertex(to)?;
        let weight = checked(from, to, weight)?;
        self.data[from * self.dim + to] = weight;
        Ok(())
    }

    /// Number of real vertices.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: a matrix has at least one vertex.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Row stride of the underlying buffer.
    pub fn padded_dim(&self) -> usize {
        self.dim
    }

    /// Current value at `(from, to)`, `None` outside `0..len`.
    pub fn get(&self, from: usize, to: usize) -> Option<T> {
        if from < self.len && to < self.len {
            Some(self.data[from * self.dim + to])
        } else {
            None
        }
    }

    /// Like [`get`](Self::get), but also `None` for unreachable pairs.
    pub fn distance(&self, from: usize, to: usize) -> Option<T> {
        self.get(from, to).filter(|d| !d.is_unreachable())
    }

    /// Row `from` without padding columns.
    ///
    /// # Panics
    ///
    /// If `from >= len`.
    pub fn row(&self, from: usize) -> &[T] {
        assert!(from < self.len, "row {from} out of range for {} vertices", self.len);
        let start = from * self.dim;
        &self.data[start..start + self.len]
    }

    /// Row-major `len * len` copy, padding excluded.
    pub fn to_dense(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len * self.len);
        for line in self.data.chunks_exact(self.dim).take(self.len) {
            out.extend_from_slice(&line[..self.len]);
        }
        out
    }

    /// The whole padded buffer, row stride [`padded_dim`](Self::padded_dim).
    pub fn as_padded_slice(&self) -> &[T] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Re-layout so that `block` divides the row stride.
    ///
    /// The stride becomes `len` rounded up to a multiple of `block`; new
    /// padding vertices get infinite edges and zero self-distance. Fails
    /// without touching the matrix if the padded store would not fit in memory.
    pub(crate) fn pad_to_multiple(&mut self, block: usize) -> Result<()> {
        let dim = self
            .len
            .div_ceil(block)
            .checked_mul(block)
            .ok_or(Error::TooManyVertices { dim: self.len })?;
        if dim == self.dim {
            return Ok(());
        }
        let mut data = identity::<T>(dim, cell_count::<T>(dim)?);
        for (dst, src) in data.chunks_exact_mut(dim).zip(self.data.chunks_exact(self.dim)).take(self.len) {
            dst[..self.len].copy_from_slice(&src[..self.len]);
        }
        self.dim = dim;
        self.data = data;
        Ok(())
    }

    fn check_vertex(&self, vertex: usize) -> Result<()> {
        if vertex < self.len {
            Ok(())
        } else {
            Err(Error::VertexOutOfRange { vertex, len: self.len })
        }
    }
}

impl<T: Weight> Index<(usize, usize)> for WeightMatrix<T> {
    type Output = T;

    fn index(&self, (from, to): (usize, usize)) -> &T {
        assert!(
            from < self.len && to < self.len,
            "({from}, {to}) out of range for {} vertices",
            self.len
        );
        &self.data[from * self.dim + to]
    }
}

/// `dim * dim`, if a buffer of that many `T` can be allocated at all.
fn cell_count<T>(dim: usize) -> Result<usize> {
    dim.checked_mul(dim)
        .filter(|&cells| cells.checked_mul(std::mem::size_of::<T>()).is_some_and(|bytes| bytes <= isize::MAX as usize))
        .ok_or(Error::TooManyVertices { dim })
}

fn identity<T: Weight>(dim: usize, cells: usize) -> Vec<T> {
    let mut data = vec![T::INFINITY; cells];
    for i in 0..dim {
        data[i * dim + i] = T::ZERO;
    }
    data
}

fn checked<T: Weight>(row: usize, col: usize, value: T) -> Result<T> {
    let normalized = value.normalize().ok_or_else(|| Error::InvalidWeight {
        row,
        col,
        value: format!("{value:?}"),
    })?;
    if row != col {
        return Ok(normalized);
    }
    if normalized < T::ZERO {
        Err(Error::NegativeDiagonal { vertex: row })
    } else {
        Ok(T::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INF: u32 = <u32 as Weight>::INFINITY;

    #[test]
    fn zero_vertices_is_rejected() {
        assert!(matches!(WeightMatrix::<f32>::unconnected(0), Err(Error::EmptyGraph)));
        assert!(matches!(WeightMatrix::<f32>::from_dense(0, vec![]), Err(Error::EmptyGraph)));
    }

    #[test]
    fn dense_length_must_match() {
        let err = WeightMatrix::from_dense(3, vec![0_u32; 8]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 9, actual: 8 }));
    }

    #[test]
    fn diagonal_is_normalised() {
        let m = WeightMatrix::from_dense(2, vec![5_i32, 1, 2, 0]).unwrap();
        assert_eq!(m[(0, 0)], 0);
        assert!(matches!(
            WeightMatrix::from_dense(2, vec![0_i32, 1, 2, -1]),
            Err(Error::NegativeDiagonal { vertex: 1 })
        ));
    }

    #[test]
    fn nan_is_rejected_with_position() {
        let err = WeightMatrix::from_dense(2, vec![0.0_f32, 1.0, f32::NAN, 0.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidWeight { row: 1, col: 0, .. }));
    }

    #[test]
    fn edges_keep_shortest_parallel_edge() {
        let m = WeightMatrix::from_edges(3, [(0, 1, 7_u32), (0, 1, 4), (1, 2, 9)]).unwrap();
        assert_eq!(m.get(0, 1), Some(4));
        assert_eq!(m.get(1, 2), Some(9));
        assert_eq!(m.distance(2, 0), None);
        assert_eq!(m.get(3, 0), None);
        assert!(matches!(
            WeightMatrix::from_edges(3, [(0, 3, 1_u32)]),
            Err(Error::VertexOutOfRange { vertex: 3, len: 3 })
        ));
    }

    #[test]
    fn padding_preserves_logical_contents() {
        let mut m = WeightMatrix::from_dense(3, (0..9).map(|x| if x % 4 == 0 { 0 } else { x }).collect::<Vec<u32>>())
            .unwrap();
        let before = m.to_dense();
        m.pad_to_multiple(4).unwrap();
        assert_eq!(m.padded_dim(), 4);
        assert_eq!(m.to_dense(), before);
        let raw = m.as_padded_slice();
        assert_eq!(&raw[12..16], &[INF, INF, INF, 0]);
        assert_eq!(raw[3], INF);
        assert_eq!(m.row(1), &[3, 0, 5]);

        // Re-padding to a different block size starts again from the logical size
        m.pad_to_multiple(2).unwrap();
        assert_eq!(m.padded_dim(), 4);
        m.pad_to_multiple(3).unwrap();
        assert_eq!(m.padded_dim(), 3);
        assert_eq!(m.to_dense(), before);
    }

    #[test]
    fn vertex_counts_whose_square_overflows_are_rejected() {
        // n * n wraps to zero for this n
        let n = 1_usize << (usize::BITS / 2);
        let err = WeightMatrix::<u32>::from_dense(n, Vec::new()).unwrap_err();
        assert!(matches!(err, Error::TooManyVertices { dim } if dim == n));
        assert!(matches!(WeightMatrix::<f32>::unconnected(n), Err(Error::TooManyVertices { .. })));
        // fits in usize, but not in memory as f64 cells
        let n = 1_usize << (usize::BITS / 2 - 1);
        assert!(matches!(WeightMatrix::<f64>::unconnected(n), Err(Error::TooManyVertices { .. })));
    }

    #[test]
    fn oversized_padding_leaves_the_matrix_alone() {
        let mut m = WeightMatrix::from_edges(3, [(0, 1, 2_u32)]).unwrap();
        let before = m.clone();
        assert!(matches!(m.pad_to_multiple(usize::MAX), Err(Error::TooManyVertices { dim: usize::MAX })));
        assert!(matches!(m.pad_to_multiple(1 << (usize::BITS / 2)), Err(Error::TooManyVertices { .. })));
        assert_eq!(m, before);
    }
}
