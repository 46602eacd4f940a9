//! Zero-copy block views into the weight matrix.
//!
//! A block `B[r][c]` of an `L × L` tiling covers rows `[r·L, r·L + L)` and
//! columns `[c·L, c·L + L)` of the row-major store. Because the store is
//! row-major, a block is not contiguous: it is `L` row segments of length
//! `L`, one per matrix row, each `dim` elements apart. A view is therefore
//! just the address of its top-left element and the row stride.
//!
//! [`BlockGrid`] holds the exclusive borrow of the store for a whole solve.
//! Each phase opens a [`PhaseBlocks`] from it, which hands out every block at
//! most once. Two views of one phase never cover the same element, so tasks
//! that run concurrently own different [`BlockMut`]s; blocks that are only
//! read are converted into shared [`Block`]s first. Opening the next phase
//! needs the grid mutably again, which ends every view of the previous one.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::slice;

/// `(block_row, block_col)` coordinate in the block grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockCoord {
    pub row: usize,
    pub col: usize,
}

impl BlockCoord {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for BlockCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Mutable `L × L` view.
pub struct BlockMut<'a, T> {
    origin: NonNull<T>,
    stride: usize,
    size: usize,
    _data: PhantomData<&'a mut [T]>,
}

// SAFETY: a BlockMut is the only live view of its elements, like a `&mut [T]`.
unsafe impl<T: Send> Send for BlockMut<'_, T> {}
unsafe impl<T: Sync> Sync for BlockMut<'_, T> {}

impl<'a, T> BlockMut<'a, T> {
    /// Side length `L`.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        assert!(i < self.size, "row {i} out of range for block of size {}", self.size);
        // SAFETY: row i of the block lies inside the store and inside this view only
        unsafe { slice::from_raw_parts(self.origin.as_ptr().add(i * self.stride), self.size) }
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        assert!(i < self.size, "row {i} out of range for block of size {}", self.size);
        // SAFETY: as in `row`, and `&mut self` excludes every other borrow of the view
        unsafe { slice::from_raw_parts_mut(self.origin.as_ptr().add(i * self.stride), self.size) }
    }

    /// Row `i` mutably and row `k` shared, `i != k`.
    #[inline]
    pub fn row_pair_mut(&mut self, i: usize, k: usize) -> (&mut [T], &[T]) {
        assert!(i != k && i < self.size && k < self.size, "rows ({i}, {k}) of block of size {}", self.size);
        let base = self.origin.as_ptr();
        // SAFETY: two different rows never overlap because `stride >= size`
        unsafe {
            (
                slice::from_raw_parts_mut(base.add(i * self.stride), self.size),
                slice::from_raw_parts(base.add(k * self.stride), self.size),
            )
        }
    }

    /// Give up write access, keeping the same memory.
    pub fn into_shared(self) -> Block<'a, T> {
        Block { origin: self.origin, stride: self.stride, size: self.size, _data: PhantomData }
    }
}

impl<T: Copy> BlockMut<'_, T> {
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.row(i)[j]
    }
}

impl<T> fmt::Debug for BlockMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockMut").field("size", &self.size).field("stride", &self.stride).finish()
    }
}

/// Read-only `L × L` view.
pub struct Block<'a, T> {
    origin: NonNull<T>,
    stride: usize,
    size: usize,
    _data: PhantomData<&'a [T]>,
}

// SAFETY: a Block only reads, like a `&[T]`.
unsafe impl<T: Sync> Send for Block<'_, T> {}
unsafe impl<T: Sync> Sync for Block<'_, T> {}

impl<T> Clone for Block<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Block<'_, T> {}

impl<'a, T> Block<'a, T> {
    /// A zero-sized block, for grid slots that a phase never reads.
    pub fn empty() -> Self {
        Self { origin: NonNull::dangling(), stride: 0, size: 0, _data: PhantomData }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn row(&self, i: usize) -> &'a [T] {
        assert!(i < self.size, "row {i} out of range for block of size {}", self.size);
        // SAFETY: row i lies inside the store, which no phase task writes through this block
        unsafe { slice::from_raw_parts(self.origin.as_ptr().add(i * self.stride), self.size) }
    }
}

impl<T: Copy> Block<'_, T> {
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.row(i)[j]
    }

    /// Row-major copy of the transpose, `L * L` elements.
    pub fn transposed(&self) -> Vec<T> {
        let l = self.size();
        let mut out = Vec::with_capacity(l * l);
        for j in 0..l {
            out.extend((0..l).map(|i| self.row(i)[j]));
        }
        out
    }
}

impl<T> fmt::Debug for Block<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block").field("size", &self.size).field("stride", &self.stride).finish()
    }
}

/// One `L × L` tiling of a `dim × dim` store, borrowed for a whole solve.
pub struct BlockGrid<'a, T> {
    origin: NonNull<T>,
    dim: usize,
    block: usize,
    side: usize,
    /// Phase in which each block was last handed out.
    stamps: Vec<u32>,
    phase: u32,
    _data: PhantomData<&'a mut [T]>,
}

impl<'a, T> BlockGrid<'a, T> {
    /// Tile a `dim × dim` row-major buffer into `block × block` views.
    ///
    /// # Panics
    ///
    /// If `block` does not divide `dim` or the buffer is not `dim * dim` long.
    pub fn new(data: &'a mut [T], dim: usize, block: usize) -> Self {
        assert!(block > 0 && dim % block == 0, "block size {block} does not tile dimension {dim}");
        assert_eq!(Some(data.len()), dim.checked_mul(dim));
        let side = dim / block;
        Self {
            origin: NonNull::from(data).cast(),
            dim,
            block,
            side,
            stamps: vec![0; side * side],
            phase: 0,
            _data: PhantomData,
        }
    }

    /// Blocks per row (and per column).
    pub fn side(&self) -> usize {
        self.side
    }

    /// Start handing out blocks for the next phase.
    pub fn phase(&mut self) -> PhaseBlocks<'_, T> {
        if self.phase == u32::MAX {
            self.stamps.fill(0);
            self.phase = 0;
        }
        self.phase += 1;
        PhaseBlocks {
            origin: self.origin,
            dim: self.dim,
            block: self.block,
            side: self.side,
            stamps: &mut self.stamps,
            phase: self.phase,
            _data: PhantomData,
        }
    }
}

impl<T> fmt::Debug for BlockGrid<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockGrid").field("dim", &self.dim).field("block", &self.block).finish()
    }
}

/// The blocks of one phase, each handed out at most once.
pub struct PhaseBlocks<'g, T> {
    origin: NonNull<T>,
    dim: usize,
    block: usize,
    side: usize,
    stamps: &'g mut [u32],
    phase: u32,
    _data: PhantomData<&'g mut [T]>,
}

impl<'g, T> PhaseBlocks<'g, T> {
    pub fn side(&self) -> usize {
        self.side
    }

    /// Move the block at `coord` out of the grid.
    ///
    /// # Panics
    ///
    /// If `coord` is outside the grid or the block was already taken in this phase.
    #[track_caller]
    pub fn take(&mut self, coord: BlockCoord) -> BlockMut<'g, T> {
        assert!(coord.row < self.side && coord.col < self.side, "block {coord} outside a {0}×{0} grid", self.side);
        let stamp = &mut self.stamps[coord.row * self.side + coord.col];
        if *stamp == self.phase {
            panic!("block {coord} handed out twice");
        }
        *stamp = self.phase;
        let offset = coord.row * self.block * self.dim + coord.col * self.block;
        BlockMut {
            // SAFETY: the block's last element is at offset + (L - 1) * dim + L - 1 < dim * dim
            origin: unsafe { NonNull::new_unchecked(self.origin.as_ptr().add(offset)) },
            stride: self.dim,
            size: self.block,
            _data: PhantomData,
        }
    }
}
