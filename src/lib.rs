//! All-pairs shortest paths on dense graphs with blocked Floyd-Warshall.
//!
//! The `n × n` weight matrix is tiled into `L × L` blocks. Each of the `n / L`
//! pivot rounds first closes the pivot block on the diagonal, then relaxes
//! the rest of the pivot row and column against it, then every other block
//! against the pivot row and column:
//!
//! ```text
//! for p in 0..n/L:
//!     relax(B[p,p], B[p,p], B[p,p])                          // diagonal
//!     par for c != p: relax(B[p,c], B[p,p], B[p,c])          // cross
//!     par for r != p: relax(B[r,p], B[r,p], B[p,p])
//!     par for r != p, c != p: relax(B[r,c], B[r,p], B[p,c])  // remaining
//! ```
//!
//! where `relax(C, A, B)` is `C[i,j] = min(C[i,j], A[i,k] + B[k,j])` over
//! all `k, i, j`. The tasks of one phase write disjoint blocks and run on a
//! rayon pool; phases are separated by a join.
//!
//! ```
//! use blocked_apsp::{Solver, SolverConfig, WeightMatrix};
//!
//! let mut graph = WeightMatrix::from_edges(4, [(0, 1, 3_u32), (1, 2, 1), (2, 3, 2), (0, 3, 100)])?;
//! let solver = Solver::new(SolverConfig::default().with_block_size(2).with_threads(2))?;
//! solver.solve(&mut graph)?;
//! assert_eq!(graph.distance(0, 3), Some(6));
//! assert_eq!(graph.distance(3, 0), None);
//! # Ok::<(), blocked_apsp::Error>(())
//! ```

pub mod baseline;
pub mod block;
pub mod config;
pub mod error;
pub mod executor;
pub mod kernel;
pub mod matrix;
pub mod schedule;
pub mod simd;
pub mod solver;
pub mod timer;
pub mod weight;

pub use config::{PaddingPolicy, SolverConfig};
pub use error::{Error, Result, TaskFailure};
pub use executor::CancellationToken;
pub use kernel::KernelKind;
pub use matrix::WeightMatrix;
pub use schedule::PhaseKind;
pub use solver::{shortest_paths, SolveReport, Solver};
pub use weight::Weight;
