//! Error types for the blocked APSP solver.

use std::fmt;

use thiserror::Error;

use crate::schedule::PhaseKind;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Solver error types.
///
/// Everything except [`Error::PhaseFailed`] and [`Error::Cancelled`] is
/// reported before the first block task runs.
#[derive(Error, Debug)]
pub enum Error {
    /// A graph needs at least one vertex.
    #[error("vertex count must be positive")]
    EmptyGraph,

    /// Block size of zero.
    #[error("block size must be positive")]
    ZeroBlockSize,

    /// Worker pool of zero threads.
    #[error("worker thread count must be positive")]
    ZeroThreads,

    /// Strict padding was requested but the block size does not divide the dimension.
    #[error("block size {block_size} does not divide matrix dimension {dim}")]
    BlockSizeMismatch {
        /// Matrix dimension.
        dim: usize,
        /// Requested block size.
        block_size: usize,
    },

    /// Dense input buffer has the wrong length.
    #[error("expected {expected} matrix entries, got {actual}")]
    DimensionMismatch {
        /// `n * n`.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },

    /// `dim * dim` cells do not fit in the address space.
    #[error("a {dim} × {dim} matrix is too large to allocate")]
    TooManyVertices {
        /// Requested row stride.
        dim: usize,
    },

    /// Edge endpoint outside `0..len`.
    #[error("vertex {vertex} out of range for a graph of {len} vertices")]
    VertexOutOfRange {
        /// Offending vertex index.
        vertex: usize,
        /// Number of vertices.
        len: usize,
    },

    /// A value that has no meaning as a path length (NaN, negative infinity).
    #[error("invalid weight {value} at ({row}, {col})")]
    InvalidWeight {
        /// Source vertex.
        row: usize,
        /// Target vertex.
        col: usize,
        /// Debug rendering of the value.
        value: String,
    },

    /// Negative self-distance, i.e. a negative cycle of length one.
    #[error("negative self-distance on vertex {vertex}")]
    NegativeDiagonal {
        /// Offending vertex.
        vertex: usize,
    },

    /// The rayon pool could not be built.
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// Configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// One or more block tasks failed; later phases were not run.
    #[error("{phase} phase of pivot round {pivot} failed: {}", FailureList(.failures))]
    PhaseFailed {
        /// Pivot round in which the failure happened.
        pivot: usize,
        /// Phase in which the failure happened.
        phase: PhaseKind,
        /// Every failed task of that phase.
        failures: Vec<TaskFailure>,
    },

    /// The solve was cancelled at a block boundary.
    #[error("cancelled during {phase} phase of pivot round {pivot}")]
    Cancelled {
        /// Pivot round at cancellation.
        pivot: usize,
        /// Phase at cancellation.
        phase: PhaseKind,
    },
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(err.to_string())
    }
}

/// A single block task that panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Block row of the task's target.
    pub block_row: usize,
    /// Block column of the task's target.
    pub block_col: usize,
    /// Panic payload, if it was a string.
    pub message: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block ({}, {}): {}", self.block_row, self.block_col, self.message)
    }
}

struct FailureList<'a>(&'a [TaskFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_failure_lists_every_task() {
        let err = Error::PhaseFailed {
            pivot: 2,
            phase: PhaseKind::Remaining,
            failures: vec![
                TaskFailure { block_row: 0, block_col: 1, message: "boom".into() },
                TaskFailure { block_row: 3, block_col: 1, message: "bang".into() },
            ],
        };
        assert_eq!(
            err.to_string(),
            "remaining phase of pivot round 2 failed: block (0, 1): boom; block (3, 1): bang"
        );
    }

    #[test]
    fn toml_errors_become_config_errors() {
        let err: Error = toml::from_str::<toml::Value>("block_size = ").unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
    }
}
