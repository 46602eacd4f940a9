//! Blocked Floyd-Warshall driver.
//!
//! [`Solver::solve`] pads the matrix to a multiple of the block size, tiles
//! the store once into a [`BlockGrid`], then walks the [`Schedule`]: for
//! every phase it takes the phase's target blocks into tasks, turns the
//! blocks the phase only reads into shared views, and hands the tasks to the
//! [`Executor`]. A phase returns only once all its tasks are done, which is
//! what orders diagonal < cross < remaining < next round.
//!
//! Taking a block is constant work, so a phase costs its own task count and
//! nothing proportional to the matrix size.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, info_span, trace, warn};

use crate::block::{Block, BlockCoord, BlockGrid, PhaseBlocks};
use crate::config::{PaddingPolicy, SolverConfig};
use crate::error::{Error, Result};
use crate::executor::{CancellationToken, Executor, PhaseOutcome};
use crate::kernel::{self, BlockTask, KernelKind, Operands};
use crate::matrix::WeightMatrix;
use crate::schedule::{PhaseKind, PhasePlan, Schedule};
use crate::timer::{PhaseTimings, Stopwatch};
use crate::weight::Weight;

/// Summary of a finished solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveReport {
    pub vertices: usize,
    pub padded_dim: usize,
    pub block_size: usize,
    pub threads: usize,
    pub kernel: KernelKind,
    pub rounds: usize,
    pub tasks: usize,
    pub timings: PhaseTimings,
    pub elapsed: Duration,
}

impl fmt::Display for SolveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} dim={} L={} threads={} kernel={} rounds={} tasks={} in {} ms ({})",
            self.vertices,
            self.padded_dim,
            self.block_size,
            self.threads,
            self.kernel,
            self.rounds,
            self.tasks,
            self.elapsed.as_millis(),
            self.timings
        )
    }
}

/// Configured solver owning its worker pool. Reusable across matrices.
///
/// Once its [`CancellationToken`] is cancelled, every solve fails with
/// [`Error::Cancelled`] until the token is [reset](CancellationToken::reset).
#[derive(Debug)]
pub struct Solver {
    config: SolverConfig,
    executor: Executor,
    cancel: CancellationToken,
}

impl Solver {
    /// Validate `config` and start the worker pool.
    pub fn new(config: SolverConfig) -> Result<Self> {
        config.validate()?;
        let executor = Executor::new(config.threads)?;
        Ok(Self { config, executor, cancel: CancellationToken::new() })
    }

    /// Use `token` to stop solves early. The token is shared, not copied,
    /// so cancelling any clone of it affects this solver.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Replace every entry of `matrix` by its shortest-path distance.
    ///
    /// On error the contents of `matrix` are unspecified. Negative cycles
    /// are not detected and give meaningless distances.
    pub fn solve<T: Weight>(&self, matrix: &mut WeightMatrix<T>) -> Result<SolveReport> {
        let kind = self.config.kernel;
        self.solve_with(matrix, |task: BlockTask<'_, '_, T>| kernel::execute(task, kind))
    }

    fn solve_with<T, F>(&self, matrix: &mut WeightMatrix<T>, run: F) -> Result<SolveReport>
    where
        T: Weight,
        F: for<'s, 'a> Fn(BlockTask<'s, 'a, T>) + Sync,
    {
        let block = self.config.block_size;
        if self.config.padding == PaddingPolicy::Strict && matrix.len() % block != 0 {
            return Err(Error::BlockSizeMismatch { dim: matrix.len(), block_size: block });
        }
        matrix.pad_to_multiple(block)?;
        let vertices = matrix.len();
        let dim = matrix.padded_dim();
        let schedule = Schedule::new(dim / block);

        let span = info_span!(
            "apsp_solve",
            n = vertices,
            dim,
            block_size = block,
            threads = self.executor.threads(),
            kernel = %self.config.kernel,
        );
        let _guard = span.enter();

        let mut watch = Stopwatch::new();
        let mut timings = PhaseTimings::default();
        let mut grid = BlockGrid::new(matrix.as_mut_slice(), dim, block);
        for plan in schedule.phases() {
            if plan.kind == PhaseKind::Diagonal {
                debug!(pivot = plan.pivot, rounds = schedule.rounds(), "pivot round");
            }
            trace!(pivot = plan.pivot, phase = %plan.kind, tasks = plan.task_count(), "phase");
            let outcome = self.run_plan(grid.phase(), &plan, &run);
            timings.record(plan.kind, watch.click());
            match outcome {
                PhaseOutcome::Completed => {}
                PhaseOutcome::Cancelled => {
                    warn!(pivot = plan.pivot, phase = %plan.kind, "solve cancelled");
                    return Err(Error::Cancelled { pivot: plan.pivot, phase: plan.kind });
                }
                PhaseOutcome::Failed(failures) => {
                    warn!(pivot = plan.pivot, phase = %plan.kind, failed = failures.len(), "aborting solve");
                    return Err(Error::PhaseFailed { pivot: plan.pivot, phase: plan.kind, failures });
                }
            }
        }

        let report = SolveReport {
            vertices,
            padded_dim: dim,
            block_size: block,
            threads: self.executor.threads(),
            kernel: self.config.kernel,
            rounds: schedule.rounds(),
            tasks: schedule.task_count(),
            timings,
            elapsed: watch.total(),
        };
        info!(elapsed_ms = report.elapsed.as_millis() as u64, tasks = report.tasks, "solve finished");
        Ok(report)
    }

    fn run_plan<T, F>(&self, mut blocks: PhaseBlocks<'_, T>, plan: &PhasePlan, run: &F) -> PhaseOutcome
    where
        T: Weight,
        F: for<'s, 'a> Fn(BlockTask<'s, 'a, T>) + Sync,
    {
        let p = plan.pivot;
        let pivot_coord = BlockCoord::new(p, p);
        match plan.kind {
            PhaseKind::Diagonal => {
                let task =
                    BlockTask { coord: pivot_coord, target: blocks.take(pivot_coord), operands: Operands::Diagonal };
                self.executor.run_serial(task, &self.cancel, run)
            }
            PhaseKind::Cross => {
                let pivot = blocks.take(pivot_coord).into_shared();
                let tasks = plan
                    .targets
                    .iter()
                    .map(|&coord| {
                        let operands = if coord.row == p {
                            Operands::PivotRow { pivot: &pivot }
                        } else {
                            Operands::PivotColumn { pivot: &pivot }
                        };
                        BlockTask { coord, target: blocks.take(coord), operands }
                    })
                    .collect();
                self.executor.run_phase(tasks, &self.cancel, run)
            }
            PhaseKind::Remaining => {
                let side = blocks.side();
                let pivot_row: Vec<Block<'_, T>> =
                    (0..side).map(|c| blocks.take(BlockCoord::new(p, c)).into_shared()).collect();
                // B[p, p] is owned by pivot_row and never read in this phase
                let pivot_col: Vec<Block<'_, T>> = (0..side)
                    .map(|r| {
                        if r == p {
                            Block::empty()
                        } else {
                            blocks.take(BlockCoord::new(r, p)).into_shared()
                        }
                    })
                    .collect();
                let tasks = plan
                    .targets
                    .iter()
                    .map(|&coord| BlockTask {
                        coord,
                        target: blocks.take(coord),
                        operands: Operands::Disjoint { left: &pivot_col[coord.row], right: &pivot_row[coord.col] },
                    })
                    .collect();
                self.executor.run_phase(tasks, &self.cancel, run)
            }
        }
    }
}

/// Solve a row-major `n * n` matrix and return the distances.
pub fn shortest_paths<T: Weight>(n: usize, dense: Vec<T>, config: &SolverConfig) -> Result<Vec<T>> {
    let mut matrix = WeightMatrix::from_dense(n, dense)?;
    Solver::new(config.clone())?.solve(&mut matrix)?;
    Ok(matrix.to_dense())
}
