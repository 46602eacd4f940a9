//! Fixed-size worker pool for the block tasks of one phase.
//!
//! A phase is a fork-join: [`Executor::run_phase`] hands every task to the
//! rayon pool and returns once all of them have finished, so the return is
//! the phase barrier. No lock guards the weight matrix; every task owns a
//! distinct [`BlockMut`](crate::block::BlockMut).
//!
//! Each task runs under `catch_unwind`. The first failure raises an abort
//! flag, so tasks of the same phase that have not started yet are skipped.
//! The same check honours a [`CancellationToken`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*; // Parallel iterator over the tasks of a phase
use tracing::warn;

use crate::error::{Result, TaskFailure};
use crate::kernel::BlockTask;

/// Cooperative cancellation flag, checked before every block task.
///
/// A token stays cancelled until [`reset`](Self::reset), and every solve that
/// uses it fails with [`Error::Cancelled`](crate::Error::Cancelled) meanwhile.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Tasks already running finish their block.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Clear a previous cancellation so the token can guard new solves.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

/// How a phase ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed,
    Cancelled,
    Failed(Vec<TaskFailure>),
}

/// rayon thread pool of a fixed size.
pub struct Executor {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl Executor {
    /// # Errors
    ///
    /// [`Error::ZeroThreads`](crate::Error::ZeroThreads) for an empty pool, or
    /// [`Error::ThreadPool`](crate::Error::ThreadPool) if the threads cannot be spawned.
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(crate::Error::ZeroThreads);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("apsp-worker-{i}"))
            .build()?;
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run a single task on the calling thread.
    pub fn run_serial<'s, 'a, T, F>(
        &self,
        task: BlockTask<'s, 'a, T>,
        cancel: &CancellationToken,
        run: &F,
    ) -> PhaseOutcome
    where
        F: Fn(BlockTask<'s, 'a, T>),
    {
        if cancel.is_cancelled() {
            return PhaseOutcome::Cancelled;
        }
        let coord = task.coord;
        match panic::catch_unwind(AssertUnwindSafe(|| run(task))) {
            Ok(()) => PhaseOutcome::Completed,
            Err(payload) => PhaseOutcome::Failed(vec![failure(coord.row, coord.col, payload.as_ref())]),
        }
    }

    /// Run all tasks of one phase on the pool and wait for them.
    pub fn run_phase<'s, 'a, T, F>(
        &self,
        tasks: Vec<BlockTask<'s, 'a, T>>,
        cancel: &CancellationToken,
        run: &F,
    ) -> PhaseOutcome
    where
        T: Send + Sync,
        F: Fn(BlockTask<'s, 'a, T>) + Sync,
    {
        if tasks.is_empty() {
            return PhaseOutcome::Completed;
        }
        let abort = AtomicBool::new(false);
        let mut failures: Vec<TaskFailure> = self.pool.install(|| {
            tasks
                .into_par_iter()
                .filter_map(|task| {
                    if abort.load(Ordering::Acquire) || cancel.is_cancelled() {
                        return None;
                    }
                    let coord = task.coord;
                    match panic::catch_unwind(AssertUnwindSafe(|| run(task))) {
                        Ok(()) => None,
                        Err(payload) => {
                            abort.store(true, Ordering::Release);
                            let failure = failure(coord.row, coord.col, payload.as_ref());
                            warn!(block = %coord, message = %failure.message, "block task failed");
                            Some(failure)
                        }
                    }
                })
                .collect()
        });
        if !failures.is_empty() {
            failures.sort_by_key(|f| (f.block_row, f.block_col));
            PhaseOutcome::Failed(failures)
        } else if cancel.is_cancelled() {
            PhaseOutcome::Cancelled
        } else {
            PhaseOutcome::Completed
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").field("threads", &self.threads).finish()
    }
}

fn failure(block_row: usize, block_col: usize, payload: &(dyn Any + Send)) -> TaskFailure {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    TaskFailure { block_row, block_col, message }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::block::{BlockCoord, BlockGrid, PhaseBlocks};
    use crate::kernel::Operands;

    fn diagonal_tasks<'g>(blocks: &mut PhaseBlocks<'g, u32>) -> Vec<BlockTask<'static, 'g, u32>> {
        (0..blocks.side())
            .map(|i| {
                let coord = BlockCoord::new(i, i);
                BlockTask { coord, target: blocks.take(coord), operands: Operands::Diagonal }
            })
            .collect()
    }

    #[test]
    fn zero_threads_is_a_config_error() {
        assert!(matches!(Executor::new(0), Err(crate::Error::ZeroThreads)));
    }

    #[test]
    fn every_task_runs_once() {
        let executor = Executor::new(3).unwrap();
        let mut data = vec![0_u32; 64];
        let mut grid = BlockGrid::new(&mut data, 8, 2);
        let tasks = diagonal_tasks(&mut grid.phase());
        let count = AtomicUsize::new(0);
        let outcome = executor.run_phase(tasks, &CancellationToken::new(), &|mut task: BlockTask<'_, '_, u32>| {
            task.target.row_mut(0)[0] = 1;
            count.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(outcome, PhaseOutcome::Completed);
        assert_eq!(count.load(Ordering::Relaxed), 4);
        drop(grid);
        assert_eq!(data.iter().filter(|&&x| x == 1).count(), 4);
    }

    #[test]
    fn panics_are_collected_per_block() {
        let executor = Executor::new(1).unwrap();
        let mut data = vec![0_u32; 16];
        let mut grid = BlockGrid::new(&mut data, 4, 1);
        let tasks = diagonal_tasks(&mut grid.phase());
        let outcome = executor.run_phase(tasks, &CancellationToken::new(), &|task: BlockTask<'_, '_, u32>| {
            if task.coord.row == 2 {
                panic!("bad block {}", task.coord.row);
            }
        });
        let failures = match outcome {
            PhaseOutcome::Failed(failures) => failures,
            other => panic!("expected failure, got {other:?}"),
        };
        assert_eq!(failures, vec![TaskFailure { block_row: 2, block_col: 2, message: "bad block 2".into() }]);
    }

    #[test]
    fn cancelled_token_skips_tasks() {
        let executor = Executor::new(2).unwrap();
        let mut data = vec![0_u32; 16];
        let mut grid = BlockGrid::new(&mut data, 4, 2);
        let token = CancellationToken::new();
        token.cancel();
        let ran = AtomicUsize::new(0);
        let run = |_task: BlockTask<'_, '_, u32>| {
            ran.fetch_add(1, Ordering::Relaxed);
        };
        let mut tasks = diagonal_tasks(&mut grid.phase());
        let serial = tasks.remove(0);
        assert_eq!(executor.run_serial(serial, &token, &run), PhaseOutcome::Cancelled);
        assert_eq!(executor.run_phase(tasks, &token, &run), PhaseOutcome::Cancelled);
        assert_eq!(ran.load(Ordering::Relaxed), 0);

        token.reset();
        assert!(!token.is_cancelled());
        let mut tasks = diagonal_tasks(&mut grid.phase());
        let serial = tasks.remove(0);
        assert_eq!(executor.run_serial(serial, &token, &run), PhaseOutcome::Completed);
        assert_eq!(executor.run_phase(tasks, &token, &run), PhaseOutcome::Completed);
        assert_eq!(ran.load(Ordering::Relaxed), 2);
    }
}
