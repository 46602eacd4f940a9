//! Pivot-round schedule.
//!
//! For a grid of `side × side` blocks the algorithm is `side` pivot rounds,
//! each made of three phases that must run strictly in order:
//!
//! 1. [`PhaseKind::Diagonal`]: the pivot block `B[p, p]`, alone.
//! 2. [`PhaseKind::Cross`]: the rest of pivot row `p` and pivot column `p`.
//! 3. [`PhaseKind::Remaining`]: every block outside row and column `p`.
//!
//! Within a phase the targets are pairwise distinct blocks and none of them
//! is a block that the phase reads, so the tasks of one phase can run in any
//! order or concurrently.

use std::fmt;

use crate::block::BlockCoord;

/// One of the three ordered stages of a pivot round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhaseKind {
    Diagonal,
    Cross,
    Remaining,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 3] = [PhaseKind::Diagonal, PhaseKind::Cross, PhaseKind::Remaining];

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKind::Diagonal => "diagonal",
            PhaseKind::Cross => "cross",
            PhaseKind::Remaining => "remaining",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The target blocks of one phase of one pivot round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    pub pivot: usize,
    pub kind: PhaseKind,
    pub targets: Vec<BlockCoord>,
}

impl PhasePlan {
    pub fn task_count(&self) -> usize {
        self.targets.len()
    }
}

/// Ordered phase plans for a `side × side` block grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    side: usize,
}

impl Schedule {
    pub fn new(side: usize) -> Self {
        Self { side }
    }

    /// Number of pivot rounds.
    pub fn rounds(&self) -> usize {
        self.side
    }

    /// Number of phases over all rounds.
    pub fn len(&self) -> usize {
        self.side * PhaseKind::ALL.len()
    }

    pub fn is_empty(&self) -> bool {
        self.side == 0
    }

    /// Block tasks over all rounds, `side³`.
    pub fn task_count(&self) -> usize {
        self.side * self.side * self.side
    }

    /// Targets of `kind` in round `pivot`.
    pub fn plan(&self, pivot: usize, kind: PhaseKind) -> PhasePlan {
        let side = self.side;
        let targets = match kind {
            PhaseKind::Diagonal => vec![BlockCoord::new(pivot, pivot)],
            PhaseKind::Cross => {
                let others = || (0..side).filter(move |&x| x != pivot);
                others()
                    .map(|c| BlockCoord::new(pivot, c))
                    .chain(others().map(|r| BlockCoord::new(r, pivot)))
                    .collect()
            }
            PhaseKind::Remaining => (0..side)
                .filter(|&r| r != pivot)
                .flat_map(|r| (0..side).filter(move |&c| c != pivot).map(move |c| BlockCoord::new(r, c)))
                .collect(),
        };
        PhasePlan { pivot, kind, targets }
    }

    /// All phases in execution order.
    pub fn phases(&self) -> impl Iterator<Item = PhasePlan> + '_ {
        (0..self.side).flat_map(move |pivot| PhaseKind::ALL.into_iter().map(move |kind| self.plan(pivot, kind)))
    }
}
