use std::fmt;
use std::time::{Duration, Instant};

use crate::schedule::PhaseKind;

/// Records instants and reports the time between consecutive clicks.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    instants: Vec<Instant>,
}

impl Stopwatch {
    /// Started stopwatch; the first click measures from here.
    pub fn new() -> Stopwatch {
        Stopwatch { instants: vec![Instant::now()] }
    }

    /// Record now and return the time since the previous click.
    pub fn click(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = self.instants.last().map_or(Duration::ZERO, |&prev| now.duration_since(prev));
        self.instants.push(now);
        elapsed
    }

    /// Durations between consecutive clicks.
    pub fn laps(&self) -> impl Iterator<Item = Duration> + '_ {
        self.instants.windows(2).map(|w| w[1].duration_since(w[0]))
    }

    /// From construction to the last click.
    pub fn total(&self) -> Duration {
        match (self.instants.first(), self.instants.last()) {
            (Some(&first), Some(&last)) => last.duration_since(first),
            _ => Duration::ZERO,
        }
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall time spent per phase kind, summed over all pivot rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub diagonal: Duration,
    pub cross: Duration,
    pub remaining: Duration,
}

impl PhaseTimings {
    pub fn record(&mut self, kind: PhaseKind, elapsed: Duration) {
        match kind {
            PhaseKind::Diagonal => self.diagonal += elapsed,
            PhaseKind::Cross => self.cross += elapsed,
            PhaseKind::Remaining => self.remaining += elapsed,
        }
    }

    pub fn get(&self, kind: PhaseKind) -> Duration {
        match kind {
            PhaseKind::Diagonal => self.diagonal,
            PhaseKind::Cross => self.cross,
            PhaseKind::Remaining => self.remaining,
        }
    }
}

impl fmt::Display for PhaseTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, kind) in PhaseKind::ALL.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind}: {} ms", self.get(kind).as_millis())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laps_sum_to_total() {
        let mut watch = Stopwatch::new();
        let a = watch.click();
        std::thread::sleep(Duration::from_millis(2));
        let b = watch.click();
        assert!(b >= Duration::from_millis(2));
        let laps: Vec<Duration> = watch.laps().collect();
        assert_eq!(laps, vec![a, b]);
        assert_eq!(watch.total(), a + b);
    }

    #[test]
    fn timings_accumulate_per_kind() {
        let mut t = PhaseTimings::default();
        t.record(PhaseKind::Cross, Duration::from_millis(3));
        t.record(PhaseKind::Cross, Duration::from_millis(4));
        t.record(PhaseKind::Remaining, Duration::from_millis(1));
        assert_eq!(t.cross, Duration::from_millis(7));
        assert_eq!(t.diagonal, Duration::ZERO);
        assert_eq!(t.to_string(), "diagonal: 0 ms, cross: 7 ms, remaining: 1 ms");
    }
}
