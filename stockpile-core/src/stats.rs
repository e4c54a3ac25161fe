//! Run statistics.
//!
//! [`Stats`] is a commutative monoid: per-bundle results are folded with
//! [`Stats::combine`] in whatever order workers complete.

use std::iter::Sum;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Stats {
    pub failure_count: u64,
    pub dirty: bool,
}

impl Stats {
    /// Nothing happened. Identity of [`Stats::combine`].
    pub const NOOP: Stats = Stats {
        failure_count: 0,
        dirty: false,
    };

    /// At least one item was newly synchronized; the index must be republished.
    pub const DIRTY: Stats = Stats {
        failure_count: 0,
        dirty: true,
    };

    /// One bundle failed to synchronize.
    pub const FAILED: Stats = Stats {
        failure_count: 1,
        dirty: false,
    };

    pub fn combine(self, other: Stats) -> Stats {
        Stats {
            failure_count: self.failure_count.saturating_add(other.failure_count),
            dirty: self.dirty || other.dirty,
        }
    }

    /// `true` once a positive `threshold` has been reached.
    pub fn reached(&self, threshold: u64) -> bool {
        threshold > 0 && self.failure_count >= threshold
    }
}

impl Sum for Stats {
    fn sum<I: Iterator<Item = Stats>>(iter: I) -> Self {
        iter.fold(Stats::NOOP, Stats::combine)
    }
}
