//! Lock-free per-entity statistics.
//!
//! Every Scenario, Request, and Response carries one of these. Counts and
//! totals use atomic adds; min/max use compare-and-swap retry loops so the
//! hot path never takes a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Measured statistics for one entity. A min of zero means "never recorded".
#[derive(Debug, Default)]
pub struct Statistics {
    count: AtomicU64,
    errors: AtomicU64,
    total_ns: AtomicU64,
    min_ns: AtomicU64,
    max_ns: AtomicU64,
}

fn as_nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

impl Statistics {
    fn set_min(&self, observed: u64) {
        loop {
            let current = self.min_ns.load(Ordering::Acquire);
            if current > 0 && observed >= current {
                return;
            }
            if self
                .min_ns
                .compare_exchange(current, observed, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    fn set_max(&self, observed: u64) {
        loop {
            let current = self.max_ns.load(Ordering::Acquire);
            if observed <= current {
                return;
            }
            if self
                .max_ns
                .compare_exchange(current, observed, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    fn update_times(&self, start: Instant) {
        let observed = as_nanos(start.elapsed());
        self.total_ns.fetch_add(observed, Ordering::AcqRel);
        self.set_min(observed);
        self.set_max(observed);
    }

    /// Records one successful execution and its duration.
    pub fn success(&self, start: Instant) {
        self.count.fetch_add(1, Ordering::AcqRel);
        self.update_times(start);
    }

    /// Records one failed execution and its duration.
    pub fn error(&self, start: Instant) {
        self.errors.fetch_add(1, Ordering::AcqRel);
        self.update_times(start);
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn total_duration(&self) -> Duration {
        Duration::from_nanos(self.total_ns.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn min_duration(&self) -> Duration {
        Duration::from_nanos(self.min_ns.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn max_duration(&self) -> Duration {
        Duration::from_nanos(self.max_ns.load(Ordering::Acquire))
    }
}
