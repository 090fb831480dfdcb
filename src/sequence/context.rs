use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Deadline and cancellation state threaded through a run.
///
/// The cancellation flag is shared by every context cloned or derived from
/// the same root; deadlines are scoped to the derived context. Cancellation
/// only prevents new work — it is polled at loop boundaries and never
/// interrupts an in-flight attempt.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl RunContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a context sharing this one's cancellation flag, bounded by
    /// `limit` from now. A zero limit means unbounded.
    #[must_use]
    pub fn with_deadline(&self, limit: Duration) -> Self {
        let deadline = if limit.is_zero() {
            None
        } else {
            Instant::now().checked_add(limit)
        };
        Self {
            deadline,
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// True once no new work should start: cancelled or past the deadline.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.expired()
    }

    /// Time left until the deadline, if one exists. Saturates at zero.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
