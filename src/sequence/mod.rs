//! The concurrency scheduler.
//!
//! Iterations run strictly in sequence; within an iteration, requests run
//! in declared order; concurrency exists only inside one request's
//! thundering-herd burst.

mod context;
mod pool;


use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{error, info};

use crate::config::{Scenario, Stampede};
use crate::error::{AppError, AppResult};
use crate::execute::Executor;

pub use context::RunContext;
use pool::HerdPool;

/// Sleep applied between submissions whenever the pool's queue is
/// non-empty, throttling issuance to roughly the drain rate.
const HERD_THROTTLE: Duration = Duration::from_millis(10);

/// Burst lifecycle. One termination evaluation per loop pass decides when
/// issuing stops; draining always completes before the burst returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HerdState {
    Issuing,
    Draining,
    Done,
}

/// The racing termination conditions of one burst, evaluated in one place.
#[derive(Debug, Clone, Copy)]
struct HerdBudget {
    time_limit: Duration,
    max: u64,
}

impl HerdBudget {
    fn new(herd: &Stampede) -> Self {
        Self {
            time_limit: herd.time_limit,
            // With no time limit at least one attempt is always issued.
            max: herd.max.max(1),
        }
    }

    fn evaluate(&self, started: Instant, issued: u64, run: &RunContext) -> HerdState {
        if run.is_done() {
            return HerdState::Draining;
        }
        if !self.time_limit.is_zero() {
            if started.elapsed() >= self.time_limit {
                return HerdState::Draining;
            }
            return HerdState::Issuing;
        }
        if issued >= self.max {
            return HerdState::Draining;
        }
        HerdState::Issuing
    }
}

/// Drives a scenario: iterations, per-iteration deadlines, and per-request
/// bursts. Single-threaded itself; all parallelism lives in the pools it
/// creates.
pub struct Sequencer {
    scenario: Arc<Scenario>,
    executor: Arc<dyn Executor>,
    failure: Arc<Mutex<Option<AppError>>>,
}

impl Sequencer {
    #[must_use]
    pub fn new(scenario: Arc<Scenario>, executor: Arc<dyn Executor>) -> Self {
        Self {
            scenario,
            executor,
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Executes every iteration in order.
    ///
    /// # Errors
    ///
    /// With abort-on-error set, returns the first attempt error (or the
    /// first iteration time-limit breach) observed anywhere in the run.
    pub async fn run(&self) -> AppResult<()> {
        let run = RunContext::new();
        for iteration in 0..self.scenario.sequence.iterations {
            if run.is_cancelled() {
                break;
            }
            self.execute_iteration(&run, iteration).await;
        }

        let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Runs one iteration under its deadline. Once the deadline or a
    /// cancellation fires, no further requests start; bursts already
    /// dispatched drain normally.
    pub async fn execute_iteration(&self, run: &RunContext, iteration: u64) {
        let scoped = run.with_deadline(self.scenario.sequence.time_limit);
        let start = std::time::Instant::now();

        for index in 0..self.scenario.sequence.requests.len() {
            if scoped.is_done() {
                break;
            }
            let Some(request) = self.scenario.sequence.requests.get(index) else {
                break;
            };
            info!(request = %request.name, "execution started");
            self.execute_request(&scoped, iteration, index).await;
            info!(request = %request.name, "execution complete");

            if !self.scenario.sequence.delay.is_zero() {
                sleep(self.scenario.sequence.delay).await;
            }
        }

        if scoped.expired() {
            self.scenario.sequence.stats.error(start);
            error!(iteration, "iteration exceeded the scenario time limit");
            if self.scenario.sequence.abort_on_error {
                self.record_failure(AppError::TimeLimitExceeded { iteration });
                run.cancel();
            }
        } else {
            self.scenario.sequence.stats.success(start);
        }
    }

    /// Generates one thundering-herd burst for the request at `index`.
    async fn execute_request(&self, run: &RunContext, iteration: u64, index: usize) {
        let Some(request) = self.scenario.sequence.requests.get(index) else {
            return;
        };

        if request.once_only
            && request
                .executed
                .swap(true, std::sync::atomic::Ordering::SeqCst)
        {
            info!(request = %request.name, "once_only request already executed, ignoring");
            return;
        }

        let mut pool = HerdPool::new(request.herd.size);
        let budget = HerdBudget::new(&request.herd);
        let started = Instant::now();
        let mut issued: u64 = 0;

        let mut state = HerdState::Issuing;
        loop {
            state = match state {
                HerdState::Issuing => {
                    if pool.waiting() > 0 {
                        sleep(HERD_THROTTLE).await;
                    }
                    pool.submit(self.attempt_job(run, iteration, index));
                    issued = issued.saturating_add(1);
                    if !request.herd.delay.is_zero() {
                        sleep(request.herd.delay).await;
                    }
                    budget.evaluate(started, issued, run)
                }
                HerdState::Draining => {
                    pool.drain().await;
                    HerdState::Done
                }
                HerdState::Done => break,
            };
        }
    }

    /// Builds one pool job: a single executor attempt plus abort-on-error
    /// bookkeeping.
    fn attempt_job(
        &self,
        run: &RunContext,
        iteration: u64,
        index: usize,
    ) -> impl Future<Output = ()> + Send + 'static {
        let scenario = Arc::clone(&self.scenario);
        let executor = Arc::clone(&self.executor);
        let failure = Arc::clone(&self.failure);
        let abort = self.scenario.sequence.abort_on_error;
        let run = run.clone();

        async move {
            let Some(request) = scenario.sequence.requests.get(index) else {
                return;
            };
            if let Err(err) = executor.execute(&run, iteration, request).await {
                if abort {
                    let mut slot = failure.lock().unwrap_or_else(PoisonError::into_inner);
                    if slot.is_none() {
                        *slot = Some(AppError::aborted(request.name.clone(), err));
                        run.cancel();
                    }
                }
            }
        }
    }

    fn record_failure(&self, err: AppError) {
        let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
    }
}
