//! Metrics collaborator seam.
//!
//! The engine reports counts, durations, and errors through [`MetricsSink`];
//! aggregation and transport (push gateways, exporters) live outside the
//! core and must never block it.

use std::time::Duration;

use tracing::debug;

/// Response label used when an attempt fails before classification.
pub const NO_RESPONSE_NAME: &str = "none";

pub trait MetricsSink: Send + Sync {
    /// One processed response, partitioned by iteration, request name,
    /// response name, and status code.
    fn requests(&self, iteration: u64, request: &str, response: &str, status: u16);

    /// One failed attempt, partitioned by iteration, request name, and the
    /// response name it was attributed to.
    fn errors(&self, iteration: u64, request: &str, response: &str);

    /// One observed attempt duration.
    fn duration(
        &self,
        elapsed: Duration,
        iteration: u64,
        request: &str,
        method: &str,
        response: &str,
        status: u16,
    );
}

/// Discards every observation. The default when no collector is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn requests(&self, _iteration: u64, _request: &str, _response: &str, _status: u16) {}

    fn errors(&self, _iteration: u64, _request: &str, _response: &str) {}

    fn duration(
        &self,
        _elapsed: Duration,
        _iteration: u64,
        _request: &str,
        _method: &str,
        _response: &str,
        _status: u16,
    ) {
    }
}

/// Emits every observation as a debug-level tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn requests(&self, iteration: u64, request: &str, response: &str, status: u16) {
        debug!(iteration, request, response, status, "response processed");
    }

    fn errors(&self, iteration: u64, request: &str, response: &str) {
        debug!(iteration, request, response, "attempt error");
    }

    fn duration(
        &self,
        elapsed: Duration,
        iteration: u64,
        request: &str,
        method: &str,
        response: &str,
        status: u16,
    ) {
        debug!(
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            iteration,
            request,
            method,
            response,
            status,
            "attempt duration"
        );
    }
}
