use std::path::PathBuf;

use thiserror::Error;

use super::ValidationError;

/// Failures from a single request attempt: build, TLS, transport, or
/// validation. None of these abort the run unless abort-on-error is set.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("Invalid HTTP method '{method}'")]
    Method { method: String },
    #[error("Failed to build request: {source}")]
    Build {
        #[source]
        source: reqwest::Error,
    },
    #[error("Invalid request cookie '{value}': {source}")]
    Cookie {
        value: String,
        #[source]
        source: cookie::ParseError,
    },
    #[error("Failed to read TLS material {path:?}: {source}")]
    CertificateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid TLS material: {source}")]
    CertificateInvalid {
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to build HTTP client: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    #[error("Transport failure: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

impl ExecuteError {
    /// True when the attempt failed before a response could be classified,
    /// meaning the error belongs to the Request's statistics rather than a
    /// Response's.
    #[must_use]
    pub const fn is_pre_response(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}
