use thiserror::Error;

use super::{ConfigError, ExecuteError, StoreError};

/// Top-level error returned to callers of the engine.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Data store error: {0}")]
    Store(#[from] StoreError),
    #[error("Request '{request}' failed: {source}")]
    Aborted {
        request: String,
        #[source]
        source: ExecuteError,
    },
    #[error("Iteration {iteration} exceeded the scenario time limit")]
    TimeLimitExceeded { iteration: u64 },
}

impl AppError {
    #[must_use]
    pub const fn aborted(request: String, source: ExecuteError) -> Self {
        Self::Aborted { request, source }
    }
}

pub type AppResult<T> = Result<T, AppError>;
