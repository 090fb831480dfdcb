use thiserror::Error;

/// Failures raised by the substitution store and its extractors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid replacement pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Failed to read extraction input: {detail}")]
    Read { detail: String },
    #[error("Invalid extraction path '{path}': {detail}")]
    Parse { path: String, detail: String },
    #[error("No value found for '{path}'")]
    NotFound { path: String },
}
