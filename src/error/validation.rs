use thiserror::Error;

use super::StoreError;

/// Response verification failures, ordered the way the checks run.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Header '{name}' not found in response")]
    HeaderNotFound { name: String },
    #[error("Header '{name}': expected value '{expected}' not found")]
    HeaderValueMismatch { name: String, expected: String },
    #[error("Invalid expected cookie '{value}': {source}")]
    CookieSyntax {
        value: String,
        #[source]
        source: cookie::ParseError,
    },
    #[error("Cookie '{value}' not found in response")]
    CookieNotFound { value: String },
    #[error("Failed to read response body: {source}")]
    BodyRead {
        #[source]
        source: reqwest::Error,
    },
    #[error("No content expected, yet read {read} response bytes")]
    UnexpectedContent { read: usize },
    #[error("Mismatched Content-Length header ({declared}) and actual content ({read} bytes)")]
    ContentLengthMismatch { declared: u64, read: usize },
    #[error("Content-Type '{actual}' does not match expected '{expected}'")]
    ContentTypeMismatch { expected: String, actual: String },
    #[error("Content sniffed as '{detected}', Content-Type declared '{declared}'")]
    ContentSniffMismatch { declared: String, detected: String },
    #[error("Invalid contains pattern '{pattern}': {source}")]
    ContainsPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Content sequence not found: {pattern}")]
    ContentPatternNotFound { pattern: String },
    #[error("Extraction failed: {0}")]
    Extraction(#[from] StoreError),
}
