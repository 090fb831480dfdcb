//! Scenario configuration tree.
//!
//! A [`Scenario`] is parsed once (TOML) and is read-mostly for the rest of
//! the run. The only fields mutated during execution are each Request's
//! `executed` flag and `unknown` response list, plus the embedded
//! [`Statistics`] — all synchronized and all skipped by serde.

mod parse;


use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::stats::Statistics;

/// Response bodies are read up to this many bytes when the spec does not
/// declare its own limit.
pub const DEFAULT_CONTENT_LIMIT: usize = 4096;

/// Name given to dynamically synthesized specs for unanticipated statuses.
pub const UNKNOWN_RESPONSE_NAME: &str = "unknown";

/// One seed substitution rule, loaded into the data store before the run.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplaceRule {
    #[serde(rename = "match")]
    pub pattern: String,
    #[serde(rename = "replace")]
    pub value: String,
}

/// Client TLS material. Both cert and key absent means "default transport".
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    #[serde(default, rename = "client_cert_path")]
    pub cert_path: String,
    #[serde(default, rename = "client_key_path")]
    pub key_path: String,
    #[serde(default, rename = "ca_cert_path")]
    pub ca_path: String,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// An expected header on a response, or an extra header on a request.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderRule {
    pub name: String,
    pub value: String,
}

/// A cookie string; Set-Cookie syntax on responses, Cookie pairs on requests.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CookieRule {
    pub value: String,
}

/// Which extractor an extraction rule runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractKind {
    Json,
    Xml,
    Text,
}

/// One extraction rule: the scalar found at `path` is registered into the
/// data store under `name`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractRule {
    #[serde(rename = "type")]
    pub kind: ExtractKind,
    pub path: String,
    #[serde(rename = "match")]
    pub name: String,
}

/// Expected response content.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentSpec {
    #[serde(default)]
    pub expected: bool,
    #[serde(default, rename = "content_type")]
    pub media_type: String,
    #[serde(default, rename = "max_content")]
    pub max_size: usize,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub extract: Vec<ExtractRule>,
}

/// An expected-outcome definition, matched to actual responses by status.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Response {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub headers: Vec<HeaderRule>,
    #[serde(default)]
    pub cookies: Vec<CookieRule>,
    #[serde(default)]
    pub content: ContentSpec,
    #[serde(skip)]
    pub stats: Statistics,
}

impl Response {
    /// Builds the synthesized spec for a status code no declared Response
    /// matches. It expects no content, so most unknown statuses surface as
    /// validation errors attributed to this spec.
    #[must_use]
    pub fn unknown(status_code: u16) -> Self {
        Self {
            name: UNKNOWN_RESPONSE_NAME.to_owned(),
            status_code,
            ..Self::default()
        }
    }
}

/// Thundering herd parameters for one request.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stampede {
    #[serde(default, rename = "maximum_requests")]
    pub max: u64,
    #[serde(default, rename = "active_size")]
    pub size: usize,
    #[serde(default, rename = "time_limit", deserialize_with = "parse::duration_de")]
    pub time_limit: Duration,
    #[serde(default, deserialize_with = "parse::duration_de")]
    pub delay: Duration,
}

/// One parameterized HTTP call template.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub once_only: bool,
    #[serde(default, rename = "thundering_herd")]
    pub herd: Stampede,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "extra_headers")]
    pub headers: Vec<HeaderRule>,
    #[serde(default)]
    pub cookies: Vec<CookieRule>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub responses: Vec<Response>,

    /// Set once when a once-only request first runs.
    #[serde(skip)]
    pub executed: AtomicBool,
    /// Find-or-create specs for statuses no declared Response matches.
    /// The mutex guards structural growth, not a scalar.
    #[serde(skip)]
    pub unknown: Mutex<Vec<Arc<Response>>>,
    #[serde(skip)]
    pub stats: Statistics,
}

/// The ordered request sequence and its execution knobs.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sequence {
    #[serde(default)]
    pub iterations: u64,
    #[serde(
        default,
        rename = "iteration_time_limit",
        deserialize_with = "parse::duration_de"
    )]
    pub time_limit: Duration,
    #[serde(default, deserialize_with = "parse::duration_de")]
    pub delay: Duration,
    #[serde(default)]
    pub abort_on_error: bool,
    #[serde(default)]
    pub requests: Vec<Request>,
    #[serde(skip)]
    pub stats: Statistics,
}

/// Top-level declarative description of one test run.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub sequence: Sequence,
    #[serde(default, rename = "find_replace")]
    pub replacements: Vec<ReplaceRule>,
    #[serde(default, rename = "tls_configuration")]
    pub tls: TlsConfig,
    #[serde(default, rename = "use_single_http_client")]
    pub single_client: bool,
}

impl Scenario {
    /// Loads and normalizes a scenario from a TOML file. Unknown fields are
    /// rejected so typos in scenario files fail loudly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it does not deserialize.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            source: err,
        })?;
        let mut scenario: Self = toml::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(err),
        })?;
        scenario.normalize();
        Ok(scenario)
    }

    /// Fills schema defaults the deserializer cannot express.
    pub fn normalize(&mut self) {
        for request in &mut self.sequence.requests {
            for response in &mut request.responses {
                if response.content.max_size == 0 {
                    response.content.max_size = DEFAULT_CONTENT_LIMIT;
                }
            }
        }
    }
}
