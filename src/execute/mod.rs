//! The execution pipeline: one complete build → send → validate cycle for a
//! single Request attempt (a "gestalt").

mod tls;
mod validate;

#[cfg(test)]
mod tests;

use std::sync::{Arc, OnceLock, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use cookie::Cookie;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method};
use tracing::{debug, error};

use crate::config::{Request, Response, Scenario};
use crate::error::ExecuteError;
use crate::metrics::{MetricsSink, NO_RESPONSE_NAME};
use crate::sequence::RunContext;
use crate::store::DataStore;

/// The spec an actual response was classified against.
pub(crate) enum Matched<'req> {
    Declared(&'req Response),
    Unknown(Arc<Response>),
}

impl Matched<'_> {
    pub(crate) fn spec(&self) -> &Response {
        match self {
            Self::Declared(spec) => spec,
            Self::Unknown(spec) => spec.as_ref(),
        }
    }
}

/// Finds the Response spec whose status code matches, or find-or-creates an
/// unknown-response entry. The dedicated lock makes find-or-create atomic:
/// concurrent attempts seeing the same unseen status share one entry.
pub(crate) fn classify(request: &Request, status: u16) -> Matched<'_> {
    if let Some(spec) = request
        .responses
        .iter()
        .find(|candidate| candidate.status_code == status)
    {
        return Matched::Declared(spec);
    }

    let mut unknown = request.unknown.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(spec) = unknown
        .iter()
        .find(|candidate| candidate.status_code == status)
    {
        return Matched::Unknown(Arc::clone(spec));
    }
    let spec = Arc::new(Response::unknown(status));
    unknown.push(Arc::clone(&spec));
    Matched::Unknown(spec)
}

/// One attempt of one Request. The sequencer drives this through a worker
/// pool; tests substitute fakes.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs one gestalt and records its outcome into statistics, metrics,
    /// and the log.
    ///
    /// # Errors
    ///
    /// Returns the attempt's failure so the sequencer can honor
    /// abort-on-error; the failure has already been recorded.
    async fn execute(
        &self,
        run: &RunContext,
        iteration: u64,
        request: &Request,
    ) -> Result<(), ExecuteError>;
}

struct AttemptFailure<'req> {
    response: Option<Matched<'req>>,
    source: ExecuteError,
}

impl<'req> AttemptFailure<'req> {
    const fn early(source: ExecuteError) -> Self {
        Self {
            response: None,
            source,
        }
    }
}

/// The canonical [`Executor`]: resolves templates through the data store,
/// manages the HTTP client, sends, validates, records.
pub struct RestExecutor {
    scenario: Arc<Scenario>,
    store: Arc<DataStore>,
    metrics: Arc<dyn MetricsSink>,
    cached_client: OnceLock<Client>,
}

impl RestExecutor {
    /// Creates an executor and seeds the data store with the scenario's
    /// `find_replace` rules.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::Pattern`] when a seed rule's
    /// pattern does not compile.
    pub fn new(
        scenario: Arc<Scenario>,
        store: Arc<DataStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, crate::error::StoreError> {
        for rule in &scenario.replacements {
            store.add_replacement(&rule.pattern, &rule.value)?;
        }
        Ok(Self {
            scenario,
            store,
            metrics,
            cached_client: OnceLock::new(),
        })
    }

    /// Lazily builds one shared client when the scenario asks for it
    /// (reusing connections and TLS handshakes), otherwise a fresh client
    /// per attempt.
    fn client(&self) -> Result<Client, ExecuteError> {
        if !self.scenario.single_client {
            return tls::build_client(&self.scenario.tls);
        }
        if let Some(cached) = self.cached_client.get() {
            return Ok(cached.clone());
        }
        let built = tls::build_client(&self.scenario.tls)?;
        Ok(self.cached_client.get_or_init(|| built).clone())
    }

    /// Resolves the request template into a concrete `reqwest::Request`.
    /// Substitution is applied per element, immediately before use.
    fn build_request(
        &self,
        client: &Client,
        run: &RunContext,
        request: &Request,
    ) -> Result<reqwest::Request, ExecuteError> {
        let method =
            Method::from_bytes(request.method.as_bytes()).map_err(|_err| ExecuteError::Method {
                method: request.method.clone(),
            })?;
        let url = self.store.replace(&request.url);
        let mut builder = client.request(method, url);

        let body = self.store.replace(&request.content);
        if !body.is_empty() {
            if !request.content_type.is_empty() {
                builder = builder.header(CONTENT_TYPE, &request.content_type);
            }
            builder = builder.body(body);
        }

        for header in &request.headers {
            builder = builder.header(&header.name, self.store.replace(&header.value));
        }

        let mut pairs = Vec::new();
        for rule in &request.cookies {
            let resolved = self.store.replace(&rule.value);
            for raw in resolved.split(';') {
                let raw = raw.trim();
                if raw.is_empty() {
                    continue;
                }
                let parsed = Cookie::parse(raw).map_err(|err| ExecuteError::Cookie {
                    value: raw.to_owned(),
                    source: err,
                })?;
                pairs.push(format!("{}={}", parsed.name(), parsed.value()));
            }
        }
        if !pairs.is_empty() {
            builder = builder.header(COOKIE, pairs.join("; "));
        }

        if let Some(remaining) = run.remaining() {
            builder = builder.timeout(remaining);
        }

        builder
            .build()
            .map_err(|err| ExecuteError::Build { source: err })
    }

    /// One build → send → classify → verify pass. Every failure
    /// short-circuits the rest of the attempt.
    async fn attempt<'req>(
        &self,
        run: &RunContext,
        request: &'req Request,
    ) -> Result<Matched<'req>, AttemptFailure<'req>> {
        let client = self.client().map_err(AttemptFailure::early)?;
        let wire_request = self
            .build_request(&client, run, request)
            .map_err(AttemptFailure::early)?;

        let response = client
            .execute(wire_request)
            .await
            .map_err(|err| AttemptFailure::early(ExecuteError::Transport { source: err }))?;

        let status = response.status().as_u16();
        let matched = classify(request, status);
        match validate::verify(response, matched.spec(), &self.store).await {
            Ok(()) => Ok(matched),
            Err(err) => Err(AttemptFailure {
                response: Some(matched),
                source: ExecuteError::Validation(err),
            }),
        }
    }
}

#[async_trait]
impl Executor for RestExecutor {
    async fn execute(
        &self,
        run: &RunContext,
        iteration: u64,
        request: &Request,
    ) -> Result<(), ExecuteError> {
        let start = Instant::now();
        match self.attempt(run, request).await {
            Ok(matched) => {
                let spec = matched.spec();
                spec.stats.success(start);
                self.metrics
                    .requests(iteration, &request.name, &spec.name, spec.status_code);
                self.metrics.duration(
                    start.elapsed(),
                    iteration,
                    &request.name,
                    &request.method,
                    &spec.name,
                    spec.status_code,
                );
                debug!(request = %request.name, response = %spec.name, "attempt succeeded");
                Ok(())
            }
            Err(failure) => {
                match failure.response.as_ref() {
                    Some(matched) => {
                        let spec = matched.spec();
                        spec.stats.error(start);
                        self.metrics.errors(iteration, &request.name, &spec.name);
                        error!(
                            request = %request.name,
                            response = %spec.name,
                            "{}", failure.source
                        );
                    }
                    None => {
                        request.stats.error(start);
                        self.metrics
                            .errors(iteration, &request.name, NO_RESPONSE_NAME);
                        error!(request = %request.name, "{}", failure.source);
                    }
                }
                Err(failure.source)
            }
        }
    }
}
