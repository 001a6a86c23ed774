//! HTTP request pipeline: auth, timeout, retry, and error mapping.
//!
//! One [`RequestDescriptor`] describes one logical call; the pipeline may
//! dispatch it several times (retry on 429/5xx and transport failures)
//! before resolving with a typed value or a single [`Error`].

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::TokenManager;
use crate::error::{parse_retry_after, ProblemDetails};
use crate::{Error, Result};

use super::config::ClientConfig;

/// A single query parameter value.
///
/// List values repeat the key once per element on the wire
/// (`?rarity=Rare&rarity=Common`); absent options are simply not added.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// String value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
    /// Repeated-key list value.
    List(Vec<String>),
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::Str(v.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        QueryValue::Str(v)
    }
}

impl From<i64> for QueryValue {
    fn from(v: i64) -> Self {
        QueryValue::Int(v)
    }
}

impl From<u32> for QueryValue {
    fn from(v: u32) -> Self {
        QueryValue::Int(i64::from(v))
    }
}

impl From<bool> for QueryValue {
    fn from(v: bool) -> Self {
        QueryValue::Bool(v)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(v: Vec<String>) -> Self {
        QueryValue::List(v)
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(v: Vec<&str>) -> Self {
        QueryValue::List(v.into_iter().map(String::from).collect())
    }
}

/// Description of one logical API call.
///
/// Constructed fresh per call and never reused; resource wrappers build one
/// and hand it to [`PokeForgeClient::request`](crate::PokeForgeClient::request).
///
/// # Example
///
/// ```
/// use pokeforge_rs::RequestDescriptor;
///
/// let descriptor = RequestDescriptor::get("/Cards")
///     .query("page", 1u32)
///     .query("rarity", vec!["Rare", "Common"])
///     .query_opt("search", None::<&str>);
/// ```
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the base URL.
    pub path: String,
    /// Query parameters, in insertion order.
    pub query: Vec<(String, QueryValue)>,
    /// JSON request body, if any.
    pub body: Option<serde_json::Value>,
    /// Per-request deadline override.
    pub timeout: Option<Duration>,
    /// Disable retries for this call.
    pub no_retry: bool,
    /// Caller-supplied cancellation signal.
    pub cancel: Option<CancellationToken>,
}

impl RequestDescriptor {
    /// Describe a call with an explicit method.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
            no_retry: false,
            cancel: None,
        }
    }

    /// Describe a GET call.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Describe a POST call.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Describe a PUT call.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Describe a DELETE call.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a query parameter only when the value is present.
    pub fn query_opt<V: Into<QueryValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// Attach a JSON body.
    pub fn json_body<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Override the deadline for this call only.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Make this call single-attempt.
    pub fn no_retry(mut self) -> Self {
        self.no_retry = true;
        self
    }

    /// Attach a cancellation token.
    ///
    /// Cancelling aborts the in-flight dispatch or pending retry sleep and
    /// surfaces as [`Error::Cancelled`], never as a timeout.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Expand query values into wire pairs, repeating keys for lists.
    pub(crate) fn expanded_query(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.query.len());
        for (key, value) in &self.query {
            match value {
                QueryValue::Str(s) => pairs.push((key.clone(), s.clone())),
                QueryValue::Int(i) => pairs.push((key.clone(), i.to_string())),
                QueryValue::Bool(b) => pairs.push((key.clone(), b.to_string())),
                QueryValue::List(items) => {
                    for item in items {
                        pairs.push((key.clone(), item.clone()));
                    }
                }
            }
        }
        pairs
    }
}

/// Shared per-client state: transport, base URL, credentials, config.
///
/// Holds no mutable cross-call state, so concurrent calls need no locking.
pub(crate) struct ClientInner {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) tokens: TokenManager,
    pub(crate) config: ClientConfig,
}

impl ClientInner {
    /// Execute one logical call.
    ///
    /// Resolves `Ok(None)` for 204 or non-JSON success bodies, `Ok(Some)`
    /// for parsed JSON, and a typed [`Error`] otherwise.
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<Option<T>> {
        let url = self.build_url(&descriptor.path);
        let query = descriptor.expanded_query();
        let effective_timeout = descriptor.timeout.unwrap_or(self.config.timeout);
        let max_attempts = if descriptor.no_retry {
            1
        } else {
            self.config.max_retries + 1
        };
        let cancel = descriptor.cancel.as_ref();
        let mut last_transport: Option<reqwest::Error> = None;

        for attempt in 1..=max_attempts {
            debug!(method = %descriptor.method, %url, attempt, "dispatching request");

            // The deadline restarts per attempt and covers the whole
            // attempt: connect, headers, and body read.
            let deadline = Instant::now() + effective_timeout;

            let mut request = self.http.request(descriptor.method.clone(), &url);
            if !query.is_empty() {
                request = request.query(&query);
            }
            request = request.header(ACCEPT, "application/json");
            // Token resolved per attempt so refresh-on-retry works.
            if let Some(token) = self.tokens.get_token().await {
                request = request.header(AUTHORIZATION, format!("Bearer {token}"));
            }
            if let Some(body) = &descriptor.body {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .json(body);
            }

            let sent = self
                .bounded(deadline, effective_timeout, cancel, request.send())
                .await?;
            let response = match sent {
                Ok(response) => response,
                // A fired deadline terminates the call on the spot.
                Err(e) if e.is_timeout() => {
                    return Err(Error::Timeout {
                        after: effective_timeout,
                    });
                }
                Err(e) => {
                    if attempt < max_attempts {
                        let delay = self.config.retry.delay_for_attempt(attempt);
                        warn!(%url, attempt, ?delay, error = %e, "transport failure, retrying");
                        self.backoff(delay, cancel).await?;
                        last_transport = Some(e);
                        continue;
                    }
                    return Err(Error::Network {
                        message: e.to_string(),
                        source: Some(e),
                    });
                }
            };

            let status = response.status();
            if status.is_success() {
                return self
                    .read_success(response, deadline, effective_timeout, cancel)
                    .await;
            }

            let error = self
                .map_error(response, deadline, effective_timeout, cancel)
                .await;
            // A deadline or cancellation that fired mid-read is terminal.
            if matches!(error, Error::Timeout { .. } | Error::Cancelled) {
                return Err(error);
            }
            let retryable_status = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if attempt < max_attempts && retryable_status {
                let delay = self.config.retry.delay_after(attempt, Some(&error));
                warn!(%url, attempt, status = status.as_u16(), ?delay, "retrying after error response");
                self.backoff(delay, cancel).await?;
                continue;
            }
            return Err(error);
        }

        // Unreachable under correct accounting; never return silently.
        Err(Error::Network {
            message: "request failed after retries".to_string(),
            source: last_transport,
        })
    }

    fn build_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Await a pipeline future, racing the attempt deadline and the
    /// cancellation signal.
    ///
    /// Used for the send and for the body reads, so a server that
    /// delivers headers promptly but stalls the body still hits the
    /// deadline.
    async fn bounded<F, T>(
        &self,
        deadline: Instant,
        after: Duration,
        cancel: Option<&CancellationToken>,
        fut: F,
    ) -> Result<T>
    where
        F: std::future::Future<Output = T>,
    {
        let timed = tokio::time::timeout_at(deadline, fut);
        let outcome = match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(Error::Cancelled),
                outcome = timed => outcome,
            },
            None => timed.await,
        };
        outcome.map_err(|_elapsed| Error::Timeout { after })
    }

    async fn read_success<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        deadline: Instant,
        after: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<T>> {
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("application/json"))
            .unwrap_or(false);
        if !is_json {
            return Ok(None);
        }
        let bytes = self
            .bounded(deadline, after, cancel, response.bytes())
            .await?
            .map_err(|e| Error::Network {
                message: "failed to read response body".to_string(),
                source: Some(e),
            })?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Map a non-success response into a typed error.
    ///
    /// A malformed or non-JSON body never raises a secondary error; the
    /// mapping proceeds with an absent problem body. A deadline or
    /// cancellation firing during the body read surfaces as that
    /// terminal error instead.
    async fn map_error(
        &self,
        response: reqwest::Response,
        deadline: Instant,
        after: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Error {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let problem = match self
            .bounded(deadline, after, cancel, response.json::<ProblemDetails>())
            .await
        {
            Ok(parsed) => parsed.ok(),
            Err(terminal) => return terminal,
        };

        let mut error = Error::from_response(status, problem);
        if let Error::RateLimit {
            retry_after: slot, ..
        } = &mut error
        {
            *slot = retry_after;
        }
        error
    }

    /// Sleep between attempts, aborting early on cancellation.
    async fn backoff(&self, delay: Duration, cancel: Option<&CancellationToken>) -> Result<()> {
        match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(Error::Cancelled),
                _ = tokio::time::sleep(delay) => Ok(()),
            },
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}
