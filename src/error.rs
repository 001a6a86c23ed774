//! Error types for the PokeForge API client.
//!
//! Every failure surfaces as exactly one [`Error`] variant; raw transport
//! errors never cross the client boundary. Callers branch on the variant
//! rather than inspecting status codes by hand.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A specialized `Result` type for PokeForge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// RFC 7807 problem details carried by API error responses.
///
/// Any subset of fields may be absent; deserialization never fails on a
/// missing field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub type_uri: Option<String>,
    /// Short human-readable summary.
    pub title: Option<String>,
    /// HTTP status code echoed in the body.
    pub status: Option<u16>,
    /// Detailed explanation for this occurrence.
    pub detail: Option<String>,
    /// URI identifying this specific occurrence.
    pub instance: Option<String>,
    /// Field-level validation errors (field name to messages).
    pub errors: Option<HashMap<String, Vec<String>>>,
}

impl ProblemDetails {
    fn message_for(problem: Option<&ProblemDetails>, status: u16) -> String {
        problem
            .and_then(|p| p.title.clone())
            .or_else(|| problem.and_then(|p| p.detail.clone()))
            .unwrap_or_else(|| format!("HTTP {status} error"))
    }
}

/// The main error type for all PokeForge API operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Request validation failed (400).
    #[error("{message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// Field-level validation errors, if the server provided them.
        errors: Option<HashMap<String, Vec<String>>>,
        /// Raw problem details body.
        problem: Option<ProblemDetails>,
    },

    /// Authentication required or invalid (401).
    #[error("{message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
        /// Raw problem details body.
        problem: Option<ProblemDetails>,
    },

    /// Access denied (403).
    #[error("{message}")]
    Forbidden {
        /// Human-readable error message.
        message: String,
        /// Raw problem details body.
        problem: Option<ProblemDetails>,
    },

    /// Resource not found (404).
    #[error("{message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
        /// Raw problem details body.
        problem: Option<ProblemDetails>,
    },

    /// Rate limit exceeded (429).
    #[error("{message}")]
    RateLimit {
        /// Human-readable error message.
        message: String,
        /// Server-provided wait hint from the `Retry-After` header.
        retry_after: Option<Duration>,
        /// Raw problem details body.
        problem: Option<ProblemDetails>,
    },

    /// The request exceeded its deadline before a response arrived.
    #[error("request timed out after {after:?}")]
    Timeout {
        /// The deadline that fired.
        after: Duration,
    },

    /// Transport-level connectivity failure (connection refused, DNS, ...).
    #[error("network error: {message}")]
    Network {
        /// Human-readable error message.
        message: String,
        /// Underlying transport error, when one is available.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Any other non-success status from the API.
    #[error("{message}")]
    Api {
        /// Raw HTTP status code.
        status: u16,
        /// Human-readable error message.
        message: String,
        /// Raw problem details body.
        problem: Option<ProblemDetails>,
    },

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status code associated with this error, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Validation { .. } => Some(400),
            Error::Authentication { .. } => Some(401),
            Error::Forbidden { .. } => Some(403),
            Error::NotFound { .. } => Some(404),
            Error::RateLimit { .. } => Some(429),
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if the pipeline would retry this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimit { .. } | Error::Network { .. } => true,
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is an authentication-related error.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Error::Authentication { .. } | Error::Forbidden { .. }
        )
    }

    /// Map a non-success status code and optional problem body to an error.
    ///
    /// Total over the status domain: unknown codes map to [`Error::Api`].
    /// Message precedence is the problem body's `title`, then `detail`,
    /// then a synthesized `HTTP {status} error`.
    pub fn from_response(status: u16, problem: Option<ProblemDetails>) -> Self {
        let message = ProblemDetails::message_for(problem.as_ref(), status);
        match status {
            400 => Error::Validation {
                message,
                errors: problem.as_ref().and_then(|p| p.errors.clone()),
                problem,
            },
            401 => Error::Authentication { message, problem },
            403 => Error::Forbidden { message, problem },
            404 => Error::NotFound { message, problem },
            429 => Error::RateLimit {
                message,
                retry_after: None,
                problem,
            },
            _ => Error::Api {
                status,
                message,
                problem,
            },
        }
    }
}

/// Parse a `Retry-After` header value into a wait duration.
///
/// Accepts integer seconds or an HTTP date; a hint that resolves to a
/// negative duration is discarded.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let date = DateTime::parse_from_rfc2822(value.trim()).ok()?;
    (date.with_timezone(&Utc) - Utc::now()).to_std().ok()
}
