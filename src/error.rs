//! Fetch failure taxonomy.
//!
//! Every network call made against the upstream API resolves to either a
//! payload or a [`FetchError`]. The retry executor only needs to know whether
//! a failure is worth another attempt and whether the server suggested a
//! delay, which is what [`Retryable`] exposes.

use std::fmt;
use thiserror::Error;

/// Classification of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused, timeout, DNS failure, truncated body.
    TransientNetwork,
    /// HTTP 429.
    RateLimited,
    /// HTTP 5xx.
    Server,
    /// Any other non-success status.
    Client,
    /// The body was not the JSON document the endpoint promises.
    Malformed,
}

impl FailureKind {
    /// Whether a failure of this kind should be retried.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FailureKind::TransientNetwork | FailureKind::RateLimited | FailureKind::Server
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::TransientNetwork => write!(f, "transient network failure"),
            FailureKind::RateLimited => write!(f, "rate limited"),
            FailureKind::Server => write!(f, "server failure"),
            FailureKind::Client => write!(f, "client failure"),
            FailureKind::Malformed => write!(f, "malformed payload"),
        }
    }
}

/// A failed request against the upstream API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status {
        url: String,
        status: u16,
        /// Raw `Retry-After` header value, if the server sent one.
        retry_after: Option<String>,
    },

    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Transport { .. } => FailureKind::TransientNetwork,
            FetchError::Status { status: 429, .. } => FailureKind::RateLimited,
            FetchError::Status { status, .. } if (500..600).contains(status) => {
                FailureKind::Server
            }
            FetchError::Status { .. } => FailureKind::Client,
            FetchError::Decode { .. } => FailureKind::Malformed,
        }
    }
}

/// Errors the retry executor knows how to classify.
pub trait Retryable {
    /// Whether another attempt may succeed.
    fn is_retryable(&self) -> bool;

    /// Server-provided retry hint (`Retry-After` header value).
    fn retry_after(&self) -> Option<&str> {
        None
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    fn retry_after(&self) -> Option<&str> {
        match self {
            FetchError::Status { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}
