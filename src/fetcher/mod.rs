//! Page fetcher implementations

use crate::{Credentials, Record};
use async_trait::async_trait;
use reqwest::Url;
use std::fmt;

pub mod query;
pub mod retry;
pub mod retry_formatter;
pub mod shared_resources;
pub mod soda_http;

pub use retry::{RetryPolicy, RetryingFetcher};
pub use soda_http::SodaHttpClient;

/// Why a transport-level failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportReason {
    /// Request exceeded the per-request timeout
    Timeout,
    /// Connection could not be established (DNS, refused, TLS)
    Connect,
    /// Anything else (body read interrupted, redirect loop, ...)
    Other,
}

impl fmt::Display for TransportReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Other => "transport",
        };
        f.write_str(label)
    }
}

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network failure or timeout
    #[error("{reason} error: {message}")]
    Transport {
        /// Failure class
        reason: TransportReason,
        /// Underlying error message
        message: String,
    },

    /// Non-success HTTP status
    #[error("unexpected status code {status}: {body}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Response body (may be truncated)
        body: String,
    },

    /// Response body was not a JSON array of records
    #[error("failed to parse JSON: {0}")]
    Decode(String),

    /// Retry budget spent for one offset
    #[error("offset {offset} failed after {attempts} attempts: {last}")]
    RetryExhausted {
        /// Offset that could not be fetched
        offset: u64,
        /// Attempts made
        attempts: u32,
        /// Last underlying failure
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Build a transport error from a reqwest error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            TransportReason::Timeout
        } else if err.is_connect() {
            TransportReason::Connect
        } else {
            TransportReason::Other
        };
        Self::Transport {
            reason,
            message: err.to_string(),
        }
    }

    /// Innermost per-attempt error (unwraps `RetryExhausted`)
    pub fn root_cause(&self) -> &FetchError {
        match self {
            Self::RetryExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

/// Result type for fetcher operations
pub type FetchResult<T> = Result<T, FetchError>;

/// One network call for one page (no retries)
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the records behind a fully-formed page URL
    ///
    /// # Arguments
    /// * `url` - Query URL with filter, limit and offset already embedded
    /// * `credentials` - API credentials; empty means unauthenticated
    async fn fetch_page(&self, url: &Url, credentials: &Credentials) -> FetchResult<Vec<Record>>;
}
