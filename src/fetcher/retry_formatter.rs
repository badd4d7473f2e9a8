//! Retry message formatting for page fetches.
//!
//! Every failure is retried the same way, so the classification here only
//! drives log wording and the remediation hints printed after the last attempt.

use std::time::Duration;

use crate::fetcher::{FetchError, TransportReason};

/// Classification of fetch failures for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request exceeded the per-request timeout
    NetworkTimeout,
    /// Connection refused, DNS failure, or other offline scenarios
    NetworkOffline,
    /// HTTP 429 throttling
    RateLimit,
    /// HTTP 5xx server error
    ServerError(u16),
    /// HTTP 400, usually a malformed `$where`
    InvalidQuery,
    /// Authentication failures (401/403)
    AuthFailed(u16),
    /// Other client errors (4xx, except 429)
    ClientError(u16),
    /// Body was not a JSON array
    MalformedBody,
    /// Generic fallback when no better classification fits
    NetworkGeneric,
}

impl RetryErrorType {
    /// Classify a single-attempt fetch error.
    pub fn classify(err: &FetchError) -> Self {
        match err.root_cause() {
            FetchError::Transport { reason, .. } => match reason {
                TransportReason::Timeout => Self::NetworkTimeout,
                TransportReason::Connect => Self::NetworkOffline,
                TransportReason::Other => Self::NetworkGeneric,
            },
            FetchError::HttpStatus { status, .. } => match *status {
                400 => Self::InvalidQuery,
                401 | 403 => Self::AuthFailed(*status),
                429 => Self::RateLimit,
                code if code >= 500 => Self::ServerError(code),
                code => Self::ClientError(code),
            },
            FetchError::Decode(_) => Self::MalformedBody,
            FetchError::RetryExhausted { .. } => Self::NetworkGeneric,
        }
    }

    /// User-friendly description string used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "throttled by portal",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::InvalidQuery => "query rejected",
            Self::AuthFailed(code) => match code {
                401 => "authentication failed (401)",
                403 => "authentication failed (403)",
                _ => "authentication failed",
            },
            Self::ClientError(code) => match code {
                404 => "dataset not found",
                _ => "client error",
            },
            Self::MalformedBody => "malformed response body",
            Self::NetworkGeneric => "network error",
        }
    }

    /// Suggested remediation presented after the final failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Large pages can be slow; try a smaller --page-size",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => "Supply an app key (SOCRATA_KEY_ID/SOCRATA_KEY_SECRET) or lower --concurrency",
            Self::ServerError(_) => "The portal may be experiencing issues, try again later",
            Self::InvalidQuery => "Check the dataset's filter column in the registry",
            Self::AuthFailed(_) => "Verify the API key id and secret",
            Self::ClientError(_) => "Check the dataset base URL in the registry",
            Self::MalformedBody => "The endpoint may not be a SODA resource; check the base URL",
            Self::NetworkGeneric => "Check network connectivity and try again",
        }
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts configured
    pub max_attempts: u32,
    /// Type of error that triggered retry
    pub error_type: RetryErrorType,
    /// Fixed delay until next attempt
    pub delay: Duration,
    /// Page offset being fetched
    pub offset: u64,
    /// Original error message for details
    pub error_message: String,
    /// Resource path that failed
    pub endpoint: String,
}

impl RetryContext {
    /// Build a context from a failed attempt.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        err: &FetchError,
        delay: Duration,
        offset: u64,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type: RetryErrorType::classify(err),
            delay,
            offset,
            error_message: err.to_string(),
            endpoint: endpoint.into(),
        }
    }

    /// Format standardized retry message with attempt counters and context.
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... (offset {})",
            self.attempt + 1,
            self.max_attempts,
            self.error_type.description(),
            self.delay.as_secs_f64(),
            self.offset
        )
    }

    /// Format retry success message when a later attempt works.
    pub fn format_success(&self) -> String {
        format!(
            "Retry attempt {}/{} succeeded - resuming extraction (offset {})",
            self.attempt, self.max_attempts, self.offset
        )
    }

    /// Format final failure summary with actionable suggestions.
    pub fn format_failure(&self) -> String {
        let mut lines = vec![
            format!("[FAILED] Page fetch failed after {} attempts", self.max_attempts),
            format!("  Last error: {}", self.error_message),
            format!("  Offset: {}", self.offset),
            format!("  Endpoint: {}", self.endpoint),
            "  Suggestions:".to_string(),
        ];

        for suggestion in self.format_suggestions() {
            lines.push(format!("    - {suggestion}"));
        }

        lines.join("\n")
    }

    /// Derive suggestions tailored to the current retry context.
    pub fn format_suggestions(&self) -> Vec<String> {
        vec![
            self.error_type.suggestion().to_string(),
            format!(
                "Try increasing --max-retries (current: {})",
                self.max_attempts
            ),
        ]
    }
}
