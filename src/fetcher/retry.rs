//! Fixed-delay retry around a [`PageFetcher`]
//!
//! Every failure is retried: attempt, sleep the fixed delay, attempt again,
//! up to `max_attempts` attempts. There is no sleep after the final attempt,
//! so a page that never succeeds costs exactly `(max_attempts - 1) * delay`
//! of waiting on top of the attempts themselves.

use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::fetcher::retry_formatter::RetryContext;
use crate::fetcher::{FetchError, FetchResult, PageFetcher};
use crate::metrics;
use crate::{Credentials, Record};

/// Default attempts per page
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default pause between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Attempt budget and pause for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub max_attempts: u32,
    /// Pause between consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` attempts separated by `delay`.
    ///
    /// A zero attempt count is raised to one.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Worst-case time spent sleeping for one page
    pub fn max_total_delay(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }
}

/// Wraps a [`PageFetcher`] with a [`RetryPolicy`]
#[derive(Clone)]
pub struct RetryingFetcher {
    inner: Arc<dyn PageFetcher>,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    /// Create a retrying fetcher
    pub fn new(inner: Arc<dyn PageFetcher>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Active retry policy
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch one page, retrying every failure
    ///
    /// # Arguments
    /// * `url` - Page URL
    /// * `credentials` - Forwarded unchanged to every attempt
    /// * `offset` - Page offset, used for logs and the exhausted error
    ///
    /// # Errors
    /// [`FetchError::RetryExhausted`] carrying the last attempt's error once
    /// the attempt budget is spent.
    pub async fn fetch(
        &self,
        url: &Url,
        credentials: &Credentials,
        offset: u64,
    ) -> FetchResult<Vec<Record>> {
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 0u32;
        let mut last_failure: Option<RetryContext> = None;

        loop {
            attempt += 1;
            debug!(offset, attempt, max_attempts, "Fetching page");

            match self.inner.fetch_page(url, credentials).await {
                Ok(records) => {
                    if let Some(mut ctx) = last_failure {
                        ctx.attempt = attempt;
                        info!("{}", ctx.format_success());
                    }
                    return Ok(records);
                }
                Err(err) => {
                    let ctx = RetryContext::new(
                        attempt,
                        max_attempts,
                        &err,
                        self.policy.delay,
                        offset,
                        url.path(),
                    );

                    if attempt >= max_attempts {
                        warn!("{}", ctx.format_failure());
                        return Err(FetchError::RetryExhausted {
                            offset,
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }

                    warn!(error = %err, "{}", ctx.format_retry());
                    metrics::record_retry_delay(self.policy.delay, attempt);
                    tokio::time::sleep(self.policy.delay).await;
                    last_failure = Some(ctx);
                }
            }
        }
    }
}
