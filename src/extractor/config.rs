//! Engine configuration

use std::time::Duration;

use crate::extractor::ExtractError;
use crate::fetcher::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::fetcher::RetryPolicy;

/// Default number of pages fetched concurrently.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Upper bound for `--concurrency`.
/// SODA portals start throttling well before this even with an app key.
pub const MAX_CONCURRENCY: usize = 32;

/// Default attempts per page.
pub const DEFAULT_MAX_RETRIES: u32 = DEFAULT_MAX_ATTEMPTS;

/// Upper bound for `--max-retries`.
pub const MAX_RETRIES_LIMIT: u32 = 20;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = DEFAULT_RETRY_DELAY.as_secs();

/// Default `$limit` per page.
pub const DEFAULT_PAGE_SIZE: u64 = 50_000;

/// Engine settings for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum pages in flight
    pub concurrency: usize,
    /// Records requested per page
    pub page_size: u64,
    /// Per-page retry policy
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Set maximum pages in flight
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set records per page
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set attempts per page and the pause between them
    pub fn with_retry(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.retry = RetryPolicy {
            max_attempts,
            delay,
        };
        self
    }

    /// Check bounds
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ExtractError::InvalidConfig(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }

        if self.page_size == 0 {
            return Err(ExtractError::InvalidConfig(
                "page size must be at least 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 || self.retry.max_attempts > MAX_RETRIES_LIMIT {
            return Err(ExtractError::InvalidConfig(format!(
                "max retries must be between 1 and {MAX_RETRIES_LIMIT}, got {}",
                self.retry.max_attempts
            )));
        }

        Ok(())
    }
}
