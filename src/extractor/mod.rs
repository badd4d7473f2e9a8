//! Concurrent extraction engine
//!
//! # Overview
//!
//! One run pulls every page of a filtered dataset:
//!
//! 1. **Launch**: issue offsets `0, P, 2P, …` while fewer than `C` pages are in flight
//! 2. **Collect**: wait for whichever page finishes first and aggregate it
//! 3. **Drain**: after a short page (the tail) or the first permanent failure,
//!    stop launching and wait for everything already in flight
//!
//! Only the coordinator touches the aggregate and the offset counter, so no
//! locking is involved.
//!
//! # Components
//!
//! - [`engine`] - The coordinator ([`ExtractionEngine`])
//! - [`config`] - Concurrency, page size and retry settings
//! - [`job`] - Engine state and run results
//! - [`progress`] - Periodic progress logging
//!
//! # Error Handling
//!
//! A page error is final for the run: the retrying fetcher has already spent
//! its budget. The engine reports the first failure with its offset and batch
//! index and discards the partial aggregate.

pub mod config;
pub mod engine;
pub mod job;
pub mod progress;

pub use config::EngineConfig;
pub use engine::ExtractionEngine;
pub use job::{EngineState, Extraction, ExtractionStats};

use crate::fetcher::query::QueryError;
use crate::fetcher::FetchError;
use crate::Page;

/// Engine errors
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// A page failed permanently
    #[error("batch {batch_index} at offset {offset} failed: {cause}")]
    EngineFatal {
        /// Offset of the failed page
        offset: u64,
        /// Launch order of the failed page
        batch_index: u64,
        /// Retry-exhausted cause
        #[source]
        cause: FetchError,
    },

    /// A page task panicked or was aborted
    #[error("batch {batch_index} at offset {offset} aborted: {reason}")]
    TaskAborted {
        /// Offset of the aborted page
        offset: u64,
        /// Launch order of the aborted page
        batch_index: u64,
        /// Panic or abort description
        reason: String,
    },

    /// Shutdown requested before the run finished
    #[error("extraction cancelled by shutdown request")]
    Cancelled,

    /// Configuration out of bounds
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Query could not be built
    #[error("query error: {0}")]
    Query(#[from] QueryError),
}

impl ExtractError {
    /// Offset of the page that failed, when the failure belongs to one page
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::EngineFatal { offset, .. } | Self::TaskAborted { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/// Failure of one page task
#[derive(Debug)]
pub struct PageFailure {
    /// Offset of the page
    pub offset: u64,
    /// Launch order of the page
    pub batch_index: u64,
    /// Retry-exhausted cause
    pub cause: FetchError,
}

impl From<PageFailure> for ExtractError {
    fn from(failure: PageFailure) -> Self {
        Self::EngineFatal {
            offset: failure.offset,
            batch_index: failure.batch_index,
            cause: failure.cause,
        }
    }
}

/// What a page task reports back to the coordinator
pub type PageResult = Result<Page, PageFailure>;
