//! # SODA Extractor Library
//!
//! Pulls large tabular datasets out of Socrata open-data portals (SODA API)
//! using bounded concurrency. Pages are requested by offset, fetched in
//! parallel, retried on failure and aggregated by a single coordinator.
//!
//! ## Features
//!
//! - **Bounded Concurrency**: a fixed-size worker pool fetches pages ahead of the
//!   dataset tail without ever reissuing an offset
//! - **Fixed-Delay Retry**: each page gets its own retry budget before the run fails
//! - **Fail Fast, Drain Clean**: the first permanent error stops new launches while
//!   in-flight pages are waited on
//! - **Dataset Registry**: per-dataset endpoints and filters live in configuration,
//!   not in code
//!
//! ## Quick Start
//!
//! ```no_run
//! use soda_extractor::extractor::{EngineConfig, ExtractionEngine};
//! use soda_extractor::fetcher::query::{DateWindow, QueryBuilder};
//! use soda_extractor::registry::DatasetRegistry;
//! use soda_extractor::Credentials;
//! use chrono::NaiveDate;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = DatasetRegistry::load_embedded()?;
//! let dataset = registry.get("taxi")?;
//!
//! let config = EngineConfig::default();
//! let query = QueryBuilder::for_dataset(dataset, config.page_size)?;
//! let engine = ExtractionEngine::with_http(query, Credentials::anonymous(), config)?;
//!
//! let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
//! let extraction = engine.run(&DateWindow::single(day)).await?;
//! println!("extracted {} records", extraction.records.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - Page fetcher, retrying fetcher and query builder
//! - [`extractor`] - The concurrent extraction engine
//! - [`registry`] - Dataset registry (endpoints, filter columns, output prefixes)
//! - [`credentials`] - Credential providers
//! - [`output`] - Record sinks (newline-delimited JSON)
//! - [`cli`] - Command line surface

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// CLI command implementations
pub mod cli;

/// Credential providers
pub mod credentials;

/// Concurrent extraction engine
pub mod extractor;

/// Page fetchers and query construction
pub mod fetcher;

/// Observability metrics
pub mod metrics;

/// Record sinks
pub mod output;

/// Dataset registry
pub mod registry;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use credentials::Credentials;

/// One opaque record as returned by the source.
///
/// The extractor never inspects records; they are forwarded to the sink as-is.
pub type Record = serde_json::Value;

/// One fetched page of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Record offset the page was requested at
    pub offset: u64,
    /// Launch order of the page within its run (diagnostics only)
    pub batch_index: u64,
    /// Records in source order
    pub records: Vec<Record>,
}

impl Page {
    /// Create a new page
    pub fn new(offset: u64, batch_index: u64, records: Vec<Record>) -> Self {
        Self {
            offset,
            batch_index,
            records,
        }
    }

    /// Number of records in the page
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the page holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A page shorter than the requested limit marks the tail of the dataset
    pub fn is_tail(&self, page_size: u64) -> bool {
        (self.records.len() as u64) < page_size
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch {} (offset {}, {} records)",
            self.batch_index,
            self.offset,
            self.records.len()
        )
    }
}
