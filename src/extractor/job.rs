//! Engine state and run results

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::Record;

/// Lifecycle of one extraction run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Issuing new offsets while permits are available
    Launching,
    /// Tail seen or error recorded; waiting for in-flight pages
    Draining,
    /// Every page fetched
    Done,
    /// A page failed permanently, or the run was cancelled
    Failed,
}

impl EngineState {
    /// Whether the engine may still issue offsets
    pub fn is_launching(&self) -> bool {
        matches!(self, Self::Launching)
    }

    /// Whether the run has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Launching => "launching",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Run statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionStats {
    /// Offsets issued, in launch order
    pub offsets_issued: Vec<u64>,
    /// Pages received successfully
    pub pages: u64,
    /// Records aggregated
    pub records: u64,
    /// Wall time of the run
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl ExtractionStats {
    /// Number of offsets issued
    pub fn batches(&self) -> usize {
        self.offsets_issued.len()
    }
}

/// Successful extraction
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Every fetched record. Page order is not guaranteed; order within a page is.
    pub records: Vec<Record>,
    /// Run statistics
    pub stats: ExtractionStats,
}

impl Extraction {
    /// Whether nothing was extracted
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
