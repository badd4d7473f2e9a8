//! Record sinks
//!
//! The engine hands its aggregate to a [`RecordSink`] only after a successful
//! run. Sinks write the whole object at once and can read it back to verify
//! the row count.

use crate::Record;
use std::path::PathBuf;

pub mod ndjson;
pub mod path;

pub use ndjson::NdjsonSink;
pub use path::OutputDestination;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Record could not be serialized
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Destination scheme is not supported
    #[error("unsupported output destination {0}: only local paths and file:// URLs are supported")]
    UnsupportedDestination(String),

    /// Path segment would escape the destination root
    #[error("invalid path segment: {0}")]
    InvalidPath(String),

    /// Line of an output file is not valid JSON
    #[error("{path}:{line}: invalid JSON record: {reason}")]
    ParseError {
        /// File being read
        path: PathBuf,
        /// 1-based line number
        line: u64,
        /// Parser message
        reason: String,
    },

    /// Read-back count differs from what was written
    #[error("verification failed for {path}: wrote {expected} records, found {actual}")]
    VerificationFailed {
        /// File that was verified
        path: PathBuf,
        /// Records written
        expected: u64,
        /// Records read back
        actual: u64,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// What a sink wrote
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SinkReceipt {
    /// Final location of the object
    pub location: PathBuf,
    /// Records written
    pub records_written: u64,
    /// Bytes written
    pub bytes_written: u64,
}

/// Destination for an extraction's records
pub trait RecordSink {
    /// Write every record as one object, replacing any previous object
    fn write_records(&mut self, records: &[Record]) -> OutputResult<SinkReceipt>;

    /// Read the object back and check its row count against the receipt
    fn verify(&self, receipt: &SinkReceipt) -> OutputResult<u64>;
}
