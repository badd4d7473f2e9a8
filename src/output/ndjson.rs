//! Newline-delimited JSON sink
//!
//! One record per line, written to a temporary file next to the target and
//! renamed into place once fully flushed and synced. A failed write leaves
//! no object behind.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{OutputError, OutputResult, RecordSink, SinkReceipt};
use crate::Record;

/// Default buffer size for the file writer (64 KiB)
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Writes records as NDJSON to a single file
#[derive(Debug, Clone)]
pub struct NdjsonSink {
    path: PathBuf,
    buffer_size: usize,
}

impl NdjsonSink {
    /// Create a sink for `path`
    ///
    /// # Arguments
    /// * `path` - Final object path; parent directories are created on write
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::new_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Create a sink with a custom write buffer size
    pub fn new_with_buffer_size<P: Into<PathBuf>>(path: P, buffer_size: usize) -> Self {
        Self {
            path: path.into(),
            buffer_size,
        }
    }

    /// Final object path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data.json".to_string());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", std::process::id()))
    }

    fn write_to(&self, file: File, records: &[Record]) -> OutputResult<u64> {
        let mut writer = BufWriter::with_capacity(self.buffer_size, file);
        let mut bytes = 0u64;

        for record in records {
            let line = serde_json::to_vec(record)
                .map_err(|e| OutputError::SerializationError(e.to_string()))?;
            writer
                .write_all(&line)
                .and_then(|_| writer.write_all(b"\n"))
                .map_err(|e| OutputError::IoError(format!("Failed to write record: {e}")))?;
            bytes += line.len() as u64 + 1;
        }

        writer
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush: {e}")))?;

        let file = writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get file handle: {e}")))?;
        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {e}")))?;

        Ok(bytes)
    }
}

impl RecordSink for NdjsonSink {
    fn write_records(&mut self, records: &[Record]) -> OutputResult<SinkReceipt> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
        }

        let temp = self.temp_path();
        debug!(temp = %temp.display(), records = records.len(), "Writing NDJSON object");

        let file = File::create(&temp)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;

        let bytes = match self.write_to(file, records) {
            Ok(bytes) => bytes,
            Err(e) => {
                discard_temp(&temp);
                return Err(e);
            }
        };

        std::fs::rename(&temp, &self.path).map_err(|e| {
            discard_temp(&temp);
            OutputError::IoError(format!("Failed to move object into place: {e}"))
        })?;

        info!(
            path = %self.path.display(),
            records = records.len(),
            bytes,
            "Object written"
        );

        Ok(SinkReceipt {
            location: self.path.clone(),
            records_written: records.len() as u64,
            bytes_written: bytes,
        })
    }

    fn verify(&self, receipt: &SinkReceipt) -> OutputResult<u64> {
        let actual = count_records(&receipt.location)?;
        if actual != receipt.records_written {
            return Err(OutputError::VerificationFailed {
                path: receipt.location.clone(),
                expected: receipt.records_written,
                actual,
            });
        }
        debug!(path = %receipt.location.display(), records = actual, "Object verified");
        Ok(actual)
    }
}

fn discard_temp(temp: &Path) {
    if let Err(e) = std::fs::remove_file(temp) {
        warn!(temp = %temp.display(), error = %e, "Failed to remove temp file");
    }
}

/// Count the records of an NDJSON file, checking every line parses
///
/// Blank lines are ignored.
pub fn count_records(path: &Path) -> OutputResult<u64> {
    let file = File::open(path)
        .map_err(|e| OutputError::IoError(format!("Failed to open {}: {e}", path.display())))?;

    let mut count = 0u64;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line
            .map_err(|e| OutputError::IoError(format!("Failed to read {}: {e}", path.display())))?;
        if line.trim().is_empty() {
            continue;
        }
        serde_json::from_str::<Record>(&line).map_err(|e| OutputError::ParseError {
            path: path.to_path_buf(),
            line: index as u64 + 1,
            reason: e.to_string(),
        })?;
        count += 1;
    }

    Ok(count)
}
