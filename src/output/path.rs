//! Output destinations and object layout
//!
//! Objects live at `{root}/{prefix}/{partition}/data.json`, where the prefix
//! comes from the dataset registry and the partition from the date window.
//!
//! ```rust
//! use soda_extractor::output::OutputDestination;
//!
//! let dest = OutputDestination::parse("file:///data/raw").unwrap();
//! let path = dest.object_path("taxi", "2024-01-15").unwrap();
//! assert_eq!(path.to_str().unwrap(), "/data/raw/taxi/2024-01-15/data.json");
//! ```

use super::{OutputError, OutputResult};
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of every object
pub const OBJECT_FILE_NAME: &str = "data.json";

/// Root under which objects are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDestination {
    root: PathBuf,
}

impl OutputDestination {
    /// Parse a bucket string: a local path or a `file://` URL
    ///
    /// Remote object stores (`gs://`, `s3://`, ...) are rejected.
    pub fn parse(bucket: &str) -> OutputResult<Self> {
        let bucket = bucket.trim();
        if bucket.is_empty() {
            return Err(OutputError::InvalidPath(
                "output bucket is empty".to_string(),
            ));
        }

        if let Some(local) = bucket.strip_prefix("file://") {
            if local.is_empty() {
                return Err(OutputError::InvalidPath(bucket.to_string()));
            }
            return Ok(Self::local(local));
        }

        if bucket.contains("://") {
            return Err(OutputError::UnsupportedDestination(bucket.to_string()));
        }

        Ok(Self::local(bucket))
    }

    /// Destination rooted at a local directory
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Object key relative to the root (`taxi/2024-01-15/data.json`)
    pub fn object_key(prefix: &str, partition: &str) -> OutputResult<String> {
        validate_segment(prefix)?;
        validate_segment(partition)?;
        Ok(format!("{prefix}/{partition}/{OBJECT_FILE_NAME}"))
    }

    /// Full path of the object for a prefix and partition
    pub fn object_path(&self, prefix: &str, partition: &str) -> OutputResult<PathBuf> {
        validate_segment(prefix)?;
        validate_segment(partition)?;
        Ok(self.root.join(prefix).join(partition).join(OBJECT_FILE_NAME))
    }
}

impl fmt::Display for OutputDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.display())
    }
}

fn validate_segment(segment: &str) -> OutputResult<()> {
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(OutputError::InvalidPath(segment.to_string()))
    }
}
