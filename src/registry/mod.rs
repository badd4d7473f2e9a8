//! Dataset registry for supported SODA resources
//!
//! The registry holds everything that differs between datasets: endpoint,
//! date filter, output prefix and warehouse table. Adding a dataset is a
//! registry change, not a code change. A registry file passed with
//! `--registry` replaces the embedded one.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::fetcher::query::FilterKind;

/// Embedded registry data
const REGISTRY_JSON: &str = include_str!("datasets.json");

/// Global registry instance (loaded once)
static REGISTRY: Lazy<Result<DatasetRegistry, RegistryError>> =
    Lazy::new(|| DatasetRegistry::from_json(REGISTRY_JSON));

/// Configuration of one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Canonical short name (e.g., `taxi`)
    pub name: String,
    /// Alternative names accepted on the command line
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Human-readable title
    pub title: String,
    /// Resource endpoint
    pub base_url: String,
    /// Date filter
    pub filter: FilterKind,
    /// First path segment of the output object
    pub output_prefix: String,
    /// Warehouse table the output is loaded into
    pub table: String,
    /// Default distance of the start date from today
    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: u32,
}

fn default_lookback_days() -> u32 {
    1
}

impl DatasetConfig {
    /// Whether `name` is the canonical name or an alias (case-insensitive)
    pub fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// Registry of configured datasets
#[derive(Debug, Clone)]
pub struct DatasetRegistry {
    #[allow(dead_code)]
    schema_version: String,
    datasets: BTreeMap<String, DatasetConfig>,
}

impl DatasetRegistry {
    /// Load the embedded registry
    ///
    /// This is a singleton operation - the registry is loaded once and cached.
    pub fn load() -> Result<&'static Self, &'static RegistryError> {
        REGISTRY.as_ref()
    }

    /// Load embedded registry, returning an owned copy
    pub fn load_embedded() -> Result<Self, RegistryError> {
        Self::from_json(REGISTRY_JSON)
    }

    /// Load a registry file
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            RegistryError::ParseError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Parse registry from JSON string
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let raw: RawRegistry = serde_json::from_str(json)
            .map_err(|e| RegistryError::ParseError(format!("Failed to parse registry: {e}")))?;

        let mut datasets = BTreeMap::new();
        for entry in raw.datasets {
            if entry.name.trim().is_empty() {
                return Err(RegistryError::ParseError(
                    "dataset with empty name".to_string(),
                ));
            }
            let key = entry.name.to_ascii_lowercase();
            if datasets.insert(key, entry.clone()).is_some() {
                return Err(RegistryError::ParseError(format!(
                    "duplicate dataset name: {}",
                    entry.name
                )));
            }
        }

        Ok(Self {
            schema_version: raw.schema_version,
            datasets,
        })
    }

    /// All datasets sorted by name
    pub fn entries(&self) -> Vec<&DatasetConfig> {
        self.datasets.values().collect()
    }

    /// Look up a dataset by name or alias
    pub fn get(&self, name: &str) -> Result<&DatasetConfig, RegistryError> {
        if let Some(entry) = self.datasets.get(&name.to_ascii_lowercase()) {
            return Ok(entry);
        }

        self.datasets
            .values()
            .find(|d| d.answers_to(name))
            .ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "{name} (known datasets: {})",
                    self.names().join(", ")
                ))
            })
    }

    /// Canonical names
    pub fn names(&self) -> Vec<&str> {
        self.datasets.values().map(|d| d.name.as_str()).collect()
    }

    /// Resolve a wildcard pattern against dataset names and aliases
    ///
    /// # Pattern Syntax
    /// - `*` matches any sequence of characters
    /// - `t*` matches `taxi` and `tnp`
    /// - a pattern without `*` is an exact name or alias lookup
    pub fn resolve_pattern(&self, pattern: &str) -> Result<Vec<&DatasetConfig>, RegistryError> {
        if !pattern.contains('*') {
            return self.get(pattern).map(|d| vec![d]);
        }

        let pattern = pattern.to_ascii_lowercase();
        let matches: Vec<&DatasetConfig> = self
            .datasets
            .values()
            .filter(|d| {
                matches_pattern(&pattern, &d.name.to_ascii_lowercase())
                    || d
                        .aliases
                        .iter()
                        .any(|a| matches_pattern(&pattern, &a.to_ascii_lowercase()))
            })
            .collect();

        if matches.is_empty() {
            return Err(RegistryError::NotFound(format!(
                "Pattern {pattern} does not match any dataset"
            )));
        }

        Ok(matches)
    }
}

/// Helper function to match a pattern with wildcards
fn matches_pattern(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    if !pattern.contains('*') {
        return pattern == value;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let last = parts.len() - 1;

    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }

        if i == 0 {
            // First part must match start
            if !value.starts_with(part) {
                return false;
            }
            pos = part.len();
        } else if i == last {
            // Last part must match end without overlapping what was consumed
            if value.len() < pos + part.len() || !value.ends_with(part) {
                return false;
            }
        } else if let Some(found_pos) = value[pos..].find(part) {
            pos += found_pos + part.len();
        } else {
            return false;
        }
    }

    true
}

/// Raw registry structure for deserialization
#[derive(Debug, Deserialize)]
struct RawRegistry {
    schema_version: String,
    datasets: Vec<DatasetConfig>,
}

/// Errors that can occur when working with the registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Failed to read or parse registry JSON
    #[error("registry parse error: {0}")]
    ParseError(String),

    /// Dataset not found in registry
    #[error("dataset not found: {0}")]
    NotFound(String),
}
