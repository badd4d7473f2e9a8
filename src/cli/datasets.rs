//! CLI command for listing configured datasets

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use super::OutputFormat;
use crate::registry::DatasetRegistry;

/// Datasets subcommand
#[derive(Debug, Args)]
pub struct DatasetsCommand {
    #[command(subcommand)]
    action: DatasetsAction,
}

/// Datasets actions
#[derive(Debug, clap::Subcommand)]
enum DatasetsAction {
    /// List datasets, optionally filtered by a name pattern (supports wildcards)
    List {
        /// Optional name pattern (e.g., "t*")
        pattern: Option<String>,
    },
}

impl DatasetsCommand {
    /// Execute the datasets command
    pub fn execute(&self, registry: &DatasetRegistry, format: OutputFormat) -> Result<()> {
        match &self.action {
            DatasetsAction::List { pattern } => {
                let listing = list_datasets(registry, pattern.as_deref())?;
                println!("{}", render_listing(&listing, format)?);
                Ok(())
            }
        }
    }
}

/// Registry entries as JSON objects, filtered by `pattern`
pub fn list_datasets(
    registry: &DatasetRegistry,
    pattern: Option<&str>,
) -> Result<Vec<serde_json::Value>> {
    let datasets = match pattern {
        Some(p) => registry.resolve_pattern(p)?,
        None => registry.entries(),
    };

    Ok(datasets
        .into_iter()
        .map(|d| {
            json!({
                "name": d.name,
                "aliases": d.aliases,
                "title": d.title,
                "base_url": d.base_url,
                "filter": d.filter,
                "output_prefix": d.output_prefix,
                "table": d.table,
                "default_lookback_days": d.default_lookback_days,
            })
        })
        .collect())
}

/// Render a listing for the terminal
pub fn render_listing(listing: &[serde_json::Value], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(listing)
            .context("Failed to serialize datasets to JSON"),
        OutputFormat::Human => {
            let mut lines = vec![format!("Found {} datasets:\n", listing.len())];
            for entry in listing {
                lines.push(format!(
                    "{} | {} | {} | {}",
                    entry["name"].as_str().unwrap_or_default(),
                    entry["title"].as_str().unwrap_or_default(),
                    entry["table"].as_str().unwrap_or_default(),
                    entry["base_url"].as_str().unwrap_or_default(),
                ));
            }
            Ok(lines.join("\n"))
        }
    }
}
