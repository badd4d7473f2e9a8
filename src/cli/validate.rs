//! Validation subcommand

use chrono::Utc;
use clap::Parser;
use serde_json::json;
use std::path::{Path, PathBuf};

use super::{CliError, OutputFormat};
use crate::extractor::config::DEFAULT_PAGE_SIZE;
use crate::fetcher::query::{parse_date, DateWindow, QueryBuilder};
use crate::output::ndjson::count_records;
use crate::registry::DatasetRegistry;

/// Validate command for checking dataset configuration and output files
#[derive(Parser, Debug)]
pub struct ValidateCommand {
    /// What to validate
    #[command(subcommand)]
    pub target: ValidateTarget,
}

/// Target type for validation
#[derive(clap::Subcommand, Debug)]
pub enum ValidateTarget {
    /// Show a dataset's configuration and the first page URL it would request
    Dataset {
        /// Dataset name or alias
        name: String,

        /// Day to build the query for (YYYY-MM-DD, default: yesterday)
        #[arg(long)]
        date: Option<String>,
    },
    /// Count and check the records of an NDJSON output file
    Output {
        /// File to check
        file: PathBuf,
    },
}

impl ValidateCommand {
    /// Execute the validation command
    pub fn execute(
        &self,
        registry: &DatasetRegistry,
        format: OutputFormat,
    ) -> Result<(), CliError> {
        let report = match &self.target {
            ValidateTarget::Dataset { name, date } => {
                validate_dataset(registry, name, date.as_deref())?
            }
            ValidateTarget::Output { file } => validate_output(file)?,
        };

        match format {
            OutputFormat::Json => println!("{report}"),
            OutputFormat::Human => {
                if let Some(fields) = report.as_object() {
                    for (key, value) in fields {
                        match value.as_str() {
                            Some(s) => println!("  {key}: {s}"),
                            None => println!("  {key}: {value}"),
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Resolve a dataset and build its first page URL
pub fn validate_dataset(
    registry: &DatasetRegistry,
    name: &str,
    date: Option<&str>,
) -> Result<serde_json::Value, CliError> {
    let dataset = registry.get(name)?;
    let day = match date {
        Some(d) => parse_date(d)?,
        None => Utc::now()
            .date_naive()
            .pred_opt()
            .ok_or_else(|| CliError::InvalidArgument("date out of range".to_string()))?,
    };
    let window = DateWindow::single(day);
    let query = QueryBuilder::for_dataset(dataset, DEFAULT_PAGE_SIZE)?;

    Ok(json!({
        "dataset": dataset.name,
        "title": dataset.title,
        "table": dataset.table,
        "output_prefix": dataset.output_prefix,
        "where": query.where_clause(&window),
        "first_page_url": query.page_url(&window, 0).to_string(),
    }))
}

/// Count the records of an NDJSON file
pub fn validate_output(file: &Path) -> Result<serde_json::Value, CliError> {
    let records = count_records(file)?;
    Ok(json!({
        "file": file.display().to_string(),
        "records": records,
        "valid": true,
    }))
}
