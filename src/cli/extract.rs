//! Extract command implementation

use chrono::{Days, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{load_registry, CliError};
use crate::credentials::{CredentialProvider, EnvCredentialProvider, SecretDirProvider};
use crate::extractor::config::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DEFAULT_PAGE_SIZE, DEFAULT_RETRY_DELAY_SECS,
    MAX_CONCURRENCY, MAX_RETRIES_LIMIT,
};
use crate::extractor::{EngineConfig, ExtractionEngine};
use crate::fetcher::query::{parse_date, DateWindow, QueryBuilder, DATE_FORMAT};
use crate::fetcher::{PageFetcher, SodaHttpClient};
use crate::output::{NdjsonSink, OutputDestination, RecordSink};
use crate::registry::{DatasetConfig, DatasetRegistry};
use crate::shutdown::SharedShutdown;

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// SODA extractor CLI
#[derive(Parser, Debug)]
#[command(name = "soda-extractor")]
#[command(about = "Extract Socrata open-data datasets with bounded concurrency", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g., 0.0.0.0:9090)
    #[arg(long, global = true, env = "METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Dataset registry file replacing the built-in one
    #[arg(long, global = true, env = "SODA_REGISTRY")]
    pub registry: Option<PathBuf>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract one dataset for a date window
    Extract(ExtractArgs),

    /// List configured datasets
    Datasets(super::DatasetsCommand),

    /// Validate a dataset configuration or an output file
    Validate(super::ValidateCommand),
}

/// Run modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Extract the start date only
    Incremental,
    /// Extract start..=end as one window
    Full,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "incremental" => Ok(Mode::Incremental),
            "full" => Ok(Mode::Full),
            _ => Err(format!(
                "Invalid mode: {s}. Valid options: incremental, full"
            )),
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Arguments of the extract command
#[derive(Parser, Debug, Clone)]
pub struct ExtractArgs {
    /// Dataset name or alias (see `datasets list`)
    pub dataset: String,

    /// Run mode: incremental (start date only) or full (start..=end)
    #[arg(long, env = "MODE", default_value = "incremental")]
    pub mode: Mode,

    /// First day to extract (YYYY-MM-DD); defaults to the dataset's look-back
    #[arg(long, env = "START_DATE")]
    pub start_date: Option<String>,

    /// Last day to extract in full mode (YYYY-MM-DD); defaults to yesterday
    #[arg(long, env = "END_DATE")]
    pub end_date: Option<String>,

    /// Output root: a local directory or file:// URL
    #[arg(long, env = "OUTPUT_BUCKET")]
    pub output_bucket: String,

    /// Pages fetched concurrently (max: 32)
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY, value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Attempts per page before the run fails (range: 1-20)
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(1..=MAX_RETRIES_LIMIT as i64))]
    pub max_retries: u32,

    /// Seconds to wait between attempts
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    pub retry_delay_secs: u64,

    /// Records per page ($limit)
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u64).range(1..))]
    pub page_size: u64,

    /// Write an empty object instead of failing when nothing matches
    #[arg(long, default_value_t = false)]
    pub allow_empty: bool,

    /// Directory with mounted `socrata-key-id` / `socrata-key-secret` files;
    /// without it SOCRATA_KEY_ID / SOCRATA_KEY_SECRET are used
    #[arg(long, env = "SOCRATA_SECRETS_DIR")]
    pub credentials_dir: Option<PathBuf>,
}

/// Result of a successful extract run
#[derive(Debug, Clone, Serialize)]
pub struct ExtractSummary {
    /// Dataset name
    pub dataset: String,
    /// Run mode
    pub mode: Mode,
    /// First day extracted
    pub start_date: String,
    /// Last day extracted
    pub end_date: String,
    /// Object key relative to the output root
    pub object_key: String,
    /// Object location
    pub output_path: PathBuf,
    /// Warehouse table the object is meant for
    pub table: String,
    /// Records written and verified
    pub records: u64,
    /// Pages received
    pub pages: u64,
    /// Offsets issued
    pub batches: usize,
    /// Bytes written
    pub bytes: u64,
    /// Engine wall time in seconds
    pub elapsed_secs: f64,
}

impl ExtractArgs {
    /// Engine configuration from the flags
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_concurrency(self.concurrency)
            .with_page_size(self.page_size)
            .with_retry(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }

    /// Date window for this run
    ///
    /// Start defaults to `today - look-back`, end to yesterday. Incremental
    /// runs cover the start date only.
    pub fn resolve_window(
        &self,
        today: NaiveDate,
        lookback_days: u32,
    ) -> Result<DateWindow, CliError> {
        let start = match &self.start_date {
            Some(s) if !s.trim().is_empty() => parse_date(s)?,
            _ => today
                .checked_sub_days(Days::new(u64::from(lookback_days)))
                .ok_or_else(|| CliError::InvalidArgument("start date out of range".to_string()))?,
        };

        match self.mode {
            Mode::Incremental => Ok(DateWindow::single(start)),
            Mode::Full => {
                let end = match &self.end_date {
                    Some(s) if !s.trim().is_empty() => parse_date(s)?,
                    _ => today.pred_opt().ok_or_else(|| {
                        CliError::InvalidArgument("end date out of range".to_string())
                    })?,
                };
                Ok(DateWindow::range(start, end)?)
            }
        }
    }

    async fn credentials(&self) -> Result<crate::Credentials, CliError> {
        let provider: Box<dyn CredentialProvider> = match &self.credentials_dir {
            Some(dir) => Box::new(SecretDirProvider::new(dir)),
            None => Box::new(EnvCredentialProvider::default()),
        };
        info!(provider = %provider.describe(), "Resolving API credentials");
        Ok(provider.credentials().await?)
    }

    /// Full pipeline: credentials, engine, empty policy, sink, verification
    pub async fn run_pipeline(
        &self,
        registry: &DatasetRegistry,
        fetcher: Arc<dyn PageFetcher>,
        shutdown: SharedShutdown,
        today: NaiveDate,
    ) -> Result<ExtractSummary, CliError> {
        let dataset: &DatasetConfig = registry.get(&self.dataset)?;
        let window = self.resolve_window(today, dataset.default_lookback_days)?;

        let destination = OutputDestination::parse(&self.output_bucket)?;
        let partition = window.partition();
        let object_key = OutputDestination::object_key(&dataset.output_prefix, &partition)?;
        let output_path = destination.object_path(&dataset.output_prefix, &partition)?;

        info!(
            dataset = %dataset.name,
            mode = ?self.mode,
            window = %window,
            destination = %destination,
            "Starting extract run"
        );

        let credentials = self.credentials().await?;
        let config = self.engine_config();
        let query = QueryBuilder::for_dataset(dataset, config.page_size)?;
        let engine = ExtractionEngine::new(fetcher, query, credentials, config)?
            .with_label(dataset.name.clone())
            .with_shutdown(shutdown);

        let extraction = engine.run(&window).await?;

        if extraction.is_empty() {
            if !self.allow_empty {
                return Err(CliError::EmptyExtraction {
                    dataset: dataset.name.clone(),
                    window: window.to_string(),
                });
            }
            warn!(dataset = %dataset.name, window = %window, "No records extracted, writing empty object");
        }

        let mut sink = NdjsonSink::new(&output_path);
        let receipt = sink.write_records(&extraction.records)?;
        let verified = sink.verify(&receipt)?;

        Ok(ExtractSummary {
            dataset: dataset.name.clone(),
            mode: self.mode,
            start_date: window.start.format(DATE_FORMAT).to_string(),
            end_date: window.end.format(DATE_FORMAT).to_string(),
            object_key,
            output_path,
            table: dataset.table.clone(),
            records: verified,
            pages: extraction.stats.pages,
            batches: extraction.stats.batches(),
            bytes: receipt.bytes_written,
            elapsed_secs: extraction.stats.elapsed.as_secs_f64(),
        })
    }

    /// Execute the extract command against the live portal
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let registry = load_registry(cli.registry.as_deref())?;
        let today = Utc::now().date_naive();

        let result = self
            .run_pipeline(
                &registry,
                Arc::new(SodaHttpClient::default()),
                shutdown,
                today,
            )
            .await;

        match cli.output_format {
            OutputFormat::Json => output_json(&self.dataset, &result),
            OutputFormat::Human => output_human(&result),
        }

        result.map(|_| ())
    }
}

/// Output result as JSON
fn output_json(dataset: &str, result: &Result<ExtractSummary, CliError>) {
    let output = match result {
        Ok(summary) => {
            let mut value = serde_json::to_value(summary).unwrap_or_default();
            value["success"] = serde_json::Value::Bool(true);
            value
        }
        Err(e) => serde_json::json!({
            "success": false,
            "dataset": dataset,
            "error": e.to_string(),
        }),
    };

    println!("{output}");
}

/// Output result in human-readable format
fn output_human(result: &Result<ExtractSummary, CliError>) {
    match result {
        Ok(summary) => {
            println!("\nExtraction completed successfully!");
            println!("Dataset: {} ({:?})", summary.dataset, summary.mode);
            if summary.start_date == summary.end_date {
                println!("Date: {}", summary.start_date);
            } else {
                println!("Dates: {} to {}", summary.start_date, summary.end_date);
            }
            println!("Output: {}", summary.output_path.display());
            println!("Table: {}", summary.table);
            println!("Records: {}", summary.records);
            println!(
                "Pages: {} ({} requested) in {:.1}s",
                summary.pages, summary.batches, summary.elapsed_secs
            );
        }
        Err(e) => {
            eprintln!("\nExtraction failed!");
            eprintln!("Error: {e}");
        }
    }
}
