//! Extract one day of the taxi dataset
//!
//! Run with:
//! ```bash
//! cargo run --example extract_taxi_day -- 2024-01-15
//! ```
//!
//! `SOCRATA_KEY_ID` / `SOCRATA_KEY_SECRET` are used when set.

use anyhow::Context;
use chrono::NaiveDate;
use soda_extractor::credentials::{CredentialProvider, EnvCredentialProvider};
use soda_extractor::extractor::{EngineConfig, ExtractionEngine};
use soda_extractor::fetcher::query::{DateWindow, QueryBuilder};
use soda_extractor::registry::DatasetRegistry;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("soda_extractor=info")),
        )
        .init();

    let day = match std::env::args().nth(1) {
        Some(arg) => NaiveDate::parse_from_str(&arg, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{arg}', expected YYYY-MM-DD"))?,
        None => NaiveDate::from_ymd_opt(2024, 1, 15).context("invalid default date")?,
    };

    let registry = DatasetRegistry::load_embedded()?;
    let dataset = registry.get("taxi")?;
    let credentials = EnvCredentialProvider::default().credentials().await?;

    let config = EngineConfig::default();
    let query = QueryBuilder::for_dataset(dataset, config.page_size)?;
    let engine = ExtractionEngine::with_http(query, credentials, config)?.with_label("taxi");

    let extraction = engine.run(&DateWindow::single(day)).await?;

    println!("\n=== {day} ===");
    println!("Records: {}", extraction.stats.records);
    println!("Pages:   {}", extraction.stats.pages);
    println!("Offsets: {}", extraction.stats.offsets_issued.len());
    println!("Elapsed: {:.1}s", extraction.stats.elapsed.as_secs_f64());
    Ok(())
}
