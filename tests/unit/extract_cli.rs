//! Unit tests for command line parsing

use clap::Parser;
use soda_extractor::cli::datasets::{list_datasets, render_listing};
use soda_extractor::cli::validate::{validate_dataset, validate_output, ValidateTarget};
use soda_extractor::cli::{Cli, Commands, Mode, OutputFormat};
use soda_extractor::registry::DatasetRegistry;

fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(std::iter::once("soda-extractor").chain(args.iter().copied()))
}

#[test]
fn test_extract_flags() {
    let cli = parse(&[
        "extract",
        "taxi",
        "--mode",
        "full",
        "--start-date",
        "2024-01-01",
        "--end-date",
        "2024-01-07",
        "--output-bucket",
        "/data/raw",
        "--concurrency",
        "8",
        "--max-retries",
        "5",
        "--retry-delay-secs",
        "2",
        "--page-size",
        "1000",
        "--allow-empty",
        "--output-format",
        "json",
    ])
    .unwrap();

    assert_eq!(cli.output_format, OutputFormat::Json);
    let Commands::Extract(args) = cli.command else {
        panic!("expected extract command");
    };
    assert_eq!(args.dataset, "taxi");
    assert_eq!(args.mode, Mode::Full);
    assert_eq!(args.start_date.as_deref(), Some("2024-01-01"));
    assert_eq!(args.output_bucket, "/data/raw");
    assert!(args.allow_empty);

    let config = args.engine_config();
    assert_eq!(config.concurrency, 8);
    assert_eq!(config.page_size, 1000);
    assert_eq!(config.retry.max_attempts, 5);
}

#[test]
fn test_extract_rejects_out_of_range_values() {
    let base = ["extract", "taxi", "--output-bucket", "/data/raw"];
    let with = |extra: &[&str]| {
        let args: Vec<&str> = base.iter().chain(extra.iter()).copied().collect();
        parse(&args)
    };

    assert!(with(&["--concurrency", "0"]).is_err());
    assert!(with(&["--concurrency", "33"]).is_err());
    assert!(with(&["--max-retries", "0"]).is_err());
    assert!(with(&["--max-retries", "21"]).is_err());
    assert!(with(&["--page-size", "0"]).is_err());
    assert!(with(&["--mode", "weekly"]).is_err());
    assert!(with(&["--concurrency", "32"]).is_ok());
}

#[test]
fn test_validate_subcommands_parse() {
    let cli = parse(&["validate", "dataset", "tnp", "--date", "2024-01-15"]).unwrap();
    match cli.command {
        Commands::Validate(cmd) => match cmd.target {
            ValidateTarget::Dataset { name, date } => {
                assert_eq!(name, "tnp");
                assert_eq!(date.as_deref(), Some("2024-01-15"));
            }
            other => panic!("unexpected target: {other:?}"),
        },
        other => panic!("unexpected command: {other:?}"),
    }

    assert!(parse(&["datasets", "list", "t*"]).is_ok());
    assert!(parse(&["datasets", "list"]).is_ok());
}

#[test]
fn test_datasets_listing_json() {
    let registry = DatasetRegistry::load_embedded().unwrap();
    let listing = list_datasets(&registry, Some("t*")).unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0]["name"], "taxi");
    assert_eq!(listing[1]["filter"]["kind"], "date_trunc");

    let rendered = render_listing(&listing, OutputFormat::Json).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 2);
}

#[test]
fn test_validate_reports() {
    let registry = DatasetRegistry::load_embedded().unwrap();
    let report = validate_dataset(&registry, "covid", Some("2024-01-07")).unwrap();
    assert_eq!(report["dataset"], "covid19");
    assert_eq!(report["where"], "week_start='2024-01-07T00:00:00'");

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("data.json");
    std::fs::write(&file, "{\"zip\":\"60601\"}\n{\"zip\":\"60602\"}\n{\"zip\":\"60603\"}\n").unwrap();
    assert_eq!(validate_output(&file).unwrap()["records"], 3);
}
