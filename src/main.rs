//! Main entry point for the soda-extractor CLI

use clap::Parser;
use soda_extractor::cli::{load_registry, Cli, Commands};
use soda_extractor::metrics;
use soda_extractor::shutdown::{self, ShutdownCoordinator};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("soda_extractor=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    if let Some(addr) = cli.metrics_addr {
        metrics::init_metrics(addr)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    // Install global shutdown coordinator and Ctrl+C handler
    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing in-flight pages, nothing will be written");
                shutdown.request_shutdown();
            }
        }
    });

    match &cli.command {
        Commands::Extract(args) => args.execute(cli, shutdown).await?,
        Commands::Datasets(cmd) => {
            let registry = load_registry(cli.registry.as_deref())?;
            cmd.execute(&registry, cli.output_format)?
        }
        Commands::Validate(cmd) => {
            let registry = load_registry(cli.registry.as_deref())?;
            cmd.execute(&registry, cli.output_format)?
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
