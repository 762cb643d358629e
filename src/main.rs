//! Main entry point for the orderbook-harvester CLI

use clap::Parser;
use orderbook_harvester::cli::{Cli, Commands};
use orderbook_harvester::shutdown::ShutdownCoordinator;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("orderbook_harvester=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    // .env must be loaded before tracing and clap read the environment
    let dotenv = dotenvy::dotenv();

    init_tracing();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing current steps...");
                shutdown.request_shutdown();
            }
        }
    });

    let result = match cli.command {
        Commands::Harvest(ref cmd) => cmd
            .execute(&cli.config, shutdown.clone())
            .await
            .map(|_| ())
            .map_err(anyhow::Error::from),
        Commands::Probe(ref cmd) => cmd
            .execute(&cli.config)
            .await
            .map(|_| ())
            .map_err(anyhow::Error::from),
        Commands::Cursors(ref cmd) => cmd
            .execute(&cli.config)
            .await
            .map(|_| ())
            .map_err(anyhow::Error::from),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
