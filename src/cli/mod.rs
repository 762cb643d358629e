//! CLI command implementations

use clap::{Parser, Subcommand};

use crate::config::ConfigArgs;

pub mod cursors;
pub mod error;
pub mod harvest;
pub mod probe;

pub use cursors::CursorsCommand;
pub use error::CliError;
pub use harvest::HarvestCommand;
pub use probe::ProbeCommand;

/// Order book harvester CLI
#[derive(Parser, Debug)]
#[command(name = "orderbook-harvester")]
#[command(
    about = "Harvest historical order book snapshots with rotating API credentials",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Settings shared by every command
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Harvest order book history for the configured symbols
    Harvest(HarvestCommand),

    /// Probe the configured credentials and report which ones work
    Probe(ProbeCommand),

    /// Show the cursor each symbol would resume from
    Cursors(CursorsCommand),
}

/// Output format for report-style commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
}
