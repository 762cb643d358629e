//! Harvest command implementation

use clap::Args;
use std::sync::Arc;
use tracing::info;

use super::probe::{build_fetcher, prepare_credentials};
use super::CliError;
use crate::config::ConfigArgs;
use crate::credentials::CredentialPool;
use crate::failure_log::FailureLog;
use crate::harvest::{HarvestCoordinator, HarvestSummary};
use crate::metrics::init_metrics;
use crate::shutdown::SharedShutdown;
use crate::sink::JsonLinesSink;

/// Harvest subcommand
#[derive(Debug, Args)]
pub struct HarvestCommand {}

impl HarvestCommand {
    /// Execute the harvest command
    ///
    /// Returns once every symbol worker has terminated. Individual symbols
    /// failing do not make the command fail; only a harvest that cannot start
    /// (bad configuration, no usable credentials) does.
    pub async fn execute(
        &self,
        config: &ConfigArgs,
        shutdown: SharedShutdown,
    ) -> Result<HarvestSummary, CliError> {
        let resolved = config.resolve()?;
        let settings = resolved.settings();
        settings.validate()?;

        if let Some(addr) = resolved.metrics_addr {
            init_metrics(addr)
                .await
                .map_err(|e| CliError::Metrics(e.to_string()))?;
        }

        let fetcher = build_fetcher(config)?;
        let credentials = prepare_credentials(config, fetcher.as_ref(), resolved.end).await?;
        let pool = CredentialPool::shared(credentials);

        info!(
            symbols = ?resolved.symbols,
            data_dir = %resolved.data_dir.display(),
            failure_log = %resolved.failure_log.display(),
            "Harvest configured"
        );

        let coordinator = HarvestCoordinator::new(
            settings,
            pool,
            fetcher,
            Arc::new(JsonLinesSink::new(resolved.data_dir.clone())),
            Arc::new(FailureLog::new(resolved.failure_log.clone())),
            shutdown,
        );
        let summary = coordinator.run(&resolved.symbols).await;

        for report in summary.reports() {
            println!(
                "{:<32} {:<26} pages={} records={} fetch_failures={} persist_failures={}",
                report.symbol,
                report.outcome.to_string(),
                report.pages_fetched,
                report.records_persisted,
                report.fetch_failures,
                report.persist_failures
            );
        }
        for symbol in summary.panicked() {
            println!("{symbol:<32} panicked");
        }

        Ok(summary)
    }
}
