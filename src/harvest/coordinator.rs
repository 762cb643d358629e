//! Harvest coordinator
//!
//! Spawns one [`SymbolWorker`] per symbol and waits for all of them. Workers
//! are independent: one symbol failing, timing out or panicking never cancels
//! another. The coordinator also turns a shutdown request into a closed
//! credential pool so workers blocked on a credential wake up.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::HarvestSettings;
use super::worker::{SymbolWorker, WorkerContext, WorkerReport};
use crate::credentials::SharedPool;
use crate::failure_log::FailureLog;
use crate::fetcher::PageFetcher;
use crate::shutdown::SharedShutdown;
use crate::sink::PersistenceSink;

/// Result of a harvest run
#[derive(Debug, Clone, Default)]
pub struct HarvestSummary {
    reports: Vec<WorkerReport>,
    panicked: Vec<String>,
}

impl HarvestSummary {
    /// Reports of every worker that terminated normally, in symbol order
    pub fn reports(&self) -> &[WorkerReport] {
        &self.reports
    }

    /// Report for `symbol`, if its worker terminated normally
    pub fn report(&self, symbol: &str) -> Option<&WorkerReport> {
        self.reports.iter().find(|r| r.symbol == symbol)
    }

    /// Symbols whose worker task panicked
    pub fn panicked(&self) -> &[String] {
        &self.panicked
    }

    /// Number of workers per outcome label
    pub fn tally(&self) -> BTreeMap<&'static str, usize> {
        let mut tally = BTreeMap::new();
        for report in &self.reports {
            *tally.entry(report.outcome.label()).or_insert(0) += 1;
        }
        if !self.panicked.is_empty() {
            tally.insert("panicked", self.panicked.len());
        }
        tally
    }

    /// Snapshots persisted across all symbols
    pub fn total_records(&self) -> u64 {
        self.reports.iter().map(|r| r.records_persisted).sum()
    }

    /// Whether every symbol caught up or reached the end time
    pub fn is_complete(&self) -> bool {
        self.panicked.is_empty() && self.reports.iter().all(|r| r.outcome.is_complete())
    }
}

/// Runs one worker per symbol over a shared credential pool
pub struct HarvestCoordinator {
    ctx: WorkerContext,
}

impl HarvestCoordinator {
    /// Create a coordinator
    pub fn new(
        settings: HarvestSettings,
        pool: SharedPool,
        fetcher: Arc<dyn PageFetcher>,
        sink: Arc<dyn PersistenceSink>,
        failure_log: Arc<FailureLog>,
        shutdown: SharedShutdown,
    ) -> Self {
        Self {
            ctx: WorkerContext {
                settings: Arc::new(settings),
                pool,
                fetcher,
                sink,
                failure_log,
                shutdown,
            },
        }
    }

    /// Harvest every symbol and wait for all workers to finish
    ///
    /// Duplicate symbols are harvested once. The credential pool is closed
    /// when this returns, which cancels any pending cooldowns.
    pub async fn run(&self, symbols: &[String]) -> HarvestSummary {
        let mut seen: HashSet<&str> = HashSet::with_capacity(symbols.len());
        let mut unique: Vec<&String> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if seen.insert(symbol.as_str()) {
                unique.push(symbol);
            } else {
                warn!(symbol = %symbol, "Duplicate symbol ignored");
            }
        }
        let symbols = unique;

        let snapshot = self.ctx.pool.snapshot();
        info!(
            symbols = symbols.len(),
            credentials = snapshot.available,
            start = %self.ctx.settings.default_start,
            end = %self.ctx.settings.end_time,
            "Starting harvest"
        );

        let watcher = {
            let shutdown = self.ctx.shutdown.clone();
            let pool = self.ctx.pool.clone();
            tokio::spawn(async move {
                shutdown.wait_for_shutdown().await;
                warn!("Shutdown requested, closing credential pool");
                pool.close();
            })
        };

        let handles: Vec<(String, JoinHandle<WorkerReport>)> = symbols
            .into_iter()
            .map(|symbol| {
                let worker = SymbolWorker::new(symbol.clone(), self.ctx.clone());
                (symbol.clone(), tokio::spawn(worker.run()))
            })
            .collect();

        let mut summary = HarvestSummary::default();
        for (symbol, handle) in handles {
            match handle.await {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "Symbol worker task failed");
                    summary.panicked.push(symbol);
                }
            }
        }

        watcher.abort();
        self.ctx.pool.close();

        info!(
            records = summary.total_records(),
            outcomes = ?summary.tally(),
            "Harvest finished"
        );
        summary
    }
}
