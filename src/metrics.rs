//! Pipeline observability metrics
//!
//! Counters and gauges for the harvest pipeline, exported for Prometheus
//! scraping when a listener address is configured. Without an installed
//! exporter every recording call is a cheap no-op.
//!
//! ## Metrics
//!
//! - `pages_fetched_total{symbol}`, `fetch_duration_seconds{symbol}`
//! - `records_persisted_total{symbol}`
//! - `fetch_failures_total{symbol,kind}`
//! - `persist_failures_total{symbol}`
//! - `workers_finished_total{outcome}`
//! - `credentials_available`, `credentials_checked_out`, `credentials_cooling`

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::credentials::PoolSnapshot;
use crate::fetcher::FailureKind;

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: a second call is a no-op.
///
/// # Arguments
/// * `addr` - Socket address to bind Prometheus scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "pages_fetched_total",
        Unit::Count,
        "Pages successfully fetched from the upstream API"
    );

    describe_counter!(
        "records_persisted_total",
        Unit::Count,
        "Order book snapshots written to the store"
    );

    describe_histogram!(
        "fetch_duration_seconds",
        Unit::Seconds,
        "Duration of successful page fetches"
    );

    describe_counter!(
        "fetch_failures_total",
        Unit::Count,
        "Failed fetch attempts by failure kind"
    );

    describe_counter!(
        "persist_failures_total",
        Unit::Count,
        "Pages dropped because the store rejected them"
    );

    describe_counter!(
        "workers_finished_total",
        Unit::Count,
        "Symbol workers that reached a terminal state, by outcome"
    );

    describe_gauge!(
        "credentials_available",
        Unit::Count,
        "Credentials ready to be handed out"
    );

    describe_gauge!(
        "credentials_checked_out",
        Unit::Count,
        "Credentials held by workers"
    );

    describe_gauge!(
        "credentials_cooling",
        Unit::Count,
        "Credentials waiting out a failure cooldown"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Publish the credential pool counters
pub fn record_pool_state(snapshot: &PoolSnapshot) {
    gauge!("credentials_available").set(snapshot.available as f64);
    gauge!("credentials_checked_out").set(snapshot.checked_out as f64);
    gauge!("credentials_cooling").set(snapshot.cooling as f64);
}

/// Per-symbol worker metrics
pub struct WorkerMetrics {
    symbol: String,
    start_time: Instant,
}

impl WorkerMetrics {
    /// Start tracking a symbol worker
    pub fn start(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            start_time: Instant::now(),
        }
    }

    /// Record a fetched page and how long the fetch took
    pub fn record_page(&self, records: usize, fetch_started: Instant) {
        counter!("pages_fetched_total", "symbol" => self.symbol.clone()).increment(1);
        histogram!("fetch_duration_seconds", "symbol" => self.symbol.clone())
            .record(fetch_started.elapsed().as_secs_f64());
        debug!(symbol = %self.symbol, records, "Page fetched");
    }

    /// Record a failed fetch
    pub fn record_fetch_failure(&self, kind: FailureKind) {
        counter!(
            "fetch_failures_total",
            "symbol" => self.symbol.clone(),
            "kind" => kind.label(),
        )
        .increment(1);
    }

    /// Record records written to the store
    pub fn record_persisted(&self, records: usize) {
        counter!("records_persisted_total", "symbol" => self.symbol.clone())
            .increment(records as u64);
    }

    /// Record a page the store rejected
    pub fn record_persist_failure(&self) {
        counter!("persist_failures_total", "symbol" => self.symbol.clone()).increment(1);
    }

    /// Record the worker reaching a terminal state
    pub fn record_finished(&self, outcome: &'static str, records_persisted: u64) {
        counter!("workers_finished_total", "outcome" => outcome).increment(1);

        let duration = self.start_time.elapsed();
        if outcome == "resume_failed" {
            warn!(
                symbol = %self.symbol,
                outcome,
                duration_secs = duration.as_secs(),
                "Symbol worker failed"
            );
        } else {
            info!(
                symbol = %self.symbol,
                outcome,
                records_persisted,
                duration_secs = duration.as_secs(),
                "Symbol worker finished"
            );
        }
    }
}
