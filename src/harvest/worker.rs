//! Symbol worker state machine
//!
//! One worker drives one symbol through
//!
//! ```text
//! Idle → FetchingCredential → Fetching → Persisting → Advancing ─┐
//!              ↑                  │  ↑                           │
//!              │                  │  └──── same credential ──────┘
//!              └── Draining ←─────┘ (fetch failed)
//! ```
//!
//! until it catches up with the provider, reaches the end time, runs out of
//! credentials or is asked to shut down. Fetch, persist and advance are
//! strictly sequential within a symbol. The worker holds at most one
//! credential and always hands it back to the pool before it terminates.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::config::HarvestSettings;
use super::progress::ProgressState;
use crate::credentials::{Credential, PoolError, SharedPool};
use crate::failure_log::FailureLog;
use crate::fetcher::PageFetcher;
use crate::metrics::WorkerMetrics;
use crate::resume::{Cursor, CursorResolver};
use crate::shutdown::SharedShutdown;
use crate::sink::PersistenceSink;

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created, cursor not resolved yet
    Idle,
    /// Waiting on the credential pool
    FetchingCredential,
    /// Page request in flight
    Fetching,
    /// Writing a page to the sink
    Persisting,
    /// Moving the cursor past the page
    Advancing,
    /// Handing a failed credential back for cooldown
    Draining,
    /// Terminal
    Done,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FetchingCredential => "fetching_credential",
            Self::Fetching => "fetching",
            Self::Persisting => "persisting",
            Self::Advancing => "advancing",
            Self::Draining => "draining",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why a worker reached [`WorkerState::Done`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The provider returned an empty page: nothing newer is available
    CaughtUp,
    /// The cursor reached the configured end time
    ReachedEnd,
    /// The credential pool was closed while waiting for a credential
    NoCredentials,
    /// No credential arrived within the configured wait timeout
    CredentialWaitTimedOut,
    /// Shutdown was requested
    ShutdownRequested,
    /// The resume cursor could not be determined
    ResumeFailed(String),
}

impl WorkerOutcome {
    /// Short stable label used in metrics and summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::CaughtUp => "caught_up",
            Self::ReachedEnd => "reached_end",
            Self::NoCredentials => "no_credentials",
            Self::CredentialWaitTimedOut => "credential_wait_timed_out",
            Self::ShutdownRequested => "shutdown_requested",
            Self::ResumeFailed(_) => "resume_failed",
        }
    }

    /// Whether the symbol's data is complete up to the provider or end time
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::CaughtUp | Self::ReachedEnd)
    }
}

impl fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResumeFailed(reason) => write!(f, "resume_failed: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Final account of one worker
#[derive(Debug, Clone)]
pub struct WorkerReport {
    /// Symbol the worker harvested
    pub symbol: String,
    /// Terminal outcome
    pub outcome: WorkerOutcome,
    /// Non-empty pages fetched
    pub pages_fetched: u64,
    /// Snapshots written to the sink
    pub records_persisted: u64,
    /// Failed fetch attempts
    pub fetch_failures: u64,
    /// Pages the sink rejected
    pub persist_failures: u64,
    /// Cursor at termination, `None` if it was never resolved
    pub final_cursor: Option<Cursor>,
}

impl WorkerReport {
    fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            outcome: WorkerOutcome::CaughtUp,
            pages_fetched: 0,
            records_persisted: 0,
            fetch_failures: 0,
            persist_failures: 0,
            final_cursor: None,
        }
    }
}

/// Collaborators shared by all workers of a harvest
#[derive(Clone)]
pub struct WorkerContext {
    /// Harvest settings
    pub settings: Arc<HarvestSettings>,
    /// Shared credential pool
    pub pool: SharedPool,
    /// Page source
    pub fetcher: Arc<dyn PageFetcher>,
    /// Page store
    pub sink: Arc<dyn PersistenceSink>,
    /// Failure audit log
    pub failure_log: Arc<FailureLog>,
    /// Shutdown signal
    pub shutdown: SharedShutdown,
}

/// Harvests one symbol
pub struct SymbolWorker {
    symbol: String,
    ctx: WorkerContext,
    state: WorkerState,
    metrics: WorkerMetrics,
}

impl SymbolWorker {
    /// Create an idle worker for `symbol`
    pub fn new(symbol: impl Into<String>, ctx: WorkerContext) -> Self {
        let symbol = symbol.into();
        let metrics = WorkerMetrics::start(symbol.clone());
        Self {
            symbol,
            ctx,
            state: WorkerState::Idle,
            metrics,
        }
    }

    /// Run to completion
    pub async fn run(mut self) -> WorkerReport {
        let span = info_span!("symbol_worker", symbol = %self.symbol);
        async move {
            let mut report = WorkerReport::new(&self.symbol);
            let outcome = self.drive(&mut report).await;
            report.outcome = outcome;
            self.transition(WorkerState::Done);
            self.metrics
                .record_finished(report.outcome.label(), report.records_persisted);
            report
        }
        .instrument(span)
        .await
    }

    fn transition(&mut self, next: WorkerState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Worker state change");
            self.state = next;
        }
    }

    async fn drive(&mut self, report: &mut WorkerReport) -> WorkerOutcome {
        let settings = self.ctx.settings.clone();
        let resolver = CursorResolver::new(self.ctx.sink.clone(), settings.default_start);

        let mut cursor = match resolver.resolve(&self.symbol).await {
            Ok(cursor) => cursor,
            Err(e) => {
                error!(error = %e, "Cannot determine resume cursor, abandoning symbol");
                return WorkerOutcome::ResumeFailed(e.to_string());
            }
        };
        report.final_cursor = Some(cursor);

        if cursor.is_at_or_after(settings.end_time) {
            info!(cursor = %cursor, end = %settings.end_time, "Stored data already reaches end time");
            return WorkerOutcome::ReachedEnd;
        }

        let mut progress = ProgressState::new(cursor.at(), settings.end_time);
        let mut held: Option<Credential> = None;

        loop {
            let credential = match held.take() {
                Some(credential) => credential,
                None => {
                    self.transition(WorkerState::FetchingCredential);
                    match self.acquire().await {
                        Ok(credential) => credential,
                        Err(outcome) => return outcome,
                    }
                }
            };

            if self.ctx.shutdown.is_shutdown_requested() {
                self.release(credential, Duration::ZERO);
                return WorkerOutcome::ShutdownRequested;
            }

            self.transition(WorkerState::Fetching);
            let fetch_started = Instant::now();
            let page = match self
                .ctx
                .fetcher
                .fetch(&self.symbol, cursor.at(), &credential, settings.page_limit)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    let kind = e.kind();
                    report.fetch_failures += 1;
                    self.metrics.record_fetch_failure(kind);
                    warn!(
                        cursor = %cursor,
                        credential = %credential,
                        kind = %kind,
                        reason = kind.description(),
                        credential_issue = kind.is_credential_related(),
                        error = %e,
                        cooldown_secs = settings.failure_cooldown.as_secs(),
                        "Fetch failed, rotating credential"
                    );
                    self.ctx.failure_log.record(&credential, &e).await;

                    self.transition(WorkerState::Draining);
                    self.release(credential, settings.failure_cooldown);

                    if self.ctx.shutdown.is_shutdown_requested() {
                        return WorkerOutcome::ShutdownRequested;
                    }
                    continue;
                }
            };

            let Some(latest) = page.iter().max_by_key(|s| s.exchange_time) else {
                info!(cursor = %cursor, "Empty page, symbol is caught up");
                self.release(credential, Duration::ZERO);
                return WorkerOutcome::CaughtUp;
            };

            let last_time = latest.exchange_time;
            debug!(
                exchange_time = %last_time,
                best_ask = ?latest.best_ask().map(|level| level.price),
                best_bid = ?latest.best_bid().map(|level| level.price),
                "Page top of book"
            );
            report.pages_fetched += 1;
            self.metrics.record_page(page.len(), fetch_started);

            self.transition(WorkerState::Persisting);
            let persisted = match self.ctx.sink.append_many(&self.symbol, &page).await {
                Ok(()) => {
                    report.records_persisted += page.len() as u64;
                    self.metrics.record_persisted(page.len());
                    page.len() as u64
                }
                Err(e) => {
                    report.persist_failures += 1;
                    self.metrics.record_persist_failure();
                    error!(
                        cursor = %cursor,
                        records = page.len(),
                        error = %e,
                        "Failed to persist page, dropping it"
                    );
                    0
                }
            };

            self.transition(WorkerState::Advancing);
            let next = cursor.advance(last_time, settings.step);
            debug!(from = %cursor, to = %next, records = page.len(), "Cursor advanced");
            cursor = next;
            report.final_cursor = Some(cursor);

            progress.update(persisted, cursor.at());
            if progress.should_emit_update() {
                info!("{}", progress.format_progress(&self.symbol));
                progress.mark_emitted();
            }

            if cursor.is_at_or_after(settings.end_time) {
                info!(cursor = %cursor, "Reached end time");
                self.release(credential, Duration::ZERO);
                return WorkerOutcome::ReachedEnd;
            }

            if !self.ctx.shutdown.sleep(settings.request_delay).await {
                self.release(credential, Duration::ZERO);
                return WorkerOutcome::ShutdownRequested;
            }

            held = Some(credential);
        }
    }

    async fn acquire(&self) -> Result<Credential, WorkerOutcome> {
        if self.ctx.shutdown.is_shutdown_requested() {
            return Err(WorkerOutcome::ShutdownRequested);
        }

        let wait = async {
            match self.ctx.settings.credential_wait_timeout {
                Some(timeout) => self.ctx.pool.acquire_timeout(timeout).await,
                None => self.ctx.pool.acquire().await,
            }
        };

        tokio::select! {
            result = wait => match result {
                Ok(credential) => {
                    debug!(credential = %credential, "Credential acquired");
                    Ok(credential)
                }
                Err(PoolError::TimedOut(timeout)) => {
                    warn!(
                        timeout_secs = timeout.as_secs(),
                        "No credential became available in time, giving up on symbol"
                    );
                    Err(WorkerOutcome::CredentialWaitTimedOut)
                }
                Err(_) if self.ctx.shutdown.is_shutdown_requested() => {
                    Err(WorkerOutcome::ShutdownRequested)
                }
                Err(e) => {
                    warn!(error = %e, "No credentials available, giving up on symbol");
                    Err(WorkerOutcome::NoCredentials)
                }
            },
            _ = self.ctx.shutdown.wait_for_shutdown() => Err(WorkerOutcome::ShutdownRequested),
        }
    }

    fn release(&self, credential: Credential, delay: Duration) {
        if let Err(e) = self.ctx.pool.release(credential, delay) {
            error!(error = %e, "Credential release rejected by pool");
        }
    }
}
