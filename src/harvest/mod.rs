//! Harvest orchestration
//!
//! The harvest runs one [`SymbolWorker`] per symbol. Each worker resolves its
//! resume cursor, then loops fetch → persist → advance, borrowing credentials
//! from the shared pool and cooling them down when a fetch fails.
//!
//! # Components
//!
//! - [`config`] - Tuning constants and [`HarvestSettings`]
//! - [`worker`] - The per-symbol state machine
//! - [`coordinator`] - Spawns workers and collects their reports
//! - [`progress`] - Timeline-based progress reporting
//!
//! # Error Handling
//!
//! Failures are handled inside the worker that hit them:
//! - Fetch failures cool the credential down and retry the same cursor
//! - Persist failures drop the page and still advance
//! - Resume failures end only the affected symbol

pub mod config;
pub mod coordinator;
pub mod progress;
pub mod worker;

pub use config::HarvestSettings;
pub use coordinator::{HarvestCoordinator, HarvestSummary};
pub use worker::{SymbolWorker, WorkerContext, WorkerOutcome, WorkerReport, WorkerState};

/// Harvest errors
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Settings cannot drive a harvest
    #[error("invalid harvest settings: {0}")]
    InvalidSettings(String),
}
