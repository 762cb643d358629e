//! # Order Book Harvester Library
//!
//! Continuously harvests historical order-book snapshots for a configured set of
//! symbols from a rate-limited, paginated market-data API and persists them,
//! resuming from the last stored point after an interruption.
//!
//! ## Features
//!
//! - **Credential Rotation**: A shared pool hands out API keys and cools down keys that failed
//! - **Resumable**: Each symbol resumes from the newest record already persisted
//! - **Concurrent**: One worker per symbol, independent of each other
//! - **Exact Decimals**: Prices and sizes are carried as [`Decimal`], never floating point
//! - **Graceful Shutdown**: Ctrl+C lets every worker finish its current step
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::{TimeZone, Utc};
//! use orderbook_harvester::credentials::{Credential, CredentialPool};
//! use orderbook_harvester::failure_log::FailureLog;
//! use orderbook_harvester::fetcher::coinapi::CoinApiFetcher;
//! use orderbook_harvester::harvest::{HarvestCoordinator, HarvestSettings};
//! use orderbook_harvester::shutdown::ShutdownCoordinator;
//! use orderbook_harvester::sink::jsonl::JsonLinesSink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = HarvestSettings::new(
//!     Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
//!     Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
//! );
//! let pool = CredentialPool::shared(vec![Credential::new("my-api-key")]);
//!
//! let coordinator = HarvestCoordinator::new(
//!     settings,
//!     pool,
//!     Arc::new(CoinApiFetcher::new()?),
//!     Arc::new(JsonLinesSink::new("./data")),
//!     Arc::new(FailureLog::new("api_errors.log")),
//!     ShutdownCoordinator::shared(),
//! );
//! let summary = coordinator.run(&["BINANCE_SPOT_BTC_USDT".to_string()]).await;
//! println!("{} symbols finished", summary.reports().len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`credentials`] - Credential pool, credential file loading and startup probing
//! - [`resume`] - Resume cursors and the resolver that derives them from stored data
//! - [`fetcher`] - Page fetcher abstraction and the CoinAPI REST implementation
//! - [`sink`] - Persistence sink abstraction and the JSON Lines store
//! - [`harvest`] - Symbol worker state machine and the coordinator that runs them
//! - [`failure_log`] - Append-only audit log of failed fetches

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Configuration surface assembled from flags, environment and `.env`
pub mod config;

/// Credential pool, source loading and probing
pub mod credentials;

/// Append-only failure audit log
pub mod failure_log;

/// Page fetchers
pub mod fetcher;

/// Harvest orchestration
pub mod harvest;

/// Prometheus metrics
pub mod metrics;

/// Resume cursors
pub mod resume;

/// Graceful shutdown coordination shared across workers
pub mod shutdown;

/// Persistence sinks
pub mod sink;

/// One page returned by a single fetch call, ordered by exchange time.
pub type Page = Vec<OrderBookSnapshot>;

/// A single price level of an order book side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceLevel {
    /// Level price
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    /// Quantity resting at this price
    #[serde(with = "rust_decimal::serde::str")]
    pub size: Decimal,
}

impl PriceLevel {
    /// Create a price level
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Historical order book snapshot for one symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBookSnapshot {
    /// Provider symbol identifier (e.g., "BINANCE_SPOT_BTC_USDT")
    pub symbol_id: String,
    /// Time the exchange produced the snapshot
    pub exchange_time: DateTime<Utc>,
    /// Time the data provider received the snapshot
    pub provider_time: DateTime<Utc>,
    /// Ask levels, best first
    pub asks: Vec<PriceLevel>,
    /// Bid levels, best first
    pub bids: Vec<PriceLevel>,
}

impl OrderBookSnapshot {
    /// Validate snapshot data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol_id.is_empty() {
            return Err("Symbol id cannot be empty".to_string());
        }

        for (side, levels) in [("ask", &self.asks), ("bid", &self.bids)] {
            for level in levels {
                if level.price <= Decimal::ZERO {
                    return Err(format!(
                        "{side} price must be positive, got {}",
                        level.price
                    ));
                }
                if level.size < Decimal::ZERO {
                    return Err(format!(
                        "{side} size must be non-negative, got {}",
                        level.size
                    ));
                }
            }
        }

        Ok(())
    }

    /// Best (lowest) ask, if any
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.iter().min_by(|a, b| a.price.cmp(&b.price))
    }

    /// Best (highest) bid, if any
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.iter().max_by(|a, b| a.price.cmp(&b.price))
    }
}
