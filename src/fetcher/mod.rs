//! Page fetchers
//!
//! A [`PageFetcher`] returns one bounded, time-ordered page of order book
//! snapshots for a symbol starting at a given time, authorised by a single
//! credential. The harvest workers only ever talk to this trait.

use crate::credentials::Credential;
use crate::Page;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod coinapi;
pub mod coinapi_config;
pub mod coinapi_http;
pub mod coinapi_parser;
pub mod failure_kind;
pub mod shared_resources;

pub use failure_kind::FailureKind;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// HTTP 429 from the upstream API
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Credential rejected (401/403)
    #[error("authentication failed ({status}): {message}")]
    AuthFailed {
        /// HTTP status code
        status: u16,
        /// Upstream message
        message: String,
    },

    /// Upstream 5xx
    #[error("server error ({status}): {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Upstream message
        message: String,
    },

    /// Any other API error response
    #[error("API error ({status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Upstream message
        message: String,
    },

    /// Transport-level failure (connect, timeout, reset)
    #[error("network error: {0}")]
    NetworkError(String),

    /// Response parse error
    #[error("parse error: {0}")]
    ParseError(String),

    /// Response was well-formed but violated an invariant
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl FetcherError {
    /// Classify this error for logging and metrics
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimitExceeded(_) => FailureKind::RateLimit,
            Self::AuthFailed { status, .. } => FailureKind::AuthFailed(*status),
            Self::ServerError { status, .. } => FailureKind::ServerError(*status),
            Self::ApiError { status, .. } => FailureKind::InvalidRequest(*status),
            Self::NetworkError(_) => FailureKind::Network,
            Self::ParseError(_) | Self::InvalidResponse(_) => FailureKind::Parse,
        }
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Source of historical order book pages
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page of snapshots
    ///
    /// # Arguments
    /// * `symbol` - Provider symbol id (e.g., "BINANCE_SPOT_BTC_USDT")
    /// * `since` - Inclusive start of the requested window
    /// * `credential` - API credential authorising the call
    /// * `limit` - Maximum number of snapshots in the page
    ///
    /// # Returns
    /// Snapshots ordered by exchange time. An empty page means the provider has
    /// nothing at or after `since`.
    async fn fetch(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
        credential: &Credential,
        limit: u32,
    ) -> FetcherResult<Page>;
}
