//! Persistence sinks
//!
//! A [`PersistenceSink`] durably appends pages of snapshots to a store
//! partitioned by symbol, and reports the newest exchange time stored for a
//! symbol so harvests can resume. Records are appended without deduplication.

use crate::OrderBookSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;

/// Sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// File lock could not be taken
    #[error("lock error: {0}")]
    LockError(String),

    /// Record serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Stored data could not be read back
    #[error("corrupt record in {path} at line {line}: {message}")]
    CorruptRecord {
        /// Store file
        path: String,
        /// 1-based line number
        line: usize,
        /// Parse error
        message: String,
    },

    /// Store refused the write
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Durable, symbol-partitioned snapshot store
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Append all `records` to the store of `symbol`, in order
    async fn append_many(&self, symbol: &str, records: &[OrderBookSnapshot]) -> SinkResult<()>;

    /// Newest exchange time stored for `symbol`, or `None` if nothing is stored
    async fn latest_timestamp(&self, symbol: &str) -> SinkResult<Option<DateTime<Utc>>>;
}
