//! In-process snapshot store
//!
//! Keeps every appended record in memory. Used for dry runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{PersistenceSink, SinkResult};
use crate::OrderBookSnapshot;

/// Memory-backed sink
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<HashMap<String, Vec<OrderBookSnapshot>>>,
}

impl MemorySink {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records` for `symbol`
    pub fn with_records(symbol: &str, records: Vec<OrderBookSnapshot>) -> Self {
        let sink = Self::new();
        sink.lock().insert(symbol.to_string(), records);
        sink
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<OrderBookSnapshot>>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of everything stored for `symbol`
    pub fn records(&self, symbol: &str) -> Vec<OrderBookSnapshot> {
        self.lock().get(symbol).cloned().unwrap_or_default()
    }

    /// Number of records stored for `symbol`
    pub fn len(&self, symbol: &str) -> usize {
        self.lock().get(symbol).map_or(0, Vec::len)
    }

    /// Whether nothing is stored for `symbol`
    pub fn is_empty(&self, symbol: &str) -> bool {
        self.len(symbol) == 0
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn append_many(&self, symbol: &str, records: &[OrderBookSnapshot]) -> SinkResult<()> {
        self.lock()
            .entry(symbol.to_string())
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }

    async fn latest_timestamp(&self, symbol: &str) -> SinkResult<Option<DateTime<Utc>>> {
        Ok(self
            .lock()
            .get(symbol)
            .and_then(|records| records.iter().map(|r| r.exchange_time).max()))
    }
}
