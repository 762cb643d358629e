//! JSON Lines snapshot store
//!
//! One file per symbol under a root directory, one snapshot per line:
//!
//! ```text
//! data/
//! ├── BINANCE_SPOT_BTC_USDT.jsonl
//! └── BINANCE_SPOT_MKR_USDT.jsonl
//! ```
//!
//! Appends take an exclusive advisory lock on the file (fd-lock) and are
//! fsynced before returning. All file IO runs on the blocking thread pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{PersistenceSink, SinkError, SinkResult};
use crate::OrderBookSnapshot;

/// File-backed store writing `{root}/{symbol}.jsonl`
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    root: PathBuf,
}

impl JsonLinesSink {
    /// Store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the records of `symbol`
    ///
    /// Bytes outside `[A-Za-z0-9_-]` are written as `%XX`, so distinct
    /// symbols always land in distinct files.
    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.root.join(format!("{}.jsonl", encode_symbol(symbol)))
    }
}

fn encode_symbol(symbol: &str) -> String {
    let mut encoded = String::with_capacity(symbol.len());
    for byte in symbol.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

fn append_lines(path: &Path, lines: &[u8]) -> SinkResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SinkError::IoError(e.to_string()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SinkError::IoError(format!("Failed to open {}: {e}", path.display())))?;

    let mut lock = RwLock::new(file);
    let mut guard = lock
        .write()
        .map_err(|e| SinkError::LockError(format!("Failed to lock {}: {e}", path.display())))?;

    guard
        .write_all(lines)
        .map_err(|e| SinkError::IoError(e.to_string()))?;
    guard
        .sync_data()
        .map_err(|e| SinkError::IoError(e.to_string()))?;

    Ok(())
}

fn scan_latest(path: &Path) -> SinkResult<Option<DateTime<Utc>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(SinkError::IoError(format!(
                "Failed to open {}: {e}",
                path.display()
            )))
        }
    };

    let mut latest: Option<DateTime<Utc>> = None;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| SinkError::IoError(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }

        let record: OrderBookSnapshot =
            serde_json::from_str(&line).map_err(|e| SinkError::CorruptRecord {
                path: path.display().to_string(),
                line: index + 1,
                message: e.to_string(),
            })?;

        latest = Some(match latest {
            Some(current) => current.max(record.exchange_time),
            None => record.exchange_time,
        });
    }

    Ok(latest)
}

#[async_trait]
impl PersistenceSink for JsonLinesSink {
    async fn append_many(&self, symbol: &str, records: &[OrderBookSnapshot]) -> SinkResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buffer = Vec::with_capacity(records.len() * 256);
        for record in records {
            serde_json::to_writer(&mut buffer, record)
                .map_err(|e| SinkError::SerializationError(e.to_string()))?;
            buffer.push(b'\n');
        }

        let path = self.path_for(symbol);
        let count = records.len();
        let target = path.clone();
        tokio::task::spawn_blocking(move || append_lines(&target, &buffer))
            .await
            .map_err(|e| SinkError::IoError(format!("Append task failed: {e}")))??;

        debug!(symbol = %symbol, records = count, path = %path.display(), "Appended records");
        Ok(())
    }

    async fn latest_timestamp(&self, symbol: &str) -> SinkResult<Option<DateTime<Utc>>> {
        let path = self.path_for(symbol);
        tokio::task::spawn_blocking(move || scan_latest(&path))
            .await
            .map_err(|e| SinkError::IoError(format!("Scan task failed: {e}")))?
    }
}
