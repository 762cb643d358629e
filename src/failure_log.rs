//! Append-only failure audit log
//!
//! Every failed fetch is recorded as one tab-separated line:
//!
//! ```text
//! 2024-01-01T00:00:00.000Z	credential=KEY	kind=rate_limit	error=rate limit exceeded: ...
//! ```
//!
//! The full key is written so operators can act on it. The harvest never reads
//! this file back, and a failed write only produces a warning. Writes run on
//! the blocking thread pool.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::warn;

use crate::credentials::Credential;
use crate::fetcher::FetcherError;

/// Failure log writer
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    write_lock: Mutex<()>,
    written: AtomicU64,
}

impl FailureLog {
    /// Log appending to `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            written: AtomicU64::new(0),
        }
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records successfully written by this process
    pub fn records_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Append a record for a failed fetch
    pub async fn record(&self, credential: &Credential, error: &FetcherError) {
        self.record_at(Utc::now(), credential, error).await;
    }

    /// Append a record with an explicit timestamp
    pub async fn record_at(
        &self,
        at: DateTime<Utc>,
        credential: &Credential,
        error: &FetcherError,
    ) {
        let line = format_line(at, credential, error);

        // Serialise writers so concurrent lines never interleave
        let _guard = self.write_lock.lock().await;

        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || append_line(&path, &line))
            .await
            .map_err(|e| std::io::Error::other(format!("Write task failed: {e}")))
            .and_then(|written| written);

        match result {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    credential = %credential,
                    error = %e,
                    "Failed to write failure log record"
                );
            }
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

fn format_line(at: DateTime<Utc>, credential: &Credential, error: &FetcherError) -> String {
    // Tabs and newlines in upstream messages would break the line format
    let message: String = error
        .to_string()
        .chars()
        .map(|c| if c == '\t' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect();

    format!(
        "{}\tcredential={}\tkind={}\terror={}\n",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        credential.expose(),
        error.kind(),
        message
    )
}
