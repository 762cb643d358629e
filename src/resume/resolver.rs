//! Resume-cursor resolver
//!
//! Derives the starting cursor of a symbol from the persistence sink. The
//! newest stored exchange time wins; only an empty store falls back to the
//! configured default start.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use super::Cursor;
use crate::sink::{PersistenceSink, SinkError};

/// Resume errors
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// The sink could not report the newest stored record
    #[error("failed to read latest stored timestamp for {symbol}: {source}")]
    SinkQuery {
        /// Symbol being resolved
        symbol: String,
        /// Underlying sink error
        #[source]
        source: SinkError,
    },
}

/// Resolves the starting cursor of each symbol from stored data
pub struct CursorResolver {
    sink: Arc<dyn PersistenceSink>,
    default_start: DateTime<Utc>,
}

impl CursorResolver {
    /// Create a resolver over `sink` falling back to `default_start`
    pub fn new(sink: Arc<dyn PersistenceSink>, default_start: DateTime<Utc>) -> Self {
        Self {
            sink,
            default_start,
        }
    }

    /// Cursor from which fetching of `symbol` should continue
    ///
    /// A sink failure is returned as an error rather than guessed around:
    /// falling back to the default start could silently skip or duplicate data.
    pub async fn resolve(&self, symbol: &str) -> Result<Cursor, ResumeError> {
        let latest = self
            .sink
            .latest_timestamp(symbol)
            .await
            .map_err(|source| ResumeError::SinkQuery {
                symbol: symbol.to_string(),
                source,
            })?;

        match latest {
            Some(at) => {
                info!(symbol = %symbol, cursor = %at, "Resuming from latest stored record");
                Ok(Cursor::new(at))
            }
            None => {
                info!(
                    symbol = %symbol,
                    cursor = %self.default_start,
                    "No stored records, starting from default start"
                );
                Ok(Cursor::new(self.default_start))
            }
        }
    }
}
