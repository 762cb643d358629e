//! Cursor value type and advancement rule

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;

/// Per-symbol fetch watermark
///
/// Marks the earliest point in time not yet fetched for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor(DateTime<Utc>);

impl Cursor {
    /// Cursor positioned at `at`
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Timestamp the cursor points at
    pub fn at(&self) -> DateTime<Utc> {
        self.0
    }

    /// Cursor for the fetch following a page whose last record is at `last_record`
    ///
    /// The base is the later of the last record and the current cursor, so a
    /// page that makes no forward progress (or returns records older than the
    /// requested start) still moves the cursor forward by `step`.
    ///
    /// `step` must be positive for the result to be strictly greater than `self`.
    /// A result past the representable range saturates at the latest
    /// representable instant, which is at or after any end time.
    pub fn advance(&self, last_record: DateTime<Utc>, step: TimeDelta) -> Cursor {
        let base = last_record.max(self.0);
        Cursor(base.checked_add_signed(step).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }

    /// Whether the cursor has reached or passed `end`
    pub fn is_at_or_after(&self, end: DateTime<Utc>) -> bool {
        self.0 >= end
    }
}

impl From<DateTime<Utc>> for Cursor {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
