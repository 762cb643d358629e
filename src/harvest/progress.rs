//! Per-symbol progress reporting.
//!
//! Progress is measured along the harvest timeline: the share of
//! `[start, end)` the cursor has already covered. Updates are emitted on a
//! percentage jump or after a quiet interval, whichever comes first.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_PERCENTAGE_STEP: f64 = 10.0;

/// Progress state of one symbol worker.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Snapshots persisted so far.
    pub records_persisted: u64,
    /// Pages fetched so far.
    pub pages_fetched: u64,
    /// When the worker started.
    pub start_time: Instant,
    /// Last time progress was reported.
    pub last_update: Instant,
    /// Minimum interval between time-based updates.
    pub update_interval: Duration,
    /// Last reported completion percentage (0-100).
    pub last_reported_percentage: f64,
    /// Minimum percentage delta that triggers an update.
    pub min_percentage_step: f64,
    /// Timeline covered by this worker (resume cursor, end).
    pub range: (DateTime<Utc>, DateTime<Utc>),
    /// Current cursor position.
    pub position: DateTime<Utc>,
}

impl ProgressState {
    /// Track progress along `[start, end)`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let now = Instant::now();
        Self {
            records_persisted: 0,
            pages_fetched: 0,
            start_time: now,
            last_update: now,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            last_reported_percentage: 0.0,
            min_percentage_step: DEFAULT_PERCENTAGE_STEP,
            range: (start, end),
            position: start,
        }
    }

    /// Account for one fetched page and the cursor it advanced to.
    pub fn update(&mut self, persisted: u64, position: DateTime<Utc>) {
        self.pages_fetched = self.pages_fetched.saturating_add(1);
        self.records_persisted = self.records_persisted.saturating_add(persisted);
        self.position = position;
    }

    /// Whether a progress update should be emitted based on time or percentage.
    pub fn should_emit_update(&self) -> bool {
        if self.pages_fetched == 0 {
            return false;
        }

        if self.percentage() - self.last_reported_percentage >= self.min_percentage_step {
            return true;
        }

        self.last_update.elapsed() >= self.update_interval
    }

    /// Call after emitting a progress log to reset timers and cached percentage.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        self.last_reported_percentage = self.percentage();
    }

    /// Share of the timeline covered, 0-100.
    pub fn percentage(&self) -> f64 {
        let (start, end) = self.range;
        let span = (end - start).num_milliseconds();
        if span <= 0 {
            return 100.0;
        }
        let position = self.position.clamp(start, end);
        let done = (position - start).num_milliseconds();
        (done as f64 / span as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Estimate remaining time from the pace so far.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        let ratio = self.percentage() / 100.0;
        if !(ratio > 0.0 && ratio < 1.0) {
            return None;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let remaining = elapsed / ratio - elapsed;
        Some(Duration::from_secs_f64(remaining.max(0.0)))
    }

    /// Human-readable progress string for logging.
    pub fn format_progress(&self, symbol: &str) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] {symbol}: {} snapshots in {} pages - {:.1}% complete (at {})",
            self.records_persisted,
            self.pages_fetched,
            self.percentage(),
            self.position.format("%Y-%m-%d %H:%M:%S")
        )];

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
