//! Harvest configuration constants and settings

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use super::HarvestError;

/// Maximum snapshots requested per page.
/// The provider caps history pages at 100,000 entries.
pub const DEFAULT_PAGE_LIMIT: u32 = 100_000;

/// Fixed interval added past the last record of a page to form the next cursor.
pub const DEFAULT_STEP_SECS: i64 = 50;

/// Pause between consecutive requests made by one worker.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(5);

/// Time a credential sits out after a failed fetch before it is reusable.
/// Three hours covers the provider's daily quota reset windows in practice.
pub const DEFAULT_FAILURE_COOLDOWN: Duration = Duration::from_secs(3 * 60 * 60);

/// Settings shared by every symbol worker of one harvest
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    /// Cursor used for symbols with nothing stored yet
    pub default_start: DateTime<Utc>,
    /// Workers stop once their cursor reaches this time
    pub end_time: DateTime<Utc>,
    /// Maximum snapshots per page
    pub page_limit: u32,
    /// Interval added past the last record of a page
    pub step: TimeDelta,
    /// Pause between consecutive requests of one worker
    pub request_delay: Duration,
    /// Cooldown applied to a credential after a failed fetch
    pub failure_cooldown: Duration,
    /// Give up on a symbol if no credential arrives within this time
    pub credential_wait_timeout: Option<Duration>,
}

impl HarvestSettings {
    /// Settings for `[default_start, end_time)` with default tuning
    pub fn new(default_start: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            default_start,
            end_time,
            page_limit: DEFAULT_PAGE_LIMIT,
            step: TimeDelta::seconds(DEFAULT_STEP_SECS),
            request_delay: DEFAULT_REQUEST_DELAY,
            failure_cooldown: DEFAULT_FAILURE_COOLDOWN,
            credential_wait_timeout: None,
        }
    }

    /// Set the page limit
    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit;
        self
    }

    /// Set the cursor step
    pub fn with_step(mut self, step: TimeDelta) -> Self {
        self.step = step;
        self
    }

    /// Set the inter-request delay
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Set the failure cooldown
    pub fn with_failure_cooldown(mut self, cooldown: Duration) -> Self {
        self.failure_cooldown = cooldown;
        self
    }

    /// Set the credential wait timeout
    pub fn with_credential_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.credential_wait_timeout = timeout;
        self
    }

    /// Check the settings can drive a harvest
    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.end_time <= self.default_start {
            return Err(HarvestError::InvalidSettings(format!(
                "end time {} must be after start time {}",
                self.end_time, self.default_start
            )));
        }
        if self.page_limit == 0 {
            return Err(HarvestError::InvalidSettings(
                "page limit must be positive".to_string(),
            ));
        }
        if self.step <= TimeDelta::zero() {
            return Err(HarvestError::InvalidSettings(
                "cursor step must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
