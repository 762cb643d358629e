//! Configuration surface
//!
//! Every setting is a command-line flag with an environment-variable
//! fallback; `main` loads a `.env` file before parsing, so the variables can
//! also live there. Values are validated once, before any worker starts.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use clap::{ArgAction, Args};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::ProbeSettings;
use crate::fetcher::coinapi_config::{DEFAULT_BASE_URL, DEFAULT_PROBE_LIMIT, DEFAULT_PROBE_SYMBOL};
use crate::harvest::config::{DEFAULT_PAGE_LIMIT, DEFAULT_STEP_SECS};
use crate::harvest::HarvestSettings;

/// Maximum number of credential probes in flight
pub const PROBE_CONCURRENCY: usize = 8;

/// Configuration errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent
    #[error("missing {flag} (or {env})")]
    Missing {
        /// Command-line flag
        flag: &'static str,
        /// Environment variable
        env: &'static str,
    },

    /// A timestamp could not be parsed
    #[error("invalid {field} '{value}': expected RFC3339 or YYYY-MM-DD")]
    InvalidTime {
        /// Setting name
        field: &'static str,
        /// Rejected input
        value: String,
    },

    /// Symbol list is empty after trimming
    #[error("no symbols configured")]
    NoSymbols,

    /// End time is not after start time
    #[error("end time {end} must be after start time {start}")]
    InvalidRange {
        /// Parsed start
        start: DateTime<Utc>,
        /// Parsed end
        end: DateTime<Utc>,
    },

    /// A numeric setting is out of range
    #[error("invalid {field}: {message}")]
    InvalidValue {
        /// Setting name
        field: &'static str,
        /// Why it was rejected
        message: String,
    },
}

/// Configuration flags shared by every command
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Default start time for symbols with nothing stored (RFC3339 or YYYY-MM-DD)
    #[arg(long, global = true, env = "HARVEST_START")]
    pub start: Option<String>,

    /// End time of the harvest (RFC3339 or YYYY-MM-DD)
    #[arg(long, global = true, env = "HARVEST_END")]
    pub end: Option<String>,

    /// Comma-separated provider symbol ids
    #[arg(long, global = true, env = "HARVEST_SYMBOLS")]
    pub symbols: Option<String>,

    /// JSON credential file of the form {"keys": [...]}
    #[arg(
        long,
        global = true,
        env = "HARVEST_CREDENTIALS_FILE",
        default_value = "apiKeys.json"
    )]
    pub credentials_file: PathBuf,

    /// Root directory of the snapshot store
    #[arg(long, global = true, env = "HARVEST_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Append-only log of failed fetches
    #[arg(
        long,
        global = true,
        env = "HARVEST_FAILURE_LOG",
        default_value = "api_errors.log"
    )]
    pub failure_log: PathBuf,

    /// Base URL of the market data API
    #[arg(long, global = true, env = "HARVEST_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// Maximum snapshots per page
    #[arg(long, global = true, env = "HARVEST_PAGE_LIMIT", default_value_t = DEFAULT_PAGE_LIMIT)]
    pub page_limit: u32,

    /// Pause between consecutive requests of one symbol, in seconds
    #[arg(long, global = true, env = "HARVEST_REQUEST_DELAY_SECS", default_value_t = 5)]
    pub request_delay_secs: u64,

    /// Cooldown of a credential after a failed fetch, in seconds
    #[arg(long, global = true, env = "HARVEST_COOLDOWN_SECS", default_value_t = 10_800)]
    pub cooldown_secs: u64,

    /// Interval added past the last record of a page, in seconds
    #[arg(long, global = true, env = "HARVEST_STEP_SECS", default_value_t = DEFAULT_STEP_SECS)]
    pub step_secs: i64,

    /// Probe every credential before the harvest starts
    #[arg(
        long,
        global = true,
        env = "HARVEST_CHECK_CREDENTIALS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub check_credentials: bool,

    /// Skip the credential probe
    #[arg(long, global = true)]
    pub no_check_credentials: bool,

    /// Symbol queried by the credential probe
    #[arg(long, global = true, env = "HARVEST_PROBE_SYMBOL", default_value = DEFAULT_PROBE_SYMBOL)]
    pub probe_symbol: String,

    /// Page limit of the credential probe
    #[arg(long, global = true, default_value_t = DEFAULT_PROBE_LIMIT)]
    pub probe_limit: u32,

    /// Give up on a symbol if no credential arrives within this many seconds
    #[arg(long, global = true, env = "HARVEST_CREDENTIAL_WAIT_TIMEOUT_SECS")]
    pub credential_wait_timeout_secs: Option<u64>,

    /// Serve Prometheus metrics on this address (e.g., 0.0.0.0:9090)
    #[arg(long, global = true, env = "HARVEST_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

/// Validated configuration of a harvest run
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Default start time
    pub start: DateTime<Utc>,
    /// End time
    pub end: DateTime<Utc>,
    /// Unique symbols, in configured order
    pub symbols: Vec<String>,
    /// Credential file
    pub credentials_file: PathBuf,
    /// Store root
    pub data_dir: PathBuf,
    /// Failure log path
    pub failure_log: PathBuf,
    /// API base URL
    pub api_url: String,
    /// Page limit
    pub page_limit: u32,
    /// Inter-request delay
    pub request_delay: Duration,
    /// Failure cooldown
    pub cooldown: Duration,
    /// Cursor step
    pub step: TimeDelta,
    /// Whether to probe credentials first
    pub check_credentials: bool,
    /// Probe symbol
    pub probe_symbol: String,
    /// Probe page limit
    pub probe_limit: u32,
    /// Credential wait timeout
    pub credential_wait_timeout: Option<Duration>,
    /// Prometheus listener
    pub metrics_addr: Option<SocketAddr>,
}

impl ConfigArgs {
    /// Parsed, de-duplicated symbol list
    pub fn symbol_list(&self) -> Result<Vec<String>, ConfigError> {
        let raw = self.symbols.as_deref().ok_or(ConfigError::Missing {
            flag: "--symbols",
            env: "HARVEST_SYMBOLS",
        })?;
        parse_symbols(raw)
    }

    /// Parsed default start time
    pub fn start_time(&self) -> Result<DateTime<Utc>, ConfigError> {
        let raw = self.start.as_deref().ok_or(ConfigError::Missing {
            flag: "--start",
            env: "HARVEST_START",
        })?;
        parse_start_time(raw)
    }

    /// Parsed end time
    pub fn end_time(&self) -> Result<DateTime<Utc>, ConfigError> {
        let raw = self.end.as_deref().ok_or(ConfigError::Missing {
            flag: "--end",
            env: "HARVEST_END",
        })?;
        parse_end_time(raw)
    }

    /// Whether credentials should be probed
    pub fn should_check_credentials(&self) -> bool {
        self.check_credentials && !self.no_check_credentials
    }

    /// Probe query anchored 24 hours before `end`
    pub fn probe_settings(&self, end: DateTime<Utc>) -> ProbeSettings {
        ProbeSettings {
            symbol: self.probe_symbol.clone(),
            since: end - TimeDelta::hours(24),
            limit: self.probe_limit,
            concurrency: PROBE_CONCURRENCY,
        }
    }

    /// Validate everything a harvest needs
    pub fn resolve(&self) -> Result<HarvestConfig, ConfigError> {
        let symbols = self.symbol_list()?;
        let start = self.start_time()?;
        let end = self.end_time()?;

        if end <= start {
            return Err(ConfigError::InvalidRange { start, end });
        }
        if self.page_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "page limit",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.step_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "step",
                message: format!("must be greater than 0, got {}", self.step_secs),
            });
        }
        if self.probe_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "probe limit",
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(HarvestConfig {
            start,
            end,
            symbols,
            credentials_file: self.credentials_file.clone(),
            data_dir: self.data_dir.clone(),
            failure_log: self.failure_log.clone(),
            api_url: self.api_url.clone(),
            page_limit: self.page_limit,
            request_delay: Duration::from_secs(self.request_delay_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
            step: TimeDelta::seconds(self.step_secs),
            check_credentials: self.should_check_credentials(),
            probe_symbol: self.probe_symbol.clone(),
            probe_limit: self.probe_limit,
            credential_wait_timeout: self.credential_wait_timeout_secs.map(Duration::from_secs),
            metrics_addr: self.metrics_addr,
        })
    }
}

impl HarvestConfig {
    /// Worker settings derived from this configuration
    pub fn settings(&self) -> HarvestSettings {
        HarvestSettings::new(self.start, self.end)
            .with_page_limit(self.page_limit)
            .with_step(self.step)
            .with_request_delay(self.request_delay)
            .with_failure_cooldown(self.cooldown)
            .with_credential_wait_timeout(self.credential_wait_timeout)
    }
}

/// Split a comma-separated symbol list, trimming and dropping blanks and duplicates
pub fn parse_symbols(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !symbols.iter().any(|s| s == symbol) {
            symbols.push(symbol.to_string());
        }
    }
    if symbols.is_empty() {
        return Err(ConfigError::NoSymbols);
    }
    Ok(symbols)
}

/// Try to parse an RFC3339 datetime
///
/// Handles both inputs with and without timezone designators:
/// - "2024-01-01T00:00:00Z" - explicit UTC
/// - "2024-01-01T00:00:00+01:00" - explicit offset
/// - "2024-01-01T00:00:00" - no timezone, assumed UTC
fn try_parse_datetime_rfc3339(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{input}Z")) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

fn parse_date(input: &str, field: &'static str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| ConfigError::InvalidTime {
        field,
        value: input.to_string(),
    })
}

/// Parse a start time from YYYY-MM-DD or RFC3339.
///
/// A bare date means start of day (00:00:00 UTC).
pub fn parse_start_time(input: &str) -> Result<DateTime<Utc>, ConfigError> {
    if let Some(dt) = try_parse_datetime_rfc3339(input) {
        return Ok(dt);
    }

    let date = parse_date(input, "start time")?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ConfigError::InvalidTime {
            field: "start time",
            value: input.to_string(),
        })
}

/// Parse an end time from YYYY-MM-DD or RFC3339.
///
/// A bare date means the start of the following day, so the named date is
/// fully included in the half-open harvest range.
pub fn parse_end_time(input: &str) -> Result<DateTime<Utc>, ConfigError> {
    if let Some(dt) = try_parse_datetime_rfc3339(input) {
        return Ok(dt);
    }

    let date = parse_date(input, "end time")?;
    date.succ_opt()
        .and_then(|next| next.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ConfigError::InvalidTime {
            field: "end time",
            value: input.to_string(),
        })
}
