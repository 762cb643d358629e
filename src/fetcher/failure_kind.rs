//! Classification of fetch failures.
//!
//! Every failed fetch is recorded in the failure log and counted in metrics
//! under one of these kinds, so operators can tell a banned key apart from an
//! upstream outage at a glance.

use std::fmt;

/// Classification of a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// HTTP 429 quota exhausted
    RateLimit,
    /// Credential rejected (401/403)
    AuthFailed(u16),
    /// HTTP 5xx
    ServerError(u16),
    /// Other 4xx (bad symbol, bad parameters)
    InvalidRequest(u16),
    /// Connection refused, DNS failure, timeout
    Network,
    /// Response body could not be decoded
    Parse,
}

impl FailureKind {
    /// Short stable label used in metrics and the failure log
    pub fn label(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::AuthFailed(_) => "auth",
            Self::ServerError(_) => "server",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Network => "network",
            Self::Parse => "parse",
        }
    }

    /// User-friendly description
    pub fn description(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate limit exceeded",
            Self::AuthFailed(code) => match code {
                401 => "authentication failed (401)",
                403 => "authentication failed (403)",
                _ => "authentication failed",
            },
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::InvalidRequest(code) => match code {
                400 => "invalid request",
                404 => "resource not found",
                _ => "client error",
            },
            Self::Network => "network error",
            Self::Parse => "malformed response",
        }
    }

    /// Suggested remediation shown next to the failure
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::RateLimit => "Key quota is exhausted; it will be retried after the cooldown",
            Self::AuthFailed(_) => "Verify the API key is active and has historical data access",
            Self::ServerError(_) => "Provider may be experiencing issues, try again later",
            Self::InvalidRequest(_) => "Check the symbol id and time range for typos",
            Self::Network => "Check network connectivity and DNS resolution",
            Self::Parse => "Provider response format may have changed",
        }
    }

    /// Whether the failure is tied to the credential rather than the request
    pub fn is_credential_related(&self) -> bool {
        matches!(self, Self::RateLimit | Self::AuthFailed(_))
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
