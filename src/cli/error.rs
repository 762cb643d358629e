//! CLI error types and conversions

use crate::config::ConfigError;
use crate::credentials::CredentialError;
use crate::fetcher::FetcherError;
use crate::harvest::HarvestError;
use crate::resume::ResumeError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Credential file error
    #[error("credential error: {0}")]
    Credentials(#[from] CredentialError),

    /// No credential is usable, so nothing can be harvested
    #[error("no usable credentials: {0}")]
    NoCredentials(String),

    /// Fetcher could not be constructed
    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),

    /// Harvest error
    #[error("harvest error: {0}")]
    Harvest(#[from] HarvestError),

    /// Resume error
    #[error("resume error: {0}")]
    Resume(#[from] ResumeError),

    /// Metrics exporter could not be started
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Output serialization error
    #[error("output error: {0}")]
    Output(String),
}
