//! Probe command and the shared credential preparation step

use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::{CliError, OutputFormat};
use crate::config::ConfigArgs;
use crate::credentials::{load_credentials, probe_credentials, Credential, ProbeReport};
use crate::fetcher::coinapi::CoinApiFetcher;
use crate::fetcher::coinapi_config::CoinApiConfig;
use crate::fetcher::PageFetcher;

/// Probe subcommand
#[derive(Debug, Args)]
pub struct ProbeCommand {
    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub format: OutputFormat,
}

/// Fetcher against the configured API endpoint
pub fn build_fetcher(config: &ConfigArgs) -> Result<Arc<dyn PageFetcher>, CliError> {
    let fetcher =
        CoinApiFetcher::with_config(CoinApiConfig::with_base_url(config.api_url.as_str()))?;
    Ok(Arc::new(fetcher))
}

/// Load credentials and, unless disabled, keep only those passing the probe
///
/// Fails with [`CliError::NoCredentials`] when nothing usable remains.
pub async fn prepare_credentials(
    config: &ConfigArgs,
    fetcher: &dyn PageFetcher,
    end: DateTime<Utc>,
) -> Result<Vec<Credential>, CliError> {
    let credentials = load_credentials(&config.credentials_file)?;
    if credentials.is_empty() {
        return Err(CliError::NoCredentials(format!(
            "{} contains no keys",
            config.credentials_file.display()
        )));
    }

    if !config.should_check_credentials() {
        info!(
            credentials = credentials.len(),
            "Credential probe disabled, using all credentials"
        );
        return Ok(credentials);
    }

    let report = probe_credentials(fetcher, credentials, &config.probe_settings(end)).await;
    if report.working.is_empty() {
        return Err(CliError::NoCredentials(format!(
            "all {} credentials failed the probe",
            report.failing.len()
        )));
    }
    Ok(report.working)
}

impl ProbeCommand {
    /// Execute the probe command
    pub async fn execute(&self, config: &ConfigArgs) -> Result<ProbeReport, CliError> {
        let end = match config.end_time() {
            Ok(end) => end,
            Err(_) if config.end.is_none() => Utc::now(),
            Err(e) => return Err(e.into()),
        };

        let credentials = load_credentials(&config.credentials_file)?;
        let fetcher = build_fetcher(config)?;
        let report =
            probe_credentials(fetcher.as_ref(), credentials, &config.probe_settings(end)).await;

        self.print(&report)?;

        if report.working.is_empty() {
            warn!("No credential passed the probe");
            return Err(CliError::NoCredentials(format!(
                "all {} credentials failed the probe",
                report.failing.len()
            )));
        }
        Ok(report)
    }

    fn print(&self, report: &ProbeReport) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Human => {
                println!(
                    "{} working, {} failing",
                    report.working.len(),
                    report.failing.len()
                );
                for credential in &report.working {
                    println!("  ok    {credential}");
                }
                for (credential, error) in &report.failing {
                    let kind = error.kind();
                    println!("  FAIL  {credential}  [{}] {error}", kind.description());
                    println!("        {}", kind.suggestion());
                }
            }
            OutputFormat::Json => {
                let output = json!({
                    "working": report.working.iter().map(|c| c.masked()).collect::<Vec<_>>(),
                    "failing": report.failing.iter().map(|(c, e)| json!({
                        "credential": c.masked(),
                        "kind": e.kind().label(),
                        "error": e.to_string(),
                    })).collect::<Vec<_>>(),
                });
                let text = serde_json::to_string_pretty(&output)
                    .map_err(|e| CliError::Output(e.to_string()))?;
                println!("{text}");
            }
        }
        Ok(())
    }
}
