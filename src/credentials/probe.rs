//! Startup credential probing
//!
//! Each candidate credential is exercised with one low-cost fetch before the
//! harvest starts. Credentials whose probe fails are excluded from the pool.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::Credential;
use crate::fetcher::{FetcherError, PageFetcher};

/// Parameters of the probe query
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Symbol queried by every probe
    pub symbol: String,
    /// Start time of the probe query
    pub since: DateTime<Utc>,
    /// Page limit of the probe query
    pub limit: u32,
    /// Maximum number of probes in flight
    pub concurrency: usize,
}

/// Outcome of probing a set of credentials
#[derive(Debug, Default)]
pub struct ProbeReport {
    /// Credentials that answered the probe
    pub working: Vec<Credential>,
    /// Credentials that failed, with the failure
    pub failing: Vec<(Credential, FetcherError)>,
}

/// Probe every credential and split them into working and failing sets
///
/// A successful response counts as working even when the page is empty.
/// Order of the input is preserved in both output lists.
pub async fn probe_credentials(
    fetcher: &dyn PageFetcher,
    credentials: Vec<Credential>,
    settings: &ProbeSettings,
) -> ProbeReport {
    let total = credentials.len();
    info!(
        credentials = total,
        symbol = %settings.symbol,
        "Probing credentials"
    );

    let results: Vec<(Credential, Result<usize, FetcherError>)> = stream::iter(credentials)
        .map(|credential| async move {
            let result = fetcher
                .fetch(&settings.symbol, settings.since, &credential, settings.limit)
                .await
                .map(|page| page.len());
            (credential, result)
        })
        .buffered(settings.concurrency.max(1))
        .collect()
        .await;

    let mut report = ProbeReport::default();
    for (credential, result) in results {
        match result {
            Ok(records) => {
                info!(credential = %credential, records, "Credential probe succeeded");
                report.working.push(credential);
            }
            Err(e) => {
                warn!(
                    credential = %credential,
                    kind = %e.kind(),
                    error = %e,
                    "Credential probe failed, excluding credential"
                );
                report.failing.push((credential, e));
            }
        }
    }

    info!(
        working = report.working.len(),
        failing = report.failing.len(),
        "Credential probe finished"
    );
    report
}
