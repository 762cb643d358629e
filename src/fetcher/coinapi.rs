//! CoinAPI historical order book fetcher

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::debug;

use crate::credentials::Credential;
use crate::fetcher::coinapi_config::CoinApiConfig;
use crate::fetcher::coinapi_http::CoinApiHttpClient;
use crate::fetcher::coinapi_parser::CoinApiParser;
use crate::fetcher::shared_resources::shared_http_client;
use crate::fetcher::{FetcherResult, PageFetcher};
use crate::Page;

/// Fetches historical order book pages from the CoinAPI REST API
pub struct CoinApiFetcher {
    http: CoinApiHttpClient,
}

impl CoinApiFetcher {
    /// Fetcher against the production endpoint using the shared HTTP client
    pub fn new() -> FetcherResult<Self> {
        Self::with_config(CoinApiConfig::default())
    }

    /// Fetcher against a custom endpoint using the shared HTTP client
    pub fn with_config(config: CoinApiConfig) -> FetcherResult<Self> {
        Ok(Self {
            http: CoinApiHttpClient::new(shared_http_client()?, config),
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.http.config().base_url
    }
}

#[async_trait]
impl PageFetcher for CoinApiFetcher {
    async fn fetch(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
        credential: &Credential,
        limit: u32,
    ) -> FetcherResult<Page> {
        let path = self.http.config().history_path(symbol);
        let params = [
            (
                "time_start",
                since.to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            ("limit", limit.to_string()),
        ];

        let items: Vec<Value> = self.http.get(&path, &params, credential).await?;
        let page = CoinApiParser::parse_history(items)?;

        debug!(
            symbol = %symbol,
            since = %since,
            records = page.len(),
            "Fetched order book page"
        );

        Ok(page)
    }
}
