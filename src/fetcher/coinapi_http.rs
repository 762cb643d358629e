//! CoinAPI HTTP client helper module
//!
//! Provides the single-attempt request path used by the fetcher:
//! - Credential header injection
//! - Status code to [`FetcherError`] mapping
//! - Generic JSON deserialization
//!
//! Retrying is deliberately absent here. A failed call is handed back to the
//! symbol worker, which cools the credential down and rotates to another one.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::credentials::Credential;
use crate::fetcher::coinapi_config::CoinApiConfig;
use crate::fetcher::{FetcherError, FetcherResult};

/// HTTP client for CoinAPI REST calls
pub struct CoinApiHttpClient {
    client: Arc<Client>,
    config: CoinApiConfig,
}

impl CoinApiHttpClient {
    /// Create new HTTP client
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client (Arc for cheap cloning)
    /// * `config` - Endpoint configuration
    pub fn new(client: Arc<Client>, config: CoinApiConfig) -> Self {
        Self { client, config }
    }

    /// Endpoint configuration in use
    pub fn config(&self) -> &CoinApiConfig {
        &self.config
    }

    /// Execute an authorised GET request and deserialize the JSON body
    ///
    /// # Arguments
    /// * `path` - API path (e.g., "/v1/orderbooks/X/history")
    /// * `params` - Query parameters as key-value pairs
    /// * `credential` - Credential sent in the key header
    pub async fn get<T>(
        &self,
        path: &str,
        params: &[(&str, String)],
        credential: &Credential,
    ) -> FetcherResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);
        debug!(url = %url, credential = %credential, "GET");

        let response = self
            .client
            .get(&url)
            .header(self.config.key_header, credential.expose())
            .query(params)
            .send()
            .await
            .map_err(|e| FetcherError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = Self::status_error(status, &body);
            warn!(status = status.as_u16(), credential = %credential, "{}", error);
            return Err(error);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetcherError::ParseError(format!("Failed to deserialize response: {e}")))
    }

    /// Map a non-success status and body to a typed error
    pub fn status_error(status: StatusCode, body: &str) -> FetcherError {
        let message = Self::extract_message(body);
        let code = status.as_u16();

        match code {
            429 => FetcherError::RateLimitExceeded(message),
            401 | 403 => FetcherError::AuthFailed {
                status: code,
                message,
            },
            _ if status.is_server_error() => FetcherError::ServerError {
                status: code,
                message,
            },
            _ => FetcherError::ApiError {
                status: code,
                message,
            },
        }
    }

    /// Error bodies look like `{"error": "..."}`; fall back to the raw text
    fn extract_message(body: &str) -> String {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string())
    }
}
