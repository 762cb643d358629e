//! CoinAPI market data endpoint configuration
//!
//! Keeps the provider-specific constants in one place so the HTTP client and
//! the fetcher stay free of literals.

/// Configuration for the CoinAPI REST market data API
#[derive(Debug, Clone)]
pub struct CoinApiConfig {
    /// Base URL for API (e.g., <https://rest.coinapi.io>)
    pub base_url: String,

    /// Header carrying the API key
    pub key_header: &'static str,

    /// Path prefix of the historical order book endpoint; the symbol id and
    /// `history_suffix` are appended to it
    pub orderbooks_prefix: &'static str,

    /// Path suffix of the historical order book endpoint
    pub history_suffix: &'static str,
}

/// Production REST endpoint
pub const DEFAULT_BASE_URL: &str = "https://rest.coinapi.io";

/// Symbol used for the low-cost credential probe
pub const DEFAULT_PROBE_SYMBOL: &str = "BINANCE_SPOT_MKR_USDT";

/// Page size used for the credential probe
pub const DEFAULT_PROBE_LIMIT: u32 = 100;

impl CoinApiConfig {
    /// Configuration pointing at a custom base URL (mirrors, test servers)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Path of the historical order book endpoint for a symbol
    pub fn history_path(&self, symbol: &str) -> String {
        format!("{}/{}{}", self.orderbooks_prefix, symbol, self.history_suffix)
    }
}

impl Default for CoinApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            key_header: "X-CoinAPI-Key",
            orderbooks_prefix: "/v1/orderbooks",
            history_suffix: "/history",
        }
    }
}
