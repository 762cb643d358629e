//! Process-wide HTTP client
//!
//! Every symbol worker and the credential probe send their requests through
//! one connection pool. The client is built on first use; a build failure
//! (usually a broken TLS setup) is returned to the caller instead of aborting.

use once_cell::sync::OnceCell;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use super::{FetcherError, FetcherResult};

/// Time allowed to establish the TCP/TLS connection
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for a whole request; full history pages are large
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

static SHARED_HTTP_CLIENT: OnceCell<Arc<Client>> = OnceCell::new();

fn build_client() -> FetcherResult<Arc<Client>> {
    Client::builder()
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .timeout(HTTP_REQUEST_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map(Arc::new)
        .map_err(|e| FetcherError::NetworkError(format!("Failed to build HTTP client: {e}")))
}

/// The shared HTTP client, built on first call
pub fn shared_http_client() -> FetcherResult<Arc<Client>> {
    SHARED_HTTP_CLIENT.get_or_try_init(build_client).cloned()
}
