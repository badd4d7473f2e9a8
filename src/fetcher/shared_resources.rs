//! Shared HTTP client for all fetcher instances
//!
//! Every page task of a run goes through one `reqwest::Client` so connection
//! pooling and TLS session reuse work across concurrent pages.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// HTTP connect timeout (seconds) - time to establish TCP connection
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 30;
/// HTTP request timeout (seconds) - overall time for one page request.
/// Large pages on a busy portal can take minutes to render.
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 300;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("soda-extractor/", env!("CARGO_PKG_VERSION"));

/// Global HTTP client shared by all fetcher instances
///
/// Configured with explicit timeouts to prevent indefinite hangs:
/// - Connect timeout: 30 seconds
/// - Request timeout: 300 seconds
pub static GLOBAL_HTTP_CLIENT: Lazy<Arc<Client>> = Lazy::new(|| {
    Arc::new(
        build_client(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS)).unwrap_or_else(|e| {
            panic!("FATAL: Failed to build HTTP client: {}. Check system TLS configuration.", e);
        }),
    )
});

/// Build a client with the standard connect timeout and the given request timeout
pub fn build_client(request_timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(request_timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Get the global HTTP client
///
/// Returns a clone of the Arc, which is cheap (just increments ref count)
pub fn global_http_client() -> Arc<Client> {
    GLOBAL_HTTP_CLIENT.clone()
}
