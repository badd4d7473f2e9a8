//! SODA HTTP page fetcher
//!
//! Executes exactly one GET per call and classifies the outcome:
//! - transport failures (connect, timeout) → [`FetchError::Transport`]
//! - non-2xx responses → [`FetchError::HttpStatus`] with the response body
//! - bodies that are not a JSON array → [`FetchError::Decode`]
//!
//! Retrying is the job of [`super::RetryingFetcher`].

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::sync::Arc;
use tracing::debug;

use crate::fetcher::shared_resources::global_http_client;
use crate::fetcher::{FetchError, FetchResult, PageFetcher};
use crate::metrics::HttpRequestMetrics;
use crate::{Credentials, Record};

/// Longest error body kept inside [`FetchError::HttpStatus`]
const MAX_ERROR_BODY_CHARS: usize = 2048;

/// HTTP client for SODA resource endpoints
#[derive(Clone)]
pub struct SodaHttpClient {
    client: Arc<Client>,
}

impl Default for SodaHttpClient {
    fn default() -> Self {
        Self::new(global_http_client())
    }
}

impl SodaHttpClient {
    /// Create a fetcher on top of a (shared) reqwest client
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client (Arc for cheap cloning); its timeout bounds each attempt
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }
}

impl SodaHttpClient {
    async fn execute(
        &self,
        url: &Url,
        credentials: &Credentials,
        metrics: &HttpRequestMetrics,
    ) -> FetchResult<Vec<Record>> {
        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if !credentials.is_empty() {
            request = request.basic_auth(credentials.key_id(), Some(credentials.key_secret()));
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                let err = FetchError::from_reqwest(&e);
                metrics.record_transport_error(&err);
                return Err(err);
            }
        };

        let status = response.status();
        metrics.record_complete(status.as_u16());

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PageFetcher for SodaHttpClient {
    async fn fetch_page(&self, url: &Url, credentials: &Credentials) -> FetchResult<Vec<Record>> {
        let metrics = HttpRequestMetrics::start(url.path());
        let result = self.execute(url, credentials, &metrics).await;

        // One line per attempt; retry and failure reporting belong to the caller.
        match &result {
            Ok(records) => debug!(
                correlation_id = %metrics.correlation_id(),
                url = %url,
                authenticated = !credentials.is_empty(),
                records = records.len(),
                elapsed_ms = metrics.elapsed().as_millis(),
                "Page fetched"
            ),
            Err(e) => debug!(
                correlation_id = %metrics.correlation_id(),
                url = %url,
                authenticated = !credentials.is_empty(),
                error = %e,
                elapsed_ms = metrics.elapsed().as_millis(),
                "Page request failed"
            ),
        }

        result
    }
}

fn truncate_body(mut body: String) -> String {
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        body = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        body.push_str("...");
    }
    body
}
