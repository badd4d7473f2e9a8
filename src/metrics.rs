//! Production observability metrics for the extractor
//!
//! Covers HTTP behavior against the portal (status codes, latency, retries),
//! engine activity (pages in flight, pages and records fetched) and the
//! outcome of whole extractions.
//!
//! ## Architecture
//!
//! - Uses `metrics` crate for low-overhead metric collection
//! - Prometheus exporter for scraping endpoint (`--metrics-addr`)
//! - Without an installed recorder every call is a no-op

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::fetcher::FetchError;

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls are ignored.
///
/// # Arguments
/// * `addr` - Socket address to bind Prometheus scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP requests made to the SODA portal"
    );

    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Total number of page fetch retries"
    );

    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );

    describe_histogram!(
        "retry_delay_seconds",
        Unit::Seconds,
        "Delay slept before a retry in seconds"
    );

    describe_gauge!(
        "pages_in_flight",
        Unit::Count,
        "Page tasks currently running"
    );

    describe_counter!(
        "pages_fetched_total",
        Unit::Count,
        "Pages fetched successfully"
    );

    describe_counter!(
        "records_extracted_total",
        Unit::Count,
        "Records returned by successful pages"
    );

    describe_counter!(
        "extractions_completed_total",
        Unit::Count,
        "Total number of successful extractions"
    );

    describe_counter!(
        "extractions_failed_total",
        Unit::Count,
        "Total number of failed extractions"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Record an HTTP request with timing
pub struct HttpRequestMetrics {
    endpoint: String,
    start_time: Instant,
    correlation_id: String,
}

impl HttpRequestMetrics {
    /// Start recording a new HTTP request
    pub fn start(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            start_time: Instant::now(),
            correlation_id: generate_correlation_id(),
        }
    }

    /// Record completion of the HTTP request
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status_code.to_string(),
        )
        .increment(1);

        histogram!(
            "http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());
    }

    /// Record a transport error (no status code)
    pub fn record_transport_error(&self, err: &FetchError) {
        let duration = self.start_time.elapsed();

        let status = match err {
            FetchError::Transport { reason, .. } => reason.to_string(),
            _ => "network_error".to_string(),
        };

        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status,
        )
        .increment(1);

        histogram!(
            "http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());
    }

    /// Time since the request started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get the correlation ID for this request
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record the delay slept before retry `attempt` (1-based retry count)
pub fn record_retry_delay(delay: Duration, attempt: u32) {
    counter!(
        "http_retries_total",
        "attempt" => attempt.to_string(),
    )
    .increment(1);

    histogram!("retry_delay_seconds").record(delay.as_secs_f64());

    debug!(
        attempt = attempt,
        delay_ms = delay.as_millis(),
        "Retry delay recorded"
    );
}

/// Update the in-flight page gauge
pub fn set_pages_in_flight(in_flight: usize) {
    gauge!("pages_in_flight").set(in_flight as f64);
}

/// Record a successfully fetched page
pub fn record_page(records: usize) {
    counter!("pages_fetched_total").increment(1);
    counter!("records_extracted_total").increment(records as u64);
}

/// Extraction run metrics
pub struct ExtractionMetrics {
    dataset: String,
    start_time: Instant,
}

impl ExtractionMetrics {
    /// Start tracking an extraction
    pub fn start(dataset: impl Into<String>) -> Self {
        let dataset = dataset.into();

        info!(dataset = %dataset, "Extraction started");

        Self {
            dataset,
            start_time: Instant::now(),
        }
    }

    /// Record successful completion
    pub fn record_success(&self, records: u64) {
        let duration = self.start_time.elapsed();

        counter!(
            "extractions_completed_total",
            "dataset" => self.dataset.clone(),
        )
        .increment(1);

        info!(
            dataset = %self.dataset,
            records = records,
            duration_secs = duration.as_secs(),
            "Extraction completed successfully"
        );
    }

    /// Record failed extraction
    ///
    /// Counter only; the engine logs the failure itself.
    pub fn record_failure(&self, error: &str) {
        counter!(
            "extractions_failed_total",
            "dataset" => self.dataset.clone(),
        )
        .increment(1);

        debug!(
            dataset = %self.dataset,
            error = %error,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Extraction failure recorded"
        );
    }
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}
