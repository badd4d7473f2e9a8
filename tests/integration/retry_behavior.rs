//! Fixed-delay retry around one page fetch

use std::sync::Arc;
use std::time::Duration;

use soda_extractor::fetcher::{FetchError, PageFetcher, RetryPolicy, RetryingFetcher};
use soda_extractor::Credentials;
use tokio::time::Instant;

use crate::support::mock_source::{query, window, MockSource};

fn retrying(source: Arc<MockSource>, attempts: u32, delay: Duration) -> RetryingFetcher {
    let inner: Arc<dyn PageFetcher> = source;
    RetryingFetcher::new(inner, RetryPolicy::fixed(attempts, delay))
}

#[tokio::test(start_paused = true)]
async fn test_success_after_failures_waits_exactly_k_delays() {
    let delay = Duration::from_secs(5);

    for failures in 0..3u32 {
        let source = Arc::new(MockSource::new(25).failing(0, failures));
        let fetcher = retrying(source.clone(), 3, delay);
        let url = query(10).page_url(&window(), 0);

        let started = Instant::now();
        let records = fetcher
            .fetch(&url, &Credentials::anonymous(), 0)
            .await
            .unwrap();

        assert_eq!(records.len(), 10);
        assert_eq!(source.attempts_at(0), failures as usize + 1);
        assert_eq!(started.elapsed(), delay * failures);
    }
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_does_not_sleep_after_last_attempt() {
    let source = Arc::new(MockSource::new(100).failing(40, 10));
    let fetcher = retrying(source.clone(), 4, Duration::from_secs(5));
    let url = query(10).page_url(&window(), 40);

    let started = Instant::now();
    let err = fetcher
        .fetch(&url, &Credentials::anonymous(), 40)
        .await
        .unwrap_err();

    assert_eq!(started.elapsed(), Duration::from_secs(15));
    assert_eq!(source.attempts_at(40), 4);
    match err {
        FetchError::RetryExhausted {
            offset,
            attempts,
            last,
        } => {
            assert_eq!(offset, 40);
            assert_eq!(attempts, 4);
            assert!(matches!(*last, FetchError::HttpStatus { status: 503, .. }));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_policy_never_sleeps() {
    let source = Arc::new(MockSource::new(10).failing(0, 1));
    let fetcher = retrying(source.clone(), 1, Duration::from_secs(30));
    let url = query(10).page_url(&window(), 0);

    let started = Instant::now();
    assert!(fetcher.fetch(&url, &Credentials::anonymous(), 0).await.is_err());
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(source.attempts_at(0), 1);
}

#[test]
fn test_policy_bounds() {
    let policy = RetryPolicy::fixed(0, Duration::from_secs(5));
    assert_eq!(policy.max_attempts, 1);

    let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
    assert_eq!(policy.max_total_delay(), Duration::from_secs(10));
}
