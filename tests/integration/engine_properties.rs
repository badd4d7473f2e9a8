//! Accounting, termination and concurrency bounds of the engine

use std::sync::Arc;
use std::time::Duration;

use soda_extractor::extractor::{EngineConfig, ExtractionEngine};
use soda_extractor::fetcher::PageFetcher;
use soda_extractor::shutdown::ShutdownCoordinator;
use soda_extractor::Credentials;

use crate::support::mock_source::{query, record_ids, window, MockSource};

async fn run(source: Arc<MockSource>, page_size: u64, concurrency: usize) -> Vec<u64> {
    let config = EngineConfig::default()
        .with_page_size(page_size)
        .with_concurrency(concurrency)
        .with_retry(1, Duration::from_millis(1));
    let fetcher: Arc<dyn PageFetcher> = source.clone();
    let extraction = ExtractionEngine::new(fetcher, query(page_size), Credentials::anonymous(), config)
        .unwrap()
        .with_shutdown(ShutdownCoordinator::shared())
        .run(&window())
        .await
        .unwrap();

    // Aggregate count equals the sum of the pages received
    assert_eq!(extraction.stats.records, extraction.records.len() as u64);
    assert_eq!(extraction.stats.pages, extraction.stats.batches() as u64);
    extraction.stats.offsets_issued
}

#[tokio::test]
async fn test_offsets_are_unique_multiples_of_page_size() {
    let source = Arc::new(MockSource::new(95).with_delay(Duration::from_millis(2)));
    let offsets = run(source.clone(), 10, 4).await;

    let mut sorted = offsets.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), offsets.len(), "offset reissued: {offsets:?}");

    // Launch order is contiguous from 0
    let expected: Vec<u64> = (0..offsets.len() as u64).map(|i| i * 10).collect();
    assert_eq!(offsets, expected);
    assert_eq!(source.offsets(), expected);
}

#[tokio::test]
async fn test_termination_bounds() {
    // (records, page size, concurrency)
    let cases = [(95u64, 10u64, 4usize), (5, 10, 3), (101, 25, 5), (7, 2, 2), (33, 10, 1)];

    for (total, page_size, concurrency) in cases {
        let source = Arc::new(MockSource::new(total).with_delay(Duration::from_millis(1)));
        let offsets = run(source, page_size, concurrency).await;

        let needed = total.div_ceil(page_size) as usize;
        assert!(
            offsets.len() >= needed && offsets.len() <= needed + concurrency - 1,
            "R={total} P={page_size} C={concurrency}: issued {} offsets",
            offsets.len()
        );
    }
}

#[tokio::test]
async fn test_exact_multiple_sees_empty_tail() {
    let source = Arc::new(MockSource::new(30));
    let offsets = run(source, 10, 1).await;
    assert_eq!(offsets, vec![0, 10, 20, 30]);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_never_exceeds_concurrency() {
    let source = Arc::new(MockSource::new(500).with_delay(Duration::from_millis(50)));
    run(source.clone(), 10, 3).await;
    assert!(source.max_in_flight() <= 3, "saw {}", source.max_in_flight());
    assert_eq!(source.max_in_flight(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_every_record_exactly_once() {
    let source = Arc::new(MockSource::new(1_234).with_delay(Duration::from_millis(5)));
    let config = EngineConfig::default()
        .with_page_size(100)
        .with_concurrency(8)
        .with_retry(1, Duration::from_millis(1));
    let fetcher: Arc<dyn PageFetcher> = source;
    let extraction = ExtractionEngine::new(fetcher, query(100), Credentials::anonymous(), config)
        .unwrap()
        .with_shutdown(ShutdownCoordinator::shared())
        .run(&window())
        .await
        .unwrap();

    assert_eq!(record_ids(&extraction.records), (0..1_234).collect::<Vec<_>>());
}
