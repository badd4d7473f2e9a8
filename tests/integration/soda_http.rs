//! HTTP page fetcher against a local mock portal

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use soda_extractor::extractor::{EngineConfig, ExtractionEngine};
use soda_extractor::fetcher::query::{DateWindow, FilterKind, QueryBuilder};
use soda_extractor::fetcher::{FetchError, PageFetcher, SodaHttpClient};
use soda_extractor::shutdown::ShutdownCoordinator;
use soda_extractor::Credentials;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::log_capture::LogCapture;

const RESOURCE: &str = "/resource/wrvz-psew.json";

fn query_for(server: &MockServer, page_size: u64) -> QueryBuilder {
    QueryBuilder::new(
        &format!("{}{RESOURCE}", server.uri()),
        FilterKind::DayWindow {
            column: "trip_start_timestamp".to_string(),
        },
        page_size,
    )
    .unwrap()
}

fn day() -> DateWindow {
    DateWindow::single(chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
}

fn records(range: std::ops::Range<u64>) -> serde_json::Value {
    json!(range.map(|i| json!({ "trip_id": format!("t{i}") })).collect::<Vec<_>>())
}

#[tokio::test]
async fn test_fetch_page_sends_query_and_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RESOURCE))
        .and(query_param("$limit", "5"))
        .and(query_param("$offset", "0"))
        .and(query_param(
            "$where",
            "trip_start_timestamp>='2024-01-15T00:00:00' AND trip_start_timestamp<'2024-01-16T00:00:00'",
        ))
        .and(header("accept", "application/json"))
        .and(header("authorization", "Basic aWQ6c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(records(0..5)))
        .expect(1)
        .mount(&server)
        .await;

    let url = query_for(&server, 5).page_url(&day(), 0);
    let page = SodaHttpClient::default()
        .fetch_page(&url, &Credentials::new("id", "secret"))
        .await
        .unwrap();

    assert_eq!(page.len(), 5);
    assert_eq!(page[0]["trip_id"], "t0");
}

#[tokio::test]
async fn test_anonymous_request_has_no_auth_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RESOURCE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let url = query_for(&server, 5).page_url(&day(), 0);
    let page = SodaHttpClient::default()
        .fetch_page(&url, &Credentials::anonymous())
        .await
        .unwrap();
    assert!(page.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_non_success_status_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("query timeout"))
        .mount(&server)
        .await;

    let url = query_for(&server, 5).page_url(&day(), 0);
    let err = SodaHttpClient::default()
        .fetch_page(&url, &Credentials::anonymous())
        .await
        .unwrap_err();

    match err {
        FetchError::HttpStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "query timeout");
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_body_that_is_not_an_array_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("$offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("$offset", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": true})))
        .mount(&server)
        .await;

    let query = query_for(&server, 5);
    let client = SodaHttpClient::default();

    for offset in [0, 5] {
        let err = client
            .fetch_page(&query.page_url(&day(), offset), &Credentials::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)), "offset {offset}: {err:?}");
    }
}

#[tokio::test]
async fn test_engine_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("$offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(records(0..10)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("$offset", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(records(10..13)))
        .expect(1)
        .mount(&server)
        .await;

    let config = EngineConfig::default()
        .with_page_size(10)
        .with_concurrency(1)
        .with_retry(2, Duration::from_millis(10));
    let fetcher: Arc<dyn PageFetcher> = Arc::new(SodaHttpClient::default());
    let extraction = ExtractionEngine::new(fetcher, query_for(&server, 10), Credentials::anonymous(), config)
        .unwrap()
        .with_shutdown(ShutdownCoordinator::shared())
        .run(&day())
        .await
        .unwrap();

    assert_eq!(extraction.records.len(), 13);
    assert_eq!(extraction.stats.offsets_issued, vec![0, 10]);
    assert_eq!(extraction.records[12]["trip_id"], "t12");
}

#[tokio::test]
async fn test_engine_retries_server_errors_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(records(0..4)))
        .mount(&server)
        .await;

    let config = EngineConfig::default()
        .with_page_size(10)
        .with_concurrency(1)
        .with_retry(3, Duration::from_millis(10));
    let fetcher: Arc<dyn PageFetcher> = Arc::new(SodaHttpClient::default());
    let extraction = ExtractionEngine::new(fetcher, query_for(&server, 10), Credentials::anonymous(), config)
        .unwrap()
        .with_shutdown(ShutdownCoordinator::shared())
        .run(&day())
        .await
        .unwrap();

    assert_eq!(extraction.records.len(), 4);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_one_diagnostic_line_per_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("$offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(records(0..5)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("$offset", "5"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let query = query_for(&server, 5);
    let client = SodaHttpClient::default();
    let logs = LogCapture::default();
    let _guard = logs.install("soda_extractor=trace");

    client
        .fetch_page(&query.page_url(&day(), 0), &Credentials::anonymous())
        .await
        .unwrap();
    let lines = logs.lines();
    assert_eq!(lines.len(), 1, "{lines:#?}");
    assert!(lines[0].contains("Page fetched"));
    assert!(lines[0].contains("records=5"));

    logs.clear();
    client
        .fetch_page(&query.page_url(&day(), 5), &Credentials::anonymous())
        .await
        .unwrap_err();
    let lines = logs.lines();
    assert_eq!(lines.len(), 1, "{lines:#?}");
    assert!(lines[0].contains("Page request failed"));
}
