//! Unit tests for SoQL query construction

use chrono::NaiveDate;
use soda_extractor::fetcher::query::{parse_date, DateWindow, FilterKind, QueryBuilder, QueryError};
use soda_extractor::registry::DatasetRegistry;

fn date(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

#[test]
fn test_page_urls_differ_only_by_offset() {
    let registry = DatasetRegistry::load_embedded().unwrap();
    let query = QueryBuilder::for_dataset(registry.get("taxi").unwrap(), 50_000).unwrap();
    let window = DateWindow::single(date("2024-01-15"));

    let first = query.page_url(&window, 0);
    let second = query.page_url(&window, 50_000);

    let pairs = |url: &reqwest::Url| -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    };
    let (a, b) = (pairs(&first), pairs(&second));

    assert_eq!(a[0], b[0]);
    assert_eq!(a[1], ("$limit".to_string(), "50000".to_string()));
    assert_eq!(a[2], ("$offset".to_string(), "0".to_string()));
    assert_eq!(b[2], ("$offset".to_string(), "50000".to_string()));
    assert_eq!(first.path(), "/resource/wrvz-psew.json");
}

#[test]
fn test_where_clause_is_percent_encoded() {
    let query = QueryBuilder::new(
        "https://data.cityofchicago.org/resource/ydr8-5enu.json",
        FilterKind::DayWindow {
            column: "issue_date".to_string(),
        },
        10,
    )
    .unwrap();
    let url = query
        .page_url(&DateWindow::single(date("2024-02-29")), 20)
        .to_string();

    assert!(!url.contains(' '));
    assert!(!url.contains('\''));
    assert!(url.contains("issue_date%3E%3D%272024-02-29T00%3A00%3A00%27"));
    assert!(url.ends_with("%24limit=10&%24offset=20"));
}

#[test]
fn test_day_window_range_is_half_open() {
    let filter = FilterKind::DayWindow {
        column: "trip_start_timestamp".to_string(),
    };
    let window = DateWindow::range(date("2023-12-30"), date("2023-12-31")).unwrap();
    assert_eq!(
        filter.where_clause(&window),
        "trip_start_timestamp>='2023-12-30T00:00:00' AND trip_start_timestamp<'2024-01-01T00:00:00'"
    );
}

#[test]
fn test_week_start_forms() {
    let filter = FilterKind::WeekStart {
        column: "week_start".to_string(),
    };
    assert_eq!(
        filter.where_clause(&DateWindow::single(date("2024-01-07"))),
        "week_start='2024-01-07T00:00:00'"
    );
    assert_eq!(
        filter.where_clause(&DateWindow::range(date("2024-01-07"), date("2024-01-21")).unwrap()),
        "week_start>='2024-01-07T00:00:00' AND week_start<='2024-01-21T00:00:00'"
    );
}

#[test]
fn test_date_trunc_forms() {
    let filter = FilterKind::DateTrunc {
        column: "trip_start_timestamp".to_string(),
    };
    assert_eq!(
        filter.where_clause(&DateWindow::single(date("2024-01-15"))),
        "date_trunc_ymd(trip_start_timestamp)='2024-01-15'"
    );
    assert_eq!(
        filter.where_clause(&DateWindow::range(date("2024-01-01"), date("2024-01-31")).unwrap()),
        "date_trunc_ymd(trip_start_timestamp) between '2024-01-01' and '2024-01-31'"
    );
}

#[test]
fn test_builder_rejects_bad_input() {
    let filter = FilterKind::DayWindow {
        column: "ts".to_string(),
    };

    assert!(matches!(
        QueryBuilder::new("not a url", filter.clone(), 10),
        Err(QueryError::InvalidBaseUrl { .. })
    ));
    assert_eq!(
        QueryBuilder::new("https://example.org/r.json", filter, 0).unwrap_err(),
        QueryError::ZeroPageSize
    );
    assert_eq!(
        QueryBuilder::new(
            "https://example.org/r.json",
            FilterKind::DayWindow {
                column: "ts' OR 1=1 --".to_string()
            },
            10
        )
        .unwrap_err(),
        QueryError::InvalidColumn("ts' OR 1=1 --".to_string())
    );
}

#[test]
fn test_window_parsing_and_display() {
    assert!(matches!(parse_date("2024/01/15"), Err(QueryError::InvalidDate(_))));
    assert!(matches!(
        DateWindow::range(date("2024-01-02"), date("2024-01-01")),
        Err(QueryError::InvertedWindow { .. })
    ));

    let window = DateWindow::range(date("2024-01-01"), date("2024-01-03")).unwrap();
    assert_eq!(window.days(), 3);
    assert_eq!(window.to_string(), "2024-01-01 to 2024-01-03");
    assert_eq!(window.partition(), "2024-01-01_2024-01-03");
}
