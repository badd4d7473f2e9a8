//! SoQL query construction for offset pagination
//!
//! Every page request is the same filtered query with a different `$offset`:
//!
//! ```text
//! {base}?$where={filter}&$limit={page_size}&$offset={offset}
//! ```
//!
//! The filter is derived from a [`DateWindow`] and the dataset's [`FilterKind`].

use chrono::NaiveDate;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::registry::DatasetConfig;

/// Date format used on the command line and in partitions
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Query construction errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    /// Base URL does not parse
    #[error("invalid base URL {url}: {reason}")]
    InvalidBaseUrl {
        /// Offending URL
        url: String,
        /// Parse failure
        reason: String,
    },

    /// Filter column contains characters outside SoQL identifiers
    #[error("invalid filter column: {0}")]
    InvalidColumn(String),

    /// Date does not match YYYY-MM-DD
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// End date precedes start date
    #[error("end date {end} is before start date {start}")]
    InvertedWindow {
        /// Window start
        start: NaiveDate,
        /// Window end
        end: NaiveDate,
    },

    /// Page size of zero
    #[error("page size must be at least 1")]
    ZeroPageSize,
}

/// How a dataset is filtered by date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    /// Timestamp column bounded by `[start 00:00, end+1 00:00)`
    DayWindow {
        /// Timestamp column
        column: String,
    },
    /// Weekly datasets keyed by the week's first day
    WeekStart {
        /// Week start column
        column: String,
    },
    /// Timestamp column truncated to the day with `date_trunc_ymd`
    DateTrunc {
        /// Timestamp column
        column: String,
    },
}

impl FilterKind {
    /// Column the filter applies to
    pub fn column(&self) -> &str {
        match self {
            Self::DayWindow { column } | Self::WeekStart { column } | Self::DateTrunc { column } => {
                column
            }
        }
    }

    /// Render the `$where` clause for a window
    pub fn where_clause(&self, window: &DateWindow) -> String {
        let start = window.start.format(DATE_FORMAT);
        let end = window.end.format(DATE_FORMAT);

        match self {
            Self::DayWindow { column } => {
                let after_end = window.end.succ_opt().unwrap_or(window.end);
                format!(
                    "{column}>='{start}T00:00:00' AND {column}<'{}T00:00:00'",
                    after_end.format(DATE_FORMAT)
                )
            }
            Self::WeekStart { column } if window.is_single_day() => {
                format!("{column}='{start}T00:00:00'")
            }
            Self::WeekStart { column } => {
                format!("{column}>='{start}T00:00:00' AND {column}<='{end}T00:00:00'")
            }
            Self::DateTrunc { column } if window.is_single_day() => {
                format!("date_trunc_ymd({column})='{start}'")
            }
            Self::DateTrunc { column } => {
                format!("date_trunc_ymd({column}) between '{start}' and '{end}'")
            }
        }
    }
}

/// Inclusive range of calendar days to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    /// First day (inclusive)
    pub start: NaiveDate,
    /// Last day (inclusive)
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window covering one day
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Window covering `start..=end`
    pub fn range(start: NaiveDate, end: NaiveDate) -> Result<Self, QueryError> {
        if end < start {
            return Err(QueryError::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Whether the window is exactly one day
    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }

    /// Number of days covered
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Partition label for output paths (`2024-01-15` or `2024-01-15_2024-01-21`)
    pub fn partition(&self) -> String {
        if self.is_single_day() {
            self.start.format(DATE_FORMAT).to_string()
        } else {
            format!(
                "{}_{}",
                self.start.format(DATE_FORMAT),
                self.end.format(DATE_FORMAT)
            )
        }
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_day() {
            write!(f, "{}", self.start.format(DATE_FORMAT))
        } else {
            write!(
                f,
                "{} to {}",
                self.start.format(DATE_FORMAT),
                self.end.format(DATE_FORMAT)
            )
        }
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(input: &str) -> Result<NaiveDate, QueryError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|_| QueryError::InvalidDate(input.to_string()))
}

/// Builds page URLs for one dataset
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    base_url: Url,
    filter: FilterKind,
    page_size: u64,
}

impl QueryBuilder {
    /// Create a builder
    ///
    /// # Arguments
    /// * `base_url` - Resource endpoint (e.g., `https://data.cityofchicago.org/resource/wrvz-psew.json`)
    /// * `filter` - Date filter of the dataset
    /// * `page_size` - `$limit` of every page
    pub fn new(base_url: &str, filter: FilterKind, page_size: u64) -> Result<Self, QueryError> {
        let base_url = Url::parse(base_url).map_err(|e| QueryError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        if !is_soql_identifier(filter.column()) {
            return Err(QueryError::InvalidColumn(filter.column().to_string()));
        }

        if page_size == 0 {
            return Err(QueryError::ZeroPageSize);
        }

        Ok(Self {
            base_url,
            filter,
            page_size,
        })
    }

    /// Create a builder from a registry entry
    pub fn for_dataset(dataset: &DatasetConfig, page_size: u64) -> Result<Self, QueryError> {
        Self::new(&dataset.base_url, dataset.filter.clone(), page_size)
    }

    /// Records requested per page
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Dataset filter
    pub fn filter(&self) -> &FilterKind {
        &self.filter
    }

    /// `$where` clause for a window
    pub fn where_clause(&self, window: &DateWindow) -> String {
        self.filter.where_clause(window)
    }

    /// Full URL of the page starting at `offset`
    pub fn page_url(&self, window: &DateWindow, offset: u64) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("$where", &self.where_clause(window))
            .append_pair("$limit", &self.page_size.to_string())
            .append_pair("$offset", &offset.to_string());
        url
    }
}

fn is_soql_identifier(column: &str) -> bool {
    !column.is_empty()
        && column
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
