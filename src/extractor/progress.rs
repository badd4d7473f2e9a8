//! Progress reporting for long extractions.
//!
//! The total size of a dataset is unknown until its tail page arrives, so
//! progress is count- and rate-based rather than percentage-based.

use std::time::{Duration, Instant};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_PAGE_STEP: u64 = 10;

/// Lightweight builder that controls update cadence.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    update_interval: Duration,
    page_step: u64,
}

impl ProgressTracker {
    /// Create a tracker emitting every `page_step` pages or every `update_interval`.
    pub fn new(update_interval: Duration, page_step: u64) -> Self {
        Self {
            update_interval,
            page_step: page_step.max(1),
        }
    }

    /// Build a [`ProgressState`] configured with the tracker defaults.
    pub fn create_state(&self) -> ProgressState {
        let mut state = ProgressState::new();
        state.update_interval = self.update_interval;
        state.page_step = self.page_step;
        state
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL, DEFAULT_PAGE_STEP)
    }
}

/// Progress state of one run.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Pages aggregated so far.
    pub pages: u64,
    /// Records aggregated so far.
    pub records: u64,
    /// When the run started.
    pub start_time: Instant,
    /// Last time progress was reported.
    pub last_update: Instant,
    /// Minimum interval between time-based updates.
    pub update_interval: Duration,
    /// Page count delta that forces an update.
    pub page_step: u64,
    /// Pages at the last update.
    pub last_reported_pages: u64,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    /// Create a state with default cadence.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            pages: 0,
            records: 0,
            start_time: now,
            last_update: now,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            page_step: DEFAULT_PAGE_STEP,
            last_reported_pages: 0,
        }
    }

    /// Count one aggregated page.
    pub fn record_page(&mut self, records: usize) {
        self.pages += 1;
        self.records = self.records.saturating_add(records as u64);
    }

    /// Records per second since start.
    pub fn rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.records as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Whether an update is due.
    pub fn should_emit_update(&self) -> bool {
        if self.pages == 0 {
            return false;
        }

        self.pages - self.last_reported_pages >= self.page_step
            || self.last_update.elapsed() >= self.update_interval
    }

    /// Call after emitting a progress log.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        self.last_reported_pages = self.pages;
    }

    /// Human-readable progress string for logging.
    pub fn format_progress(&self, in_flight: usize) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] Extracted {} records from {} pages",
            self.records, self.pages
        )];

        let rate = self.rate();
        if rate > 0.0 {
            parts.push(format!("at {rate:.0} records/sec"));
        }

        parts.push(format!("({in_flight} in flight)"));
        parts.join(" ")
    }
}
