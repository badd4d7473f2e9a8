//! Extraction coordinator
//!
//! Launch-until-limit, block for one completion, repeat. Tasks are spawned
//! into a [`JoinSet`], which is the only place results come from; each task
//! holds one [`Semaphore`] permit for the duration of its fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::extractor::config::EngineConfig;
use crate::extractor::job::{EngineState, Extraction, ExtractionStats};
use crate::extractor::progress::{ProgressState, ProgressTracker};
use crate::extractor::{ExtractError, PageFailure, PageResult};
use crate::fetcher::query::{DateWindow, QueryBuilder};
use crate::fetcher::{PageFetcher, RetryingFetcher, SodaHttpClient};
use crate::metrics::{self, ExtractionMetrics};
use crate::shutdown::{self, SharedShutdown};
use crate::{Credentials, Page, Record};

/// Runs one extraction at a time over a dataset query
pub struct ExtractionEngine {
    fetcher: RetryingFetcher,
    query: Arc<QueryBuilder>,
    credentials: Credentials,
    config: EngineConfig,
    label: String,
    progress_tracker: ProgressTracker,
    shutdown: Option<SharedShutdown>,
}

impl ExtractionEngine {
    /// Create an engine over any page fetcher
    ///
    /// # Errors
    /// [`ExtractError::InvalidConfig`] when the configuration is out of bounds
    /// or its page size differs from the query's `$limit`.
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        query: QueryBuilder,
        credentials: Credentials,
        config: EngineConfig,
    ) -> Result<Self, ExtractError> {
        config.validate()?;

        if query.page_size() != config.page_size {
            return Err(ExtractError::InvalidConfig(format!(
                "query page size {} does not match engine page size {}",
                query.page_size(),
                config.page_size
            )));
        }

        Ok(Self {
            fetcher: RetryingFetcher::new(fetcher, config.retry),
            query: Arc::new(query),
            credentials,
            config,
            label: String::new(),
            progress_tracker: ProgressTracker::default(),
            shutdown: shutdown::get_global_shutdown(),
        })
    }

    /// Create an engine fetching over HTTP with the shared client
    pub fn with_http(
        query: QueryBuilder,
        credentials: Credentials,
        config: EngineConfig,
    ) -> Result<Self, ExtractError> {
        Self::new(
            Arc::new(SodaHttpClient::default()),
            query,
            credentials,
            config,
        )
    }

    /// Dataset name used in logs and metrics
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Override progress tracking configuration.
    pub fn with_progress_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.progress_tracker = tracker;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Extract every record matching the window
    ///
    /// Returns the aggregate once every launched page has been received, or
    /// the first failure once every launched page has finished.
    pub async fn run(&self, window: &DateWindow) -> Result<Extraction, ExtractError> {
        let span = info_span!(
            "extract",
            dataset = %self.label,
            start = %window.start,
            end = %window.end
        );

        async {
            let run_metrics = ExtractionMetrics::start(self.label.clone());
            let result = self.coordinate(window).await;
            match &result {
                Ok(extraction) => run_metrics.record_success(extraction.stats.records),
                Err(e) => run_metrics.record_failure(&e.to_string()),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn coordinate(&self, window: &DateWindow) -> Result<Extraction, ExtractError> {
        let started = Instant::now();
        let page_size = self.config.page_size;
        let concurrency = self.config.concurrency;

        info!(
            concurrency,
            page_size,
            max_attempts = self.config.retry.max_attempts,
            filter = %self.query.where_clause(window),
            "Starting extraction"
        );

        let permits = Arc::new(Semaphore::new(concurrency));
        let mut tasks: JoinSet<PageResult> = JoinSet::new();
        let mut launched: HashMap<Id, (u64, u64)> = HashMap::new();

        let mut state = EngineState::Launching;
        let mut next_offset = 0u64;
        let mut batch_index = 0u64;
        let mut offsets_issued = Vec::new();
        let mut records: Vec<Record> = Vec::new();
        let mut terminal: Option<ExtractError> = None;
        let mut progress = self.progress_tracker.create_state();

        loop {
            if state.is_launching() && self.shutdown_requested() {
                warn!("Shutdown requested - draining in-flight pages");
                terminal.get_or_insert(ExtractError::Cancelled);
                state = EngineState::Draining;
            }

            if state.is_launching() {
                // Finished-but-unread results still occupy a slot, so launches
                // stay bounded by the pages actually consumed.
                while tasks.len() < concurrency {
                    let Ok(permit) = permits.clone().try_acquire_owned() else {
                        break;
                    };
                    let offset = next_offset;
                    let handle = tasks.spawn(self.page_task(window, offset, batch_index, permit));
                    launched.insert(handle.id(), (offset, batch_index));
                    offsets_issued.push(offset);
                    debug!(offset, batch = batch_index, "Launched page");

                    batch_index += 1;
                    next_offset += page_size;
                }
            }

            if tasks.is_empty() {
                break;
            }
            metrics::set_pages_in_flight(pages_running(&permits, concurrency));

            let joined = match (&self.shutdown, state.is_launching()) {
                (Some(shutdown), true) => {
                    tokio::select! {
                        joined = tasks.join_next_with_id() => joined,
                        _ = shutdown.wait_for_shutdown() => continue,
                    }
                }
                _ => tasks.join_next_with_id().await,
            };
            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((id, Ok(page))) => {
                    launched.remove(&id);
                    if terminal.is_some() {
                        debug!(
                            offset = page.offset,
                            batch = page.batch_index,
                            "Discarding page received after failure"
                        );
                        continue;
                    }

                    if page.is_tail(page_size) && state.is_launching() {
                        info!(
                            offset = page.offset,
                            batch = page.batch_index,
                            records = page.len(),
                            "Reached end of dataset"
                        );
                        state = EngineState::Draining;
                    }

                    let running = pages_running(&permits, concurrency);
                    self.absorb(page, &mut records, &mut progress, running);
                }
                Ok((id, Err(failure))) => {
                    launched.remove(&id);
                    self.record_failure(failure.into(), &mut terminal);
                    state = EngineState::Draining;
                }
                Err(join_err) => {
                    let (offset, batch) = launched.remove(&join_err.id()).unwrap_or_default();
                    self.record_failure(task_aborted(offset, batch, &join_err), &mut terminal);
                    state = EngineState::Draining;
                }
            }
        }

        metrics::set_pages_in_flight(0);

        if let Some(err) = terminal {
            state = EngineState::Failed;
            error!(
                state = %state,
                batches = offsets_issued.len(),
                error = %err,
                "Extraction failed"
            );
            return Err(err);
        }

        state = EngineState::Done;
        let stats = ExtractionStats {
            offsets_issued,
            pages: progress.pages,
            records: records.len() as u64,
            elapsed: started.elapsed(),
        };
        info!(
            state = %state,
            pages = stats.pages,
            records = stats.records,
            elapsed_ms = stats.elapsed.as_millis(),
            "Extraction finished"
        );

        Ok(Extraction { records, stats })
    }

    /// Future fetching one page. Releases its permit before reporting.
    fn page_task(
        &self,
        window: &DateWindow,
        offset: u64,
        batch_index: u64,
        permit: OwnedSemaphorePermit,
    ) -> impl std::future::Future<Output = PageResult> + Send + 'static {
        let fetcher = self.fetcher.clone();
        let credentials = self.credentials.clone();
        let url = self.query.page_url(window, offset);

        async move {
            let result = fetcher.fetch(&url, &credentials, offset).await;
            drop(permit);

            match result {
                Ok(records) => Ok(Page::new(offset, batch_index, records)),
                Err(cause) => Err(PageFailure {
                    offset,
                    batch_index,
                    cause,
                }),
            }
        }
    }

    fn absorb(
        &self,
        page: Page,
        records: &mut Vec<Record>,
        progress: &mut ProgressState,
        in_flight: usize,
    ) {
        debug!(
            offset = page.offset,
            batch = page.batch_index,
            records = page.len(),
            "Page received"
        );
        metrics::record_page(page.len());
        progress.record_page(page.len());
        records.extend(page.records);

        if progress.should_emit_update() {
            info!("{}", progress.format_progress(in_flight));
            progress.mark_emitted();
        }
    }

    fn record_failure(&self, err: ExtractError, terminal: &mut Option<ExtractError>) {
        match terminal {
            None => {
                warn!(error = %err, "Page failed permanently - draining in-flight pages");
                *terminal = Some(err);
            }
            Some(_) => warn!(error = %err, "Additional page failure while draining"),
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}

/// Pages whose fetch is still running. Tasks release their permit before
/// reporting, so finished-but-unread results are not counted.
fn pages_running(permits: &Semaphore, concurrency: usize) -> usize {
    concurrency.saturating_sub(permits.available_permits())
}

fn task_aborted(offset: u64, batch_index: u64, err: &JoinError) -> ExtractError {
    let reason = if err.is_panic() {
        "page task panicked".to_string()
    } else {
        err.to_string()
    };
    ExtractError::TaskAborted {
        offset,
        batch_index,
        reason,
    }
}
