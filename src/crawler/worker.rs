//! Per-worker crawl loop
//!
//! Each worker is a small state machine:
//!
//! ```text
//!             ┌──────────────── chunk done ────────────────┐
//!             ▼                                            │
//!      FetchingTasks ──── tasks ───────────────────► Processing
//!        │      ▲
//!        │      └── backoff elapsed ── IdleBackoff ◄── no tasks, not drained
//!        │
//!        └── drained or stopped ──► Done
//! ```
//!
//! The worker leases one client when it starts and holds it until it returns.

use crate::crawler::client::ClientManager;
use crate::crawler::delay::DelayPolicy;
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::retry::RetryPolicy;
use crate::state::{Frontier, PageTask, RecordOutcome};
use crate::url::{ParseRequest, UrlBuilder};
use crate::FetchError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything the workers of one run share
pub(crate) struct WorkerContext {
    pub request: ParseRequest,
    pub urls: UrlBuilder,
    pub frontier: Arc<Frontier>,
    pub clients: Arc<ClientManager>,
    pub extractor: Arc<dyn Extractor>,
    pub delay: Arc<dyn DelayPolicy>,
    pub retry: RetryPolicy,
    pub chunk_size: usize,
    pub idle_backoff: Duration,
    pub stop: CancellationToken,
}

enum WorkerState {
    FetchingTasks,
    Processing(Vec<PageTask>),
    IdleBackoff,
    Done,
}

pub(crate) struct Worker {
    id: usize,
    ctx: Arc<WorkerContext>,
}

impl Worker {
    pub fn new(id: usize, ctx: Arc<WorkerContext>) -> Self {
        Self { id, ctx }
    }

    /// Runs the loop until the frontier drains or the stop signal fires
    pub async fn run(self) -> crate::Result<()> {
        let client = tokio::select! {
            lease = self.ctx.clients.lease() => lease?,
            _ = self.ctx.stop.cancelled() => return Ok(()),
        };

        tracing::info!(worker_id = self.id, "Worker started");

        let mut state = WorkerState::FetchingTasks;
        loop {
            state = match state {
                WorkerState::FetchingTasks => self.fetch_tasks(),
                WorkerState::IdleBackoff => {
                    if self.pause(self.ctx.idle_backoff).await {
                        WorkerState::FetchingTasks
                    } else {
                        WorkerState::Done
                    }
                }
                WorkerState::Processing(tasks) => {
                    self.process_chunk(&*client, tasks).await;
                    WorkerState::FetchingTasks
                }
                WorkerState::Done => break,
            };
        }

        tracing::info!(worker_id = self.id, "Worker finished");
        Ok(())
    }

    fn fetch_tasks(&self) -> WorkerState {
        if self.ctx.stop.is_cancelled() {
            return WorkerState::Done;
        }

        let tasks = self.ctx.frontier.next_tasks(self.id, self.ctx.chunk_size);
        if !tasks.is_empty() {
            tracing::trace!(worker_id = self.id, count = tasks.len(), "Claimed tasks");
            return WorkerState::Processing(tasks);
        }

        if self.ctx.frontier.is_drained() {
            tracing::info!(worker_id = self.id, "No pages left");
            WorkerState::Done
        } else {
            WorkerState::IdleBackoff
        }
    }

    async fn process_chunk(&self, client: &dyn Fetcher, tasks: Vec<PageTask>) {
        let mut tasks = tasks.into_iter();

        while let Some(task) = tasks.next() {
            if self.ctx.stop.is_cancelled() {
                break;
            }

            let page = task.page_number;
            if self.process_page(client, task).await {
                let rest: Vec<PageTask> = tasks.collect();
                if !rest.is_empty() {
                    let count = rest.len();
                    let dropped = self.ctx.frontier.return_unfinished(rest);
                    tracing::debug!(
                        worker_id = self.id,
                        page,
                        requeued = count - dropped,
                        dropped,
                        "Empty page ended the chunk early"
                    );
                }
                break;
            }

            if !self.pause(self.ctx.delay.next_delay()).await {
                break;
            }
        }
    }

    /// Fetches, parses and commits one page
    ///
    /// Returns true if the page came back empty, which ends the chunk.
    async fn process_page(&self, client: &dyn Fetcher, mut task: PageTask) -> bool {
        let page = task.page_number;
        let frontier = &self.ctx.frontier;

        if self.already_processed(&mut task) {
            tracing::trace!(worker_id = self.id, page, "Page already processed");
            return task.no_more_pages;
        }

        let url = self.ctx.urls.page_url(&self.ctx.request, page);
        tracing::info!(worker_id = self.id, page, %url, "Processing page");

        let items = match self.fetch_items(client, &url).await {
            Ok(items) => items,
            Err(error) => {
                self.ctx.retry.apply(frontier, task, error);
                return false;
            }
        };

        if items.is_empty() {
            tracing::warn!(worker_id = self.id, page, "No items found on page");
        }

        match frontier.record_result(&mut task, &items) {
            RecordOutcome::Duplicate => {
                tracing::debug!(worker_id = self.id, page, "Page was committed by another worker");
            }
            RecordOutcome::Recorded {
                new_items,
                catalog_exhausted,
            } => {
                if items.is_empty() && catalog_exhausted {
                    tracing::warn!(
                        "Looks like the end of the catalog was reached at page {}",
                        page.saturating_sub(1)
                    );
                } else if !items.is_empty() {
                    tracing::info!(
                        worker_id = self.id,
                        page,
                        "Page {}: found {} items, {} new",
                        page,
                        items.len(),
                        new_items
                    );
                }
            }
        }

        task.no_more_pages
    }

    /// Marks `task` processed if its page was already committed, as a duplicate commit would
    fn already_processed(&self, task: &mut PageTask) -> bool {
        if self.ctx.frontier.is_processed(task.page_number) {
            task.processed = true;
            true
        } else {
            false
        }
    }

    async fn fetch_items(&self, client: &dyn Fetcher, url: &Url) -> Result<Vec<String>, FetchError> {
        let response = client.get(url).await?;
        if !response.is_success() {
            return Err(FetchError::HttpStatus(response.status_code));
        }
        Ok(self
            .ctx
            .extractor
            .extract(&response.body, self.ctx.request.mode()))
    }

    /// Sleeps for `duration` unless stopped first; returns false if stopped
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.ctx.stop.is_cancelled();
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.ctx.stop.is_cancelled(),
            _ = self.ctx.stop.cancelled() => false,
        }
    }
}
