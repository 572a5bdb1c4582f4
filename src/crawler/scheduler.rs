//! Run orchestration
//!
//! The scheduler owns the stop signal, spawns the worker pool and waits for it.
//! With downloads enabled a second pool of download workers runs alongside the
//! page workers and drains the download queue after the last page is done.
//! Whatever way the run ends (every worker done, a worker failing, external
//! shutdown) the same cleanup path runs and a [`RunReport`] is produced.

use crate::config::{DownloadConfig, SchedulerConfig};
use crate::crawler::client::ClientManager;
use crate::crawler::delay::{DelayPolicy, JitteredDelay};
use crate::crawler::downloader::{DownloadContext, DownloadWorker};
use crate::crawler::extractor::Extractor;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::worker::{Worker, WorkerContext};
use crate::state::Frontier;
use crate::url::{ParseRequest, UrlBuilder};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Tuning knobs for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub num_workers: usize,
    pub chunk_size: usize,
    pub max_retries: u32,
    pub idle_backoff: Duration,
    pub request_delay: (Duration, Duration),
    pub max_pages: Option<u64>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for SchedulerOptions {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            num_workers: config.num_workers,
            chunk_size: config.chunk_size,
            max_retries: config.max_retries,
            idle_backoff: config.idle_backoff(),
            request_delay: config.request_delay_range(),
            max_pages: config.max_pages,
        }
    }
}

/// Download stage settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub workers: usize,
    pub max_retries: u32,
    pub directory: PathBuf,
    pub request_delay: (Duration, Duration),
}

impl From<&DownloadConfig> for DownloadOptions {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            workers: config.workers,
            max_retries: config.max_retries,
            directory: config.directory.clone(),
            request_delay: config.request_delay_range(),
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub pages_processed: usize,
    pub items_found: usize,
    pub items_downloaded: usize,
    pub failed_pages: Vec<u64>,
    pub failed_downloads: Vec<String>,
    pub max_page_found: u64,
    pub catalog_exhausted: bool,
    pub has_error: bool,
}

/// Drives a pool of workers over one shared frontier
pub struct Scheduler {
    request: ParseRequest,
    urls: UrlBuilder,
    clients: Arc<ClientManager>,
    extractor: Arc<dyn Extractor>,
    delay: Arc<dyn DelayPolicy>,
    frontier: Arc<Frontier>,
    options: SchedulerOptions,
    downloads: Option<DownloadOptions>,
    stop: CancellationToken,
}

impl Scheduler {
    pub fn new(
        request: ParseRequest,
        urls: UrlBuilder,
        clients: Arc<ClientManager>,
        extractor: Arc<dyn Extractor>,
        options: SchedulerOptions,
    ) -> Self {
        let (min, max) = options.request_delay;
        let frontier = Frontier::new().with_page_limit(options.max_pages);

        Self {
            request,
            urls,
            clients,
            extractor,
            delay: Arc::new(JitteredDelay::new(min, max)),
            frontier: Arc::new(frontier),
            options,
            downloads: None,
            stop: CancellationToken::new(),
        }
    }

    /// Starts from a frontier that already knows these items as downloaded
    pub fn with_downloaded<I>(mut self, downloaded: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let frontier = Frontier::with_downloaded(downloaded).with_page_limit(self.options.max_pages);
        self.frontier = Arc::new(frontier);
        self
    }

    /// Downloads every discovered item while the sweep runs
    ///
    /// Zero download workers leaves the stage off.
    pub fn with_downloads(mut self, downloads: DownloadOptions) -> Self {
        self.downloads = (downloads.workers > 0).then_some(downloads);
        self
    }

    /// Replaces the pause taken between two requests of a worker
    pub fn with_delay(mut self, delay: Arc<dyn DelayPolicy>) -> Self {
        self.delay = delay;
        self
    }

    /// Shared frontier; still readable after the run
    pub fn frontier(&self) -> Arc<Frontier> {
        Arc::clone(&self.frontier)
    }

    /// Token that stops the run when cancelled
    ///
    /// Stopping a run from outside is treated like any other forced shutdown:
    /// the report carries the error flag.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Runs until the frontier drains or a worker fails
    pub async fn run(self) -> RunReport {
        self.run_until(std::future::pending()).await
    }

    /// Runs until the frontier drains, a worker fails, or `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let num_workers = self.options.num_workers.max(1);

        tracing::info!(
            query = self.request.query(),
            mode = %self.request.mode(),
            "Starting sweep with {} workers",
            num_workers
        );

        let ctx = Arc::new(WorkerContext {
            request: self.request.clone(),
            urls: self.urls.clone(),
            frontier: Arc::clone(&self.frontier),
            clients: Arc::clone(&self.clients),
            extractor: Arc::clone(&self.extractor),
            delay: Arc::clone(&self.delay),
            retry: RetryPolicy::new(self.options.max_retries),
            chunk_size: self.options.chunk_size.max(1),
            idle_backoff: self.options.idle_backoff,
            stop: self.stop.clone(),
        });

        let mut workers = JoinSet::new();
        for id in 0..num_workers {
            workers.spawn(Worker::new(id, Arc::clone(&ctx)).run());
        }

        let pages_done = CancellationToken::new();
        let mut downloaders = JoinSet::new();
        if let Some(downloads) = &self.downloads {
            tracing::info!(
                "Downloading into {} with {} workers",
                downloads.directory.display(),
                downloads.workers
            );
            let (min, max) = downloads.request_delay;
            let ctx = Arc::new(DownloadContext {
                urls: self.urls.clone(),
                frontier: Arc::clone(&self.frontier),
                clients: Arc::clone(&self.clients),
                delay: Arc::new(JitteredDelay::new(min, max)),
                retry: RetryPolicy::new(downloads.max_retries),
                idle_backoff: self.options.idle_backoff,
                directory: downloads.directory.clone(),
                stop: self.stop.clone(),
                pages_done: pages_done.clone(),
            });
            for id in 0..downloads.workers {
                downloaders.spawn(DownloadWorker::new(id, Arc::clone(&ctx)).run());
            }
        }

        tokio::pin!(shutdown);
        let mut failed = false;
        let mut parsing = true;

        loop {
            if !parsing && downloaders.is_empty() {
                break;
            }

            tokio::select! {
                joined = workers.join_next(), if parsing => match joined {
                    None => {
                        tracing::info!("All page workers finished");
                        parsing = false;
                        pages_done.cancel();
                    }
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(e))) => {
                        tracing::error!("Worker failed: {}", e);
                        failed = true;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!("Worker task died: {}", e);
                        failed = true;
                        break;
                    }
                },
                joined = downloaders.join_next(), if !downloaders.is_empty() => match joined {
                    None | Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(e))) => {
                        tracing::error!("Download worker failed: {}", e);
                        failed = true;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!("Download worker task died: {}", e);
                        failed = true;
                        break;
                    }
                },
                _ = &mut shutdown => {
                    tracing::warn!("Shutdown requested, stopping workers");
                    failed = true;
                    break;
                }
            }
        }

        if self.stop.is_cancelled() {
            tracing::warn!("Sweep was stopped before the catalog drained");
            failed = true;
        }

        if failed {
            self.frontier.mark_error();
        }
        self.stop.cancel();
        workers.abort_all();
        downloaders.abort_all();
        while workers.join_next().await.is_some() {}
        while downloaders.join_next().await.is_some() {}

        let report = self.report(started_at, start.elapsed());
        tracing::info!(
            pages = report.pages_processed,
            items = report.items_found,
            downloaded = report.items_downloaded,
            failed = report.failed_pages.len(),
            "Sweep finished in {:.2}s",
            report.elapsed.as_secs_f64()
        );
        report
    }

    fn report(&self, started_at: DateTime<Utc>, elapsed: Duration) -> RunReport {
        let snapshot = self.frontier.snapshot();
        RunReport {
            started_at,
            elapsed,
            pages_processed: snapshot.processed_pages.len(),
            items_found: snapshot.discovered.len(),
            items_downloaded: snapshot.downloads_completed,
            failed_pages: snapshot.failed_pages.into_iter().collect(),
            failed_downloads: snapshot.failed_downloads.into_iter().collect(),
            max_page_found: snapshot.max_page_found,
            catalog_exhausted: snapshot.no_more_pages,
            has_error: snapshot.has_error,
        }
    }
}
