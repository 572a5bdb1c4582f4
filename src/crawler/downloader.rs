//! Download stage
//!
//! Download workers drain the frontier's download queue while the page
//! workers are still filling it:
//!
//! ```text
//!      Claiming ──── item ────► Downloading ── delay ──┐
//!        │  ▲                                          │
//!        │  └──────────────────────────────────────────┘
//!        │  ▲
//!        │  └── backoff ── Waiting ◄── queue empty, pages still running
//!        │
//!        └── queue drained after the page workers finished, or stopped ──► Done
//! ```
//!
//! Unlike page workers, a download worker leases a client per item, so it
//! never keeps a client away from the page workers while it waits.

use crate::crawler::client::ClientManager;
use crate::crawler::delay::DelayPolicy;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::retry::RetryPolicy;
use crate::state::{DownloadTask, Frontier};
use crate::url::UrlBuilder;
use crate::FetchError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything the download workers of one run share
pub(crate) struct DownloadContext {
    pub urls: UrlBuilder,
    pub frontier: Arc<Frontier>,
    pub clients: Arc<ClientManager>,
    pub delay: Arc<dyn DelayPolicy>,
    pub retry: RetryPolicy,
    pub idle_backoff: Duration,
    pub directory: PathBuf,
    pub stop: CancellationToken,
    /// Cancelled once every page worker has returned
    pub pages_done: CancellationToken,
}

enum DownloaderState {
    Claiming,
    Downloading(DownloadTask),
    Waiting,
    Done,
}

pub(crate) struct DownloadWorker {
    id: usize,
    ctx: Arc<DownloadContext>,
}

impl DownloadWorker {
    pub fn new(id: usize, ctx: Arc<DownloadContext>) -> Self {
        Self { id, ctx }
    }

    pub async fn run(self) -> crate::Result<()> {
        tracing::info!(downloader_id = self.id, "Download worker started");

        let mut state = DownloaderState::Claiming;
        loop {
            state = match state {
                DownloaderState::Claiming => self.claim(),
                DownloaderState::Waiting => {
                    if self.pause(self.ctx.idle_backoff).await {
                        DownloaderState::Claiming
                    } else {
                        DownloaderState::Done
                    }
                }
                DownloaderState::Downloading(task) => {
                    self.download(task).await?;
                    if self.pause(self.ctx.delay.next_delay()).await {
                        DownloaderState::Claiming
                    } else {
                        DownloaderState::Done
                    }
                }
                DownloaderState::Done => break,
            };
        }

        tracing::info!(downloader_id = self.id, "Download worker finished");
        Ok(())
    }

    fn claim(&self) -> DownloaderState {
        if self.ctx.stop.is_cancelled() {
            return DownloaderState::Done;
        }

        if let Some(task) = self.ctx.frontier.take_download() {
            return DownloaderState::Downloading(task);
        }

        if self.ctx.pages_done.is_cancelled() && self.ctx.frontier.is_download_drained() {
            DownloaderState::Done
        } else {
            tracing::trace!(downloader_id = self.id, "Download queue empty, waiting");
            DownloaderState::Waiting
        }
    }

    async fn download(&self, task: DownloadTask) -> crate::Result<()> {
        let frontier = &self.ctx.frontier;

        let client = tokio::select! {
            lease = self.ctx.clients.lease() => lease?,
            _ = self.ctx.stop.cancelled() => {
                frontier.requeue_download(task);
                return Ok(());
            }
        };

        let url = self.ctx.urls.download_url(&task.item_id);
        tracing::info!(
            downloader_id = self.id,
            item = %task.item_id,
            attempt = task.attempt_count + 1,
            "Downloading file"
        );

        match self.fetch_file(&*client, &url, &task.item_id).await {
            Ok(path) => {
                frontier.mark_downloaded(&task.item_id);
                tracing::info!(
                    downloader_id = self.id,
                    item = %task.item_id,
                    "Saved {}",
                    path.display()
                );
            }
            Err(error) => {
                self.ctx.retry.apply_download(frontier, task, error);
            }
        }

        Ok(())
    }

    async fn fetch_file(
        &self,
        client: &dyn Fetcher,
        url: &url::Url,
        item_id: &str,
    ) -> Result<PathBuf, FetchError> {
        let file = client.get_file(url).await?;
        if !file.is_success() {
            return Err(FetchError::HttpStatus(file.status_code));
        }
        if !file.is_pdf() {
            return Err(FetchError::Unexpected(format!(
                "expected application/pdf, got {}",
                file.content_type.as_deref().unwrap_or("no content type")
            )));
        }

        let path = self
            .ctx
            .directory
            .join(file_name(item_id, file.filename.as_deref()));
        save_file(&path, &file.bytes)
            .await
            .map_err(|e| FetchError::Unexpected(format!("failed to save {}: {}", path.display(), e)))?;

        Ok(path)
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

/// Picks the saved file name: the announced name's last component, else the item id
fn file_name(item_id: &str, announced: Option<&str>) -> String {
    let stem = announced
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| item_id.replace(['/', '\\'], "_"));

    if stem.to_ascii_lowercase().ends_with(".pdf") {
        stem
    } else {
        format!("{}.pdf", stem)
    }
}

async fn save_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}
