//! Sweep coordinator - wires configuration to a scheduler run
//!
//! The coordinator builds the client pool, URL builder and extractor from a
//! [`Config`], seeds the frontier with already downloaded items and runs the
//! scheduler until the catalog drains or Ctrl-C is pressed. With download
//! workers configured, discovered items are downloaded during the same run.

use crate::config::Config;
use crate::crawler::client::ClientManager;
use crate::crawler::extractor::RusnebExtractor;
use crate::crawler::scheduler::{DownloadOptions, RunReport, Scheduler, SchedulerOptions};
use crate::url::{ParseRequest, UrlBuilder};
use std::collections::HashSet;
use std::sync::Arc;

/// Result of a finished sweep
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub report: RunReport,
    /// Newly discovered item ids, in discovery order
    pub items: Vec<String>,
    /// Items still waiting for download when the run ended; empty without downloads
    pub pending_downloads: Vec<String>,
}

/// Main sweep coordinator structure
pub struct Coordinator {
    scheduler: Scheduler,
    downloads: bool,
}

impl Coordinator {
    /// Creates a coordinator for one request
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `request` - What to harvest
    /// * `downloaded` - Item ids that must not be queued again
    ///
    /// # Errors
    ///
    /// Fails if the base URL is unusable, the proxy file cannot be read, or no
    /// HTTP client can be built.
    pub fn new(
        config: &Config,
        request: ParseRequest,
        downloaded: HashSet<String>,
    ) -> crate::Result<Self> {
        let urls = UrlBuilder::new(&config.client.base_url)?;
        let workers = config.scheduler.num_workers + config.download.workers;
        let clients = ClientManager::from_config(&config.client, workers)?;

        if clients.size() < workers {
            tracing::warn!(
                "Only {} clients for {} workers; extra workers will wait for a free client",
                clients.size(),
                workers
            );
        }

        if !downloaded.is_empty() {
            tracing::info!("Skipping {} already downloaded items", downloaded.len());
        }

        let scheduler = Scheduler::new(
            request,
            urls,
            Arc::new(clients),
            Arc::new(RusnebExtractor),
            SchedulerOptions::from(&config.scheduler),
        )
        .with_downloaded(downloaded)
        .with_downloads(DownloadOptions::from(&config.download));

        Ok(Self {
            scheduler,
            downloads: config.download.enabled(),
        })
    }

    /// Runs the sweep; Ctrl-C stops it early and flags the report
    pub async fn run(self) -> SweepOutcome {
        let frontier = self.scheduler.frontier();
        let report = self.scheduler.run_until(ctrl_c()).await;

        let pending_downloads = if self.downloads {
            frontier.drain_download_queue()
        } else {
            Vec::new()
        };

        SweepOutcome {
            report,
            items: frontier.items(),
            pending_downloads,
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Runs a complete sweep
///
/// This is the main entry point used by the binary.
pub async fn run_sweep(
    config: &Config,
    request: ParseRequest,
    downloaded: HashSet<String>,
) -> crate::Result<SweepOutcome> {
    let coordinator = Coordinator::new(config, request, downloaded)?;
    Ok(coordinator.run().await)
}
