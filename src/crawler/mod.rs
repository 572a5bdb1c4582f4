//! Crawler module for paginated listing sweeps
//!
//! This module contains the core sweeping logic, including:
//! - HTTP fetching through a bounded client pool
//! - HTML extraction of item identifiers
//! - The per-worker loop with retries and polite delays
//! - Downloading the PDF of every discovered item
//! - Overall run orchestration and reporting

mod client;
mod coordinator;
mod delay;
mod downloader;
mod extractor;
mod fetcher;
mod retry;
mod scheduler;
mod worker;

pub use client::{read_proxies, ClientLease, ClientManager};
pub use coordinator::{run_sweep, Coordinator, SweepOutcome};
pub use delay::{DelayPolicy, JitteredDelay, NoDelay};
pub use extractor::{Extractor, RusnebExtractor};
pub use fetcher::{build_http_client, Fetcher, FileResponse, HttpFetcher, PageResponse};
pub use retry::{FailureClass, RetryDecision, RetryPolicy};
pub use scheduler::{DownloadOptions, RunReport, Scheduler, SchedulerOptions};
