use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Catalog-Sweep
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Worker pool and retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of concurrent page workers
    #[serde(rename = "num-workers")]
    pub num_workers: usize,

    /// Number of pages a worker claims at once
    #[serde(rename = "chunk-size")]
    pub chunk_size: usize,

    /// Attempts allowed for one page before it is abandoned
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Pause when no task is available but the catalog is not drained (milliseconds)
    #[serde(rename = "idle-backoff-ms")]
    pub idle_backoff_ms: u64,

    /// Lower bound of the pause between two requests of one worker (milliseconds)
    #[serde(rename = "request-delay-min-ms")]
    pub request_delay_min_ms: u64,

    /// Upper bound of the pause between two requests of one worker (milliseconds)
    #[serde(rename = "request-delay-max-ms")]
    pub request_delay_max_ms: u64,

    /// Highest page number ever allocated; unlimited when unset
    #[serde(rename = "max-pages")]
    pub max_pages: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            num_workers: 3,
            chunk_size: 10,
            max_retries: 3,
            idle_backoff_ms: 500,
            request_delay_min_ms: 500,
            request_delay_max_ms: 2000,
            max_pages: None,
        }
    }
}

impl SchedulerConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn request_delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.request_delay_min_ms),
            Duration::from_millis(self.request_delay_max_ms),
        )
    }
}

/// HTTP client pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Site root every page URL is built from
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Number of clients in the pool; defaults to the worker count
    #[serde(rename = "pool-size")]
    pub pool_size: Option<usize>,

    /// One proxy per line; one client is built per usable proxy
    #[serde(rename = "proxy-file")]
    pub proxy_file: Option<PathBuf>,

    /// Interpret the proxy file as a SOCKS5 host list
    pub socks5: bool,

    /// Whole-request timeout for file downloads (seconds)
    #[serde(rename = "download-timeout-secs")]
    pub download_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rusneb.ru/".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: format!("catalog-sweep/{}", env!("CARGO_PKG_VERSION")),
            pool_size: None,
            proxy_file: None,
            socks5: false,
            download_timeout_secs: 120,
        }
    }
}

impl ClientConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Download stage configuration
///
/// The stage is off unless `workers` is at least 1.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Number of concurrent download workers
    pub workers: usize,

    /// Attempts allowed for one item before it is abandoned
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Directory the PDF files are saved to
    pub directory: PathBuf,

    /// Lower bound of the pause between two downloads of one worker (milliseconds)
    #[serde(rename = "request-delay-min-ms")]
    pub request_delay_min_ms: u64,

    /// Upper bound of the pause between two downloads of one worker (milliseconds)
    #[serde(rename = "request-delay-max-ms")]
    pub request_delay_max_ms: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            max_retries: 3,
            directory: PathBuf::from("results/downloads"),
            request_delay_min_ms: 1000,
            request_delay_max_ms: 3000,
        }
    }
}

impl DownloadConfig {
    pub fn enabled(&self) -> bool {
        self.workers > 0
    }

    pub fn request_delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.request_delay_min_ms),
            Duration::from_millis(self.request_delay_max_ms),
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where the discovered item identifiers are written, one per line
    #[serde(rename = "items-path")]
    pub items_path: PathBuf,

    /// Optional log file receiving INFO and above regardless of console verbosity
    #[serde(rename = "log-file")]
    pub log_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            items_path: PathBuf::from("results/items.txt"),
            log_file: None,
        }
    }
}
