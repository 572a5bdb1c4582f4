//! Catalog-Sweep: a polite paginated catalog harvester
//!
//! This crate implements a bounded-concurrency crawl scheduler that drains a paginated
//! listing (search results or a catalog browse view), discovers pages on demand,
//! deduplicates the item identifiers it finds and retries transient failures.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Catalog-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid proxy entry '{line}': {reason}")]
    Proxy { line: String, reason: String },

    #[error("Client pool is empty")]
    NoClients,

    #[error("Client pool was closed")]
    PoolClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Failure of a single page fetch/parse attempt
///
/// These never escape a worker: the retry policy decides whether the page
/// is attempted again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Result type alias for Catalog-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{RunReport, Scheduler};
pub use state::{Frontier, PageTask};
pub use url::{ParseRequest, SearchMode, UrlBuilder};
