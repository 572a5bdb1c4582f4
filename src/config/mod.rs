//! Configuration module for Catalog-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use catalog_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sweep.toml")).unwrap();
//! println!("Sweeping with {} workers", config.scheduler.num_workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ClientConfig, Config, DownloadConfig, OutputConfig, SchedulerConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
