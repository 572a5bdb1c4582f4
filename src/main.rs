//! Catalog-Sweep main entry point
//!
//! This is the command-line interface for the Catalog-Sweep harvester.

use anyhow::{bail, Context};
use catalog_sweep::config::{load_config, validate, Config};
use catalog_sweep::crawler::run_sweep;
use catalog_sweep::output::{load_item_list, print_report, write_item_list};
use catalog_sweep::url::{ParseRequest, UrlBuilder};
use clap::Parser;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Catalog-Sweep: a polite paginated catalog harvester
///
/// Walks the volume listing of a catalog entry (or the results of a search)
/// page by page with a small pool of workers and writes every item id found.
#[derive(Parser, Debug)]
#[command(name = "catalog-sweep")]
#[command(version)]
#[command(about = "A polite paginated catalog harvester", long_about = None)]
struct Cli {
    /// Catalog id to browse, or search text with --search
    #[arg(value_name = "QUERY")]
    query: String,

    /// Treat QUERY as free-text search instead of a catalog id
    #[arg(long)]
    search: bool,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Pages claimed by a worker at once
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Attempts per page before giving up
    #[arg(long)]
    max_retries: Option<u32>,

    /// Never request pages above this number
    #[arg(long)]
    max_pages: Option<u64>,

    /// Number of concurrent download workers (0 disables downloads)
    #[arg(long)]
    download_workers: Option<usize>,

    /// Directory downloaded PDF files are saved to
    #[arg(long, value_name = "DIR")]
    download_dir: Option<PathBuf>,

    /// Where to write discovered item ids
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// File of already downloaded item ids to skip
    #[arg(long, value_name = "FILE")]
    skip_file: Option<PathBuf>,

    /// Also write INFO logs to this file; the console then shows warnings only
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Validate config and show the first page URL without sweeping
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn request(&self) -> ParseRequest {
        if self.search {
            ParseRequest::search(self.query.as_str())
        } else {
            ParseRequest::catalog(self.query.as_str())
        }
    }

    /// Applies command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(workers) = self.workers {
            config.scheduler.num_workers = workers;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.scheduler.chunk_size = chunk_size;
        }
        if let Some(max_retries) = self.max_retries {
            config.scheduler.max_retries = max_retries;
        }
        if let Some(max_pages) = self.max_pages {
            config.scheduler.max_pages = Some(max_pages);
        }
        if let Some(workers) = self.download_workers {
            config.download.workers = workers;
        }
        if let Some(dir) = &self.download_dir {
            config.download.directory = dir.clone();
        }
        if let Some(output) = &self.output {
            config.output.items_path = output.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.output.log_file = Some(log_file.clone());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    cli.apply_overrides(&mut config);

    setup_logging(cli.verbose, cli.quiet, config.output.log_file.as_deref())?;
    if let Some(path) = &cli.config {
        tracing::info!("Loaded configuration from: {}", path.display());
    }

    validate(&config).context("Invalid configuration")?;

    let request = cli.request();

    if cli.dry_run {
        return handle_dry_run(&config, &request);
    }

    let downloaded = match &cli.skip_file {
        Some(path) => load_item_list(path)
            .with_context(|| format!("Failed to read skip file {}", path.display()))?,
        None => HashSet::new(),
    };

    let outcome = run_sweep(&config, request, downloaded)
        .await
        .context("Sweep failed to start")?;

    write_item_list(&config.output.items_path, &outcome.items).with_context(|| {
        format!(
            "Failed to write items to {}",
            config.output.items_path.display()
        )
    })?;

    if !outcome.pending_downloads.is_empty() {
        tracing::warn!(
            "{} items were left in the download queue",
            outcome.pending_downloads.len()
        );
        tracing::debug!("Not downloaded: {}", outcome.pending_downloads.join(", "));
    }

    if !cli.quiet {
        print_report(&outcome.report);
    }

    if outcome.report.has_error {
        bail!("Sweep did not finish cleanly");
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// With a log file, INFO and above go to the file and the console keeps only
/// warnings unless `-v` is given.
fn setup_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 if log_file.is_some() => EnvFilter::new("warn"),
            0 => EnvFilter::new("catalog_sweep=info,warn"),
            1 => EnvFilter::new("catalog_sweep=debug,info"),
            2 => EnvFilter::new("catalog_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(filter);

    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(EnvFilter::new("catalog_sweep=info,warn")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install the logger")?;

    Ok(())
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, request: &ParseRequest) -> anyhow::Result<()> {
    let urls = UrlBuilder::new(&config.client.base_url).context("Invalid base URL")?;

    println!("=== Catalog-Sweep Dry Run ===\n");

    println!("Request:");
    println!("  Mode: {}", request.mode());
    println!("  Query: {}", request.query());
    println!("  First page: {}", urls.page_url(request, 1));

    let scheduler = &config.scheduler;
    println!("\nScheduler:");
    println!("  Workers: {}", scheduler.num_workers);
    println!("  Chunk size: {}", scheduler.chunk_size);
    println!("  Max retries: {}", scheduler.max_retries);
    println!("  Idle backoff: {}ms", scheduler.idle_backoff_ms);
    println!(
        "  Request delay: {}-{}ms",
        scheduler.request_delay_min_ms, scheduler.request_delay_max_ms
    );
    match scheduler.max_pages {
        Some(limit) => println!("  Page limit: {}", limit),
        None => println!("  Page limit: none"),
    }

    let client = &config.client;
    println!("\nClient:");
    println!("  Base URL: {}", client.base_url);
    println!("  User agent: {}", client.user_agent);
    println!("  Timeout: {}s", client.timeout_secs);
    match &client.proxy_file {
        Some(path) => println!(
            "  Proxies: {} ({})",
            path.display(),
            if client.socks5 { "socks5" } else { "http" }
        ),
        None => println!(
            "  Pool size: {}",
            client
                .pool_size
                .unwrap_or(scheduler.num_workers + config.download.workers)
        ),
    }

    let download = &config.download;
    println!("\nDownloads:");
    if download.enabled() {
        println!("  Workers: {}", download.workers);
        println!("  Directory: {}", download.directory.display());
        println!("  Max retries: {}", download.max_retries);
        println!(
            "  Request delay: {}-{}ms",
            download.request_delay_min_ms, download.request_delay_max_ms
        );
        println!("  Timeout: {}s", client.download_timeout_secs);
    } else {
        println!("  Disabled");
    }

    println!("\nOutput:");
    println!("  Items: {}", config.output.items_path.display());
    if let Some(log_file) = &config.output.log_file {
        println!("  Log file: {}", log_file.display());
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}
