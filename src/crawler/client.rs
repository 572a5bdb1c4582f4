//! Client pool
//!
//! Every worker leases one client for its whole lifetime. A lease is a guard:
//! dropping it hands the client back to the pool, whatever way the worker ends.

use crate::config::ClientConfig;
use crate::crawler::fetcher::{build_http_client, Fetcher, HttpFetcher};
use crate::SweepError;
use reqwest::Proxy;
use std::ops::Deref;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type IdleClients = Arc<Mutex<Vec<Arc<dyn Fetcher>>>>;

/// Bounded pool of fetch clients
pub struct ClientManager {
    idle: IdleClients,
    permits: Arc<Semaphore>,
    size: usize,
}

impl ClientManager {
    /// Wraps an arbitrary set of fetchers
    ///
    /// # Errors
    ///
    /// Returns `SweepError::NoClients` for an empty set.
    pub fn from_fetchers(fetchers: Vec<Arc<dyn Fetcher>>) -> crate::Result<Self> {
        if fetchers.is_empty() {
            return Err(SweepError::NoClients);
        }

        let size = fetchers.len();
        Ok(Self {
            idle: Arc::new(Mutex::new(fetchers)),
            permits: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    /// Builds reqwest-backed clients from configuration
    ///
    /// With a proxy file, one client is created per usable proxy line. Without
    /// one (or when it yields no proxy), `pool_size` direct clients are built,
    /// falling back to `default_size`.
    pub fn from_config(config: &ClientConfig, default_size: usize) -> crate::Result<Self> {
        let proxies = match &config.proxy_file {
            Some(path) if path.exists() => read_proxies(path, config.socks5)?,
            Some(path) => {
                tracing::warn!("Proxy file {} not found, using direct clients", path.display());
                Vec::new()
            }
            None => Vec::new(),
        };

        let mut fetchers: Vec<Arc<dyn Fetcher>> = Vec::new();
        if proxies.is_empty() {
            if config.proxy_file.is_some() {
                tracing::warn!("No usable proxies found, using direct clients");
            }
            let size = config.pool_size.unwrap_or(default_size).max(1);
            for _ in 0..size {
                let client = build_http_client(config, None)?;
                fetchers.push(http_fetcher(config, client));
            }
            tracing::info!("Created {} direct HTTP clients", size);
        } else {
            tracing::info!("Creating {} HTTP clients behind proxies", proxies.len());
            for proxy in proxies {
                let client = build_http_client(config, Some(proxy))?;
                fetchers.push(http_fetcher(config, client));
            }
        }

        Self::from_fetchers(fetchers)
    }

    /// Leases a client, waiting until one is free
    pub async fn lease(&self) -> crate::Result<ClientLease> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| SweepError::PoolClosed)?;

        // One permit per idle client, so holding a permit means a client is there
        let client = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or(SweepError::NoClients)?;

        Ok(ClientLease {
            client,
            home: Arc::clone(&self.idle),
            _permit: permit,
        })
    }

    /// Refuses all future leases; outstanding leases stay valid
    pub fn close(&self) {
        self.permits.close();
    }

    /// Total number of clients owned by the pool
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of clients not currently leased
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

fn http_fetcher(config: &ClientConfig, client: reqwest::Client) -> Arc<dyn Fetcher> {
    Arc::new(HttpFetcher::new(client).with_download_timeout(config.download_timeout()))
}

/// A client leased from a [`ClientManager`]
pub struct ClientLease {
    client: Arc<dyn Fetcher>,
    home: IdleClients,
    _permit: OwnedSemaphorePermit,
}

impl Deref for ClientLease {
    type Target = dyn Fetcher;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}

impl Drop for ClientLease {
    fn drop(&mut self) {
        // Runs before the permit field is dropped, so the client is back
        // in the idle list by the time the next lease can be granted.
        self.home
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&self.client));
    }
}

/// Reads a proxy list, skipping blank lines, `#` comments and malformed entries
///
/// # Formats
///
/// - HTTP: `host:port:user:password`
/// - SOCKS5: the first whitespace-separated token is the host; port 1080 is used
pub fn read_proxies(path: &Path, socks5: bool) -> crate::Result<Vec<Proxy>> {
    let content = std::fs::read_to_string(path)?;
    let mut proxies = Vec::new();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed = if socks5 {
            parse_socks5_proxy(line)
        } else {
            parse_http_proxy(line)
        };

        match parsed {
            Ok(proxy) => proxies.push(proxy),
            Err(e) => tracing::warn!("Skipping proxy: {}", e),
        }
    }

    Ok(proxies)
}

fn parse_http_proxy(line: &str) -> crate::Result<Proxy> {
    let parts: Vec<&str> = line.split(':').collect();
    let [host, port, user, password] = parts.as_slice() else {
        return Err(SweepError::Proxy {
            line: line.to_string(),
            reason: "expected host:port:user:password".to_string(),
        });
    };

    if port.parse::<u16>().is_err() {
        return Err(SweepError::Proxy {
            line: line.to_string(),
            reason: format!("invalid port '{}'", port),
        });
    }

    let proxy = Proxy::all(format!("http://{}:{}", host, port)).map_err(|e| SweepError::Proxy {
        line: line.to_string(),
        reason: e.to_string(),
    })?;

    Ok(proxy.basic_auth(user, password))
}

fn parse_socks5_proxy(line: &str) -> crate::Result<Proxy> {
    let host = line.split_whitespace().next().unwrap_or_default();
    Proxy::all(format!("socks5://{}:1080", host)).map_err(|e| SweepError::Proxy {
        line: line.to_string(),
        reason: e.to_string(),
    })
}
