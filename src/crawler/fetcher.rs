//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - The `Fetcher` capability the workers depend on
//! - Building reqwest clients with timeouts, user agent and optional proxy
//! - Classifying transport failures into `FetchError`

use crate::config::ClientConfig;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Proxy};
use std::time::Duration;
use url::Url;

/// A fetched listing page
///
/// Any status code is a valid response; callers decide what counts as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status_code: u16,
    pub body: String,
}

impl PageResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    /// True for 2xx status codes
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// A fetched binary file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResponse {
    pub status_code: u16,
    /// Raw `Content-Type` header
    pub content_type: Option<String>,
    /// File name announced in `Content-Disposition`
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// True if the content type is `application/pdf`, ignoring parameters and case
    pub fn is_pdf(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|value| value.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/pdf"))
    }
}

/// Something that can GET a URL
///
/// Implementations must only fail for transport problems (connection, read,
/// timeout). Non-2xx responses are returned as `Ok`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &Url) -> Result<PageResponse, FetchError>;

    /// Downloads a binary file
    async fn get_file(&self, url: &Url) -> Result<FileResponse, FetchError> {
        Err(FetchError::Unexpected(format!(
            "file downloads not supported for {}",
            url
        )))
    }
}

/// `Fetcher` backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    download_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            download_timeout: Duration::from_secs(120),
        }
    }

    /// Overrides the whole-request timeout used for file downloads
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &Url) -> Result<PageResponse, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status_code = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        Ok(PageResponse { status_code, body })
    }

    async fn get_file(&self, url: &Url) -> Result<FileResponse, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status_code = response.status().as_u16();
        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let filename = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_filename);

        let bytes = response.bytes().await.map_err(classify_reqwest_error)?;

        Ok(FileResponse {
            status_code,
            content_type,
            filename,
            bytes: bytes.to_vec(),
        })
    }
}

/// Extracts the `filename=` value of a `Content-Disposition` header
fn disposition_filename(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let name = rest.split(';').next().unwrap_or_default().trim().trim_matches('"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The client configuration (timeouts, user agent)
/// * `proxy` - Optional proxy every request of this client goes through
///
/// # Example
///
/// ```no_run
/// use catalog_sweep::config::ClientConfig;
/// use catalog_sweep::crawler::build_http_client;
///
/// let client = build_http_client(&ClientConfig::default(), None).unwrap();
/// ```
pub fn build_http_client(
    config: &ClientConfig,
    proxy: Option<Proxy>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy);
    }

    builder.build()
}

/// Maps a reqwest failure onto the fetch error taxonomy
///
/// | Condition | Result |
/// |-----------|--------|
/// | Timeout (connect or read) | `Timeout` |
/// | Connection, request or body read error | `Network` |
/// | Anything else (builder, redirect, decode) | `Unexpected` |
pub fn classify_reqwest_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_connect() || error.is_request() || error.is_body() {
        FetchError::Network(error.to_string())
    } else {
        FetchError::Unexpected(error.to_string())
    }
}
