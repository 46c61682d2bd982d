//! Network access to the repository.
//!
//! ### Transport
//! - `head` follows the full redirect chain and returns the final location
//! - `get` returns status, content type and body without judging the status
//! - Max redirects, timeout and User-Agent come from configuration
//!
//! Timeouts and connection failures are reported the same way as any other
//! transport failure.

pub mod url;

#[cfg(test)]
pub(crate) mod stub;

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::{Client, header};

pub use url::{
    UrlError, metadata_url, normalize_identifier, relation_search_url, repo_base, strip_metadata_suffix,
};

use thumbs_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "thumbs/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 10)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "thumbs/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 10 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), max_redirects: config.max_redirects }
    }
}

/// Response of a repository GET.
#[derive(Debug, Clone)]
pub struct RepoResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Type header, parameters included
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
}

impl RepoResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Content type without parameters, lowercased.
    pub fn mime(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
    }
}

/// Network client consumed by the resolver and the generation pipeline.
#[async_trait::async_trait]
pub trait RepoTransport: Send + Sync {
    /// Header-only request following redirects; returns the final location.
    ///
    /// Transport failures and non-success statuses are `RESOLUTION_FAILED`.
    async fn head(&self, url: &str) -> Result<String, Error>;

    /// Plain GET with extra request headers.
    ///
    /// Only transport failures are errors (`HTTP_ERROR`); any status is returned.
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<RepoResponse, Error>;
}

/// reqwest-backed repository client.
pub struct FetchClient {
    http: Client,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl RepoTransport for FetchClient {
    async fn head(&self, url: &str) -> Result<String, Error> {
        let start = Instant::now();
        let response = self
            .http
            .head(url)
            .send()
            .await
            .map_err(|e| Error::ResolutionFailed(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ResolutionFailed(format!("{url}: status {}", status.as_u16())));
        }

        let final_url = response.url().to_string();
        tracing::debug!("resolved {} -> {} in {}ms", url, final_url, start.elapsed().as_millis());
        Ok(final_url)
    }

    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<RepoResponse, Error> {
        let start = Instant::now();
        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::HttpError(format!("network error: {}", e)))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {}", e)))?;

        tracing::debug!(
            "fetched {} (status {}) in {}ms ({} bytes)",
            url,
            status,
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(RepoResponse { status, content_type, bytes })
    }
}
