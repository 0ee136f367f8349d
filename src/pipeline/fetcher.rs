//! Paste content retrieval from the remote content service
//!
//! Endpoint: `{base_url}/raw/{id}`, requested with `Cache-Control: no-cache`.
//!
//! ## Failure taxonomy
//!
//! - `Network` - connect/DNS/timeout failure, retryable
//! - `Remote` - non-success status, retryable up to the retry bound
//! - `EmptyContent` - success with empty body, terminal (paste likely removed)
//! - `InvalidEncoding` - body is not UTF-8, terminal (stored verbatim or not at all)
//! - `InvalidIdentifier` - identifier cannot be placed in the URL path, terminal

use crate::error_handler::ExponentialBackoff;
use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum FetchError {
    Network(String),
    Remote { status: u16 },
    EmptyContent,
    InvalidEncoding(String),
    InvalidIdentifier(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Remote { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Remote {
                status: status.as_u16(),
            },
            None => FetchError::Network(err.to_string()),
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Network(e) => write!(f, "Network error: {}", e),
            FetchError::Remote { status } => write!(f, "Remote error: HTTP {}", status),
            FetchError::EmptyContent => write!(f, "Empty content (paste removed?)"),
            FetchError::InvalidEncoding(e) => write!(f, "Content is not valid UTF-8: {}", e),
            FetchError::InvalidIdentifier(id) => write!(f, "Invalid paste identifier: {:?}", id),
        }
    }
}

impl std::error::Error for FetchError {}

/// Single-attempt retrieval of paste content by identifier
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<String, FetchError>;
}

/// Retry schedule applied around a [`ContentFetcher`]
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl FetchPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff: initial_backoff.saturating_mul(8),
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Fetch with retries for retryable failures.
///
/// Returns the last error once it is terminal or the retry budget is spent.
pub async fn fetch_with_retry(
    fetcher: &dyn ContentFetcher,
    id: &str,
    policy: &FetchPolicy,
) -> Result<String, FetchError> {
    let mut backoff = ExponentialBackoff::new(
        policy.initial_backoff,
        policy.max_backoff,
        policy.max_retries,
    );

    loop {
        match fetcher.fetch(id).await {
            Ok(content) => return Ok(content),
            Err(e) if e.is_retryable() => {
                log::debug!("Fetch attempt {} for {} failed: {}", backoff.attempts() + 1, id, e);
                if backoff.sleep().await.is_err() {
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// reqwest-backed fetcher for the paste content service
pub struct HttpContentFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContentFetcher {
    /// Arguments:
    /// - `base_url`: scheme + host of the content service, e.g. `https://pastebin.com`
    /// - `timeout`: bound applied to every attempt (connect + body)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn raw_url(&self, id: &str) -> Result<String, FetchError> {
        let valid = !id.is_empty()
            && !id
                .chars()
                .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control());
        if !valid || id == "." || id == ".." {
            return Err(FetchError::InvalidIdentifier(id.to_string()));
        }

        Ok(format!("{}/raw/{}", self.base_url, id))
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, id: &str) -> Result<String, FetchError> {
        let url = self.raw_url(id)?;

        let response = self
            .client
            .get(&url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Remote {
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(FetchError::EmptyContent);
        }

        String::from_utf8(body.to_vec()).map_err(|e| FetchError::InvalidEncoding(e.utf8_error().to_string()))
    }
}
