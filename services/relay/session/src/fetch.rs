//! Resource fetching for relay sessions.
//!
//! A session hands the request locator to a [`Fetcher`] and relays whatever
//! bytes come back. [`HttpFetcher`] is the production implementation.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default time allowed for one fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetch errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// Locator could not be turned into a request
    #[error("invalid locator {locator}: {reason}")]
    InvalidLocator {
        /// Locator as received
        locator: String,
        /// Why it was refused
        reason: String,
    },
    /// Fetch did not finish in time
    #[error("fetch timed out: {0}")]
    Timeout(String),
    /// Remote answered with a non-success status
    #[error("non-success status {0}")]
    Status(u16),
    /// Connection or transfer failure
    #[error("network error: {0}")]
    Network(String),
}

/// Turns a locator into the bytes to relay
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the full body behind `locator`
    async fn fetch(&self, locator: &str) -> Result<Bytes, FetchError>;
}

/// HTTP GET fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<Bytes, FetchError> {
        let url = reqwest::Url::parse(locator).map_err(|e| FetchError::InvalidLocator {
            locator: locator.to_string(),
            reason: e.to_string(),
        })?;

        debug!("Fetching resource: url={}", url);

        let response = self.client.get(url).send().await.map_err(map_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(map_reqwest)?;
        debug!("Fetched resource: url={} len={}", locator, body.len());
        Ok(body)
    }
}

fn map_reqwest(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else {
        FetchError::Network(err.to_string())
    }
}
