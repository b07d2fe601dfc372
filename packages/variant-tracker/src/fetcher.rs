//! Page retrieval.
//!
//! One GET per call, no retries. Callers only ever see "content or nothing";
//! the reason for a miss is logged here and available through `try_fetch`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};

/// Browser-like User-Agent to avoid trivial bot blocking.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/95.0.4638.69 Safari/537.36";

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of raw page markup (to allow mocking).
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page body, or `None` if the page could not be retrieved.
    async fn fetch(&self, url: &str) -> Option<String>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for &T {
    async fn fetch(&self, url: &str) -> Option<String> {
        (**self).fetch(url).await
    }
}

/// reqwest-backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> FetchResult<Self> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| FetchError::from_reqwest("<client>", e))?;

        Ok(Self { client })
    }

    /// Wrap an existing client (custom proxies, TLS settings, tests).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Single attempt with the failure reason preserved.
    pub async fn try_fetch(&self, url: &str) -> FetchResult<String> {
        debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        match self.try_fetch(url).await {
            Ok(body) => {
                debug!(url = %url, bytes = body.len(), "Fetched page");
                Some(body)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Fetch failed");
                None
            }
        }
    }
}
