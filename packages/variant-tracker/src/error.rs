//! Typed errors for the tracker library.
//!
//! Every failure here is recovered at a component boundary: the fetcher turns
//! `FetchError` into "no content", the summarizer turns `ModelError` into a
//! sentinel, and the monitor logs `StoreError` and moves on.

use thiserror::Error;

/// Errors raised while retrieving a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// The request did not complete within the configured timeout
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Connection, TLS, or body decoding failure
    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// Errors raised by the snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database rejected a statement
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The page row could not be found after the create-if-absent step
    #[error("unable to resolve page id for {url}")]
    PageUnresolved { url: String },
}

/// Errors raised by a language model backend.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Missing API key or invalid client settings
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection failed or timed out
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response or empty completion
    #[error("API error: {0}")]
    Api(String),

    /// Response body did not match the expected shape
    #[error("parse error: {0}")]
    Parse(String),
}

/// Errors raised while building a marker extractor.
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("attribute name {0:?} cannot be used as a selector")]
    InvalidAttribute(String),
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub type ModelResult<T> = std::result::Result<T, ModelError>;
