//! A/B Test Variant Tracker
//!
//! Watches a set of storefront pages for changes in experiment markup. Pages
//! are discovered by a bounded same-site crawl, fetched on a fixed interval,
//! diffed against the previous snapshot, summarized by a language model, and
//! appended to a SQLite history.
//!
//! # Usage
//!
//! ```rust,ignore
//! use variant_tracker::{HttpFetcher, Monitor, OpenAIModel, SiteCrawler, SqliteStore};
//! use tokio_util::sync::CancellationToken;
//!
//! let fetcher = HttpFetcher::new()?;
//! let pages = SiteCrawler::new(&fetcher).crawl("https://shop.example", 1).await;
//!
//! let store = SqliteStore::open("sqlite://vwo_ab_tests.db").await?;
//! let model = OpenAIModel::new(api_key);
//!
//! let mut monitor = Monitor::new(pages.into_iter().collect(), &fetcher, &store, model);
//! monitor.run(CancellationToken::new()).await;
//! ```
//!
//! # Modules
//!
//! - [`fetcher`] - HTTP page retrieval
//! - [`markers`] - Experiment marker extraction
//! - [`crawler`] - Bounded breadth-first discovery
//! - [`store`] - Snapshot persistence (SqliteStore, MemoryStore)
//! - [`diff`] - Unified line diffs with sentinels
//! - [`summarizer`] - Language model change descriptions
//! - [`monitor`] - The polling loop
//! - [`testing`] - Mock implementations for testing

pub mod config;
pub mod crawler;
pub mod diff;
pub mod error;
pub mod fetcher;
pub mod markers;
pub mod monitor;
pub mod store;
pub mod summarizer;
pub mod testing;
pub mod types;

pub use config::Config;
pub use crawler::SiteCrawler;
pub use diff::{diff, HtmlDiff, NO_BASELINE, NO_CHANGE};
pub use error::{FetchError, MarkerError, ModelError, StoreError};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use markers::{extract_markers, MarkerExtractor};
pub use monitor::{
    AnalysisDiffMode, CycleReport, Monitor, MonitorState, Sleeper, TokioSleeper, UrlOutcome,
};
pub use store::{MemoryStore, SnapshotStore, SqliteStore};
pub use summarizer::{
    ChangeSummarizer, LanguageModel, OpenAIModel, ANALYSIS_FAILED, NO_SIGNIFICANT_CHANGES,
};
pub use types::{ContentHash, NewSnapshot, PageId, Snapshot, SnapshotId, TrackedPage};
