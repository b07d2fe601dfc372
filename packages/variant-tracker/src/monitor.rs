//! The polling loop.
//!
//! Each cycle walks the tracked URLs in order: fetch, extract markers, diff
//! against the cached previous markup, summarize, persist, update the cache.
//! Nothing a single URL does can abort the cycle, and a new cycle always
//! starts after the sleep interval until the cancellation token fires.

use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::diff::{diff, preview};
use crate::error::StoreResult;
use crate::fetcher::PageFetcher;
use crate::markers::MarkerExtractor;
use crate::store::SnapshotStore;
use crate::summarizer::{ChangeSummarizer, LanguageModel};
use crate::types::{NewSnapshot, SnapshotId};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Characters of diff text shown in logs.
const DIFF_PREVIEW_CHARS: usize = 300;

/// Suspends the loop between cycles (to allow tests to skip real time).
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What goes into the `ai_analysis_diff` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisDiffMode {
    /// Store the analysis text again
    #[default]
    MirrorAnalysis,
    /// Store the html diff again
    MirrorDiff,
    /// Line diff between the previous analysis and this one
    AnalysisDelta,
}

impl FromStr for AnalysisDiffMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "analysis" => Ok(Self::MirrorAnalysis),
            "diff" => Ok(Self::MirrorDiff),
            "delta" => Ok(Self::AnalysisDelta),
            other => Err(format!(
                "unknown analysis diff mode {other:?} (expected analysis, diff, or delta)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Cycling,
}

/// What happened to one URL in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlOutcome {
    Saved(SnapshotId),
    /// Nothing fetched; cache and store untouched
    FetchFailed,
    /// Fetched and analysed, but the store rejected the row
    PersistFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: UrlOutcome) {
        match outcome {
            UrlOutcome::Saved(_) => self.saved += 1,
            UrlOutcome::FetchFailed => self.skipped += 1,
            UrlOutcome::PersistFailed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct PageState {
    markup: Option<String>,
    analysis: Option<String>,
}

/// Drives fetch, diff, summarize, and persist for a fixed URL list.
pub struct Monitor<F, S, M, Z = TokioSleeper> {
    urls: Vec<String>,
    fetcher: F,
    store: S,
    summarizer: ChangeSummarizer<M>,
    extractor: MarkerExtractor,
    sleeper: Z,
    interval: Duration,
    analysis_diff: AnalysisDiffMode,
    cache: HashMap<String, PageState>,
    state: MonitorState,
}

impl<F, S, M> Monitor<F, S, M, TokioSleeper>
where
    F: PageFetcher,
    S: SnapshotStore,
    M: LanguageModel,
{
    pub fn new(urls: Vec<String>, fetcher: F, store: S, model: M) -> Self {
        Self {
            urls,
            fetcher,
            store,
            summarizer: ChangeSummarizer::new(model),
            extractor: MarkerExtractor::default(),
            sleeper: TokioSleeper,
            interval: DEFAULT_INTERVAL,
            analysis_diff: AnalysisDiffMode::default(),
            cache: HashMap::new(),
            state: MonitorState::Idle,
        }
    }
}

impl<F, S, M, Z> Monitor<F, S, M, Z>
where
    F: PageFetcher,
    S: SnapshotStore,
    M: LanguageModel,
    Z: Sleeper,
{
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_extractor(mut self, extractor: MarkerExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_analysis_diff(mut self, mode: AnalysisDiffMode) -> Self {
        self.analysis_diff = mode;
        self
    }

    pub fn with_sleeper<Z2: Sleeper>(self, sleeper: Z2) -> Monitor<F, S, M, Z2> {
        Monitor {
            urls: self.urls,
            fetcher: self.fetcher,
            store: self.store,
            summarizer: self.summarizer,
            extractor: self.extractor,
            sleeper,
            interval: self.interval,
            analysis_diff: self.analysis_diff,
            cache: self.cache,
            state: self.state,
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the newest stored markup for every URL. A URL whose lookup fails
    /// stays unprimed and is retried on its first visit; after that the
    /// cache is the baseline.
    pub async fn prime(&mut self) {
        for url in &self.urls {
            match load_baseline(&self.store, url, self.analysis_diff).await {
                Ok(state) => {
                    debug!(url = %url, has_baseline = state.markup.is_some(), "Primed baseline");
                    self.cache.insert(url.clone(), state);
                }
                Err(e) => warn!(url = %url, error = %e, "Could not load last snapshot"),
            }
        }
    }

    /// Process every URL once, in order.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.state = MonitorState::Cycling;
        let mut report = CycleReport::default();

        let urls = self.urls.clone();
        for url in &urls {
            let outcome = self.process_url(url).await;
            report.record(outcome);
        }

        self.state = MonitorState::Idle;
        info!(
            saved = report.saved,
            skipped = report.skipped,
            failed = report.failed,
            "Cycle complete"
        );
        report
    }

    /// Prime, then cycle and sleep until `cancel` fires. Cancellation is
    /// only observed between cycles. Returns the number of cycles run.
    pub async fn run(&mut self, cancel: CancellationToken) -> usize {
        self.prime().await;
        info!(pages = self.urls.len(), interval_secs = self.interval.as_secs(), "Monitor started");

        let mut cycles = 0;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.run_cycle().await;
            cycles += 1;

            info!(interval_secs = self.interval.as_secs(), "Waiting before next check");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.sleeper.sleep(self.interval) => {}
            }
        }

        info!(cycles, "Monitor stopped");
        cycles
    }

    /// One fetch, diff, summarize, persist step for `url`.
    pub async fn process_url(&mut self, url: &str) -> UrlOutcome {
        info!(url = %url, "Processing URL");

        let Some(html) = self.fetcher.fetch(url).await.filter(|h| !h.is_empty()) else {
            warn!(url = %url, "Skipping due to fetch error");
            return UrlOutcome::FetchFailed;
        };

        let markers = self.extractor.extract(&html);
        let previous = match self.cache.get(url) {
            Some(state) => state.clone(),
            None => match load_baseline(&self.store, url, self.analysis_diff).await {
                Ok(state) => state,
                Err(e) => {
                    warn!(url = %url, error = %e, "Baseline still unavailable, diffing without one");
                    PageState::default()
                }
            },
        };

        let html_diff = diff(previous.markup.as_deref(), &html);
        info!(
            url = %url,
            markers = markers.len(),
            diff = %preview(html_diff.as_str(), DIFF_PREVIEW_CHARS),
            "Diff computed"
        );

        let analysis = self.summarizer.summarize(html_diff.as_str()).await;
        info!(url = %url, analysis = %analysis, "Analysis complete");

        let analysis_diff = match self.analysis_diff {
            AnalysisDiffMode::MirrorAnalysis => analysis.clone(),
            AnalysisDiffMode::MirrorDiff => html_diff.to_string(),
            AnalysisDiffMode::AnalysisDelta => {
                diff(previous.analysis.as_deref(), &analysis).to_string()
            }
        };

        let snapshot = NewSnapshot::new(url, html)
            .with_markers(markers)
            .with_analysis(analysis.clone())
            .with_diff(html_diff.to_string())
            .with_analysis_diff(analysis_diff);

        let outcome = match self.store.save(&snapshot).await {
            Ok(id) => {
                info!(url = %url, snapshot_id = id.0, "Saved variation");
                UrlOutcome::Saved(id)
            }
            Err(e) => {
                error!(url = %url, error = %e, "Failed to save variation");
                UrlOutcome::PersistFailed
            }
        };

        // The fetched markup becomes the baseline even if the save failed
        self.cache.insert(
            url.to_string(),
            PageState {
                markup: Some(snapshot.markup),
                analysis: Some(analysis),
            },
        );

        outcome
    }
}

/// Newest stored markup for `url`, plus its analysis when the delta mode
/// needs it. Only a failed markup lookup is an error.
async fn load_baseline<S: SnapshotStore>(
    store: &S,
    url: &str,
    mode: AnalysisDiffMode,
) -> StoreResult<PageState> {
    let markup = store.last_snapshot(url).await?;

    let mut analysis = None;
    if mode == AnalysisDiffMode::AnalysisDelta {
        match store.latest(url).await {
            Ok(latest) => analysis = latest.map(|s| s.ai_analysis),
            Err(e) => warn!(url = %url, error = %e, "Could not load last analysis"),
        }
    }

    Ok(PageState { markup, analysis })
}
