//! Testing utilities including mock implementations.
//!
//! These let the crawler, summarizer, and monitor run without network calls,
//! a language model, or wall-clock sleeps.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{ModelError, ModelResult, StoreError, StoreResult};
use crate::fetcher::PageFetcher;
use crate::monitor::Sleeper;
use crate::store::SnapshotStore;
use crate::summarizer::LanguageModel;
use crate::types::{NewSnapshot, Snapshot, SnapshotId, TrackedPage};

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Serves pages from a map; unknown URLs behave like failed fetches.
#[derive(Default, Clone)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    fetches: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.set_page(url, html);
        self
    }

    /// Replace (or add) a page body between fetches.
    pub fn set_page(&self, url: impl Into<String>, html: impl Into<String>) {
        write(&self.pages).insert(url.into(), html.into());
    }

    /// Make subsequent fetches of `url` fail.
    pub fn remove_page(&self, url: &str) {
        write(&self.pages).remove(url);
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        read(&self.fetches).iter().filter(|u| *u == url).count()
    }

    /// Every URL requested, in order.
    pub fn fetched(&self) -> Vec<String> {
        read(&self.fetches).clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        write(&self.fetches).push(url.to_string());
        read(&self.pages).get(url).cloned()
    }
}

/// Record of a call made to the mock model.
#[derive(Debug, Clone)]
pub struct MockModelCall {
    pub system: String,
    pub user: String,
}

/// Language model returning a fixed response, or always failing.
#[derive(Default, Clone)]
pub struct MockModel {
    response: Option<String>,
    calls: Arc<RwLock<Vec<MockModelCall>>>,
}

impl MockModel {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            ..Default::default()
        }
    }

    /// A model whose every call returns an API error.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        read(&self.calls).len()
    }

    pub fn calls(&self) -> Vec<MockModelCall> {
        read(&self.calls).clone()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, system: &str, user: &str) -> ModelResult<String> {
        write(&self.calls).push(MockModelCall {
            system: system.to_string(),
            user: user.to_string(),
        });
        self.response
            .clone()
            .ok_or_else(|| ModelError::Api("mock model failure".into()))
    }
}

/// Sleeper that returns immediately and cancels `token` after `limit` sleeps.
#[derive(Clone)]
pub struct InstantSleeper {
    token: CancellationToken,
    limit: usize,
    sleeps: Arc<RwLock<Vec<Duration>>>,
}

impl InstantSleeper {
    pub fn new(token: CancellationToken, limit: usize) -> Self {
        Self {
            token,
            limit,
            sleeps: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Durations requested so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        read(&self.sleeps).clone()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = write(&self.sleeps);
            sleeps.push(duration);
            sleeps.len()
        };
        if count >= self.limit {
            self.token.cancel();
        }
        tokio::task::yield_now().await;
    }
}

/// Store whose writes always fail; reads report no history.
#[derive(Default)]
pub struct FailingStore;

#[async_trait]
impl SnapshotStore for FailingStore {
    async fn save(&self, snapshot: &NewSnapshot) -> StoreResult<SnapshotId> {
        Err(StoreError::PageUnresolved {
            url: snapshot.page_url.clone(),
        })
    }

    async fn last_snapshot(&self, _page_url: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    async fn latest(&self, _page_url: &str) -> StoreResult<Option<Snapshot>> {
        Ok(None)
    }

    async fn history(&self, _page_url: &str, _limit: usize) -> StoreResult<Vec<Snapshot>> {
        Ok(Vec::new())
    }

    async fn pages(&self) -> StoreResult<Vec<TrackedPage>> {
        Ok(Vec::new())
    }
}

/// Wraps a store so the first `failures` `last_snapshot` calls error out.
pub struct FlakyReadStore<S> {
    inner: S,
    failures: AtomicUsize,
}

impl<S> FlakyReadStore<S> {
    pub fn new(inner: S, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl<S: SnapshotStore> SnapshotStore for FlakyReadStore<S> {
    async fn save(&self, snapshot: &NewSnapshot) -> StoreResult<SnapshotId> {
        self.inner.save(snapshot).await
    }

    async fn last_snapshot(&self, page_url: &str) -> StoreResult<Option<String>> {
        let remaining = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.last_snapshot(page_url).await
    }

    async fn latest(&self, page_url: &str) -> StoreResult<Option<Snapshot>> {
        self.inner.latest(page_url).await
    }

    async fn history(&self, page_url: &str, limit: usize) -> StoreResult<Vec<Snapshot>> {
        self.inner.history(page_url, limit).await
    }

    async fn pages(&self) -> StoreResult<Vec<TrackedPage>> {
        self.inner.pages().await
    }
}
