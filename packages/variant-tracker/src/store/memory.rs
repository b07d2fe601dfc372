//! In-memory snapshot store for testing and development.

use async_trait::async_trait;
use std::sync::RwLock;

use super::SnapshotStore;
use crate::error::StoreResult;
use crate::types::{
    now_timestamp, ContentHash, NewSnapshot, PageId, Snapshot, SnapshotId, TrackedPage,
};

#[derive(Default)]
struct Inner {
    pages: Vec<TrackedPage>,
    snapshots: Vec<Snapshot>,
}

/// Snapshot store backed by vectors. Ids start at 1 and increase with each
/// insert, like SQLite's AUTOINCREMENT.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot_count(&self) -> usize {
        self.read().snapshots.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn save(&self, snapshot: &NewSnapshot) -> StoreResult<SnapshotId> {
        let mut inner = self.write();

        let existing = inner
            .pages
            .iter()
            .find(|p| p.url == snapshot.page_url)
            .map(|p| p.id);
        let page_id = match existing {
            Some(id) => id,
            None => {
                let id = PageId(inner.pages.len() as i64 + 1);
                inner.pages.push(TrackedPage {
                    id,
                    url: snapshot.page_url.clone(),
                });
                id
            }
        };

        let id = SnapshotId(inner.snapshots.len() as i64 + 1);
        inner.snapshots.push(Snapshot {
            id,
            page_id,
            page_url: snapshot.page_url.clone(),
            timestamp: now_timestamp(),
            page_hash: ContentHash::from_content(&snapshot.markup),
            vwo_elements: snapshot.joined_markers(),
            full_html: snapshot.markup.clone(),
            ai_analysis: snapshot.analysis.clone(),
            html_diff: snapshot.diff.clone(),
            ai_analysis_diff: snapshot.analysis_diff.clone(),
        });
        Ok(id)
    }

    async fn last_snapshot(&self, page_url: &str) -> StoreResult<Option<String>> {
        Ok(self.latest(page_url).await?.map(|s| s.full_html))
    }

    async fn latest(&self, page_url: &str) -> StoreResult<Option<Snapshot>> {
        Ok(self
            .read()
            .snapshots
            .iter()
            .rev()
            .find(|s| s.page_url == page_url)
            .cloned())
    }

    async fn history(&self, page_url: &str, limit: usize) -> StoreResult<Vec<Snapshot>> {
        Ok(self
            .read()
            .snapshots
            .iter()
            .rev()
            .filter(|s| s.page_url == page_url)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn pages(&self) -> StoreResult<Vec<TrackedPage>> {
        Ok(self.read().pages.clone())
    }
}
