use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{NewSnapshot, Snapshot, SnapshotId, TrackedPage};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Append-only snapshot history keyed by page URL.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Create the page if absent and append a snapshot, atomically.
    async fn save(&self, snapshot: &NewSnapshot) -> StoreResult<SnapshotId>;

    /// Markup of the most recent snapshot for `page_url`.
    async fn last_snapshot(&self, page_url: &str) -> StoreResult<Option<String>>;

    /// The full most recent snapshot row for `page_url`.
    async fn latest(&self, page_url: &str) -> StoreResult<Option<Snapshot>>;

    /// Snapshots for `page_url`, newest first.
    async fn history(&self, page_url: &str, limit: usize) -> StoreResult<Vec<Snapshot>>;

    async fn pages(&self) -> StoreResult<Vec<TrackedPage>>;
}

#[async_trait]
impl<T: SnapshotStore + ?Sized> SnapshotStore for &T {
    async fn save(&self, snapshot: &NewSnapshot) -> StoreResult<SnapshotId> {
        (**self).save(snapshot).await
    }

    async fn last_snapshot(&self, page_url: &str) -> StoreResult<Option<String>> {
        (**self).last_snapshot(page_url).await
    }

    async fn latest(&self, page_url: &str) -> StoreResult<Option<Snapshot>> {
        (**self).latest(page_url).await
    }

    async fn history(&self, page_url: &str, limit: usize) -> StoreResult<Vec<Snapshot>> {
        (**self).history(page_url, limit).await
    }

    async fn pages(&self) -> StoreResult<Vec<TrackedPage>> {
        (**self).pages().await
    }
}
