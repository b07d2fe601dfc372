//! SQLite snapshot store.
//!
//! Table and column names follow the `vwo_ab_tests.db` layout, so existing
//! databases open unchanged and can be inspected with other tools.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info};

use super::SnapshotStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{
    now_timestamp, ContentHash, NewSnapshot, PageId, Snapshot, SnapshotId, TrackedPage,
};

const SNAPSHOT_COLUMNS: &str = r#"
    pv.id, pv.base_page_id, bp.base_page_url, pv.timestamp, pv.page_hash,
    pv.vwo_elements, pv.full_html, pv.ai_analysis, pv.html_diff, pv.ai_analysis_diff
"#;

/// SQLite-backed snapshot store.
///
/// Holds a single connection: the monitor is the only writer and runs one
/// URL at a time.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `database_url` and ensure
    /// the schema exists.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://vwo_ab_tests.db` - File-based database
    pub async fn open(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // One long-lived connection; an in-memory database would be lost if
        // the pool ever recycled it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!(database_url = %database_url, "Snapshot store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> StoreResult<Self> {
        Self::open("sqlite::memory:").await
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS base_pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                base_page_url TEXT UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS page_variations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                base_page_id INTEGER,
                timestamp TEXT,
                page_hash TEXT,
                vwo_elements TEXT,
                full_html TEXT,
                ai_analysis TEXT,
                html_diff TEXT,
                ai_analysis_diff TEXT,
                FOREIGN KEY (base_page_id) REFERENCES base_pages(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_page_variations_base_page ON page_variations(base_page_id, id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Close the connection, flushing anything pending.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Snapshot store closed");
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// Every column but the primary keys is nullable.
#[derive(Debug, FromRow)]
struct SnapshotRow {
    id: i64,
    base_page_id: Option<i64>,
    base_page_url: Option<String>,
    timestamp: Option<String>,
    page_hash: Option<String>,
    vwo_elements: Option<String>,
    full_html: Option<String>,
    ai_analysis: Option<String>,
    html_diff: Option<String>,
    ai_analysis_diff: Option<String>,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Snapshot {
        Snapshot {
            id: SnapshotId(self.id),
            page_id: PageId(self.base_page_id.unwrap_or_default()),
            page_url: self.base_page_url.unwrap_or_default(),
            timestamp: self.timestamp.unwrap_or_default(),
            page_hash: ContentHash(self.page_hash.unwrap_or_default()),
            vwo_elements: self.vwo_elements.unwrap_or_default(),
            full_html: self.full_html.unwrap_or_default(),
            ai_analysis: self.ai_analysis.unwrap_or_default(),
            html_diff: self.html_diff.unwrap_or_default(),
            ai_analysis_diff: self.ai_analysis_diff.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn save(&self, snapshot: &NewSnapshot) -> StoreResult<SnapshotId> {
        let page_hash = snapshot.content_hash();
        let timestamp = now_timestamp();

        let mut tx = self.pool.begin().await?;
        let id = match insert_snapshot(&mut *tx, snapshot, &page_hash, &timestamp).await {
            Ok(id) => id,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };
        tx.commit().await?;

        debug!(
            url = %snapshot.page_url,
            snapshot_id = id.0,
            page_hash = %page_hash,
            timestamp = %timestamp,
            "Saved snapshot"
        );
        Ok(id)
    }

    async fn last_snapshot(&self, page_url: &str) -> StoreResult<Option<String>> {
        let html: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT pv.full_html
            FROM page_variations pv
            JOIN base_pages bp ON pv.base_page_id = bp.id
            WHERE bp.base_page_url = ?
            ORDER BY pv.id DESC
            LIMIT 1
            "#,
        )
        .bind(page_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(html.map(Option::unwrap_or_default))
    }

    async fn latest(&self, page_url: &str) -> StoreResult<Option<Snapshot>> {
        Ok(self.history(page_url, 1).await?.into_iter().next())
    }

    async fn history(&self, page_url: &str, limit: usize) -> StoreResult<Vec<Snapshot>> {
        let query = format!(
            r#"
            SELECT {SNAPSHOT_COLUMNS}
            FROM page_variations pv
            JOIN base_pages bp ON pv.base_page_id = bp.id
            WHERE bp.base_page_url = ?
            ORDER BY pv.id DESC
            LIMIT ?
            "#
        );

        let rows = sqlx::query_as::<_, SnapshotRow>(&query)
            .bind(page_url)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(SnapshotRow::into_snapshot).collect())
    }

    async fn pages(&self) -> StoreResult<Vec<TrackedPage>> {
        let rows: Vec<(i64, Option<String>)> =
            sqlx::query_as("SELECT id, base_page_url FROM base_pages ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, url)| TrackedPage {
                id: PageId(id),
                url: url.unwrap_or_default(),
            })
            .collect())
    }
}

/// Page create-if-absent plus the snapshot insert. Runs inside the caller's
/// transaction; nothing is visible until it commits.
async fn insert_snapshot(
    conn: &mut SqliteConnection,
    snapshot: &NewSnapshot,
    page_hash: &ContentHash,
    timestamp: &str,
) -> StoreResult<SnapshotId> {
    sqlx::query("INSERT OR IGNORE INTO base_pages (base_page_url) VALUES (?)")
        .bind(&snapshot.page_url)
        .execute(&mut *conn)
        .await?;

    let page_id: Option<i64> =
        sqlx::query_scalar("SELECT id FROM base_pages WHERE base_page_url = ?")
            .bind(&snapshot.page_url)
            .fetch_optional(&mut *conn)
            .await?;

    let Some(page_id) = page_id else {
        return Err(StoreError::PageUnresolved {
            url: snapshot.page_url.clone(),
        });
    };

    let result = sqlx::query(
        r#"
        INSERT INTO page_variations (
            base_page_id, timestamp, page_hash, vwo_elements, full_html,
            ai_analysis, html_diff, ai_analysis_diff
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(page_id)
    .bind(timestamp)
    .bind(page_hash.as_str())
    .bind(snapshot.joined_markers())
    .bind(&snapshot.markup)
    .bind(&snapshot.analysis)
    .bind(&snapshot.diff)
    .bind(&snapshot.analysis_diff)
    .execute(&mut *conn)
    .await?;

    Ok(SnapshotId(result.last_insert_rowid()))
}
