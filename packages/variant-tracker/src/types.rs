use chrono::Local;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Timestamp layout stored in `page_variations.timestamp`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Row id of a tracked page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub i64);

/// Row id of a snapshot; increases with every insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub i64);

/// SHA-256 fingerprint of raw page markup
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Hash the markup exactly as fetched. No normalization: two snapshots
    /// share a fingerprint only if their bytes are identical.
    pub fn from_content(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A logical page identity, unique by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedPage {
    pub id: PageId,
    pub url: String,
}

/// Everything the monitor hands to the store for one observation.
///
/// The store adds the fingerprint and timestamp itself.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub page_url: String,
    pub markup: String,
    pub markers: Vec<String>,
    pub analysis: String,
    pub diff: String,
    pub analysis_diff: String,
}

impl NewSnapshot {
    pub fn new(page_url: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            markup: markup.into(),
            markers: Vec::new(),
            analysis: String::new(),
            diff: String::new(),
            analysis_diff: String::new(),
        }
    }

    pub fn with_markers(mut self, markers: Vec<String>) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_analysis(mut self, analysis: impl Into<String>) -> Self {
        self.analysis = analysis.into();
        self
    }

    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        self.diff = diff.into();
        self
    }

    pub fn with_analysis_diff(mut self, analysis_diff: impl Into<String>) -> Self {
        self.analysis_diff = analysis_diff.into();
        self
    }

    pub fn content_hash(&self) -> ContentHash {
        ContentHash::from_content(&self.markup)
    }

    /// Markers as stored in the `vwo_elements` column.
    pub fn joined_markers(&self) -> String {
        self.markers.join("\n")
    }
}

/// One stored observation of a tracked page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub page_id: PageId,
    pub page_url: String,
    pub timestamp: String,
    pub page_hash: ContentHash,
    /// Marker fragments joined with newlines, exactly as stored
    pub vwo_elements: String,
    pub full_html: String,
    pub ai_analysis: String,
    pub html_diff: String,
    pub ai_analysis_diff: String,
}

/// Current local time in the stored layout.
pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}
