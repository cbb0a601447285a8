//! Imported media files

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A file in the library. Created only by the importer, inside the same
/// transaction that flips the owning episode or content to available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: Uuid,
    pub content_id: Uuid,
    pub episode_id: Option<Uuid>,
    /// Absolute path inside the library root of the content type
    pub path: String,
    pub size_bytes: i64,
    /// Resolution label ("1080p", "720p", ...) used for upgrade decisions
    pub quality: String,
    /// Indexer the originating release was grabbed from
    pub source: String,
    pub added_at: DateTime<Utc>,
}

impl MediaFile {
    pub fn new(content_id: Uuid, path: impl Into<String>, size_bytes: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_id,
            episode_id: None,
            path: path.into(),
            size_bytes,
            quality: "unknown".to_string(),
            source: String::new(),
            added_at: Utc::now(),
        }
    }

    pub fn with_episode(mut self, episode_id: Uuid) -> Self {
        self.episode_id = Some(episode_id);
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}
