//! Storage contracts
//!
//! Each store exclusively owns its tables. The importer alone writes files
//! and history and flips content/episode status; the download handler alone
//! creates download rows; adapters never write, they observe and publish.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Content, ContentStatus, Download, DownloadClientKind, DownloadStatus, Episode, HistoryEntry,
    MediaFile,
};
use crate::Result;

/// Everything the importer commits in a single library transaction: the
/// file row plus the status flip of the episode (series) or content
/// (movie).
#[derive(Debug, Clone)]
pub struct ImportCommit {
    pub file: MediaFile,
    /// Episode to mark available; `None` marks the content itself
    pub episode_id: Option<Uuid>,
}

/// Library content, episodes and files
#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn add_content(&self, content: &Content) -> Result<()>;
    async fn get_content(&self, id: Uuid) -> Result<Option<Content>>;
    async fn list_content(&self) -> Result<Vec<Content>>;
    async fn set_content_status(&self, id: Uuid, status: ContentStatus) -> Result<()>;

    async fn add_episode(&self, episode: &Episode) -> Result<()>;
    async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>>;
    async fn episodes_for_content(&self, content_id: Uuid) -> Result<Vec<Episode>>;

    async fn files_for_content(&self, content_id: Uuid) -> Result<Vec<MediaFile>>;

    /// Atomically insert the file row and mark the episode (series) or the
    /// content (movie) available. Used only by the importer.
    async fn commit_import(&self, commit: ImportCommit) -> Result<MediaFile>;
}

/// Download records and their junction rows
#[async_trait]
pub trait DownloadStore: Send + Sync {
    /// Insert a download plus its episode junction rows
    async fn create(&self, download: &Download, episode_ids: &[Uuid]) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Download>>;
    async fn find_by_client_id(
        &self,
        client: DownloadClientKind,
        client_id: &str,
    ) -> Result<Option<Download>>;

    /// Downloads owned by the given client that are not yet terminal
    async fn list_active(&self, client: DownloadClientKind) -> Result<Vec<Download>>;
    async fn list_by_status(&self, status: DownloadStatus) -> Result<Vec<Download>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Download>>;

    /// Validate and apply a status transition, returning the updated row.
    /// Invalid transitions fail with `InvalidState` and leave the row
    /// untouched.
    async fn transition(&self, id: Uuid, to: DownloadStatus) -> Result<Download>;

    async fn update_progress(
        &self,
        id: Uuid,
        progress: f32,
        speed_bps: i64,
        eta_seconds: Option<i64>,
        size_bytes: Option<i64>,
    ) -> Result<()>;

    /// Episode ids attached to a download via the junction table
    async fn episode_ids(&self, download_id: Uuid) -> Result<Vec<Uuid>>;
}

/// Append-only operation history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: &HistoryEntry) -> Result<()>;
    async fn list(&self, content_id: Option<Uuid>, limit: i64) -> Result<Vec<HistoryEntry>>;
}
