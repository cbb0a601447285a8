//! Traits at the seams: storage and external-system contracts

pub mod clients;
pub mod stores;

pub use clients::{ClientDownloadState, ClientDownloadStatus, DownloadClient, MediaServer};
pub use stores::{DownloadStore, HistoryStore, ImportCommit, LibraryStore};

use std::path::Path;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Download, MediaFile};
use crate::Result;

/// Result of a successful import
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub file: MediaFile,
    pub file_size: i64,
    /// Episodes marked available by this import
    pub episode_ids: Vec<Uuid>,
    /// True when a lower-quality file already existed for this content
    pub upgraded: bool,
}

/// The importer contract the import handler drives. Implementations must be
/// idempotent on the same (download, source): succeed, no-op, or fail with
/// `DestinationExists` without corrupting the destination.
#[async_trait]
pub trait Importer: Send + Sync {
    async fn import(&self, download: &Download, source_path: &Path) -> Result<ImportOutcome>;
}
