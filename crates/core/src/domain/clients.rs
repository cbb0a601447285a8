//! Contracts for the external systems the engine talks to

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Content, DownloadClientKind};
use crate::Result;

/// Download state as reported by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientDownloadState {
    Queued,
    Downloading,
    Completed,
    Failed,
}

/// One download as seen by the external client
#[derive(Debug, Clone)]
pub struct ClientDownloadStatus {
    /// The client's identifier for this download
    pub client_id: String,
    pub name: String,
    pub state: ClientDownloadState,
    /// 0-100
    pub progress: f32,
    pub size_bytes: Option<i64>,
    pub speed_bps: Option<i64>,
    pub eta: Option<Duration>,
    /// Where the completed content lives, from the client's view. May need
    /// remote-to-local remapping before local use.
    pub source_path: Option<PathBuf>,
}

/// Abstract download client (SABnzbd, qBittorrent, ...)
#[async_trait]
pub trait DownloadClient: Send + Sync {
    fn kind(&self) -> DownloadClientKind;

    /// Submit a download, returning the client's identifier for it
    async fn add(&self, url: &str, category: Option<&str>) -> Result<String>;

    /// Current status, or `None` when the client no longer knows the id
    async fn status(&self, client_id: &str) -> Result<Option<ClientDownloadStatus>>;

    async fn list(&self) -> Result<Vec<ClientDownloadStatus>>;

    async fn remove(&self, client_id: &str, delete_files: bool) -> Result<()>;
}

/// Abstract media server (Plex-like)
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Whether the server has indexed this content; returns the server's
    /// key for the item when known.
    async fn has_content(&self, content: &Content) -> Result<(bool, Option<String>)>;

    /// Ask the server to scan a freshly imported path
    async fn scan_path(&self, path: &Path) -> Result<()>;

    async fn refresh_library(&self, name: &str) -> Result<()>;
}
