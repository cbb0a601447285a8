//! Shared handler state

use std::sync::Arc;

use mediarr_core::domain::{DownloadStore, HistoryStore, LibraryStore};
use mediarr_core::events::{EventBus, EventStore};

#[derive(Clone)]
pub struct ApiState {
    pub library: Arc<dyn LibraryStore>,
    pub downloads: Arc<dyn DownloadStore>,
    pub history: Arc<dyn HistoryStore>,
    pub events: Arc<dyn EventStore>,
    pub bus: Arc<EventBus>,
    /// When set, every request must present it as `X-Api-Key`
    pub api_key: Option<String>,
    /// Which `/api/v3` compat surfaces are mounted
    pub compat_radarr: bool,
    pub compat_sonarr: bool,
    /// Default library roots applied when an add request omits one
    pub movie_root: String,
    pub series_root: String,
}
