//! Grab handling: quality gate, client submission, download record
//!
//! Also the single writer of download progress and failure transitions
//! observed by the client adapter; the adapter itself never touches the
//! store.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{DownloadClient, DownloadStore, HistoryStore, LibraryStore};
use crate::events::{kinds, EventBus, SystemEvent};
use crate::models::{
    Download, DownloadClientKind, DownloadStatus, HistoryEntry, HistoryEventType,
};
use mediarr_parser::Resolution;

/// Best resolution among existing library files for a piece of content
pub(crate) fn best_existing_resolution(files: &[crate::models::MediaFile]) -> Option<Resolution> {
    files
        .iter()
        .map(|f| Resolution::from_label(&f.quality))
        .max_by_key(|r| r.rank())
}

#[derive(Debug, Clone, Default)]
pub struct DownloadHandlerConfig {
    /// Category passed to the download client on add
    pub category: Option<String>,
}

/// Consumes `grab.requested`, submits to a download client and records
/// the download. Also persists `download.progressed` / `download.failed`
/// observations. With several clients configured, magnet and .torrent
/// URLs go to the torrent client and everything else to the Usenet one.
pub struct DownloadHandler {
    bus: Arc<EventBus>,
    downloads: Arc<dyn DownloadStore>,
    library: Arc<dyn LibraryStore>,
    history: Arc<dyn HistoryStore>,
    clients: Vec<Arc<dyn DownloadClient>>,
    config: DownloadHandlerConfig,
    grabs: crate::events::Subscription,
    progress: crate::events::Subscription,
    failures: crate::events::Subscription,
}

impl DownloadHandler {
    pub fn new(
        bus: Arc<EventBus>,
        downloads: Arc<dyn DownloadStore>,
        library: Arc<dyn LibraryStore>,
        history: Arc<dyn HistoryStore>,
        clients: Vec<Arc<dyn DownloadClient>>,
        config: DownloadHandlerConfig,
    ) -> Self {
        // Subscribing at construction time means no event published between
        // construction and the first poll of `run` can be missed.
        let grabs = bus.subscribe(kinds::GRAB_REQUESTED, 64);
        let progress = bus.subscribe(kinds::DOWNLOAD_PROGRESSED, 256);
        let failures = bus.subscribe(kinds::DOWNLOAD_FAILED, 64);
        Self {
            bus,
            downloads,
            library,
            history,
            clients,
            config,
            grabs,
            progress,
            failures,
        }
    }

    /// Which client a download URL belongs to. Falls back to the first
    /// configured client when the preferred kind is absent.
    fn client_for(&self, download_url: &str) -> Option<&Arc<dyn DownloadClient>> {
        let preferred = if download_url.starts_with("magnet:") || download_url.ends_with(".torrent")
        {
            DownloadClientKind::Torrent
        } else {
            DownloadClientKind::Sabnzbd
        };
        self.clients
            .iter()
            .find(|client| client.kind() == preferred)
            .or_else(|| self.clients.first())
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!("download handler started");
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.grabs.recv() => event,
                event = self.progress.recv() => event,
                event = self.failures.recv() => event,
            };
            match event {
                Some(published) => self.on_event(published.event).await,
                None => break,
            }
        }
        info!("download handler stopped");
    }

    async fn on_event(&self, event: SystemEvent) {
        match event {
            SystemEvent::GrabRequested {
                content_id,
                episode_ids,
                season,
                is_complete_season,
                download_url,
                release_name,
                indexer,
            } => {
                self.handle_grab(
                    content_id,
                    episode_ids,
                    season,
                    is_complete_season,
                    download_url,
                    release_name,
                    indexer,
                )
                .await
            }
            SystemEvent::DownloadProgressed {
                download_id,
                progress,
                speed_bps,
                eta_seconds,
                size_bytes,
            } => {
                self.handle_progress(download_id, progress, speed_bps, eta_seconds, size_bytes)
                    .await
            }
            SystemEvent::DownloadFailed {
                download_id, reason, ..
            } => self.handle_failure(download_id, reason).await,
            other => debug!(event_type = other.event_type(), "ignoring event"),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_grab(
        &self,
        content_id: Uuid,
        episode_ids: Vec<Uuid>,
        season: Option<u32>,
        is_complete_season: bool,
        download_url: String,
        release_name: String,
        indexer: String,
    ) {
        // Upgrade gate: only grab when the release beats the best file we
        // already have for this content.
        match self.library.files_for_content(content_id).await {
            Ok(files) => {
                if let Some(existing) = best_existing_resolution(&files) {
                    let release = mediarr_parser::parse(&release_name);
                    if release.resolution.rank() <= existing.rank() {
                        info!(
                            %content_id,
                            release = %release_name,
                            release_quality = %release.resolution,
                            existing_quality = %existing,
                            "skipping grab, no quality upgrade"
                        );
                        self.bus
                            .publish(SystemEvent::GrabSkipped {
                                content_id,
                                release_name,
                                release_quality: release.resolution.to_string(),
                                existing_quality: existing.to_string(),
                                reason: "existing_quality_equal_or_better".to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }
            Err(e) => {
                // A store hiccup must not lose the grab; proceed without
                // the gate.
                warn!(%content_id, error = %e, "could not check existing files, grabbing anyway");
            }
        }

        let Some(client) = self.client_for(&download_url) else {
            error!(%content_id, release = %release_name, "no download client configured");
            return;
        };

        let mut download = Download::new(
            content_id,
            client.kind(),
            String::new(),
            &release_name,
            &indexer,
        );
        download.season = season;
        download.is_complete_season = is_complete_season;
        if episode_ids.len() == 1 {
            download.episode_id = episode_ids.first().copied();
        }

        match client.add(&download_url, self.config.category.as_deref()).await {
            Ok(client_id) => download.client_id = client_id,
            Err(e) => {
                error!(%content_id, release = %release_name, error = %e, "download client rejected grab");
                self.bus
                    .publish(SystemEvent::DownloadFailed {
                        download_id: download.id,
                        reason: e.to_string(),
                        retryable: true,
                    })
                    .await;
                return;
            }
        }

        if let Err(e) = self.downloads.create(&download, &episode_ids).await {
            error!(download_id = %download.id, error = %e, "failed to persist download record");
            return;
        }

        let grab_data = serde_json::json!({
            "release_name": release_name,
            "indexer": indexer,
            "download_url": download_url,
            "client_id": download.client_id,
        });
        if let Err(e) = self
            .history
            .append(
                &HistoryEntry::new(content_id, HistoryEventType::Grabbed, grab_data)
                    .with_episode(download.episode_id),
            )
            .await
        {
            warn!(download_id = %download.id, error = %e, "failed to record grab history");
        }

        info!(
            download_id = %download.id,
            client_id = %download.client_id,
            release = %release_name,
            "download created"
        );
        self.bus
            .publish(SystemEvent::DownloadCreated {
                download_id: download.id,
                content_id,
                episode_ids,
                client_id: download.client_id.clone(),
                release_name,
            })
            .await;
    }

    async fn handle_progress(
        &self,
        download_id: Uuid,
        progress: f32,
        speed_bps: i64,
        eta_seconds: Option<i64>,
        size_bytes: Option<i64>,
    ) {
        let download = match self.downloads.get(download_id).await {
            Ok(Some(d)) => d,
            Ok(None) => {
                debug!(%download_id, "progress for unknown download");
                return;
            }
            Err(e) => {
                warn!(%download_id, error = %e, "failed to load download for progress");
                return;
            }
        };

        if download.status == DownloadStatus::Queued {
            if let Err(e) = self
                .downloads
                .transition(download_id, DownloadStatus::Downloading)
                .await
            {
                warn!(%download_id, error = %e, "failed to mark download as downloading");
            }
        }

        if let Err(e) = self
            .downloads
            .update_progress(download_id, progress, speed_bps, eta_seconds, size_bytes)
            .await
        {
            warn!(%download_id, error = %e, "failed to persist progress");
        }
    }

    async fn handle_failure(&self, download_id: Uuid, reason: String) {
        match self.downloads.get(download_id).await {
            Ok(Some(d)) if !d.status.is_terminal() => {
                if let Err(e) = self
                    .downloads
                    .transition(download_id, DownloadStatus::Failed)
                    .await
                {
                    warn!(%download_id, error = %e, "failed to mark download as failed");
                } else {
                    warn!(%download_id, %reason, "download failed");
                }
            }
            Ok(_) => debug!(%download_id, "failure for unknown or terminal download"),
            Err(e) => warn!(%download_id, error = %e, "failed to load download for failure"),
        }
    }
}
