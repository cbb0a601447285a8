//! Import orchestration for completed downloads
//!
//! At most one import runs per download at any time: a keyed in-flight set
//! drops duplicate `download.completed` deliveries while an import holds
//! the slot, and the state machine makes redelivery after completion a
//! no-op.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{DownloadStore, Importer, LibraryStore};
use crate::events::{kinds, EventBus, SystemEvent};
use crate::models::DownloadStatus;

use super::download_handler::best_existing_resolution;

pub struct ImportHandler {
    bus: Arc<EventBus>,
    downloads: Arc<dyn DownloadStore>,
    library: Arc<dyn LibraryStore>,
    importer: Arc<dyn Importer>,
    in_flight: Mutex<HashSet<Uuid>>,
    completed: crate::events::Subscription,
}

impl ImportHandler {
    pub fn new(
        bus: Arc<EventBus>,
        downloads: Arc<dyn DownloadStore>,
        library: Arc<dyn LibraryStore>,
        importer: Arc<dyn Importer>,
    ) -> Self {
        let completed = bus.subscribe(kinds::DOWNLOAD_COMPLETED, 64);
        Self {
            bus,
            downloads,
            library,
            importer,
            in_flight: Mutex::new(HashSet::new()),
            completed,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!("import handler started");
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.completed.recv() => event,
            };
            match event {
                Some(published) => {
                    if let SystemEvent::DownloadCompleted { download_id, source_path } =
                        published.event
                    {
                        self.handle_completed(download_id, &source_path).await;
                    }
                }
                None => break,
            }
        }
        info!("import handler stopped");
    }

    async fn handle_completed(&self, download_id: Uuid, source_path: &str) {
        {
            let mut in_flight = self.in_flight.lock().expect("import guard poisoned");
            if !in_flight.insert(download_id) {
                warn!(%download_id, "import already in progress, dropping duplicate event");
                return;
            }
        }

        self.process(download_id, source_path).await;

        self.in_flight
            .lock()
            .expect("import guard poisoned")
            .remove(&download_id);
    }

    async fn process(&self, download_id: Uuid, source_path: &str) {
        let download = match self.downloads.get(download_id).await {
            Ok(Some(d)) => d,
            Ok(None) => {
                error!(%download_id, "completed download not found in store");
                self.bus
                    .publish(SystemEvent::ImportFailed {
                        download_id,
                        reason: "download not found".to_string(),
                    })
                    .await;
                return;
            }
            Err(e) => {
                error!(%download_id, error = %e, "failed to load download");
                self.bus
                    .publish(SystemEvent::ImportFailed {
                        download_id,
                        reason: e.to_string(),
                    })
                    .await;
                return;
            }
        };

        // Safety check: redelivered events for downloads that already moved
        // past `completed` are no-ops.
        match download.status {
            DownloadStatus::Queued | DownloadStatus::Downloading => {
                if let Err(e) = self
                    .downloads
                    .transition(download_id, DownloadStatus::Completed)
                    .await
                {
                    warn!(%download_id, error = %e, "could not mark download completed");
                    return;
                }
            }
            DownloadStatus::Completed => {}
            other => {
                debug!(%download_id, status = %other, "ignoring download.completed in this state");
                return;
            }
        }

        // Quality gate against what the library already holds.
        let release = mediarr_parser::parse(&download.release_name);
        let files = match self.library.files_for_content(download.content_id).await {
            Ok(files) => files,
            Err(e) => {
                warn!(%download_id, error = %e, "could not inspect existing files, importing anyway");
                Vec::new()
            }
        };
        if let Some(existing) = best_existing_resolution(&files) {
            if release.resolution.rank() <= existing.rank() {
                info!(
                    %download_id,
                    release_quality = %release.resolution,
                    existing_quality = %existing,
                    "skipping import, existing quality is equal or better"
                );
                if let Err(e) = self.mark_skipped(download_id).await {
                    warn!(%download_id, error = %e, "failed to mark download skipped");
                }
                self.bus
                    .publish(SystemEvent::ImportSkipped {
                        download_id,
                        content_id: download.content_id,
                        source_path: source_path.to_string(),
                        release_quality: release.resolution.to_string(),
                        existing_quality: existing.to_string(),
                        reason: "existing_quality_equal_or_better".to_string(),
                    })
                    .await;
                return;
            }
        }

        let download = match self
            .downloads
            .transition(download_id, DownloadStatus::Importing)
            .await
        {
            Ok(d) => d,
            Err(e) => {
                warn!(%download_id, error = %e, "could not start import");
                return;
            }
        };

        self.bus
            .publish(SystemEvent::ImportStarted {
                download_id,
                source_path: source_path.to_string(),
            })
            .await;

        match self.importer.import(&download, Path::new(source_path)).await {
            Ok(outcome) => {
                if let Err(e) = self
                    .downloads
                    .transition(download_id, DownloadStatus::Imported)
                    .await
                {
                    warn!(%download_id, error = %e, "import succeeded but status update failed");
                }
                info!(
                    %download_id,
                    file = %outcome.file.path,
                    size = outcome.file_size,
                    upgraded = outcome.upgraded,
                    "import completed"
                );
                self.bus
                    .publish(SystemEvent::ImportCompleted {
                        download_id,
                        content_id: download.content_id,
                        episode_ids: outcome.episode_ids,
                        file_path: outcome.file.path.clone(),
                        file_size: outcome.file_size,
                    })
                    .await;
            }
            Err(e) => {
                error!(%download_id, error = %e, "import failed");
                if let Err(te) = self
                    .downloads
                    .transition(download_id, DownloadStatus::Failed)
                    .await
                {
                    warn!(%download_id, error = %te, "failed to mark download failed");
                }
                self.bus
                    .publish(SystemEvent::ImportFailed {
                        download_id,
                        reason: e.to_string(),
                    })
                    .await;
            }
        }
    }

    /// `skipped` is only reachable through `importing`
    async fn mark_skipped(&self, download_id: Uuid) -> crate::Result<()> {
        self.downloads
            .transition(download_id, DownloadStatus::Importing)
            .await?;
        self.downloads
            .transition(download_id, DownloadStatus::Skipped)
            .await?;
        Ok(())
    }
}
