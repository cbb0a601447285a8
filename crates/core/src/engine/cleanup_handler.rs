//! Source cleanup after verified imports
//!
//! Joins `import.completed` with `media.item.detected` by content id, and
//! deletes the download client's source files only after strict path-safety
//! checks. A refusal still moves the download to `cleaned`: the terminal
//! state means "done with this download", not "files were deleted".

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::DownloadStore;
use crate::events::{kinds, EventBus, SystemEvent};
use crate::models::DownloadStatus;
use crate::Result;

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Root the download client writes completed downloads under
    pub download_root: PathBuf,
    /// Whether source files are actually deleted
    pub cleanup_source: bool,
    /// When no media server is configured, cleanup happens straight from
    /// `import.completed` instead of awaiting verification
    pub media_server_configured: bool,
}

#[derive(Debug, Clone)]
struct PendingCleanup {
    download_id: Uuid,
    release_name: String,
}

pub struct CleanupHandler {
    bus: Arc<EventBus>,
    downloads: Arc<dyn DownloadStore>,
    config: CleanupConfig,
    pending: Mutex<HashMap<Uuid, PendingCleanup>>,
    imports: crate::events::Subscription,
    skips: crate::events::Subscription,
    detections: crate::events::Subscription,
}

impl CleanupHandler {
    pub fn new(bus: Arc<EventBus>, downloads: Arc<dyn DownloadStore>, config: CleanupConfig) -> Self {
        let imports = bus.subscribe(kinds::IMPORT_COMPLETED, 64);
        let skips = bus.subscribe(kinds::IMPORT_SKIPPED, 64);
        let detections = bus.subscribe(kinds::MEDIA_ITEM_DETECTED, 64);
        Self {
            bus,
            downloads,
            config,
            pending: Mutex::new(HashMap::new()),
            imports,
            skips,
            detections,
        }
    }

    /// Re-populate the pending map from downloads stuck in `imported`,
    /// covering restarts between import and media-server verification.
    pub async fn reconcile(&self) -> Result<()> {
        let imported = self.downloads.list_by_status(DownloadStatus::Imported).await?;
        let mut pending = self.pending.lock().expect("cleanup pending poisoned");
        for download in imported {
            debug!(download_id = %download.id, content_id = %download.content_id, "pending cleanup restored");
            pending.insert(
                download.content_id,
                PendingCleanup {
                    download_id: download.id,
                    release_name: download.release_name,
                },
            );
        }
        Ok(())
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        if let Err(e) = self.reconcile().await {
            warn!(error = %e, "cleanup reconciliation failed");
        }

        info!("cleanup handler started");
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.imports.recv() => event,
                event = self.skips.recv() => event,
                event = self.detections.recv() => event,
            };
            match event {
                Some(published) => self.on_event(published.event).await,
                None => break,
            }
        }
        info!("cleanup handler stopped");
    }

    async fn on_event(&self, event: SystemEvent) {
        match event {
            SystemEvent::ImportCompleted {
                download_id,
                content_id,
                ..
            } => self.on_import_completed(download_id, content_id).await,
            SystemEvent::ImportSkipped { download_id, .. } => {
                self.on_import_skipped(download_id).await
            }
            SystemEvent::MediaItemDetected { content_id, .. } => {
                self.on_media_detected(content_id).await
            }
            other => debug!(event_type = other.event_type(), "ignoring event"),
        }
    }

    async fn on_import_completed(&self, download_id: Uuid, content_id: Uuid) {
        let release_name = match self.downloads.get(download_id).await {
            Ok(Some(d)) => d.release_name,
            Ok(None) => {
                warn!(%download_id, "imported download not found");
                return;
            }
            Err(e) => {
                warn!(%download_id, error = %e, "failed to load imported download");
                return;
            }
        };

        if self.config.media_server_configured {
            // Wait for the media server to report the item before touching
            // source files.
            self.pending.lock().expect("cleanup pending poisoned").insert(
                content_id,
                PendingCleanup {
                    download_id,
                    release_name,
                },
            );
            return;
        }

        self.cleanup_and_finish(download_id, &release_name).await;
    }

    async fn on_import_skipped(&self, download_id: Uuid) {
        // The library already holds this content at equal or better
        // quality; the source files have no further use. The download is
        // already terminal (skipped), so only files are touched.
        let release_name = match self.downloads.get(download_id).await {
            Ok(Some(d)) => d.release_name,
            _ => {
                warn!(%download_id, "skipped download not found");
                return;
            }
        };
        self.delete_source(download_id, &release_name).await;
    }

    async fn on_media_detected(&self, content_id: Uuid) {
        let entry = self
            .pending
            .lock()
            .expect("cleanup pending poisoned")
            .remove(&content_id);
        let Some(entry) = entry else {
            debug!(%content_id, "media item detected with no pending cleanup");
            return;
        };
        self.cleanup_and_finish(entry.download_id, &entry.release_name)
            .await;
    }

    async fn cleanup_and_finish(&self, download_id: Uuid, release_name: &str) {
        self.delete_source(download_id, release_name).await;
        match self
            .downloads
            .transition(download_id, DownloadStatus::Cleaned)
            .await
        {
            Ok(_) => info!(%download_id, "download cleaned"),
            Err(e) => warn!(%download_id, error = %e, "failed to mark download cleaned"),
        }
    }

    async fn delete_source(&self, download_id: Uuid, release_name: &str) {
        if !self.config.cleanup_source {
            debug!(%download_id, "source cleanup disabled");
            return;
        }

        let source = self.config.download_root.join(release_name);
        self.bus
            .publish(SystemEvent::CleanupStarted {
                download_id,
                source_path: source.display().to_string(),
            })
            .await;

        if let Err(e) = self.delete_source_files(&source).await {
            warn!(%download_id, source = %source.display(), error = %e, "source cleanup refused");
        }

        self.bus
            .publish(SystemEvent::CleanupCompleted { download_id })
            .await;
    }

    /// Delete source files, refusing anything that canonicalizes outside
    /// the download root.
    async fn delete_source_files(&self, source: &Path) -> Result<()> {
        let canonical_root = tokio::fs::canonicalize(&self.config.download_root)
            .await
            .map_err(|e| crate::MediarrError::FileSystemError {
                path: self.config.download_root.display().to_string(),
                error: e.to_string(),
            })?;
        let canonical_source = match tokio::fs::canonicalize(source).await {
            Ok(path) => path,
            Err(_) => {
                debug!(source = %source.display(), "source gone, nothing to clean");
                return Ok(());
            }
        };

        if canonical_source == canonical_root || !canonical_source.starts_with(&canonical_root) {
            return Err(crate::MediarrError::PathTraversal {
                path: canonical_source.display().to_string(),
            });
        }

        let metadata = tokio::fs::metadata(&canonical_source).await.map_err(|e| {
            crate::MediarrError::FileSystemError {
                path: canonical_source.display().to_string(),
                error: e.to_string(),
            }
        })?;

        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&canonical_source)
                .await
                .map_err(|e| crate::MediarrError::FileSystemError {
                    path: canonical_source.display().to_string(),
                    error: e.to_string(),
                })?;
        } else {
            tokio::fs::remove_file(&canonical_source).await.map_err(|e| {
                crate::MediarrError::FileSystemError {
                    path: canonical_source.display().to_string(),
                    error: e.to_string(),
                }
            })?;
            // Remove the containing directory only when it is now empty
            // and is not the download root itself.
            if let Some(parent) = canonical_source.parent() {
                if parent != canonical_root && dir_is_empty(parent).await {
                    let _ = tokio::fs::remove_dir(parent).await;
                }
            }
        }

        info!(source = %canonical_source.display(), "source files removed");
        Ok(())
    }
}

async fn dir_is_empty(dir: &Path) -> bool {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}
