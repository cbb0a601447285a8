//! Media-server verification adapter
//!
//! Records imported content pending verification and polls the media
//! server until it reports the item, then publishes `media.item.detected`
//! exactly once per pending entry. On startup the pending map is rebuilt
//! from downloads still in `imported`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{DownloadStore, LibraryStore, MediaServer};
use crate::events::{kinds, EventBus, SystemEvent};
use crate::models::DownloadStatus;
use crate::Result;

#[derive(Debug, Clone)]
struct PendingVerification {
    download_id: Uuid,
    release_name: String,
}

pub struct MediaServerAdapter {
    bus: Arc<EventBus>,
    downloads: Arc<dyn DownloadStore>,
    library: Arc<dyn LibraryStore>,
    server: Arc<dyn MediaServer>,
    poll_interval: Duration,
    pending: Mutex<HashMap<Uuid, PendingVerification>>,
    imports: crate::events::Subscription,
}

impl MediaServerAdapter {
    pub fn new(
        bus: Arc<EventBus>,
        downloads: Arc<dyn DownloadStore>,
        library: Arc<dyn LibraryStore>,
        server: Arc<dyn MediaServer>,
        poll_interval: Duration,
    ) -> Self {
        // Subscribing at construction time means no event published between
        // construction and the first poll of `run` can be missed.
        let imports = bus.subscribe(kinds::IMPORT_COMPLETED, 64);
        Self {
            bus,
            downloads,
            library,
            server,
            poll_interval,
            pending: Mutex::new(HashMap::new()),
            imports,
        }
    }

    /// Rebuild the pending map from the store, covering restarts after
    /// import but before verification.
    pub async fn reconcile(&self) -> Result<()> {
        let imported = self.downloads.list_by_status(DownloadStatus::Imported).await?;
        let mut pending = self.pending.lock().expect("media pending poisoned");
        for download in imported {
            debug!(
                download_id = %download.id,
                content_id = %download.content_id,
                "pending media-server verification restored"
            );
            pending.insert(
                download.content_id,
                PendingVerification {
                    download_id: download.id,
                    release_name: download.release_name,
                },
            );
        }
        Ok(())
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        if let Err(e) = self.reconcile().await {
            warn!(error = %e, "media-server reconciliation failed");
        }

        info!("media server adapter started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.imports.recv() => match event {
                    Some(published) => {
                        if let SystemEvent::ImportCompleted { download_id, content_id, .. } =
                            published.event
                        {
                            self.on_import_completed(download_id, content_id).await;
                        }
                    }
                    None => break,
                },
                _ = tokio::time::sleep(self.poll_interval) => {
                    self.tick().await;
                }
            }
        }
        info!("media server adapter stopped");
    }

    async fn on_import_completed(&self, download_id: Uuid, content_id: Uuid) {
        let release_name = match self.downloads.get(download_id).await {
            Ok(Some(d)) => d.release_name,
            _ => String::new(),
        };
        self.pending.lock().expect("media pending poisoned").insert(
            content_id,
            PendingVerification {
                download_id,
                release_name,
            },
        );
    }

    /// One verification pass over all pending content
    pub async fn tick(&self) {
        let content_ids: Vec<Uuid> = {
            let pending = self.pending.lock().expect("media pending poisoned");
            pending.keys().copied().collect()
        };

        for content_id in content_ids {
            let content = match self.library.get_content(content_id).await {
                Ok(Some(content)) => content,
                Ok(None) => {
                    warn!(%content_id, "pending verification for unknown content, dropping");
                    self.pending
                        .lock()
                        .expect("media pending poisoned")
                        .remove(&content_id);
                    continue;
                }
                Err(e) => {
                    warn!(%content_id, error = %e, "failed to load content");
                    continue;
                }
            };

            match self.server.has_content(&content).await {
                Ok((true, media_server_key)) => {
                    let removed = self
                        .pending
                        .lock()
                        .expect("media pending poisoned")
                        .remove(&content_id);
                    if let Some(entry) = removed {
                        info!(
                            %content_id,
                            download_id = %entry.download_id,
                            release = %entry.release_name,
                            "media server indexed imported content"
                        );
                        self.bus
                            .publish(SystemEvent::MediaItemDetected {
                                content_id,
                                media_server_key,
                            })
                            .await;
                    }
                }
                Ok((false, _)) => {}
                Err(e) => {
                    // Transient; next tick retries.
                    warn!(%content_id, error = %e, "media server check failed");
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().expect("media pending poisoned").len()
    }
}
