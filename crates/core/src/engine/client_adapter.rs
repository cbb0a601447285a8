//! Download-client polling adapter
//!
//! Observes external client state and translates it into bus events. The
//! adapter never writes to the store; persistence happens in the handlers
//! consuming its events. Terminal observations are deduplicated through an
//! in-memory `last_emitted` map keyed by download id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{ClientDownloadState, DownloadClient, DownloadStore};
use crate::events::{EventBus, SystemEvent};

#[derive(Debug, Clone)]
pub struct ClientAdapterConfig {
    pub poll_interval: Duration,
    /// Path prefix as the client reports it
    pub remote_path: Option<PathBuf>,
    /// Local prefix substituted for `remote_path`
    pub local_path: Option<PathBuf>,
}

impl Default for ClientAdapterConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            remote_path: None,
            local_path: None,
        }
    }
}

pub struct ClientAdapter {
    bus: Arc<EventBus>,
    downloads: Arc<dyn DownloadStore>,
    client: Arc<dyn DownloadClient>,
    config: ClientAdapterConfig,
    last_emitted: Mutex<HashMap<Uuid, ClientDownloadState>>,
}

impl ClientAdapter {
    pub fn new(
        bus: Arc<EventBus>,
        downloads: Arc<dyn DownloadStore>,
        client: Arc<dyn DownloadClient>,
        config: ClientAdapterConfig,
    ) -> Self {
        Self {
            bus,
            downloads,
            client,
            config,
            last_emitted: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(client = %self.client.kind(), "download client adapter started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.tick().await;
                }
            }
        }
        info!(client = %self.client.kind(), "download client adapter stopped");
    }

    /// One polling pass. Individual failures are logged; the tick never
    /// dies.
    pub async fn tick(&self) {
        let active = match self.downloads.list_active(self.client.kind()).await {
            Ok(downloads) => downloads,
            Err(e) => {
                warn!(error = %e, "failed to list active downloads");
                return;
            }
        };

        for download in active {
            if download.client_id.is_empty() {
                continue;
            }
            match self.client.status(&download.client_id).await {
                Ok(Some(status)) => self.observe(download.id, status).await,
                Ok(None) => self.observe_disappeared(download.id).await,
                Err(e) => {
                    warn!(
                        download_id = %download.id,
                        client_id = %download.client_id,
                        error = %e,
                        "client status check failed, retrying next tick"
                    );
                }
            }
        }
    }

    async fn observe(&self, download_id: Uuid, status: crate::domain::ClientDownloadStatus) {
        let previous = self
            .last_emitted
            .lock()
            .expect("adapter dedup poisoned")
            .get(&download_id)
            .copied();

        match status.state {
            ClientDownloadState::Completed => {
                if previous == Some(ClientDownloadState::Completed) {
                    return;
                }
                let Some(source) = status.source_path else {
                    warn!(%download_id, "client reported completion without a source path");
                    return;
                };
                let source = self.remap_path(&source);
                self.remember(download_id, ClientDownloadState::Completed);
                self.bus
                    .publish(SystemEvent::DownloadCompleted {
                        download_id,
                        source_path: source.display().to_string(),
                    })
                    .await;
            }
            ClientDownloadState::Failed => {
                if previous == Some(ClientDownloadState::Failed) {
                    return;
                }
                self.remember(download_id, ClientDownloadState::Failed);
                self.bus
                    .publish(SystemEvent::DownloadFailed {
                        download_id,
                        reason: "download client reported failure".to_string(),
                        retryable: true,
                    })
                    .await;
            }
            ClientDownloadState::Downloading | ClientDownloadState::Queued => {
                // Progress is continuous data, not a state change: emitted
                // every tick.
                self.remember(download_id, status.state);
                self.bus
                    .publish(SystemEvent::DownloadProgressed {
                        download_id,
                        progress: status.progress,
                        speed_bps: status.speed_bps.unwrap_or(0),
                        eta_seconds: status.eta.map(|d| d.as_secs() as i64),
                        size_bytes: status.size_bytes,
                    })
                    .await;
            }
        }
    }

    async fn observe_disappeared(&self, download_id: Uuid) {
        let previous = self
            .last_emitted
            .lock()
            .expect("adapter dedup poisoned")
            .get(&download_id)
            .copied();
        if previous == Some(ClientDownloadState::Failed) {
            return;
        }
        debug!(%download_id, "download disappeared from client");
        self.remember(download_id, ClientDownloadState::Failed);
        self.bus
            .publish(SystemEvent::DownloadFailed {
                download_id,
                reason: "download disappeared from client".to_string(),
                retryable: false,
            })
            .await;
    }

    fn remember(&self, download_id: Uuid, state: ClientDownloadState) {
        self.last_emitted
            .lock()
            .expect("adapter dedup poisoned")
            .insert(download_id, state);
    }

    /// Prefix substitution from the client's view of the filesystem to
    /// ours. Paths outside the configured remote prefix pass through
    /// unchanged.
    fn remap_path(&self, path: &Path) -> PathBuf {
        if let (Some(remote), Some(local)) = (&self.config.remote_path, &self.config.local_path) {
            if let Ok(rest) = path.strip_prefix(remote) {
                return local.join(rest);
            }
        }
        path.to_path_buf()
    }
}
