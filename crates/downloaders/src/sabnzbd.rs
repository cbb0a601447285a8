//! SABnzbd client
//!
//! Uses the JSON api (`api?mode=...&output=json`). Active downloads live in
//! the queue; finished ones (completed or failed) move to the history, so a
//! status lookup checks both.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use mediarr_core::domain::{ClientDownloadState, ClientDownloadStatus, DownloadClient};
use mediarr_core::models::DownloadClientKind;
use mediarr_core::{MediarrError, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub struct SabnzbdConfig {
    /// Base URL, e.g. "http://localhost:8080"
    pub url: String,
    pub api_key: String,
    pub category: Option<String>,
    pub timeout: Duration,
}

pub struct SabnzbdClient {
    config: SabnzbdConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    status: bool,
    #[serde(default)]
    nzo_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    queue: Queue,
}

#[derive(Debug, Deserialize)]
struct Queue {
    #[serde(default)]
    slots: Vec<QueueSlot>,
    /// Global download rate in KB/s
    #[serde(default)]
    kbpersec: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueSlot {
    nzo_id: String,
    filename: String,
    /// Percentage as a string, e.g. "42.5"
    percentage: String,
    mb: String,
    status: String,
    timeleft: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    history: History,
}

#[derive(Debug, Deserialize)]
struct History {
    #[serde(default)]
    slots: Vec<HistorySlot>,
}

#[derive(Debug, Deserialize)]
struct HistorySlot {
    nzo_id: String,
    name: String,
    status: String,
    /// Completed download location
    #[serde(default)]
    storage: String,
    #[serde(default)]
    bytes: Option<i64>,
    #[serde(default)]
    fail_message: String,
}

impl SabnzbdClient {
    pub fn new(config: SabnzbdConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MediarrError::ConfigurationError {
                field: "downloaders.sabnzbd".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { config, client })
    }

    fn api_url(&self, mode: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.url)
            .and_then(|u| u.join("/api"))
            .map_err(|e| MediarrError::ConfigurationError {
                field: "downloaders.sabnzbd.url".to_string(),
                message: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("mode", mode)
            .append_pair("output", "json")
            .append_pair("apikey", &self.config.api_key);
        Ok(url)
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| MediarrError::RemoteUnavailable {
                    service: "sabnzbd".to_string(),
                    error: e.to_string(),
                })?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(MediarrError::Unauthorized {
                service: "sabnzbd".to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(MediarrError::RemoteUnavailable {
                service: "sabnzbd".to_string(),
                error: format!("HTTP {}", response.status()),
            });
        }
        response
            .json()
            .await
            .map_err(|e| MediarrError::PayloadDecodeFailed {
                context: "sabnzbd api".to_string(),
                error: e.to_string(),
            })
    }

    async fn queue(&self) -> Result<Queue> {
        let response: QueueResponse = self.call(self.api_url("queue")?).await?;
        Ok(response.queue)
    }

    async fn history(&self) -> Result<Vec<HistorySlot>> {
        let response: HistoryResponse = self.call(self.api_url("history")?).await?;
        Ok(response.history.slots)
    }

    fn queue_slot_status(slot: &QueueSlot, global_speed: Option<i64>) -> ClientDownloadStatus {
        let state = match slot.status.to_ascii_lowercase().as_str() {
            "downloading" | "fetching" => ClientDownloadState::Downloading,
            _ => ClientDownloadState::Queued,
        };
        let size_bytes = slot
            .mb
            .parse::<f64>()
            .ok()
            .map(|mb| (mb * 1_048_576.0) as i64);
        ClientDownloadStatus {
            client_id: slot.nzo_id.clone(),
            name: slot.filename.clone(),
            state,
            progress: slot.percentage.parse().unwrap_or(0.0),
            size_bytes,
            speed_bps: if state == ClientDownloadState::Downloading {
                global_speed
            } else {
                None
            },
            eta: parse_timeleft(&slot.timeleft),
            source_path: None,
        }
    }

    fn history_slot_status(slot: &HistorySlot) -> ClientDownloadStatus {
        let failed = slot.status.eq_ignore_ascii_case("failed");
        ClientDownloadStatus {
            client_id: slot.nzo_id.clone(),
            name: if failed && !slot.fail_message.is_empty() {
                format!("{} ({})", slot.name, slot.fail_message)
            } else {
                slot.name.clone()
            },
            state: if failed {
                ClientDownloadState::Failed
            } else {
                ClientDownloadState::Completed
            },
            progress: 100.0,
            size_bytes: slot.bytes,
            speed_bps: None,
            eta: None,
            source_path: (!slot.storage.is_empty()).then(|| PathBuf::from(&slot.storage)),
        }
    }
}

/// "0:12:34" from real SABnzbd, "745s" from minimal implementations
fn parse_timeleft(text: &str) -> Option<Duration> {
    if let Some(seconds) = text.strip_suffix('s') {
        return seconds.parse().ok().map(Duration::from_secs);
    }
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() == 3 {
        let hours: u64 = parts[0].parse().ok()?;
        let minutes: u64 = parts[1].parse().ok()?;
        let seconds: u64 = parts[2].parse().ok()?;
        return Some(Duration::from_secs(hours * 3600 + minutes * 60 + seconds));
    }
    None
}

#[async_trait]
impl DownloadClient for SabnzbdClient {
    fn kind(&self) -> DownloadClientKind {
        DownloadClientKind::Sabnzbd
    }

    async fn add(&self, url: &str, category: Option<&str>) -> Result<String> {
        let mut api_url = self.api_url("addurl")?;
        api_url.query_pairs_mut().append_pair("name", url);
        if let Some(cat) = category.or(self.config.category.as_deref()) {
            api_url.query_pairs_mut().append_pair("cat", cat);
        }

        let response: AddResponse = self.call(api_url).await?;
        if !response.status {
            return Err(MediarrError::RemoteUnavailable {
                service: "sabnzbd".to_string(),
                error: "addurl rejected".to_string(),
            });
        }
        let nzo_id = response
            .nzo_ids
            .into_iter()
            .next()
            .ok_or_else(|| MediarrError::PayloadDecodeFailed {
                context: "sabnzbd addurl".to_string(),
                error: "no nzo id returned".to_string(),
            })?;
        debug!(%nzo_id, "queued nzb");
        Ok(nzo_id)
    }

    async fn status(&self, client_id: &str) -> Result<Option<ClientDownloadStatus>> {
        let queue = self.queue().await?;
        let global_speed = queue
            .kbpersec
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .map(|kb| (kb * 1024.0) as i64);
        if let Some(slot) = queue.slots.iter().find(|s| s.nzo_id == client_id) {
            return Ok(Some(Self::queue_slot_status(slot, global_speed)));
        }

        let history = self.history().await?;
        Ok(history
            .iter()
            .find(|s| s.nzo_id == client_id)
            .map(Self::history_slot_status))
    }

    async fn list(&self) -> Result<Vec<ClientDownloadStatus>> {
        let queue = self.queue().await?;
        let global_speed = queue
            .kbpersec
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .map(|kb| (kb * 1024.0) as i64);
        let mut statuses: Vec<ClientDownloadStatus> = queue
            .slots
            .iter()
            .map(|slot| Self::queue_slot_status(slot, global_speed))
            .collect();
        statuses.extend(self.history().await?.iter().map(Self::history_slot_status));
        Ok(statuses)
    }

    async fn remove(&self, client_id: &str, delete_files: bool) -> Result<()> {
        let mut url = self.api_url("queue")?;
        url.query_pairs_mut()
            .append_pair("name", "delete")
            .append_pair("value", client_id)
            .append_pair("del_files", if delete_files { "1" } else { "0" });
        let _: serde_json::Value = self.call(url).await?;
        Ok(())
    }
}
