//! qBittorrent Web API client
//!
//! Cookie-session auth (`auth/login`), torrents via `torrents/add`,
//! `torrents/info` and `torrents/delete`. The client id is the torrent
//! hash; for magnet links it is extracted from the URI, otherwise the most
//! recently added torrent is taken after the add call.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use mediarr_core::domain::{ClientDownloadState, ClientDownloadStatus, DownloadClient};
use mediarr_core::models::DownloadClientKind;
use mediarr_core::{MediarrError, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct QbittorrentConfig {
    /// Base URL, e.g. "http://localhost:8080"
    pub url: String,
    pub username: String,
    pub password: String,
    pub category: Option<String>,
    pub timeout: Duration,
}

pub struct QbittorrentClient {
    config: QbittorrentConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TorrentInfo {
    hash: String,
    name: String,
    state: String,
    /// 0.0 - 1.0
    progress: f64,
    size: i64,
    dlspeed: i64,
    /// Seconds; 8640000 means unknown
    eta: i64,
    #[serde(default)]
    content_path: String,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    added_on: i64,
}

impl TorrentInfo {
    fn to_status(&self) -> ClientDownloadStatus {
        let state = match self.state.as_str() {
            "error" | "missingFiles" => ClientDownloadState::Failed,
            "uploading" | "stalledUP" | "pausedUP" | "queuedUP" | "forcedUP" | "checkingUP" => {
                ClientDownloadState::Completed
            }
            "queuedDL" | "pausedDL" | "allocating" => ClientDownloadState::Queued,
            _ => ClientDownloadState::Downloading,
        };
        let source = if !self.content_path.is_empty() {
            Some(PathBuf::from(&self.content_path))
        } else if !self.save_path.is_empty() {
            Some(PathBuf::from(&self.save_path).join(&self.name))
        } else {
            None
        };
        ClientDownloadStatus {
            client_id: self.hash.clone(),
            name: self.name.clone(),
            state,
            progress: (self.progress * 100.0) as f32,
            size_bytes: Some(self.size),
            speed_bps: Some(self.dlspeed),
            eta: (self.eta > 0 && self.eta < 8_640_000)
                .then(|| Duration::from_secs(self.eta as u64)),
            source_path: (state == ClientDownloadState::Completed)
                .then_some(source)
                .flatten(),
        }
    }
}

/// Extract the info hash from a magnet URI
fn magnet_hash(url: &str) -> Option<String> {
    let marker = "xt=urn:btih:";
    let start = url.find(marker)? + marker.len();
    let rest = &url[start..];
    let end = rest.find('&').unwrap_or(rest.len());
    let hash = &rest[..end];
    (hash.len() == 40 || hash.len() == 32).then(|| hash.to_ascii_lowercase())
}

impl QbittorrentClient {
    pub fn new(config: QbittorrentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| MediarrError::ConfigurationError {
                field: "downloaders.qbittorrent".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { config, client })
    }

    async fn login(&self) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/api/v2/auth/login", self.config.url))
            .form(&[
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MediarrError::RemoteUnavailable {
                service: "qbittorrent".to_string(),
                error: e.to_string(),
            })?;
        let body = response.text().await.unwrap_or_default();
        if body.trim() != "Ok." {
            return Err(MediarrError::Unauthorized {
                service: "qbittorrent".to_string(),
            });
        }
        Ok(())
    }

    async fn torrents(&self, hashes: Option<&str>) -> Result<Vec<TorrentInfo>> {
        let mut request = self
            .client
            .get(format!("{}/api/v2/torrents/info", self.config.url));
        if let Some(hashes) = hashes {
            request = request.query(&[("hashes", hashes)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| MediarrError::RemoteUnavailable {
                service: "qbittorrent".to_string(),
                error: e.to_string(),
            })?;
        if response.status() == reqwest::StatusCode::FORBIDDEN {
            // Session expired; caller retries after login
            return Err(MediarrError::Unauthorized {
                service: "qbittorrent".to_string(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| MediarrError::PayloadDecodeFailed {
                context: "qbittorrent torrents/info".to_string(),
                error: e.to_string(),
            })
    }

    async fn torrents_authed(&self, hashes: Option<&str>) -> Result<Vec<TorrentInfo>> {
        match self.torrents(hashes).await {
            Err(MediarrError::Unauthorized { .. }) => {
                self.login().await?;
                self.torrents(hashes).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl DownloadClient for QbittorrentClient {
    fn kind(&self) -> DownloadClientKind {
        DownloadClientKind::Torrent
    }

    async fn add(&self, url: &str, category: Option<&str>) -> Result<String> {
        self.login().await?;

        let mut form = vec![("urls", url.to_string())];
        if let Some(cat) = category.or(self.config.category.as_deref()) {
            form.push(("category", cat.to_string()));
        }
        let response = self
            .client
            .post(format!("{}/api/v2/torrents/add", self.config.url))
            .form(&form)
            .send()
            .await
            .map_err(|e| MediarrError::RemoteUnavailable {
                service: "qbittorrent".to_string(),
                error: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(MediarrError::RemoteUnavailable {
                service: "qbittorrent".to_string(),
                error: format!("HTTP {}", response.status()),
            });
        }

        if let Some(hash) = magnet_hash(url) {
            debug!(%hash, "torrent queued");
            return Ok(hash);
        }

        // Non-magnet add responses carry no id; take the newest torrent
        let mut torrents = self.torrents_authed(None).await?;
        torrents.sort_by_key(|t| t.added_on);
        torrents
            .pop()
            .map(|t| t.hash)
            .ok_or_else(|| MediarrError::PayloadDecodeFailed {
                context: "qbittorrent add".to_string(),
                error: "no torrent visible after add".to_string(),
            })
    }

    async fn status(&self, client_id: &str) -> Result<Option<ClientDownloadStatus>> {
        let torrents = self.torrents_authed(Some(client_id)).await?;
        Ok(torrents
            .iter()
            .find(|t| t.hash.eq_ignore_ascii_case(client_id))
            .map(TorrentInfo::to_status))
    }

    async fn list(&self) -> Result<Vec<ClientDownloadStatus>> {
        let torrents = self.torrents_authed(None).await?;
        Ok(torrents.iter().map(TorrentInfo::to_status).collect())
    }

    async fn remove(&self, client_id: &str, delete_files: bool) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/api/v2/torrents/delete", self.config.url))
            .form(&[
                ("hashes", client_id),
                ("deleteFiles", if delete_files { "true" } else { "false" }),
            ])
            .send()
            .await
            .map_err(|e| MediarrError::RemoteUnavailable {
                service: "qbittorrent".to_string(),
                error: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(MediarrError::RemoteUnavailable {
                service: "qbittorrent".to_string(),
                error: format!("HTTP {}", response.status()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnet_hash_extraction() {
        let magnet = "magnet:?xt=urn:btih:c12fe1c06bba254a9dc9f519b335aa7c1367a88a&dn=Movie";
        assert_eq!(
            magnet_hash(magnet).as_deref(),
            Some("c12fe1c06bba254a9dc9f519b335aa7c1367a88a")
        );
        assert!(magnet_hash("http://tracker/file.torrent").is_none());
        assert!(magnet_hash("magnet:?xt=urn:btih:tooshort").is_none());
    }

    #[test]
    fn state_mapping() {
        let mut info = TorrentInfo {
            hash: "abc".to_string(),
            name: "Movie".to_string(),
            state: "downloading".to_string(),
            progress: 0.42,
            size: 1000,
            dlspeed: 10,
            eta: 60,
            content_path: "/downloads/Movie".to_string(),
            save_path: String::new(),
            added_on: 0,
        };
        let status = info.to_status();
        assert_eq!(status.state, ClientDownloadState::Downloading);
        assert!((status.progress - 42.0).abs() < 0.01);
        // Source paths only surface once completed
        assert!(status.source_path.is_none());

        info.state = "uploading".to_string();
        let status = info.to_status();
        assert_eq!(status.state, ClientDownloadState::Completed);
        assert_eq!(
            status.source_path.as_deref(),
            Some(std::path::Path::new("/downloads/Movie"))
        );

        info.state = "missingFiles".to_string();
        assert_eq!(info.to_status().state, ClientDownloadState::Failed);
    }
}
