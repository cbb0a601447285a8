//! Request and response bodies for the native API

use chrono::{DateTime, Utc};
use mediarr_core::models::{Content, ContentType, Download, Episode, HistoryEntry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AddContentRequest {
    pub title: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub quality_profile: Option<String>,
    #[serde(default)]
    pub root_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddEpisodeRequest {
    pub season: u32,
    pub episode: u32,
}

#[derive(Debug, Deserialize)]
pub struct GrabRequest {
    pub content_id: Uuid,
    #[serde(default)]
    pub episode_ids: Vec<Uuid>,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub is_complete_season: bool,
    pub download_url: String,
    pub release_name: String,
    pub indexer: String,
}

#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub id: Uuid,
    pub content_type: String,
    pub title: String,
    pub year: Option<i32>,
    pub status: String,
    pub quality_profile: String,
    pub root_path: String,
    pub added_at: DateTime<Utc>,
}

impl From<Content> for ContentResponse {
    fn from(content: Content) -> Self {
        Self {
            id: content.id,
            content_type: content.content_type.to_string(),
            title: content.title,
            year: content.year,
            status: content.status.to_string(),
            quality_profile: content.quality_profile,
            root_path: content.root_path,
            added_at: content.added_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EpisodeResponse {
    pub id: Uuid,
    pub content_id: Uuid,
    pub season: u32,
    pub episode: u32,
    pub status: String,
}

impl From<Episode> for EpisodeResponse {
    fn from(episode: Episode) -> Self {
        Self {
            id: episode.id,
            content_id: episode.content_id,
            season: episode.season,
            episode: episode.episode,
            status: episode.status.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub id: Uuid,
    pub content_id: Uuid,
    pub status: String,
    pub client: String,
    pub client_id: String,
    pub release_name: String,
    pub indexer: String,
    pub progress: f32,
    pub speed_bps: i64,
    pub eta_seconds: Option<i64>,
    pub size_bytes: Option<i64>,
    pub added_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Download> for DownloadResponse {
    fn from(download: Download) -> Self {
        Self {
            id: download.id,
            content_id: download.content_id,
            status: download.status.to_string(),
            client: download.client.to_string(),
            client_id: download.client_id,
            release_name: download.release_name,
            indexer: download.indexer,
            progress: download.progress,
            speed_bps: download.speed_bps,
            eta_seconds: download.eta_seconds,
            size_bytes: download.size_bytes,
            added_at: download.added_at,
            completed_at: download.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub id: Uuid,
    pub content_id: Uuid,
    pub episode_id: Option<Uuid>,
    pub event: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<HistoryEntry> for HistoryResponse {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            id: entry.id,
            content_id: entry.content_id,
            episode_id: entry.episode_id,
            event: entry.event.to_string(),
            data: entry.data,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: i64,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub content_id: Option<Uuid>,
}
