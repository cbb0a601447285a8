//! Radarr / Sonarr compatibility shims
//!
//! A thin `/api/v3` surface shaped like the ecosystem APIs so existing
//! tooling (mobile apps, request managers) can point at Mediarr without
//! changes. Read-only: status, library listings and the queue.

use axum::extract::{Query, State};
use axum::Json;
use mediarr_core::domain::{DownloadStore, LibraryStore};
use mediarr_core::models::{ContentStatus, ContentType};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::models::ListQuery;
use crate::state::ApiState;

pub async fn system_status() -> Json<Value> {
    Json(json!({
        "appName": "Mediarr",
        "version": env!("CARGO_PKG_VERSION"),
        "apiVersion": "v3",
        "osName": std::env::consts::OS,
        "isProduction": true,
    }))
}

/// Radarr-shaped movie listing
pub async fn list_movies(State(state): State<ApiState>) -> ApiResult<Json<Vec<Value>>> {
    let content = state.library.list_content().await?;
    let movies = content
        .into_iter()
        .filter(|c| c.content_type == ContentType::Movie)
        .map(|c| {
            json!({
                "id": c.id,
                "title": c.title,
                "year": c.year,
                "monitored": true,
                "hasFile": c.status == ContentStatus::Available,
                "path": c.root_path,
                "qualityProfileId": c.quality_profile,
                "added": c.added_at,
            })
        })
        .collect();
    Ok(Json(movies))
}

/// Sonarr-shaped series listing
pub async fn list_series(State(state): State<ApiState>) -> ApiResult<Json<Vec<Value>>> {
    let content = state.library.list_content().await?;
    let mut series = Vec::new();
    for c in content
        .into_iter()
        .filter(|c| c.content_type == ContentType::Series)
    {
        let episodes = state.library.episodes_for_content(c.id).await?;
        let available = episodes
            .iter()
            .filter(|e| e.status == ContentStatus::Available)
            .count();
        series.push(json!({
            "id": c.id,
            "title": c.title,
            "year": c.year,
            "monitored": true,
            "path": c.root_path,
            "statistics": {
                "episodeCount": episodes.len(),
                "episodeFileCount": available,
            },
            "added": c.added_at,
        }));
    }
    Ok(Json(series))
}

/// Queue in the paged `records` envelope both Radarr and Sonarr use
pub async fn queue(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let downloads = state
        .downloads
        .list(query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    let records: Vec<Value> = downloads
        .into_iter()
        .filter(|d| !d.status.is_terminal())
        .map(|d| {
            let timeleft = d.eta_seconds.map(|eta| {
                format!("{:02}:{:02}:{:02}", eta / 3600, (eta % 3600) / 60, eta % 60)
            });
            json!({
                "id": d.id,
                "movieId": d.content_id,
                "title": d.release_name,
                "status": d.status.to_string(),
                "protocol": d.client.to_string(),
                "downloadId": d.client_id,
                "indexer": d.indexer,
                "size": d.size_bytes,
                "sizeleft": d.size_bytes.map(|size| {
                    (size as f64 * (1.0 - f64::from(d.progress) / 100.0)) as i64
                }),
                "timeleft": timeleft,
            })
        })
        .collect();

    Ok(Json(json!({
        "page": 1,
        "pageSize": records.len(),
        "totalRecords": records.len(),
        "records": records,
    })))
}
