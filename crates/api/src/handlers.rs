//! Native API handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use mediarr_core::domain::{DownloadStore, HistoryStore, LibraryStore};
use mediarr_core::events::{EventStore, SystemEvent};
use mediarr_core::models::{Content, Episode};
use mediarr_core::MediarrError;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    AddContentRequest, AddEpisodeRequest, ContentResponse, DownloadResponse, EpisodeResponse,
    EventResponse, GrabRequest, HistoryResponse, ListQuery,
};
use crate::state::ApiState;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn add_content(
    State(state): State<ApiState>,
    Json(request): Json<AddContentRequest>,
) -> ApiResult<(StatusCode, Json<ContentResponse>)> {
    let root_path = request.root_path.unwrap_or_else(|| {
        match request.content_type {
            mediarr_core::models::ContentType::Movie => state.movie_root.clone(),
            mediarr_core::models::ContentType::Series => state.series_root.clone(),
        }
    });

    let mut content = Content::new(request.content_type, request.title, root_path);
    content.year = request.year;
    if let Some(profile) = request.quality_profile {
        content.quality_profile = profile;
    }
    state.library.add_content(&content).await?;

    info!(content_id = %content.id, title = %content.title, "content added");
    state
        .bus
        .publish(SystemEvent::ContentAdded {
            content_id: content.id,
            title: content.title.clone(),
        })
        .await;

    Ok((StatusCode::CREATED, Json(content.into())))
}

pub async fn list_content(
    State(state): State<ApiState>,
) -> ApiResult<Json<Vec<ContentResponse>>> {
    let content = state.library.list_content().await?;
    Ok(Json(content.into_iter().map(Into::into).collect()))
}

pub async fn get_content(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ContentResponse>> {
    let content = state
        .library
        .get_content(id)
        .await?
        .ok_or_else(|| MediarrError::NotFound {
            resource: format!("content {}", id),
        })?;
    Ok(Json(content.into()))
}

pub async fn list_episodes(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<EpisodeResponse>>> {
    let episodes = state.library.episodes_for_content(id).await?;
    Ok(Json(episodes.into_iter().map(Into::into).collect()))
}

pub async fn add_episode(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddEpisodeRequest>,
) -> ApiResult<(StatusCode, Json<EpisodeResponse>)> {
    // The content must exist and be a series
    let content = state
        .library
        .get_content(id)
        .await?
        .ok_or_else(|| MediarrError::NotFound {
            resource: format!("content {}", id),
        })?;
    if content.content_type != mediarr_core::models::ContentType::Series {
        return Err(ApiError(MediarrError::ValidationError {
            field: "content_type".to_string(),
            message: "episodes can only be added to series".to_string(),
        }));
    }

    let episode = Episode::new(id, request.season, request.episode);
    state.library.add_episode(&episode).await?;
    Ok((StatusCode::CREATED, Json(episode.into())))
}

/// Accepts a grab and publishes it onto the bus. Processing is
/// asynchronous; the caller learns the outcome through downloads and
/// events.
pub async fn grab(
    State(state): State<ApiState>,
    Json(request): Json<GrabRequest>,
) -> ApiResult<StatusCode> {
    // Reject grabs for unknown content up front
    state
        .library
        .get_content(request.content_id)
        .await?
        .ok_or_else(|| MediarrError::NotFound {
            resource: format!("content {}", request.content_id),
        })?;

    info!(
        content_id = %request.content_id,
        release = %request.release_name,
        indexer = %request.indexer,
        "grab requested"
    );
    state
        .bus
        .publish(SystemEvent::GrabRequested {
            content_id: request.content_id,
            episode_ids: request.episode_ids,
            season: request.season,
            is_complete_season: request.is_complete_season,
            download_url: request.download_url,
            release_name: request.release_name,
            indexer: request.indexer,
        })
        .await;

    Ok(StatusCode::ACCEPTED)
}

pub async fn list_downloads(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<DownloadResponse>>> {
    let downloads = state
        .downloads
        .list(query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    Ok(Json(downloads.into_iter().map(Into::into).collect()))
}

pub async fn list_history(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<HistoryResponse>>> {
    let entries = state
        .history
        .list(query.content_id, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

pub async fn recent_events(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<EventResponse>>> {
    let events = state
        .events
        .recent(query.limit.unwrap_or(50) as u32)
        .await?;
    Ok(Json(
        events
            .into_iter()
            .map(|e| EventResponse {
                id: e.id,
                event_type: e.event_type,
                entity_type: e.entity_type.to_string(),
                entity_id: e.entity_id,
                payload: e.payload,
                occurred_at: e.occurred_at,
            })
            .collect(),
    ))
}
