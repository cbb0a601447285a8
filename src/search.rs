//! Interactive search and lookup endpoints
//!
//! `/api/search` fans a query out over every configured indexer and
//! annotates each release with parsed metadata, so a caller can pick a
//! release and POST it to `/api/grab`. `/api/lookup/*` resolve titles
//! against the metadata services when adding content.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use futures::future::join_all;
use mediarr_api::error::{ApiError, ApiResult};
use mediarr_core::MediarrError;
use mediarr_indexers::{
    MovieMetadataClient, NewznabClient, SearchRequest, TmdbClient, TvMetadataClient, TvdbClient,
};
use mediarr_infrastructure::SqliteMetadataCache;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Clone)]
pub struct SearchState {
    pub indexers: Vec<Arc<NewznabClient>>,
    pub tmdb: Option<Arc<TmdbClient>>,
    pub tvdb: Option<Arc<TvdbClient>>,
    pub cache: Arc<SqliteMetadataCache>,
    pub api_key: Option<String>,
}

/// Metadata answers barely change; a day of caching spares the services'
/// rate limits.
const CACHE_MAX_AGE_HOURS: i64 = 24;

async fn cached_lookup<F, Fut>(
    cache: &SqliteMetadataCache,
    key: &str,
    fetch: F,
) -> Result<Vec<Value>, ApiError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<Value>, ApiError>>,
{
    let max_age = chrono::Duration::hours(CACHE_MAX_AGE_HOURS);
    if let Ok(Some(Value::Array(hit))) = cache.get(key, max_age).await {
        return Ok(hit);
    }
    let fresh = fetch().await?;
    if let Err(e) = cache.put(key, &Value::Array(fresh.clone())).await {
        warn!(%key, error = %e, "failed to cache lookup result");
    }
    Ok(fresh)
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub cat: Option<String>,
}

fn check_api_key(state: &SearchState, headers: &HeaderMap) -> Result<(), ApiError> {
    if let Some(expected) = &state.api_key {
        let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(ApiError(MediarrError::Unauthorized {
                service: "api".to_string(),
            }));
        }
    }
    Ok(())
}

async fn search(
    State(state): State<SearchState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    check_api_key(&state, &headers)?;

    let categories: Vec<u32> = query
        .cat
        .as_deref()
        .map(|cats| cats.split(',').filter_map(|c| c.parse().ok()).collect())
        .unwrap_or_default();
    let request = SearchRequest::new(&query.q).with_categories(categories);

    let searches = state.indexers.iter().map(|indexer| {
        let request = request.clone();
        async move { (indexer.name().to_string(), indexer.search(&request).await) }
    });

    let mut releases = Vec::new();
    for (indexer, result) in join_all(searches).await {
        match result {
            Ok(found) => {
                for release in found {
                    let parsed = mediarr_parser::parse(&release.title);
                    releases.push(json!({
                        "title": release.title,
                        "guid": release.guid,
                        "download_url": release.link,
                        "size_bytes": release.size_bytes,
                        "pub_date": release.pub_date,
                        "indexer": release.indexer,
                        "parsed": {
                            "title": parsed.title,
                            "year": parsed.year,
                            "resolution": parsed.resolution.to_string(),
                            "source": parsed.source.to_string(),
                            "codec": parsed.codec.to_string(),
                            "season": parsed.season,
                            "episodes": parsed.episodes,
                            "release_group": parsed.release_group,
                        },
                    }));
                }
            }
            // One broken indexer must not sink the whole search
            Err(e) => warn!(%indexer, error = %e, "indexer search failed"),
        }
    }

    Ok(Json(releases))
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub q: String,
}

async fn lookup_movie(
    State(state): State<SearchState>,
    headers: HeaderMap,
    Query(query): Query<LookupQuery>,
) -> ApiResult<(StatusCode, Json<Vec<Value>>)> {
    check_api_key(&state, &headers)?;
    let Some(tmdb) = &state.tmdb else {
        return Err(ApiError(MediarrError::ConfigurationError {
            field: "tmdb.api_key".to_string(),
            message: "movie lookup requires a TMDB api key".to_string(),
        }));
    };
    let key = format!("tmdb:search:{}", query.q.to_lowercase());
    let body = cached_lookup(&state.cache, &key, || async {
        let results = tmdb.search(&query.q).await?;
        Ok(results
            .into_iter()
            .map(|movie| {
                json!({
                    "tmdb_id": movie.id,
                    "title": movie.title,
                    "year": movie.year(),
                    "overview": movie.overview,
                })
            })
            .collect())
    })
    .await?;
    Ok((StatusCode::OK, Json(body)))
}

async fn lookup_series(
    State(state): State<SearchState>,
    headers: HeaderMap,
    Query(query): Query<LookupQuery>,
) -> ApiResult<(StatusCode, Json<Vec<Value>>)> {
    check_api_key(&state, &headers)?;
    let Some(tvdb) = &state.tvdb else {
        return Err(ApiError(MediarrError::ConfigurationError {
            field: "tvdb".to_string(),
            message: "series lookup requires a TVDB api key".to_string(),
        }));
    };
    let key = format!("tvdb:search:{}", query.q.to_lowercase());
    let body = cached_lookup(&state.cache, &key, || async {
        let results = tvdb.search(&query.q).await?;
        Ok(results
            .into_iter()
            .map(|series| {
                json!({
                    "tvdb_id": series.id,
                    "title": series.title,
                    "status": series.status,
                    "first_aired": series.first_aired,
                })
            })
            .collect())
    })
    .await?;
    Ok((StatusCode::OK, Json(body)))
}

pub fn router(state: SearchState) -> Router {
    Router::new()
        .route("/api/search", get(search))
        .route("/api/lookup/movie", get(lookup_movie))
        .route("/api/lookup/series", get(lookup_series))
        .with_state(state)
}
