//! HTTP API for Mediarr
//!
//! The native surface lives under `/api`; Radarr/Sonarr-shaped shims live
//! under `/api/v3`. All routes except the health check require the
//! configured API key when one is set.

pub mod compat;
pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

async fn require_api_key(State(state): State<ApiState>, request: Request, next: Next) -> Response {
    if let Some(expected) = &state.api_key {
        let provided = request
            .headers()
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid api key" })),
            )
                .into_response();
        }
    }
    next.run(request).await
}

pub fn create_router(state: ApiState) -> Router {
    let native = Router::new()
        .route("/content", post(handlers::add_content).get(handlers::list_content))
        .route("/content/:id", get(handlers::get_content))
        .route(
            "/content/:id/episodes",
            get(handlers::list_episodes).post(handlers::add_episode),
        )
        .route("/grab", post(handlers::grab))
        .route("/downloads", get(handlers::list_downloads))
        .route("/history", get(handlers::list_history))
        .route("/events/recent", get(handlers::recent_events));

    let mut router = Router::new().nest("/api", native);
    if state.compat_radarr || state.compat_sonarr {
        let mut compat = Router::new()
            .route("/system/status", get(compat::system_status))
            .route("/queue", get(compat::queue));
        if state.compat_radarr {
            compat = compat.route("/movie", get(compat::list_movies));
        }
        if state.compat_sonarr {
            compat = compat.route("/series", get(compat::list_series));
        }
        router = router.nest("/api/v3", compat);
    }

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        // Health stays reachable without a key
        .route("/api/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum_test::TestServer;
    use mediarr_core::domain::LibraryStore;
    use mediarr_core::events::{kinds, EventBus, SystemEvent};
    use mediarr_core::models::{Content, ContentType};
    use mediarr_core::testing::{MemoryDownloads, MemoryEvents, MemoryHistory, MemoryLibrary};
    use serde_json::json;
    use uuid::Uuid;

    fn state(api_key: Option<&str>) -> (ApiState, Arc<EventBus>, Arc<MemoryLibrary>) {
        let bus = Arc::new(EventBus::new());
        let library = Arc::new(MemoryLibrary::default());
        let state = ApiState {
            library: library.clone(),
            downloads: Arc::new(MemoryDownloads::default()),
            history: Arc::new(MemoryHistory::default()),
            events: Arc::new(MemoryEvents::default()),
            bus: bus.clone(),
            api_key: api_key.map(String::from),
            compat_radarr: true,
            compat_sonarr: true,
            movie_root: "/movies".to_string(),
            series_root: "/series".to_string(),
        };
        (state, bus, library)
    }

    #[tokio::test]
    async fn add_and_list_content() {
        let (state, _bus, _library) = state(None);
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server
            .post("/api/content")
            .json(&json!({
                "title": "The Matrix",
                "content_type": "movie",
                "year": 1999
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["title"], "The Matrix");
        assert_eq!(body["status"], "wanted");
        assert_eq!(body["root_path"], "/movies");

        let listing: Vec<serde_json::Value> = server.get("/api/content").await.json();
        assert_eq!(listing.len(), 1);
    }

    #[tokio::test]
    async fn grab_publishes_event_and_returns_accepted() {
        let (state, bus, library) = state(None);
        let content = Content::new(ContentType::Movie, "The Matrix", "/movies");
        library.add_content(&content).await.unwrap();

        let mut grabs = bus.subscribe(kinds::GRAB_REQUESTED, 8);
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server
            .post("/api/grab")
            .json(&json!({
                "content_id": content.id,
                "download_url": "http://indexer/1.nzb",
                "release_name": "The.Matrix.1999.1080p.BluRay.x264-GRP",
                "indexer": "idx"
            }))
            .await;
        response.assert_status(StatusCode::ACCEPTED);

        let published = grabs.recv().await.unwrap();
        assert!(matches!(
            published.event,
            SystemEvent::GrabRequested { content_id, .. } if content_id == content.id
        ));
    }

    #[tokio::test]
    async fn grab_for_unknown_content_is_404() {
        let (state, _bus, _library) = state(None);
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server
            .post("/api/grab")
            .json(&json!({
                "content_id": Uuid::new_v4(),
                "download_url": "http://indexer/1.nzb",
                "release_name": "X.2020.1080p",
                "indexer": "idx"
            }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn api_key_is_enforced_except_for_health() {
        let (state, _bus, _library) = state(Some("secret"));
        let server = TestServer::new(create_router(state)).unwrap();

        server
            .get("/api/content")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/api/content")
            .add_header(
                axum::http::HeaderName::from_static("x-api-key"),
                axum::http::HeaderValue::from_static("secret"),
            )
            .await
            .assert_status(StatusCode::OK);
        server.get("/api/health").await.assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn disabled_compat_surfaces_are_not_mounted() {
        let (mut state, _bus, _library) = state(None);
        state.compat_sonarr = false;
        let server = TestServer::new(create_router(state)).unwrap();

        server
            .get("/api/v3/movie")
            .await
            .assert_status(StatusCode::OK);
        server
            .get("/api/v3/series")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn radarr_compat_lists_movies() {
        let (state, _bus, library) = state(None);
        let content = Content::new(ContentType::Movie, "The Matrix", "/movies").with_year(1999);
        library.add_content(&content).await.unwrap();
        library
            .add_content(&Content::new(ContentType::Series, "Show", "/series"))
            .await
            .unwrap();

        let server = TestServer::new(create_router(state)).unwrap();
        let movies: Vec<serde_json::Value> = server.get("/api/v3/movie").await.json();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0]["title"], "The Matrix");
        assert_eq!(movies[0]["hasFile"], false);

        let series: Vec<serde_json::Value> = server.get("/api/v3/series").await.json();
        assert_eq!(series.len(), 1);

        let status: serde_json::Value = server.get("/api/v3/system/status").await.json();
        assert_eq!(status["apiVersion"], "v3");
    }
}
