//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mediarr_core::MediarrError;
use serde_json::json;

pub struct ApiError(pub MediarrError);

impl From<MediarrError> for ApiError {
    fn from(err: MediarrError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MediarrError::NotFound { .. } => StatusCode::NOT_FOUND,
            MediarrError::InvalidState { .. } | MediarrError::DestinationExists { .. } => {
                StatusCode::CONFLICT
            }
            MediarrError::ValidationError { .. }
            | MediarrError::EpisodeNotSpecified { .. }
            | MediarrError::PathTraversal { .. } => StatusCode::BAD_REQUEST,
            MediarrError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            MediarrError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            MediarrError::RemoteUnavailable { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
