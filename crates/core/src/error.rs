//! Core error type shared across the Mediarr crates

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediarrError {
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid state: {entity} is {actual}, expected {expected}")]
    InvalidState {
        entity: String,
        actual: String,
        expected: String,
    },

    #[error("Remote service unavailable: {service} - {error}")]
    RemoteUnavailable { service: String, error: String },

    #[error("Unauthorized against {service}")]
    Unauthorized { service: String },

    #[error("Rate limited by {service}")]
    RateLimited { service: String },

    #[error("Failed to decode payload for {context}: {error}")]
    PayloadDecodeFailed { context: String, error: String },

    #[error("Unknown event kind: {kind}")]
    UnknownEventKind { kind: String },

    #[error("Destination already exists: {path}")]
    DestinationExists { path: String },

    #[error("No video file found under {path}")]
    NoVideoFile { path: String },

    #[error("Path escapes library root: {path}")]
    PathTraversal { path: String },

    #[error("Copy failed: {from} -> {to}: {error}")]
    CopyFailed {
        from: String,
        to: String,
        error: String,
    },

    #[error("Episode not specified for series download {download_id}")]
    EpisodeNotSpecified { download_id: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("Domain validation error: {field} - {message}")]
    ValidationError { field: String, message: String },

    #[error("Configuration error: {field} - {message}")]
    ConfigurationError { field: String, message: String },

    #[error("File system error: {path} - {error}")]
    FileSystemError { path: String, error: String },
}

impl MediarrError {
    /// Whether retrying the same operation later can reasonably succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MediarrError::RemoteUnavailable { .. } | MediarrError::RateLimited { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MediarrError>;

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for MediarrError {
    fn from(err: sqlx::Error) -> Self {
        MediarrError::DatabaseError {
            message: err.to_string(),
        }
    }
}
