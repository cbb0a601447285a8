//! Typed lifecycle events
//!
//! Every event is a tagged variant with its own payload. The string tags
//! are what gets persisted in the event log; [`SystemEvent::from_stored`]
//! rehydrates a log row back into the typed form.

pub mod bus;
pub mod log;

pub use bus::{EventBus, PublishedEvent, Subscription, SubscriptionFilter};
pub use log::{EventStore, StoredEvent};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MediarrError, Result};

/// What kind of entity an event is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Download,
    Content,
    Episode,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Download => write!(f, "download"),
            EntityType::Content => write!(f, "content"),
            EntityType::Episode => write!(f, "episode"),
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = MediarrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "download" => Ok(EntityType::Download),
            "content" => Ok(EntityType::Content),
            "episode" => Ok(EntityType::Episode),
            other => Err(MediarrError::ValidationError {
                field: "entity_type".to_string(),
                message: format!("Invalid entity type: {}", other),
            }),
        }
    }
}

/// The closed set of lifecycle events flowing over the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SystemEvent {
    #[serde(rename = "grab.requested")]
    GrabRequested {
        content_id: Uuid,
        episode_ids: Vec<Uuid>,
        season: Option<u32>,
        is_complete_season: bool,
        download_url: String,
        release_name: String,
        indexer: String,
    },
    #[serde(rename = "grab.skipped")]
    GrabSkipped {
        content_id: Uuid,
        release_name: String,
        release_quality: String,
        existing_quality: String,
        reason: String,
    },
    #[serde(rename = "download.created")]
    DownloadCreated {
        download_id: Uuid,
        content_id: Uuid,
        episode_ids: Vec<Uuid>,
        client_id: String,
        release_name: String,
    },
    #[serde(rename = "download.progressed")]
    DownloadProgressed {
        download_id: Uuid,
        progress: f32,
        speed_bps: i64,
        eta_seconds: Option<i64>,
        size_bytes: Option<i64>,
    },
    #[serde(rename = "download.completed")]
    DownloadCompleted {
        download_id: Uuid,
        source_path: String,
    },
    #[serde(rename = "download.failed")]
    DownloadFailed {
        download_id: Uuid,
        reason: String,
        retryable: bool,
    },
    #[serde(rename = "import.started")]
    ImportStarted {
        download_id: Uuid,
        source_path: String,
    },
    #[serde(rename = "import.completed")]
    ImportCompleted {
        download_id: Uuid,
        content_id: Uuid,
        episode_ids: Vec<Uuid>,
        file_path: String,
        file_size: i64,
    },
    #[serde(rename = "import.failed")]
    ImportFailed { download_id: Uuid, reason: String },
    #[serde(rename = "import.skipped")]
    ImportSkipped {
        download_id: Uuid,
        content_id: Uuid,
        source_path: String,
        release_quality: String,
        existing_quality: String,
        reason: String,
    },
    #[serde(rename = "cleanup.started")]
    CleanupStarted {
        download_id: Uuid,
        source_path: String,
    },
    #[serde(rename = "cleanup.completed")]
    CleanupCompleted { download_id: Uuid },
    #[serde(rename = "content.added")]
    ContentAdded { content_id: Uuid, title: String },
    #[serde(rename = "content.status.changed")]
    ContentStatusChanged { content_id: Uuid, status: String },
    #[serde(rename = "media.item.detected")]
    MediaItemDetected {
        content_id: Uuid,
        media_server_key: Option<String>,
    },
}

/// Event-type string constants, used by subscribers and the registry
pub mod kinds {
    pub const GRAB_REQUESTED: &str = "grab.requested";
    pub const GRAB_SKIPPED: &str = "grab.skipped";
    pub const DOWNLOAD_CREATED: &str = "download.created";
    pub const DOWNLOAD_PROGRESSED: &str = "download.progressed";
    pub const DOWNLOAD_COMPLETED: &str = "download.completed";
    pub const DOWNLOAD_FAILED: &str = "download.failed";
    pub const IMPORT_STARTED: &str = "import.started";
    pub const IMPORT_COMPLETED: &str = "import.completed";
    pub const IMPORT_FAILED: &str = "import.failed";
    pub const IMPORT_SKIPPED: &str = "import.skipped";
    pub const CLEANUP_STARTED: &str = "cleanup.started";
    pub const CLEANUP_COMPLETED: &str = "cleanup.completed";
    pub const CONTENT_ADDED: &str = "content.added";
    pub const CONTENT_STATUS_CHANGED: &str = "content.status.changed";
    pub const MEDIA_ITEM_DETECTED: &str = "media.item.detected";

    pub const ALL: &[&str] = &[
        GRAB_REQUESTED,
        GRAB_SKIPPED,
        DOWNLOAD_CREATED,
        DOWNLOAD_PROGRESSED,
        DOWNLOAD_COMPLETED,
        DOWNLOAD_FAILED,
        IMPORT_STARTED,
        IMPORT_COMPLETED,
        IMPORT_FAILED,
        IMPORT_SKIPPED,
        CLEANUP_STARTED,
        CLEANUP_COMPLETED,
        CONTENT_ADDED,
        CONTENT_STATUS_CHANGED,
        MEDIA_ITEM_DETECTED,
    ];
}

impl SystemEvent {
    /// The persisted string tag of this event
    pub fn event_type(&self) -> &'static str {
        match self {
            SystemEvent::GrabRequested { .. } => kinds::GRAB_REQUESTED,
            SystemEvent::GrabSkipped { .. } => kinds::GRAB_SKIPPED,
            SystemEvent::DownloadCreated { .. } => kinds::DOWNLOAD_CREATED,
            SystemEvent::DownloadProgressed { .. } => kinds::DOWNLOAD_PROGRESSED,
            SystemEvent::DownloadCompleted { .. } => kinds::DOWNLOAD_COMPLETED,
            SystemEvent::DownloadFailed { .. } => kinds::DOWNLOAD_FAILED,
            SystemEvent::ImportStarted { .. } => kinds::IMPORT_STARTED,
            SystemEvent::ImportCompleted { .. } => kinds::IMPORT_COMPLETED,
            SystemEvent::ImportFailed { .. } => kinds::IMPORT_FAILED,
            SystemEvent::ImportSkipped { .. } => kinds::IMPORT_SKIPPED,
            SystemEvent::CleanupStarted { .. } => kinds::CLEANUP_STARTED,
            SystemEvent::CleanupCompleted { .. } => kinds::CLEANUP_COMPLETED,
            SystemEvent::ContentAdded { .. } => kinds::CONTENT_ADDED,
            SystemEvent::ContentStatusChanged { .. } => kinds::CONTENT_STATUS_CHANGED,
            SystemEvent::MediaItemDetected { .. } => kinds::MEDIA_ITEM_DETECTED,
        }
    }

    /// Which entity this event is about
    pub fn entity(&self) -> (EntityType, Uuid) {
        match self {
            SystemEvent::GrabRequested { content_id, .. }
            | SystemEvent::GrabSkipped { content_id, .. }
            | SystemEvent::ContentAdded { content_id, .. }
            | SystemEvent::ContentStatusChanged { content_id, .. }
            | SystemEvent::MediaItemDetected { content_id, .. } => {
                (EntityType::Content, *content_id)
            }
            SystemEvent::DownloadCreated { download_id, .. }
            | SystemEvent::DownloadProgressed { download_id, .. }
            | SystemEvent::DownloadCompleted { download_id, .. }
            | SystemEvent::DownloadFailed { download_id, .. }
            | SystemEvent::ImportStarted { download_id, .. }
            | SystemEvent::ImportCompleted { download_id, .. }
            | SystemEvent::ImportFailed { download_id, .. }
            | SystemEvent::ImportSkipped { download_id, .. }
            | SystemEvent::CleanupStarted { download_id, .. }
            | SystemEvent::CleanupCompleted { download_id, .. } => {
                (EntityType::Download, *download_id)
            }
        }
    }

    /// The payload portion alone, as persisted in the event log
    pub fn payload(&self) -> Result<serde_json::Value> {
        let tagged =
            serde_json::to_value(self).map_err(|e| MediarrError::PayloadDecodeFailed {
                context: self.event_type().to_string(),
                error: e.to_string(),
            })?;
        Ok(tagged.get("data").cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Rehydrate a stored row back into a typed event.
    ///
    /// Unknown tags fail with `UnknownEventKind`; a known tag with a payload
    /// that does not match its schema fails with `PayloadDecodeFailed`.
    pub fn from_stored(event_type: &str, payload: serde_json::Value) -> Result<SystemEvent> {
        if !kinds::ALL.contains(&event_type) {
            return Err(MediarrError::UnknownEventKind {
                kind: event_type.to_string(),
            });
        }
        let tagged = serde_json::json!({ "type": event_type, "data": payload });
        serde_json::from_value(tagged).map_err(|e| MediarrError::PayloadDecodeFailed {
            context: event_type.to_string(),
            error: e.to_string(),
        })
    }

    /// Short human description for logging
    pub fn description(&self) -> String {
        match self {
            SystemEvent::GrabRequested { release_name, .. } => {
                format!("grab requested: {}", release_name)
            }
            SystemEvent::GrabSkipped { release_name, reason, .. } => {
                format!("grab skipped: {} ({})", release_name, reason)
            }
            SystemEvent::DownloadCreated { client_id, .. } => {
                format!("download created: {}", client_id)
            }
            SystemEvent::DownloadProgressed { progress, .. } => {
                format!("download progress: {:.1}%", progress)
            }
            SystemEvent::DownloadCompleted { source_path, .. } => {
                format!("download completed: {}", source_path)
            }
            SystemEvent::DownloadFailed { reason, .. } => format!("download failed: {}", reason),
            SystemEvent::ImportStarted { source_path, .. } => {
                format!("import started: {}", source_path)
            }
            SystemEvent::ImportCompleted { file_path, .. } => {
                format!("import completed: {}", file_path)
            }
            SystemEvent::ImportFailed { reason, .. } => format!("import failed: {}", reason),
            SystemEvent::ImportSkipped { reason, .. } => format!("import skipped: {}", reason),
            SystemEvent::CleanupStarted { source_path, .. } => {
                format!("cleanup started: {}", source_path)
            }
            SystemEvent::CleanupCompleted { download_id } => {
                format!("cleanup completed: {}", download_id)
            }
            SystemEvent::ContentAdded { title, .. } => format!("content added: {}", title),
            SystemEvent::ContentStatusChanged { status, .. } => {
                format!("content status: {}", status)
            }
            SystemEvent::MediaItemDetected { content_id, .. } => {
                format!("media item detected: {}", content_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_events() -> Vec<SystemEvent> {
        let id = Uuid::new_v4();
        vec![
            SystemEvent::GrabRequested {
                content_id: id,
                episode_ids: vec![Uuid::new_v4()],
                season: Some(2),
                is_complete_season: false,
                download_url: "http://indexer/1.nzb".to_string(),
                release_name: "Show.S02E01.1080p.WEB-DL".to_string(),
                indexer: "idx".to_string(),
            },
            SystemEvent::GrabSkipped {
                content_id: id,
                release_name: "Show.S02E01.720p".to_string(),
                release_quality: "720p".to_string(),
                existing_quality: "1080p".to_string(),
                reason: "existing_quality_equal_or_better".to_string(),
            },
            SystemEvent::DownloadCreated {
                download_id: id,
                content_id: Uuid::new_v4(),
                episode_ids: vec![],
                client_id: "nzo_abc".to_string(),
                release_name: "x".to_string(),
            },
            SystemEvent::DownloadProgressed {
                download_id: id,
                progress: 42.5,
                speed_bps: 1_000_000,
                eta_seconds: Some(120),
                size_bytes: Some(700_000_000),
            },
            SystemEvent::DownloadCompleted {
                download_id: id,
                source_path: "/downloads/x".to_string(),
            },
            SystemEvent::DownloadFailed {
                download_id: id,
                reason: "client error".to_string(),
                retryable: true,
            },
            SystemEvent::ImportStarted {
                download_id: id,
                source_path: "/downloads/x".to_string(),
            },
            SystemEvent::ImportCompleted {
                download_id: id,
                content_id: Uuid::new_v4(),
                episode_ids: vec![Uuid::new_v4()],
                file_path: "/movies/X (2020)/X (2020) - 1080p.mkv".to_string(),
                file_size: 1000,
            },
            SystemEvent::ImportFailed {
                download_id: id,
                reason: "no video file".to_string(),
            },
            SystemEvent::ImportSkipped {
                download_id: id,
                content_id: Uuid::new_v4(),
                source_path: "/downloads/x".to_string(),
                release_quality: "1080p".to_string(),
                existing_quality: "1080p".to_string(),
                reason: "existing_quality_equal_or_better".to_string(),
            },
            SystemEvent::CleanupStarted {
                download_id: id,
                source_path: "/downloads/x".to_string(),
            },
            SystemEvent::CleanupCompleted { download_id: id },
            SystemEvent::ContentAdded {
                content_id: id,
                title: "The Matrix".to_string(),
            },
            SystemEvent::ContentStatusChanged {
                content_id: id,
                status: "available".to_string(),
            },
            SystemEvent::MediaItemDetected {
                content_id: id,
                media_server_key: Some("12345".to_string()),
            },
        ]
    }

    #[test]
    fn every_event_round_trips_through_the_registry() {
        for event in sample_events() {
            let payload = event.payload().unwrap();
            let back = SystemEvent::from_stored(event.event_type(), payload).unwrap();
            assert_eq!(event, back);
        }
    }

    #[test]
    fn kinds_list_covers_every_variant() {
        for event in sample_events() {
            assert!(kinds::ALL.contains(&event.event_type()));
        }
        assert_eq!(kinds::ALL.len(), sample_events().len());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = SystemEvent::from_stored("grab.exploded", serde_json::json!({})).unwrap_err();
        assert!(matches!(err, MediarrError::UnknownEventKind { .. }));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let err = SystemEvent::from_stored(
            kinds::DOWNLOAD_COMPLETED,
            serde_json::json!({ "download_id": "not-a-uuid" }),
        )
        .unwrap_err();
        assert!(matches!(err, MediarrError::PayloadDecodeFailed { .. }));
    }

    #[test]
    fn entity_mapping() {
        let id = Uuid::new_v4();
        let event = SystemEvent::DownloadCompleted {
            download_id: id,
            source_path: "/x".to_string(),
        };
        assert_eq!(event.entity(), (EntityType::Download, id));

        let event = SystemEvent::ContentAdded {
            content_id: id,
            title: "t".to_string(),
        };
        assert_eq!(event.entity(), (EntityType::Content, id));
    }
}
