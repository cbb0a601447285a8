//! Append-only history of library-affecting operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEventType {
    Grabbed,
    Imported,
    Upgraded,
    Failed,
    Deleted,
}

impl std::fmt::Display for HistoryEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryEventType::Grabbed => write!(f, "grabbed"),
            HistoryEventType::Imported => write!(f, "imported"),
            HistoryEventType::Upgraded => write!(f, "upgraded"),
            HistoryEventType::Failed => write!(f, "failed"),
            HistoryEventType::Deleted => write!(f, "deleted"),
        }
    }
}

impl std::str::FromStr for HistoryEventType {
    type Err = crate::MediarrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grabbed" => Ok(HistoryEventType::Grabbed),
            "imported" => Ok(HistoryEventType::Imported),
            "upgraded" => Ok(HistoryEventType::Upgraded),
            "failed" => Ok(HistoryEventType::Failed),
            "deleted" => Ok(HistoryEventType::Deleted),
            other => Err(crate::MediarrError::ValidationError {
                field: "event".to_string(),
                message: format!("Invalid history event: {}", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub content_id: Uuid,
    pub episode_id: Option<Uuid>,
    pub event: HistoryEventType,
    /// Free-form metadata: release name, indexer, quality, paths
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(content_id: Uuid, event: HistoryEventType, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_id,
            episode_id: None,
            event,
            data,
            created_at: Utc::now(),
        }
    }

    pub fn with_episode(mut self, episode_id: Option<Uuid>) -> Self {
        self.episode_id = episode_id;
        self
    }
}
