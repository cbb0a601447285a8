//! Download records and their status state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which download client owns a download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadClientKind {
    Sabnzbd,
    Torrent,
    Manual,
}

impl std::fmt::Display for DownloadClientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadClientKind::Sabnzbd => write!(f, "sabnzbd"),
            DownloadClientKind::Torrent => write!(f, "torrent"),
            DownloadClientKind::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for DownloadClientKind {
    type Err = crate::MediarrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sabnzbd" => Ok(DownloadClientKind::Sabnzbd),
            "torrent" => Ok(DownloadClientKind::Torrent),
            "manual" => Ok(DownloadClientKind::Manual),
            other => Err(crate::MediarrError::ValidationError {
                field: "client".to_string(),
                message: format!("Invalid download client: {}", other),
            }),
        }
    }
}

/// Durable download lifecycle. Transitions are validated; see
/// [`DownloadStatus::can_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    #[default]
    Queued,
    Downloading,
    Completed,
    Importing,
    Imported,
    Cleaned,
    Skipped,
    Failed,
}

impl DownloadStatus {
    /// Cleaned, failed and skipped are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Cleaned | DownloadStatus::Failed | DownloadStatus::Skipped
        )
    }

    /// The permitted transitions of the download state machine. A download
    /// may skip the `downloading` observation when the client finishes
    /// between two polls.
    pub fn can_transition(&self, to: DownloadStatus) -> bool {
        use DownloadStatus::*;
        matches!(
            (self, to),
            (Queued, Downloading)
                | (Queued, Completed)
                | (Queued, Failed)
                | (Downloading, Completed)
                | (Downloading, Failed)
                | (Completed, Importing)
                | (Completed, Failed)
                | (Importing, Imported)
                | (Importing, Skipped)
                | (Importing, Failed)
                | (Imported, Cleaned)
        )
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadStatus::Queued => write!(f, "queued"),
            DownloadStatus::Downloading => write!(f, "downloading"),
            DownloadStatus::Completed => write!(f, "completed"),
            DownloadStatus::Importing => write!(f, "importing"),
            DownloadStatus::Imported => write!(f, "imported"),
            DownloadStatus::Cleaned => write!(f, "cleaned"),
            DownloadStatus::Skipped => write!(f, "skipped"),
            DownloadStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DownloadStatus {
    type Err = crate::MediarrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(DownloadStatus::Queued),
            "downloading" => Ok(DownloadStatus::Downloading),
            "completed" => Ok(DownloadStatus::Completed),
            "importing" => Ok(DownloadStatus::Importing),
            "imported" => Ok(DownloadStatus::Imported),
            "cleaned" => Ok(DownloadStatus::Cleaned),
            "skipped" => Ok(DownloadStatus::Skipped),
            "failed" => Ok(DownloadStatus::Failed),
            other => Err(crate::MediarrError::ValidationError {
                field: "status".to_string(),
                message: format!("Invalid download status: {}", other),
            }),
        }
    }
}

/// Core download entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    pub id: Uuid,
    pub content_id: Uuid,
    /// Single-episode convenience; the full set lives in the junction table
    pub episode_id: Option<Uuid>,
    pub season: Option<u32>,
    pub is_complete_season: bool,
    pub client: DownloadClientKind,
    /// Client-specific identifier (nzo id, torrent hash, ...). Unique per
    /// client.
    pub client_id: String,
    pub status: DownloadStatus,
    pub release_name: String,
    pub indexer: String,
    pub progress: f32,
    pub speed_bps: i64,
    pub eta_seconds: Option<i64>,
    pub size_bytes: Option<i64>,
    pub added_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_transition_at: DateTime<Utc>,
}

impl Download {
    pub fn new(
        content_id: Uuid,
        client: DownloadClientKind,
        client_id: impl Into<String>,
        release_name: impl Into<String>,
        indexer: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content_id,
            episode_id: None,
            season: None,
            is_complete_season: false,
            client,
            client_id: client_id.into(),
            status: DownloadStatus::Queued,
            release_name: release_name.into(),
            indexer: indexer.into(),
            progress: 0.0,
            speed_bps: 0,
            eta_seconds: None,
            size_bytes: None,
            added_at: now,
            completed_at: None,
            last_transition_at: now,
        }
    }

    /// Apply a status transition, validating it against the state machine.
    /// `last_transition_at` is bumped on every change; `completed_at` is
    /// stamped when the download reaches `completed`.
    pub fn transition(&mut self, to: DownloadStatus) -> crate::Result<()> {
        if !self.status.can_transition(to) {
            return Err(crate::MediarrError::InvalidState {
                entity: format!("download {}", self.id),
                actual: self.status.to_string(),
                expected: format!("a state that can reach {}", to),
            });
        }
        self.status = to;
        self.last_transition_at = Utc::now();
        if to == DownloadStatus::Completed && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download() -> Download {
        Download::new(
            Uuid::new_v4(),
            DownloadClientKind::Sabnzbd,
            "nzo_1",
            "Movie.2020.1080p.BluRay.x264-GRP",
            "idx",
        )
    }

    #[test]
    fn happy_path_transitions() {
        let mut d = download();
        for to in [
            DownloadStatus::Downloading,
            DownloadStatus::Completed,
            DownloadStatus::Importing,
            DownloadStatus::Imported,
            DownloadStatus::Cleaned,
        ] {
            d.transition(to).unwrap();
        }
        assert!(d.status.is_terminal());
        assert!(d.completed_at.is_some());
    }

    #[test]
    fn terminal_states_reject_transitions() {
        for terminal in [
            DownloadStatus::Cleaned,
            DownloadStatus::Failed,
            DownloadStatus::Skipped,
        ] {
            assert!(terminal.is_terminal());
            for to in [
                DownloadStatus::Queued,
                DownloadStatus::Downloading,
                DownloadStatus::Completed,
                DownloadStatus::Importing,
                DownloadStatus::Imported,
                DownloadStatus::Cleaned,
                DownloadStatus::Skipped,
                DownloadStatus::Failed,
            ] {
                assert!(!terminal.can_transition(to));
            }
        }
    }

    #[test]
    fn skipped_only_from_importing() {
        let mut d = download();
        assert!(d.transition(DownloadStatus::Skipped).is_err());
        d.transition(DownloadStatus::Completed).unwrap();
        d.transition(DownloadStatus::Importing).unwrap();
        d.transition(DownloadStatus::Skipped).unwrap();
    }

    #[test]
    fn fast_downloads_may_skip_the_downloading_observation() {
        let mut d = download();
        d.transition(DownloadStatus::Completed).unwrap();
        assert_eq!(d.status, DownloadStatus::Completed);
    }

    #[test]
    fn invalid_transition_keeps_state() {
        let mut d = download();
        let err = d.transition(DownloadStatus::Imported).unwrap_err();
        assert!(matches!(err, crate::MediarrError::InvalidState { .. }));
        assert_eq!(d.status, DownloadStatus::Queued);
    }
}
