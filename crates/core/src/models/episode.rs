//! Episode rows for series content

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::ContentStatus;

/// One episode of a series. `(content_id, season, episode)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: Uuid,
    pub content_id: Uuid,
    pub season: u32,
    pub episode: u32,
    pub status: ContentStatus,
    pub added_at: DateTime<Utc>,
}

impl Episode {
    pub fn new(content_id: Uuid, season: u32, episode: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_id,
            season,
            episode,
            status: ContentStatus::Wanted,
            added_at: Utc::now(),
        }
    }

    /// Season and episode numbers start at 1
    pub fn validate(&self) -> crate::Result<()> {
        if self.season < 1 || self.episode < 1 {
            return Err(crate::MediarrError::ValidationError {
                field: "episode".to_string(),
                message: format!("Invalid numbering S{:02}E{:02}", self.season, self.episode),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_starts_at_one() {
        assert!(Episode::new(Uuid::new_v4(), 1, 1).validate().is_ok());
        assert!(Episode::new(Uuid::new_v4(), 0, 1).validate().is_err());
        assert!(Episode::new(Uuid::new_v4(), 1, 0).validate().is_err());
    }
}
