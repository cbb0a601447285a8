//! Library content: movies and series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Series,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Movie => write!(f, "movie"),
            ContentType::Series => write!(f, "series"),
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = crate::MediarrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(ContentType::Movie),
            "series" => Ok(ContentType::Series),
            other => Err(crate::MediarrError::ValidationError {
                field: "content_type".to_string(),
                message: format!("Invalid content type: {}", other),
            }),
        }
    }
}

/// Availability of a library item. For series this is a derived summary;
/// the authoritative status lives on each episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Wanted,
    Available,
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentStatus::Wanted => write!(f, "wanted"),
            ContentStatus::Available => write!(f, "available"),
        }
    }
}

impl std::str::FromStr for ContentStatus {
    type Err = crate::MediarrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wanted" => Ok(ContentStatus::Wanted),
            "available" => Ok(ContentStatus::Available),
            other => Err(crate::MediarrError::ValidationError {
                field: "status".to_string(),
                message: format!("Invalid content status: {}", other),
            }),
        }
    }
}

/// A movie or series tracked by the library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: Uuid,
    pub content_type: ContentType,
    pub title: String,
    pub year: Option<i32>,
    pub status: ContentStatus,
    /// Name of the quality profile governing upgrade decisions
    pub quality_profile: String,
    /// Library root this item lives under
    pub root_path: String,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    pub fn new(content_type: ContentType, title: impl Into<String>, root_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content_type,
            title: title.into(),
            year: None,
            status: ContentStatus::Wanted,
            quality_profile: "default".to_string(),
            root_path: root_path.into(),
            added_at: now,
            updated_at: now,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Title must be non-empty
    pub fn validate(&self) -> crate::Result<()> {
        if self.title.trim().is_empty() {
            return Err(crate::MediarrError::ValidationError {
                field: "title".to_string(),
                message: "Content title must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_content_is_wanted() {
        let content = Content::new(ContentType::Movie, "The Matrix", "/movies").with_year(1999);
        assert_eq!(content.status, ContentStatus::Wanted);
        assert_eq!(content.year, Some(1999));
        assert!(content.validate().is_ok());
    }

    #[test]
    fn empty_title_is_rejected() {
        let content = Content::new(ContentType::Movie, "  ", "/movies");
        assert!(content.validate().is_err());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [ContentStatus::Wanted, ContentStatus::Available] {
            assert_eq!(status.to_string().parse::<ContentStatus>().unwrap(), status);
        }
    }
}
