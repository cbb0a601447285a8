//! SQLite implementation of the library store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediarr_core::domain::{ImportCommit, LibraryStore};
use mediarr_core::models::{Content, ContentStatus, ContentType, Episode, MediaFile};
use mediarr_core::{MediarrError, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::database::DatabasePool;

pub struct SqliteLibraryStore {
    pool: DatabasePool,
}

impl SqliteLibraryStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| MediarrError::ValidationError {
        field: field.to_string(),
        message: e.to_string(),
    })
}

fn content_from_row(row: &SqliteRow) -> Result<Content> {
    Ok(Content {
        id: parse_uuid("id", &row.try_get::<String, _>("id")?)?,
        content_type: row.try_get::<String, _>("content_type")?.parse()?,
        title: row.try_get("title")?,
        year: row.try_get("year")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        quality_profile: row.try_get("quality_profile")?,
        root_path: row.try_get("root_path")?,
        added_at: row.try_get::<DateTime<Utc>, _>("added_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn episode_from_row(row: &SqliteRow) -> Result<Episode> {
    Ok(Episode {
        id: parse_uuid("id", &row.try_get::<String, _>("id")?)?,
        content_id: parse_uuid("content_id", &row.try_get::<String, _>("content_id")?)?,
        season: row.try_get::<i64, _>("season")? as u32,
        episode: row.try_get::<i64, _>("episode")? as u32,
        status: row.try_get::<String, _>("status")?.parse()?,
        added_at: row.try_get::<DateTime<Utc>, _>("added_at")?,
    })
}

fn file_from_row(row: &SqliteRow) -> Result<MediaFile> {
    let episode_id: Option<String> = row.try_get("episode_id")?;
    Ok(MediaFile {
        id: parse_uuid("id", &row.try_get::<String, _>("id")?)?,
        content_id: parse_uuid("content_id", &row.try_get::<String, _>("content_id")?)?,
        episode_id: episode_id
            .map(|id| parse_uuid("episode_id", &id))
            .transpose()?,
        path: row.try_get("path")?,
        size_bytes: row.try_get("size_bytes")?,
        quality: row.try_get("quality")?,
        source: row.try_get("source")?,
        added_at: row.try_get::<DateTime<Utc>, _>("added_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
}

#[async_trait]
impl LibraryStore for SqliteLibraryStore {
    async fn add_content(&self, content: &Content) -> Result<()> {
        content.validate()?;
        sqlx::query(
            "INSERT INTO content (id, content_type, title, year, status, quality_profile,
             root_path, added_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(content.id.to_string())
        .bind(content.content_type.to_string())
        .bind(&content.title)
        .bind(content.year)
        .bind(content.status.to_string())
        .bind(&content.quality_profile)
        .bind(&content.root_path)
        .bind(content.added_at)
        .bind(content.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_content(&self, id: Uuid) -> Result<Option<Content>> {
        let row = sqlx::query("SELECT * FROM content WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(content_from_row).transpose()
    }

    async fn list_content(&self) -> Result<Vec<Content>> {
        let rows = sqlx::query("SELECT * FROM content ORDER BY added_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(content_from_row).collect()
    }

    async fn set_content_status(&self, id: Uuid, status: ContentStatus) -> Result<()> {
        let result = sqlx::query(
            "UPDATE content SET status = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id.to_string())
        .bind(status.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(MediarrError::NotFound {
                resource: format!("content {}", id),
            });
        }
        Ok(())
    }

    async fn add_episode(&self, episode: &Episode) -> Result<()> {
        episode.validate()?;
        sqlx::query(
            "INSERT INTO episodes (id, content_id, season, episode, status, added_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(episode.id.to_string())
        .bind(episode.content_id.to_string())
        .bind(episode.season as i64)
        .bind(episode.episode as i64)
        .bind(episode.status.to_string())
        .bind(episode.added_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>> {
        let row = sqlx::query("SELECT * FROM episodes WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(episode_from_row).transpose()
    }

    async fn episodes_for_content(&self, content_id: Uuid) -> Result<Vec<Episode>> {
        let rows = sqlx::query(
            "SELECT * FROM episodes WHERE content_id = $1 ORDER BY season, episode",
        )
        .bind(content_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(episode_from_row).collect()
    }

    async fn files_for_content(&self, content_id: Uuid) -> Result<Vec<MediaFile>> {
        let rows = sqlx::query("SELECT * FROM files WHERE content_id = $1 ORDER BY added_at")
            .bind(content_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(file_from_row).collect()
    }

    async fn commit_import(&self, commit: ImportCommit) -> Result<MediaFile> {
        let file = &commit.file;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO files (id, content_id, episode_id, path, size_bytes, quality, source, added_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(file.id.to_string())
        .bind(file.content_id.to_string())
        .bind(file.episode_id.map(|id| id.to_string()))
        .bind(&file.path)
        .bind(file.size_bytes)
        .bind(&file.quality)
        .bind(&file.source)
        .bind(file.added_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                return Err(MediarrError::DestinationExists {
                    path: file.path.clone(),
                });
            }
            return Err(e.into());
        }

        let updated = match commit.episode_id {
            Some(episode_id) => {
                sqlx::query("UPDATE episodes SET status = 'available' WHERE id = $1")
                    .bind(episode_id.to_string())
                    .execute(&mut *tx)
                    .await?
            }
            None => {
                sqlx::query("UPDATE content SET status = 'available', updated_at = $2 WHERE id = $1")
                    .bind(file.content_id.to_string())
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await?
            }
        };
        if updated.rows_affected() == 0 {
            return Err(MediarrError::NotFound {
                resource: match commit.episode_id {
                    Some(id) => format!("episode {}", id),
                    None => format!("content {}", file.content_id),
                },
            });
        }

        tx.commit().await?;
        Ok(commit.file)
    }
}
