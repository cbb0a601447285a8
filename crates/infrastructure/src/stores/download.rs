//! SQLite implementation of the download store
//!
//! Status transitions are validated against the state machine before the
//! update and the UPDATE itself is guarded on the expected previous status,
//! so a concurrent writer cannot slip an invalid transition through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediarr_core::domain::DownloadStore;
use mediarr_core::models::{Download, DownloadClientKind, DownloadStatus};
use mediarr_core::{MediarrError, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::database::DatabasePool;

pub struct SqliteDownloadStore {
    pool: DatabasePool,
}

impl SqliteDownloadStore {
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

fn download_from_row(row: &SqliteRow) -> Result<Download> {
    let episode_id: Option<String> = row.try_get("episode_id")?;
    let season: Option<i64> = row.try_get("season")?;
    Ok(Download {
        id: parse_uuid("id", &row.try_get::<String, _>("id")?)?,
        content_id: parse_uuid("content_id", &row.try_get::<String, _>("content_id")?)?,
        episode_id: episode_id
            .map(|id| parse_uuid("episode_id", &id))
            .transpose()?,
        season: season.map(|s| s as u32),
        is_complete_season: row.try_get::<i64, _>("is_complete_season")? != 0,
        client: row.try_get::<String, _>("client")?.parse()?,
        client_id: row.try_get("client_id")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        release_name: row.try_get("release_name")?,
        indexer: row.try_get("indexer")?,
        progress: row.try_get::<f64, _>("progress")? as f32,
        speed_bps: row.try_get("speed_bps")?,
        eta_seconds: row.try_get("eta_seconds")?,
        size_bytes: row.try_get("size_bytes")?,
        added_at: row.try_get::<DateTime<Utc>, _>("added_at")?,
        completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
        last_transition_at: row.try_get::<DateTime<Utc>, _>("last_transition_at")?,
    })
}

const TERMINAL_STATUSES: &str = "('cleaned', 'failed', 'skipped')";

#[async_trait]
impl DownloadStore for SqliteDownloadStore {
    async fn create(&self, download: &Download, episode_ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO downloads (id, content_id, episode_id, season, is_complete_season,
             client, client_id, status, release_name, indexer, progress, speed_bps,
             eta_seconds, size_bytes, added_at, completed_at, last_transition_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(download.id.to_string())
        .bind(download.content_id.to_string())
        .bind(download.episode_id.map(|id| id.to_string()))
        .bind(download.season.map(|s| s as i64))
        .bind(download.is_complete_season as i64)
        .bind(download.client.to_string())
        .bind(&download.client_id)
        .bind(download.status.to_string())
        .bind(&download.release_name)
        .bind(&download.indexer)
        .bind(download.progress as f64)
        .bind(download.speed_bps)
        .bind(download.eta_seconds)
        .bind(download.size_bytes)
        .bind(download.added_at)
        .bind(download.completed_at)
        .bind(download.last_transition_at)
        .execute(&mut *tx)
        .await?;

        for episode_id in episode_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO download_episodes (download_id, episode_id) VALUES ($1, $2)",
            )
            .bind(download.id.to_string())
            .bind(episode_id.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Download>> {
        let row = sqlx::query("SELECT * FROM downloads WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(download_from_row).transpose()
    }

    async fn find_by_client_id(
        &self,
        client: DownloadClientKind,
        client_id: &str,
    ) -> Result<Option<Download>> {
        let row = sqlx::query("SELECT * FROM downloads WHERE client = $1 AND client_id = $2")
            .bind(client.to_string())
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(download_from_row).transpose()
    }

    async fn list_active(&self, client: DownloadClientKind) -> Result<Vec<Download>> {
        let sql = format!(
            "SELECT * FROM downloads WHERE client = $1 AND status NOT IN {} ORDER BY added_at",
            TERMINAL_STATUSES
        );
        let rows = sqlx::query(&sql)
            .bind(client.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(download_from_row).collect()
    }

    async fn list_by_status(&self, status: DownloadStatus) -> Result<Vec<Download>> {
        let rows = sqlx::query("SELECT * FROM downloads WHERE status = $1 ORDER BY added_at")
            .bind(status.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(download_from_row).collect()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Download>> {
        let rows = sqlx::query(
            "SELECT * FROM downloads ORDER BY added_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(download_from_row).collect()
    }

    async fn transition(&self, id: Uuid, to: DownloadStatus) -> Result<Download> {
        let mut current = self.get(id).await?.ok_or_else(|| MediarrError::NotFound {
            resource: format!("download {}", id),
        })?;
        let previous_status = current.status;
        // Validates against the state machine and stamps the timestamps
        current.transition(to)?;

        let result = sqlx::query(
            "UPDATE downloads SET status = $3, completed_at = $4, last_transition_at = $5
             WHERE id = $1 AND status = $2",
        )
        .bind(id.to_string())
        .bind(previous_status.to_string())
        .bind(current.status.to_string())
        .bind(current.completed_at)
        .bind(current.last_transition_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Lost a race: someone else transitioned the row first
            return Err(MediarrError::InvalidState {
                entity: format!("download {}", id),
                actual: "concurrently modified".to_string(),
                expected: previous_status.to_string(),
            });
        }
        Ok(current)
    }

    async fn update_progress(
        &self,
        id: Uuid,
        progress: f32,
        speed_bps: i64,
        eta_seconds: Option<i64>,
        size_bytes: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE downloads SET progress = $2, speed_bps = $3, eta_seconds = $4,
             size_bytes = COALESCE($5, size_bytes) WHERE id = $1",
        )
        .bind(id.to_string())
        .bind(progress as f64)
        .bind(speed_bps)
        .bind(eta_seconds)
        .bind(size_bytes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn episode_ids(&self, download_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT episode_id FROM download_episodes WHERE download_id = $1")
            .bind(download_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| parse_uuid("episode_id", &row.try_get::<String, _>("episode_id")?))
            .collect()
    }
}
