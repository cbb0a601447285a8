//! SQLite implementation of the history store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediarr_core::domain::HistoryStore;
use mediarr_core::models::HistoryEntry;
use mediarr_core::{MediarrError, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::database::DatabasePool;

pub struct SqliteHistoryStore {
    pool: DatabasePool,
}

impl SqliteHistoryStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn entry_from_row(row: &SqliteRow) -> Result<HistoryEntry> {
    let parse = |field: &str, value: String| {
        Uuid::parse_str(&value).map_err(|e| MediarrError::ValidationError {
            field: field.to_string(),
            message: e.to_string(),
        })
    };
    let episode_id: Option<String> = row.try_get("episode_id")?;
    let data: String = row.try_get("data")?;
    Ok(HistoryEntry {
        id: parse("id", row.try_get("id")?)?,
        content_id: parse("content_id", row.try_get("content_id")?)?,
        episode_id: episode_id.map(|id| parse("episode_id", id)).transpose()?,
        event: row.try_get::<String, _>("event")?.parse()?,
        data: serde_json::from_str(&data).unwrap_or(serde_json::Value::Null),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, entry: &HistoryEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO history (id, content_id, episode_id, event, data, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id.to_string())
        .bind(entry.content_id.to_string())
        .bind(entry.episode_id.map(|id| id.to_string()))
        .bind(entry.event.to_string())
        .bind(entry.data.to_string())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, content_id: Option<Uuid>, limit: i64) -> Result<Vec<HistoryEntry>> {
        let rows = match content_id {
            Some(content_id) => {
                sqlx::query(
                    "SELECT * FROM history WHERE content_id = $1
                     ORDER BY created_at DESC LIMIT $2",
                )
                .bind(content_id.to_string())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM history ORDER BY created_at DESC LIMIT $1")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(entry_from_row).collect()
    }
}
