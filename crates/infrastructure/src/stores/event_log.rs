//! SQLite event log
//!
//! Append-only; ids come from the AUTOINCREMENT rowid and are monotonically
//! increasing in append order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediarr_core::events::{EntityType, EventStore, StoredEvent, SystemEvent};
use mediarr_core::{MediarrError, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::database::DatabasePool;

pub struct SqliteEventStore {
    pool: DatabasePool,
}

impl SqliteEventStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn stored_from_row(row: &SqliteRow) -> Result<StoredEvent> {
    let payload: String = row.try_get("payload")?;
    let entity_id: String = row.try_get("entity_id")?;
    Ok(StoredEvent {
        id: row.try_get("id")?,
        event_type: row.try_get("event_type")?,
        entity_type: row.try_get::<String, _>("entity_type")?.parse()?,
        entity_id: Uuid::parse_str(&entity_id).map_err(|e| MediarrError::ValidationError {
            field: "entity_id".to_string(),
            message: e.to_string(),
        })?,
        payload: serde_json::from_str(&payload).map_err(|e| {
            MediarrError::PayloadDecodeFailed {
                context: "event log".to_string(),
                error: e.to_string(),
            }
        })?,
        occurred_at: row.try_get::<DateTime<Utc>, _>("occurred_at")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn append(&self, event: &SystemEvent, occurred_at: DateTime<Utc>) -> Result<i64> {
        let (entity_type, entity_id) = event.entity();
        let payload = event.payload()?;
        let result = sqlx::query(
            "INSERT INTO events (event_type, entity_type, entity_id, payload, occurred_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(event.event_type())
        .bind(entity_type.to_string())
        .bind(entity_id.to_string())
        .bind(payload.to_string())
        .bind(occurred_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn since(&self, since: DateTime<Utc>) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query("SELECT * FROM events WHERE occurred_at >= $1 ORDER BY id")
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(stored_from_row).collect()
    }

    async fn for_entity(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE entity_type = $1 AND entity_id = $2 ORDER BY id",
        )
        .bind(entity_type.to_string())
        .bind(entity_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(stored_from_row).collect()
    }

    async fn recent(&self, n: u32) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query("SELECT * FROM events ORDER BY id DESC LIMIT $1")
            .bind(n as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(stored_from_row).collect()
    }

    async fn prune(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM events WHERE occurred_at < $1")
            .bind(older_than)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
