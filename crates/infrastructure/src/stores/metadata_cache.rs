//! Cache for metadata-service responses
//!
//! Keyed free-form JSON with an age cutoff on read; lookups against TMDB
//! and TVDB go through this to spare their rate limits.

use chrono::{Duration, Utc};
use mediarr_core::Result;
use sqlx::Row;

use crate::database::DatabasePool;

pub struct SqliteMetadataCache {
    pool: DatabasePool,
}

impl SqliteMetadataCache {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// A cached payload no older than `max_age`, if present
    pub async fn get(&self, key: &str, max_age: Duration) -> Result<Option<serde_json::Value>> {
        let cutoff = Utc::now() - max_age;
        let row = sqlx::query(
            "SELECT payload FROM metadata_cache WHERE cache_key = $1 AND fetched_at >= $2",
        )
        .bind(key)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(|row| {
            let payload: String = row.try_get("payload").ok()?;
            serde_json::from_str(&payload).ok()
        }))
    }

    pub async fn put(&self, key: &str, payload: &serde_json::Value) -> Result<()> {
        sqlx::query(
            "INSERT INTO metadata_cache (cache_key, payload, fetched_at) VALUES ($1, $2, $3)
             ON CONFLICT (cache_key) DO UPDATE SET payload = $2, fetched_at = $3",
        )
        .bind(key)
        .bind(payload.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
