//! SQLite pool construction and migrations

use std::path::Path;

use mediarr_core::{MediarrError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

pub type DatabasePool = SqlitePool;

/// Embedded forward-only migrations
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Filesystem path of the SQLite database, or ":memory:"
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "mediarr.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Open (creating if missing) and migrate the database
pub async fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool> {
    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| MediarrError::DatabaseError {
            message: format!("migration failed: {}", e),
        })?;

    info!(path = %config.path, "database ready");
    Ok(pool)
}

/// Pool backed by a file under the given directory; test suites use this
/// with a tempdir.
pub async fn create_pool_at(dir: &Path, name: &str) -> Result<DatabasePool> {
    create_pool(&DatabaseConfig {
        path: dir.join(name).display().to_string(),
        max_connections: 2,
    })
    .await
}
