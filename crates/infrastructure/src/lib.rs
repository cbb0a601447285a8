//! SQLite persistence for Mediarr: the library, download, history and
//! event-log stores plus pool construction and migrations.

pub mod database;
pub mod stores;

pub use database::{create_pool, create_pool_at, DatabaseConfig, DatabasePool, MIGRATOR};
pub use stores::{
    SqliteDownloadStore, SqliteEventStore, SqliteHistoryStore, SqliteLibraryStore,
    SqliteMetadataCache,
};

#[cfg(test)]
mod tests;
