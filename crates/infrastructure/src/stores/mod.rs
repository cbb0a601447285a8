//! SQLite store implementations

pub mod content;
pub mod download;
pub mod event_log;
pub mod history;
pub mod metadata_cache;

pub use content::SqliteLibraryStore;
pub use download::SqliteDownloadStore;
pub use event_log::SqliteEventStore;
pub use history::SqliteHistoryStore;
pub use metadata_cache::SqliteMetadataCache;
