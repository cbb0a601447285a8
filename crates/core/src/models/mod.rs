//! Domain models

pub mod content;
pub mod download;
pub mod episode;
pub mod file;
pub mod history;

pub use content::{Content, ContentStatus, ContentType};
pub use download::{Download, DownloadClientKind, DownloadStatus};
pub use episode::Episode;
pub use file::MediaFile;
pub use history::{HistoryEntry, HistoryEventType};
