//! Download client wrappers for Mediarr
//!
//! Implementations of the core `DownloadClient` contract: SABnzbd for
//! Usenet and qBittorrent for torrents.

pub mod qbittorrent;
pub mod sabnzbd;

pub use qbittorrent::{QbittorrentClient, QbittorrentConfig};
pub use sabnzbd::{SabnzbdClient, SabnzbdConfig};
