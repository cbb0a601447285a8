//! Application configuration
//!
//! Loaded from a TOML file (`--config`, default `config.toml`). A missing
//! file falls back to defaults so a bare binary starts; an unparseable or
//! invalid file is a startup error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use mediarr_core::{MediarrError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7878,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "mediarr.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SabnzbdConfig {
    pub url: String,
    pub api_key: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Local view of the client's completed-download path
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    /// The client's own view of the same path
    #[serde(default)]
    pub remote_path: Option<PathBuf>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QbittorrentConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Local view of the client's completed-download path
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    /// The client's own view of the same path
    #[serde(default)]
    pub remote_path: Option<PathBuf>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadersConfig {
    #[serde(default)]
    pub sabnzbd: Option<SabnzbdConfig>,
    #[serde(default)]
    pub qbittorrent: Option<QbittorrentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlexConfig {
    pub url: String,
    pub token: String,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub remote_path: Option<PathBuf>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub plex: Option<PlexConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub root: PathBuf,
    /// Naming template; empty means the built-in default
    pub naming: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/media"),
            naming: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrariesConfig {
    pub movies: LibraryConfig,
    pub series: LibraryConfig,
}

impl Default for LibrariesConfig {
    fn default() -> Self {
        Self {
            movies: LibraryConfig {
                root: PathBuf::from("/media/movies"),
                naming: String::new(),
            },
            series: LibraryConfig {
                root: PathBuf::from("/media/series"),
                naming: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QualityProfileConfig {
    /// Ordered resolution preference, best first
    pub resolution: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub profiles: HashMap<String, QualityProfileConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImporterSettings {
    pub cleanup_source: bool,
}

impl Default for ImporterSettings {
    fn default() -> Self {
        Self {
            cleanup_source: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompatConfig {
    pub radarr: bool,
    pub sonarr: bool,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TmdbSettings {
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TvdbSettings {
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub downloaders: DownloadersConfig,
    #[serde(default)]
    pub indexers: HashMap<String, IndexerConfig>,
    pub notifications: NotificationsConfig,
    pub libraries: LibrariesConfig,
    pub quality: QualityConfig,
    pub importer: ImporterSettings,
    pub compat: CompatConfig,
    pub tmdb: TmdbSettings,
    pub tvdb: TvdbSettings,
}

fn default_poll_interval() -> u64 {
    15
}

impl AppConfig {
    /// Load from the given path. A missing file yields defaults; anything
    /// else that goes wrong is a startup error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| MediarrError::ConfigurationError {
            field: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: AppConfig =
            toml::from_str(&raw).map_err(|e| MediarrError::ConfigurationError {
                field: path.display().to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(MediarrError::ConfigurationError {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }
        if let Some(sab) = &self.downloaders.sabnzbd {
            if sab.api_key.is_empty() {
                return Err(MediarrError::ConfigurationError {
                    field: "downloaders.sabnzbd.api_key".to_string(),
                    message: "api key must not be empty".to_string(),
                });
            }
        }
        if let Some(qbit) = &self.downloaders.qbittorrent {
            if qbit.username.is_empty() {
                return Err(MediarrError::ConfigurationError {
                    field: "downloaders.qbittorrent.username".to_string(),
                    message: "username must not be empty".to_string(),
                });
            }
        }
        for (name, profile) in &self.quality.profiles {
            if profile.resolution.is_empty() {
                return Err(MediarrError::ConfigurationError {
                    field: format!("quality.profiles.{}", name),
                    message: "resolution list must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let raw = r#"
            [server]
            host = "127.0.0.1"
            port = 8989
            log_level = "debug"

            [database]
            path = "/var/lib/mediarr/mediarr.db"

            [downloaders.sabnzbd]
            url = "http://localhost:8080"
            api_key = "sabkey"
            category = "mediarr"
            local_path = "/downloads"
            remote_path = "/data/complete"
            poll_interval = 10

            [downloaders.qbittorrent]
            url = "http://localhost:8081"
            username = "admin"
            password = "adminadmin"
            category = "mediarr"
            poll_interval = 20

            [indexers.geek]
            url = "https://api.nzbgeek.info/api"
            api_key = "idxkey"

            [notifications.plex]
            url = "http://localhost:32400"
            token = "plextoken"
            poll_interval = 30

            [libraries.movies]
            root = "/media/movies"
            naming = "{title} ({year})/{title} ({year}) - {quality}.{ext}"

            [libraries.series]
            root = "/media/series"

            [quality.profiles.hd]
            resolution = ["1080p", "720p"]

            [importer]
            cleanup_source = true

            [compat]
            radarr = true
            sonarr = true
            api_key = "compatkey"

            [tmdb]
            api_key = "tmdbkey"
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.port, 8989);
        assert_eq!(config.database.path, "/var/lib/mediarr/mediarr.db");
        let sab = config.downloaders.sabnzbd.unwrap();
        assert_eq!(sab.poll_interval, 10);
        assert_eq!(sab.remote_path.as_deref(), Some(Path::new("/data/complete")));
        let qbit = config.downloaders.qbittorrent.unwrap();
        assert_eq!(qbit.username, "admin");
        assert_eq!(qbit.poll_interval, 20);
        assert_eq!(config.indexers["geek"].api_key, "idxkey");
        assert!(config.notifications.plex.is_some());
        assert_eq!(config.quality.profiles["hd"].resolution[0], "1080p");
        assert!(config.compat.radarr);
        assert_eq!(config.tmdb.api_key, "tmdbkey");
    }

    #[test]
    fn defaults_apply_when_sections_are_missing() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 7878);
        assert_eq!(config.database.path, "mediarr.db");
        assert!(config.downloaders.sabnzbd.is_none());
        assert!(config.downloaders.qbittorrent.is_none());
        assert!(config.importer.cleanup_source);
    }

    #[test]
    fn empty_sab_api_key_is_rejected() {
        let raw = r#"
            [downloaders.sabnzbd]
            url = "http://localhost:8080"
            api_key = ""
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_qbittorrent_username_is_rejected() {
        let raw = r#"
            [downloaders.qbittorrent]
            url = "http://localhost:8081"
            username = ""
            password = "x"
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }
}
