//! Plex media-server client
//!
//! Implements the core `MediaServer` contract: checking whether imported
//! content has been indexed, asking for path scans after imports, and full
//! library refreshes. All requests authenticate with `X-Plex-Token` and ask
//! for JSON responses.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use mediarr_core::domain::MediaServer;
use mediarr_core::models::{Content, ContentType};
use mediarr_core::{MediarrError, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PlexConfig {
    /// Base URL, e.g. "http://localhost:32400"
    pub url: String,
    pub token: String,
    /// Prefix substitution when Plex sees the library under another mount
    pub local_path: Option<PathBuf>,
    pub remote_path: Option<PathBuf>,
    pub timeout: Duration,
}

pub struct PlexClient {
    config: PlexConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct MediaContainerResponse<T> {
    #[serde(rename = "MediaContainer")]
    media_container: T,
}

#[derive(Debug, Deserialize, Default)]
struct SectionsContainer {
    #[serde(rename = "Directory", default)]
    directories: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    key: String,
    title: String,
    #[serde(rename = "type")]
    section_type: String,
    #[serde(rename = "Location", default)]
    locations: Vec<SectionLocation>,
}

#[derive(Debug, Deserialize)]
struct SectionLocation {
    path: String,
}

#[derive(Debug, Deserialize, Default)]
struct ItemsContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    title: String,
    #[serde(default)]
    year: Option<i32>,
}

impl PlexClient {
    pub fn new(config: PlexConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MediarrError::ConfigurationError {
                field: "notifications.plex".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { config, client })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.config.url, path))
            .header("Accept", "application/json")
            .header("X-Plex-Token", &self.config.token)
            .query(query)
            .send()
            .await
            .map_err(|e| MediarrError::RemoteUnavailable {
                service: "plex".to_string(),
                error: e.to_string(),
            })?;
        match response.status() {
            reqwest::StatusCode::UNAUTHORIZED => Err(MediarrError::Unauthorized {
                service: "plex".to_string(),
            }),
            status if !status.is_success() => Err(MediarrError::RemoteUnavailable {
                service: "plex".to_string(),
                error: format!("HTTP {}", status),
            }),
            _ => response
                .json()
                .await
                .map_err(|e| MediarrError::PayloadDecodeFailed {
                    context: "plex".to_string(),
                    error: e.to_string(),
                }),
        }
    }

    async fn sections(&self) -> Result<Vec<Section>> {
        let response: MediaContainerResponse<SectionsContainer> =
            self.get_json("/library/sections", &[]).await?;
        Ok(response.media_container.directories)
    }

    /// Plex's view of a library path, applying the local-to-remote prefix
    /// substitution when configured
    fn remap_path(&self, path: &Path) -> PathBuf {
        if let (Some(local), Some(remote)) = (&self.config.local_path, &self.config.remote_path) {
            if let Ok(rest) = path.strip_prefix(local) {
                return remote.join(rest);
            }
        }
        path.to_path_buf()
    }

    fn section_type_for(content_type: ContentType) -> &'static str {
        match content_type {
            ContentType::Movie => "movie",
            ContentType::Series => "show",
        }
    }
}

#[async_trait]
impl MediaServer for PlexClient {
    async fn has_content(&self, content: &Content) -> Result<(bool, Option<String>)> {
        let wanted_type = Self::section_type_for(content.content_type);
        for section in self.sections().await? {
            if section.section_type != wanted_type {
                continue;
            }
            let response: MediaContainerResponse<ItemsContainer> = self
                .get_json(
                    &format!("/library/sections/{}/all", section.key),
                    &[("title", content.title.as_str())],
                )
                .await?;
            for item in response.media_container.metadata {
                let title_matches = item.title.eq_ignore_ascii_case(&content.title);
                let year_matches = match (item.year, content.year) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                };
                if title_matches && year_matches {
                    debug!(title = %content.title, rating_key = %item.rating_key, "found in plex");
                    return Ok((true, Some(item.rating_key)));
                }
            }
        }
        Ok((false, None))
    }

    async fn scan_path(&self, path: &Path) -> Result<()> {
        let remote = self.remap_path(path);
        let remote_str = remote.display().to_string();

        // Refresh the section whose location contains the path; fall back
        // to refreshing every section when none matches.
        let sections = self.sections().await?;
        let owning = sections.iter().find(|s| {
            s.locations
                .iter()
                .any(|loc| remote.starts_with(Path::new(&loc.path)))
        });

        match owning {
            Some(section) => {
                debug!(section = %section.title, path = %remote_str, "requesting plex scan");
                let _: serde_json::Value = self
                    .get_json(
                        &format!("/library/sections/{}/refresh", section.key),
                        &[("path", remote_str.as_str())],
                    )
                    .await?;
            }
            None => {
                warn!(path = %remote_str, "no plex section owns this path, refreshing all");
                for section in &sections {
                    let _: serde_json::Value = self
                        .get_json(&format!("/library/sections/{}/refresh", section.key), &[])
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn refresh_library(&self, name: &str) -> Result<()> {
        let sections = self.sections().await?;
        let section = sections
            .iter()
            .find(|s| s.title.eq_ignore_ascii_case(name))
            .ok_or_else(|| MediarrError::NotFound {
                resource: format!("plex library {}", name),
            })?;
        let _: serde_json::Value = self
            .get_json(&format!("/library/sections/{}/refresh", section.key), &[])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> PlexClient {
        PlexClient::new(PlexConfig {
            url: server.uri(),
            token: "tok".to_string(),
            local_path: None,
            remote_path: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    async fn mount_sections(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/library/sections"))
            .and(header("X-Plex-Token", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "MediaContainer": {
                    "Directory": [
                        {"key": "1", "title": "Movies", "type": "movie",
                         "Location": [{"path": "/movies"}]},
                        {"key": "2", "title": "TV Shows", "type": "show",
                         "Location": [{"path": "/series"}]}
                    ]
                }
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn has_content_matches_title_and_year() {
        let server = MockServer::start().await;
        mount_sections(&server).await;
        Mock::given(method("GET"))
            .and(path("/library/sections/1/all"))
            .and(query_param("title", "The Matrix"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "MediaContainer": {
                    "Metadata": [
                        {"ratingKey": "12345", "title": "The Matrix", "year": 1999}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let content =
            Content::new(ContentType::Movie, "The Matrix", "/movies").with_year(1999);
        let (found, key) = client(&server).has_content(&content).await.unwrap();
        assert!(found);
        assert_eq!(key.as_deref(), Some("12345"));
    }

    #[tokio::test]
    async fn has_content_is_false_when_plex_lacks_the_item() {
        let server = MockServer::start().await;
        mount_sections(&server).await;
        Mock::given(method("GET"))
            .and(path("/library/sections/1/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "MediaContainer": {}
            })))
            .mount(&server)
            .await;

        let content = Content::new(ContentType::Movie, "Unknown Movie", "/movies");
        let (found, key) = client(&server).has_content(&content).await.unwrap();
        assert!(!found);
        assert!(key.is_none());
    }

    #[tokio::test]
    async fn scan_path_targets_the_owning_section() {
        let server = MockServer::start().await;
        mount_sections(&server).await;
        Mock::given(method("GET"))
            .and(path("/library/sections/1/refresh"))
            .and(query_param(
                "path",
                "/movies/The Matrix (1999)/The Matrix (1999) - 1080p.mkv",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .scan_path(Path::new(
                "/movies/The Matrix (1999)/The Matrix (1999) - 1080p.mkv",
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn refresh_library_by_name() {
        let server = MockServer::start().await;
        mount_sections(&server).await;
        Mock::given(method("GET"))
            .and(path("/library/sections/2/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).refresh_library("tv shows").await.unwrap();

        let err = client(&server).refresh_library("music").await.unwrap_err();
        assert!(matches!(err, MediarrError::NotFound { .. }));
    }
}
