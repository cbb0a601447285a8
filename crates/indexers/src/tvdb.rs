//! TVDB series metadata client
//!
//! Uses short-lived bearer tokens: login with the API key, cache the token,
//! and on a 401 refresh it transparently and retry the request once.

use std::time::Duration;

use async_trait::async_trait;
use mediarr_core::{MediarrError, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesMetadata {
    pub id: i64,
    #[serde(alias = "seriesName", alias = "name")]
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "firstAired")]
    pub first_aired: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeMetadata {
    pub id: i64,
    #[serde(alias = "airedSeason", alias = "seasonNumber")]
    pub season: u32,
    #[serde(alias = "airedEpisodeNumber", alias = "number")]
    pub episode: u32,
    #[serde(default, alias = "episodeName")]
    pub title: Option<String>,
}

/// Abstract tv-database client
#[async_trait]
pub trait TvMetadataClient: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SeriesMetadata>>;
    async fn get(&self, id: i64) -> Result<SeriesMetadata>;
    /// All episodes of a series; paginated upstream, drained here
    async fn get_episodes(&self, series_id: i64) -> Result<Vec<EpisodeMetadata>>;
}

#[derive(Debug, Clone)]
pub struct TvdbConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for TvdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.thetvdb.com".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct TvdbClient {
    config: TvdbConfig,
    client: Client,
    token: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    #[serde(default)]
    next: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
    #[serde(default)]
    links: Option<PageLinks>,
}

impl TvdbClient {
    pub fn new(config: TvdbConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MediarrError::ConfigurationError {
                field: "tvdb".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            config,
            client,
            token: RwLock::new(None),
        })
    }

    async fn login(&self) -> Result<String> {
        debug!("refreshing TVDB token");
        let response = self
            .client
            .post(format!("{}/login", self.config.base_url))
            .json(&serde_json::json!({ "apikey": self.config.api_key }))
            .send()
            .await
            .map_err(|e| MediarrError::RemoteUnavailable {
                service: "tvdb".to_string(),
                error: e.to_string(),
            })?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(MediarrError::Unauthorized {
                service: "tvdb".to_string(),
            });
        }
        let login: LoginResponse =
            response
                .json()
                .await
                .map_err(|e| MediarrError::PayloadDecodeFailed {
                    context: "tvdb login".to_string(),
                    error: e.to_string(),
                })?;
        *self.token.write().await = Some(login.token.clone());
        Ok(login.token)
    }

    async fn current_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.login().await
    }

    /// GET with bearer auth; on 401 the token is refreshed and the request
    /// retried exactly once.
    async fn get_authed(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let mut token = self.current_token().await?;
        for attempt in 0..2 {
            let response = self
                .client
                .get(format!("{}{}", self.config.base_url, path))
                .bearer_auth(&token)
                .query(query)
                .send()
                .await
                .map_err(|e| MediarrError::RemoteUnavailable {
                    service: "tvdb".to_string(),
                    error: e.to_string(),
                })?;

            match response.status() {
                StatusCode::UNAUTHORIZED if attempt == 0 => {
                    token = self.login().await?;
                }
                StatusCode::UNAUTHORIZED => {
                    return Err(MediarrError::Unauthorized {
                        service: "tvdb".to_string(),
                    })
                }
                StatusCode::NOT_FOUND => {
                    return Err(MediarrError::NotFound {
                        resource: format!("tvdb {}", path),
                    })
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    return Err(MediarrError::RateLimited {
                        service: "tvdb".to_string(),
                    })
                }
                status if !status.is_success() => {
                    return Err(MediarrError::RemoteUnavailable {
                        service: "tvdb".to_string(),
                        error: format!("HTTP {}", status),
                    })
                }
                _ => return Ok(response),
            }
        }
        unreachable!("authed request loop always returns")
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| MediarrError::PayloadDecodeFailed {
            context: context.to_string(),
            error: e.to_string(),
        })
}

#[async_trait]
impl TvMetadataClient for TvdbClient {
    async fn search(&self, query: &str) -> Result<Vec<SeriesMetadata>> {
        let response = self
            .get_authed("/search/series", &[("name", query.to_string())])
            .await?;
        let parsed: DataResponse<Vec<SeriesMetadata>> = decode(response, "tvdb search").await?;
        Ok(parsed.data)
    }

    async fn get(&self, id: i64) -> Result<SeriesMetadata> {
        let response = self.get_authed(&format!("/series/{}", id), &[]).await?;
        let parsed: DataResponse<SeriesMetadata> = decode(response, "tvdb series").await?;
        Ok(parsed.data)
    }

    async fn get_episodes(&self, series_id: i64) -> Result<Vec<EpisodeMetadata>> {
        let mut episodes = Vec::new();
        let mut page = 1u32;
        loop {
            let response = self
                .get_authed(
                    &format!("/series/{}/episodes", series_id),
                    &[("page", page.to_string())],
                )
                .await?;
            let parsed: DataResponse<Vec<EpisodeMetadata>> =
                decode(response, "tvdb episodes").await?;
            episodes.extend(parsed.data);
            match parsed.links.and_then(|l| l.next) {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        Ok(episodes)
    }
}
