//! TMDB movie metadata client (long-lived API key auth)

use std::time::Duration;

use async_trait::async_trait;
use mediarr_core::{MediarrError, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// A movie as described by the metadata service
#[derive(Debug, Clone, Deserialize)]
pub struct MovieMetadata {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
}

impl MovieMetadata {
    pub fn year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .and_then(|d| d.split('-').next())
            .and_then(|y| y.parse().ok())
    }
}

/// Abstract movie-database client
#[async_trait]
pub trait MovieMetadataClient: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<MovieMetadata>>;
    async fn get(&self, id: i64) -> Result<MovieMetadata>;
}

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.themoviedb.org/3".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct TmdbClient {
    config: TmdbConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    results: Vec<MovieMetadata>,
}

impl TmdbClient {
    pub fn new(config: TmdbConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MediarrError::ConfigurationError {
                field: "tmdb".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { config, client })
    }

    fn check_status(&self, status: StatusCode) -> Result<()> {
        match status {
            StatusCode::UNAUTHORIZED => Err(MediarrError::Unauthorized {
                service: "tmdb".to_string(),
            }),
            StatusCode::TOO_MANY_REQUESTS => Err(MediarrError::RateLimited {
                service: "tmdb".to_string(),
            }),
            StatusCode::NOT_FOUND => Err(MediarrError::NotFound {
                resource: "tmdb entry".to_string(),
            }),
            status if !status.is_success() => Err(MediarrError::RemoteUnavailable {
                service: "tmdb".to_string(),
                error: format!("HTTP {}", status),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MovieMetadataClient for TmdbClient {
    async fn search(&self, query: &str) -> Result<Vec<MovieMetadata>> {
        debug!(%query, "searching TMDB");
        let response = self
            .client
            .get(format!("{}/search/movie", self.config.base_url))
            .query(&[("api_key", self.config.api_key.as_str()), ("query", query)])
            .send()
            .await
            .map_err(|e| MediarrError::RemoteUnavailable {
                service: "tmdb".to_string(),
                error: e.to_string(),
            })?;
        self.check_status(response.status())?;

        let parsed: TmdbSearchResponse =
            response
                .json()
                .await
                .map_err(|e| MediarrError::PayloadDecodeFailed {
                    context: "tmdb search".to_string(),
                    error: e.to_string(),
                })?;
        Ok(parsed.results)
    }

    async fn get(&self, id: i64) -> Result<MovieMetadata> {
        let response = self
            .client
            .get(format!("{}/movie/{}", self.config.base_url, id))
            .query(&[("api_key", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| MediarrError::RemoteUnavailable {
                service: "tmdb".to_string(),
                error: e.to_string(),
            })?;
        self.check_status(response.status())?;

        response
            .json()
            .await
            .map_err(|e| MediarrError::PayloadDecodeFailed {
                context: "tmdb movie".to_string(),
                error: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TmdbClient {
        TmdbClient::new(TmdbConfig {
            api_key: "key".to_string(),
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn search_parses_results_and_year() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .and(query_param("query", "the matrix"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"id": 603, "title": "The Matrix", "release_date": "1999-03-30"}
                ]
            })))
            .mount(&server)
            .await;

        let results = client(&server).search("the matrix").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 603);
        assert_eq!(results[0].year(), Some(1999));
    }

    #[tokio::test]
    async fn rate_limit_maps_to_error_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client(&server).search("x").await.unwrap_err();
        assert!(matches!(err, MediarrError::RateLimited { .. }));
    }
}
