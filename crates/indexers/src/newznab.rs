//! Newznab search client
//!
//! Speaks the classic `?t=search&apikey=...&q=...&cat=...` RSS protocol
//! used by Usenet indexers. Response parsing is tolerant: unknown elements
//! are skipped, and item sizes are resolved in the order enclosure length,
//! `<size>` element, `newznab:attr name="size"`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use mediarr_core::{MediarrError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::models::{IndexerRelease, SearchRequest};

#[derive(Debug, Clone)]
pub struct NewznabConfig {
    /// Display name, recorded on grabbed releases
    pub name: String,
    /// API endpoint, e.g. "https://api.nzbgeek.info/api"
    pub url: String,
    pub api_key: String,
    pub timeout: Duration,
}

pub struct NewznabClient {
    config: NewznabConfig,
    client: Client,
}

impl NewznabClient {
    pub fn new(config: NewznabConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MediarrError::ConfigurationError {
                field: "indexer".to_string(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { config, client })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Run a `t=search` query and return the parsed releases
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<IndexerRelease>> {
        let mut url =
            Url::parse(&self.config.url).map_err(|e| MediarrError::ConfigurationError {
                field: "indexer.url".to_string(),
                message: e.to_string(),
            })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("t", "search");
            pairs.append_pair("apikey", &self.config.api_key);
            pairs.append_pair("q", &request.query);
            if !request.categories.is_empty() {
                let cats = request
                    .categories
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                pairs.append_pair("cat", &cats);
            }
            if let Some(limit) = request.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
            if let Some(offset) = request.offset {
                pairs.append_pair("offset", &offset.to_string());
            }
        }

        debug!(indexer = %self.config.name, query = %request.query, "searching indexer");
        let response = self.client.get(url).send().await.map_err(|e| {
            MediarrError::RemoteUnavailable {
                service: self.config.name.clone(),
                error: e.to_string(),
            }
        })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(MediarrError::Unauthorized {
                    service: self.config.name.clone(),
                })
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(MediarrError::RateLimited {
                    service: self.config.name.clone(),
                })
            }
            status if !status.is_success() => {
                return Err(MediarrError::RemoteUnavailable {
                    service: self.config.name.clone(),
                    error: format!("HTTP {}", status),
                })
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| MediarrError::RemoteUnavailable {
                service: self.config.name.clone(),
                error: e.to_string(),
            })?;
        let releases = parse_rss(&body, &self.config.name)?;
        debug!(indexer = %self.config.name, count = releases.len(), "search returned");
        Ok(releases)
    }
}

/// Parse a newznab RSS document into releases
pub fn parse_rss(xml: &str, indexer: &str) -> Result<Vec<IndexerRelease>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut releases = Vec::new();
    let mut current: Option<ItemBuilder> = None;
    let mut element_stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    current = Some(ItemBuilder::default());
                }
                element_stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if let Some(item) = current.as_mut() {
                    match name.as_str() {
                        "enclosure" => {
                            for attr in e.attributes().flatten() {
                                let value = attr.unescape_value().unwrap_or_default().to_string();
                                match attr.key.as_ref() {
                                    b"url" => item.enclosure_url = Some(value),
                                    b"length" => item.enclosure_length = value.parse().ok(),
                                    _ => {}
                                }
                            }
                        }
                        "newznab:attr" | "attr" => {
                            let mut attr_name = None;
                            let mut attr_value = None;
                            for attr in e.attributes().flatten() {
                                let value = attr.unescape_value().unwrap_or_default().to_string();
                                match attr.key.as_ref() {
                                    b"name" => attr_name = Some(value),
                                    b"value" => attr_value = Some(value),
                                    _ => {}
                                }
                            }
                            if attr_name.as_deref() == Some("size") {
                                item.attr_size = attr_value.and_then(|v| v.parse().ok());
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(item), Some(element)) = (current.as_mut(), element_stack.last()) {
                    let text = t.unescape().unwrap_or_default().to_string();
                    match element.as_str() {
                        "title" => item.title = Some(text),
                        "guid" => item.guid = Some(text),
                        "link" => item.link = Some(text),
                        "pubDate" => item.pub_date = parse_pub_date(&text),
                        "size" => item.size_element = text.parse().ok(),
                        "category" => item.category = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                element_stack.pop();
                if name == "item" {
                    if let Some(item) = current.take() {
                        match item.build(indexer) {
                            Some(release) => releases.push(release),
                            None => warn!(indexer, "skipping RSS item without title or link"),
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(MediarrError::PayloadDecodeFailed {
                    context: format!("{} RSS", indexer),
                    error: e.to_string(),
                })
            }
        }
    }

    Ok(releases)
}

/// RFC1123-style dates come in a few flavors across indexers
fn parse_pub_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(text) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%a, %d %b %Y %H:%M:%S %z", "%d %b %Y %H:%M:%S %z"] {
        if let Ok(date) = DateTime::parse_from_str(text, format) {
            return Some(date.with_timezone(&Utc));
        }
    }
    None
}

#[derive(Default)]
struct ItemBuilder {
    title: Option<String>,
    guid: Option<String>,
    link: Option<String>,
    pub_date: Option<DateTime<Utc>>,
    enclosure_url: Option<String>,
    enclosure_length: Option<i64>,
    size_element: Option<i64>,
    attr_size: Option<i64>,
    category: Option<String>,
}

impl ItemBuilder {
    fn build(self, indexer: &str) -> Option<IndexerRelease> {
        let title = self.title?;
        let link = self.link.or(self.enclosure_url.clone())?;
        // Size resolution order: enclosure length, <size>, newznab attr
        let size_bytes = self
            .enclosure_length
            .filter(|len| *len > 0)
            .or(self.size_element)
            .or(self.attr_size);
        Some(IndexerRelease {
            guid: self.guid.unwrap_or_else(|| link.clone()),
            title,
            link,
            pub_date: self.pub_date,
            size_bytes,
            category: self.category,
            indexer: indexer.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:newznab="http://www.newznab.com/DTD/2010/feeds/attributes/">
  <channel>
    <title>indexer</title>
    <item>
      <title>The.Matrix.1999.1080p.BluRay.x264-GRP</title>
      <guid>abc-123</guid>
      <link>https://indexer/get/abc-123.nzb</link>
      <pubDate>Mon, 15 Jan 2024 12:30:00 +0000</pubDate>
      <enclosure url="https://indexer/get/abc-123.nzb" length="734003200" type="application/x-nzb"/>
      <newznab:attr name="size" value="1"/>
    </item>
    <item>
      <title>Show.S01E01.720p.HDTV.x264</title>
      <link>https://indexer/get/def.nzb</link>
      <pubDate>Tue, 16 Jan 2024 01:00:00 GMT</pubDate>
      <size>52428800</size>
    </item>
    <item>
      <title>Attr.Size.Only.2160p</title>
      <link>https://indexer/get/ghi.nzb</link>
      <newznab:attr name="size" value="1073741824"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_with_size_resolution_order() {
        let releases = parse_rss(SAMPLE, "idx").unwrap();
        assert_eq!(releases.len(), 3);

        // Enclosure length wins over the newznab attr
        assert_eq!(releases[0].title, "The.Matrix.1999.1080p.BluRay.x264-GRP");
        assert_eq!(releases[0].guid, "abc-123");
        assert_eq!(releases[0].size_bytes, Some(734003200));
        assert!(releases[0].pub_date.is_some());

        // <size> element when no enclosure
        assert_eq!(releases[1].size_bytes, Some(52428800));
        // Missing guid falls back to the link
        assert_eq!(releases[1].guid, "https://indexer/get/def.nzb");

        // attr size as last resort
        assert_eq!(releases[2].size_bytes, Some(1073741824));
        assert_eq!(releases[2].indexer, "idx");
    }

    #[test]
    fn rfc1123_variants() {
        assert!(parse_pub_date("Mon, 15 Jan 2024 12:30:00 +0000").is_some());
        assert!(parse_pub_date("Mon, 15 Jan 2024 12:30:00 GMT").is_some());
        assert!(parse_pub_date("15 Jan 2024 12:30:00 +0200").is_some());
        assert!(parse_pub_date("not a date").is_none());
    }

    #[test]
    fn items_without_title_are_skipped() {
        let xml = r#"<rss><channel><item><link>https://x/get.nzb</link></item></channel></rss>"#;
        let releases = parse_rss(xml, "idx").unwrap();
        assert!(releases.is_empty());
    }

    #[tokio::test]
    async fn search_builds_newznab_query() {
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("t", "search"))
            .and(query_param("apikey", "secret"))
            .and(query_param("q", "the matrix"))
            .and(query_param("cat", "2000,2040"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE))
            .mount(&server)
            .await;

        let client = NewznabClient::new(NewznabConfig {
            name: "idx".to_string(),
            url: format!("{}/api", server.uri()),
            api_key: "secret".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let releases = client
            .search(
                &SearchRequest::new("the matrix").with_categories(vec![2000, 2040]),
            )
            .await
            .unwrap();
        assert_eq!(releases.len(), 3);
    }

    #[tokio::test]
    async fn unauthorized_maps_to_error_kind() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = NewznabClient::new(NewznabConfig {
            name: "idx".to_string(),
            url: format!("{}/api", server.uri()),
            api_key: "bad".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let err = client.search(&SearchRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, MediarrError::Unauthorized { .. }));
    }
}
