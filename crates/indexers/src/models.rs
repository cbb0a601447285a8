//! Search requests and indexer release listings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A search against an indexer
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    /// Newznab category ids, joined comma-separated on the wire
    pub categories: Vec<u32>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_categories(mut self, categories: Vec<u32>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One release as listed by an indexer
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexerRelease {
    pub title: String,
    pub guid: String,
    /// Download URL (the nzb link)
    pub link: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub size_bytes: Option<i64>,
    pub category: Option<String>,
    /// Name of the indexer this came from
    pub indexer: String,
}
