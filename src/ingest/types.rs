// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One normalized news item, immutable once it leaves the aggregator.
/// `link` is the equality key across the pipeline.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub summary: String, // plain text, capped at 500 chars
    pub source: String,  // e.g. "MarketWatch", "CNBC Top News"
    pub published: Option<DateTime<Utc>>,
}

/// Raw entry as parsed out of a feed document, before filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>>;
    fn name(&self) -> &str;
}
