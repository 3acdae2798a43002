// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::types::{FeedEntry, FeedSource};

// ---------- RSS 2.0 ----------

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    summary: Option<String>,
}

// ---------- Atom ----------

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
}

/// Atom text constructs carry attributes (`type="html"`), so plain `String`
/// deserialization is not enough.
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
}

fn parse_feed_datetime(ts: &str) -> Option<DateTime<Utc>> {
    // RSS uses RFC 2822 pubDate, Atom uses RFC 3339 published/updated.
    // Feeds in the wild end pubDate with the obsolete "GMT"/"UT" zone names,
    // which the strict parser rejects.
    let normalized = ts
        .trim()
        .trim_end_matches(" GMT")
        .trim_end_matches(" UT")
        .to_string();
    let normalized = if normalized.len() < ts.trim().len() {
        format!("{normalized} +0000")
    } else {
        normalized
    };
    let odt = OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(&normalized, &Rfc2822))
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()?;
    DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), 0)
}

/// Parse a feed document that is either RSS 2.0 (`<rss><channel><item>`)
/// or Atom (`<feed><entry>`).
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    if let Ok(rss) = from_str::<Rss>(xml) {
        let out = rss
            .channel
            .item
            .into_iter()
            .map(|it| FeedEntry {
                title: it.title.unwrap_or_default(),
                link: it.link.unwrap_or_default(),
                summary: it.description.or(it.summary).unwrap_or_default(),
                published: it.pub_date.as_deref().and_then(parse_feed_datetime),
            })
            .collect();
        return Ok(out);
    }

    let atom: AtomFeed = from_str(xml).context("parsing feed as rss and atom both failed")?;
    let out = atom
        .entry
        .into_iter()
        .map(|e| FeedEntry {
            title: e.title.and_then(|t| t.value).unwrap_or_default(),
            link: e
                .links
                .into_iter()
                .find_map(|l| l.href)
                .unwrap_or_default(),
            summary: e
                .summary
                .and_then(|t| t.value)
                .or_else(|| e.content.and_then(|t| t.value))
                .unwrap_or_default(),
            published: e
                .published
                .or(e.updated)
                .as_deref()
                .and_then(parse_feed_datetime),
        })
        .collect();
    Ok(out)
}

/// Production feed source: fetches one RSS/Atom URL over HTTP.
pub struct RssFeedSource {
    name: String,
    url: String,
    http: reqwest::Client,
}

impl RssFeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("usstock-news-digest/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            name: name.into(),
            url: url.into(),
            http,
        }
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>> {
        let body = self
            .http
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("fetching feed {}", self.url))?
            .error_for_status()
            .with_context(|| format!("feed {} returned non-2xx", self.url))?
            .text()
            .await
            .context("reading feed body")?;
        parse_feed(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fixture-backed source for tests: parses a canned document, no HTTP.
pub struct FixtureFeedSource {
    name: String,
    xml: String,
}

impl FixtureFeedSource {
    pub fn new(name: impl Into<String>, xml: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            xml: xml.into(),
        }
    }
}

#[async_trait]
impl FeedSource for FixtureFeedSource {
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>> {
        parse_feed(&self.xml)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc2822_and_rfc3339_dates_parse() {
        let a = parse_feed_datetime("Tue, 05 Aug 2025 13:00:00 GMT").unwrap();
        assert_eq!(a.timestamp(), 1754398800);
        let b = parse_feed_datetime("2025-08-05T13:00:00Z").unwrap();
        assert_eq!(a, b);
        assert!(parse_feed_datetime("next tuesday").is_none());
    }

    #[test]
    fn rss_documents_parse() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Wire</title>
<item>
  <title>Fed holds rates steady</title>
  <link>https://example.com/fed</link>
  <pubDate>Tue, 05 Aug 2025 13:00:00 GMT</pubDate>
  <description>The central bank left its target range unchanged.</description>
</item>
<item>
  <title>No link here</title>
  <description>Still parsed; the aggregator filters it.</description>
</item>
</channel></rss>"#;
        let entries = parse_feed(xml).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Fed holds rates steady");
        assert_eq!(entries[0].link, "https://example.com/fed");
        assert!(entries[0].published.is_some());
        assert_eq!(entries[1].link, "");
    }

    #[test]
    fn atom_documents_parse() {
        let xml = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
<entry>
  <title type="text">Chipmaker beats estimates</title>
  <link href="https://example.com/chips"/>
  <updated>2025-08-05T09:30:00Z</updated>
  <summary>Quarterly revenue came in ahead of consensus.</summary>
</entry>
</feed>"#;
        let entries = parse_feed(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Chipmaker beats estimates");
        assert_eq!(entries[0].link, "https://example.com/chips");
        assert!(entries[0].published.is_some());
        assert_eq!(
            entries[0].summary,
            "Quarterly revenue came in ahead of consensus."
        );
    }
}
