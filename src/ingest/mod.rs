// src/ingest/mod.rs
pub mod providers;
pub mod types;

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

use crate::ingest::types::{FeedEntry, FeedSource, NewsItem};

/// At most this many entries are considered per source.
pub const MAX_ENTRIES_PER_SOURCE: usize = 30;
/// Feed summaries are capped at this many characters.
pub const SUMMARY_MAX_CHARS: usize = 500;

/// Normalize a feed summary: decode HTML entities, strip tags, collapse
/// whitespace, cap the length.
pub fn clean_summary(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    truncate_chars(&out, SUMMARY_MAX_CHARS)
}

/// Char-boundary-safe truncation.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s.to_string()
    }
}

/// Keep entries that are recent enough and carry a title and a link.
/// Entries without a parseable publish time are kept; only a known-old
/// timestamp excludes an entry.
pub fn filter_entries(
    source: &str,
    entries: Vec<FeedEntry>,
    cutoff: DateTime<Utc>,
) -> Vec<NewsItem> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries.into_iter().take(MAX_ENTRIES_PER_SOURCE) {
        if let Some(published) = entry.published {
            if published < cutoff {
                continue;
            }
        }
        let title = entry.title.trim().to_string();
        let link = entry.link.trim().to_string();
        if title.is_empty() || link.is_empty() {
            continue;
        }
        out.push(NewsItem {
            title,
            link,
            summary: clean_summary(&entry.summary),
            source: source.to_string(),
            published: entry.published,
        });
    }
    out
}

/// Collapse items with case-insensitive identical titles; the first
/// occurrence wins, so source iteration order defines "first".
pub fn dedup_by_title(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        if seen.insert(item.title.to_lowercase()) {
            unique.push(item);
        }
    }
    unique
}

/// Pulls from every configured source, filters by recency, and removes
/// exact title duplicates. Source failures are logged and skipped.
pub struct FeedAggregator {
    sources: Vec<Box<dyn FeedSource>>,
    window_hours: i64,
}

impl FeedAggregator {
    pub fn new(sources: Vec<Box<dyn FeedSource>>, window_hours: i64) -> Self {
        Self {
            sources,
            window_hours,
        }
    }

    pub async fn collect(&self) -> Vec<NewsItem> {
        let cutoff = Utc::now() - Duration::hours(self.window_hours);
        let mut all = Vec::new();

        for source in &self.sources {
            match source.fetch_entries().await {
                Ok(entries) => {
                    let items = filter_entries(source.name(), entries, cutoff);
                    tracing::info!(source = source.name(), kept = items.len(), "feed collected");
                    all.extend(items);
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = ?e, "feed fetch failed");
                }
            }
        }

        let total = all.len();
        let unique = dedup_by_title(all);
        if unique.len() < total {
            tracing::info!(removed = total - unique.len(), "exact title duplicates removed");
        }
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, link: &str, published: Option<DateTime<Utc>>) -> FeedEntry {
        FeedEntry {
            title: title.into(),
            link: link.into(),
            summary: String::new(),
            published,
        }
    }

    #[test]
    fn clean_summary_strips_markup_and_caps() {
        let s = "<p>Shares &amp; bonds\n\n  rallied</p>";
        assert_eq!(clean_summary(s), "Shares & bonds rallied");

        let long = "x".repeat(600);
        assert_eq!(clean_summary(&long).chars().count(), SUMMARY_MAX_CHARS);
    }

    #[test]
    fn old_entries_are_dropped_but_undated_kept() {
        let cutoff = Utc::now() - Duration::hours(12);
        let fresh = Utc::now() - Duration::hours(1);
        let stale = Utc::now() - Duration::hours(24);
        let entries = vec![
            entry("fresh", "https://e/1", Some(fresh)),
            entry("stale", "https://e/2", Some(stale)),
            entry("undated", "https://e/3", None),
        ];
        let items = filter_entries("Wire", entries, cutoff);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["fresh", "undated"]);
    }

    #[test]
    fn entries_without_title_or_link_are_dropped() {
        let cutoff = Utc::now() - Duration::hours(12);
        let entries = vec![
            entry("  ", "https://e/1", None),
            entry("titled", "  ", None),
            entry("ok", "https://e/2", None),
        ];
        let items = filter_entries("Wire", entries, cutoff);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "ok");
    }

    #[test]
    fn per_source_cap_applies() {
        let cutoff = Utc::now() - Duration::hours(12);
        let entries: Vec<FeedEntry> = (0..40)
            .map(|i| entry(&format!("t{i}"), &format!("https://e/{i}"), None))
            .collect();
        let items = filter_entries("Wire", entries, cutoff);
        assert_eq!(items.len(), MAX_ENTRIES_PER_SOURCE);
    }

    #[test]
    fn title_dedup_is_case_insensitive_first_wins() {
        let items = vec![
            NewsItem {
                title: "Fed Holds Rates".into(),
                link: "https://a/1".into(),
                summary: String::new(),
                source: "A".into(),
                published: None,
            },
            NewsItem {
                title: "FED HOLDS RATES".into(),
                link: "https://b/1".into(),
                summary: String::new(),
                source: "B".into(),
                published: None,
            },
        ];
        let unique = dedup_by_title(items);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].source, "A");
    }
}
