// src/config.rs
// Explicit configuration, validated once at startup and passed into each
// component's constructor. Nothing in the pipeline reads the environment.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Required credentials
    pub telegram_token: String,
    pub telegram_chat_ids: Vec<String>,
    pub openai_api_key: String,

    // Daily briefs
    pub header_image_url: Option<String>,
    pub morning_time: String, // "HH:MM", fixed KST
    pub evening_time: String,
    pub window_hours: i64,
    pub top_n: usize,
    pub locale: String,

    // Models per stage: a cheap one for the daily brief stages, a stronger
    // one for the weekly/monthly rollups.
    pub brief_model: String,
    pub rollup_model: String,

    // History
    pub history_path: PathBuf,
    pub history_retention_days: i64,

    // Transport
    pub transport_limit: usize,

    // Optional social signals (weekly rollup)
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub subreddit: String,

    pub feeds: Vec<FeedConfig>,
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| anyhow!("missing required environment variable {name}"))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn validate_hhmm(s: &str) -> Result<()> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map(|_| ())
        .with_context(|| format!("time must be HH:MM, got {s:?}"))
}

impl AppConfig {
    /// Reads and validates the whole configuration. This is the only place
    /// that may fail hard: a missing credential halts startup before the
    /// pipeline runs.
    pub fn from_env() -> Result<Self> {
        let telegram_token = required("TELEGRAM_BOT_TOKEN")?;
        // TELEGRAM_CHAT_ID is the legacy single-chat variable.
        let raw_chat_ids = optional("TELEGRAM_CHAT_IDS")
            .or_else(|| optional("TELEGRAM_CHAT_ID"))
            .ok_or_else(|| anyhow!("missing required environment variable TELEGRAM_CHAT_IDS"))?;
        let telegram_chat_ids: Vec<String> = raw_chat_ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if telegram_chat_ids.is_empty() {
            return Err(anyhow!("TELEGRAM_CHAT_IDS contains no chat ids"));
        }
        let openai_api_key = required("OPENAI_API_KEY")?;

        let morning_time = optional("MORNING_TIME").unwrap_or_else(|| "08:00".to_string());
        let evening_time = optional("EVENING_TIME").unwrap_or_else(|| "22:00".to_string());
        validate_hhmm(&morning_time)?;
        validate_hhmm(&evening_time)?;

        let feeds = match optional("FEEDS_PATH") {
            Some(p) => load_feeds_file(Path::new(&p))?,
            None => default_feeds(),
        };

        Ok(Self {
            telegram_token,
            telegram_chat_ids,
            openai_api_key,
            header_image_url: optional("HEADER_IMAGE_URL"),
            morning_time,
            evening_time,
            window_hours: parse_or("NEWS_WINDOW_HOURS", 12)?,
            top_n: parse_or("TOP_N", 10)?,
            locale: optional("DIGEST_LOCALE").unwrap_or_else(|| "Korean".to_string()),
            brief_model: optional("BRIEF_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            rollup_model: optional("ROLLUP_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            history_path: optional("HISTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_history_path),
            // Must cover the longest rollup window (monthly reads 30 days).
            history_retention_days: parse_or("HISTORY_RETENTION_DAYS", 30)?,
            transport_limit: parse_or("TRANSPORT_LIMIT", crate::digest::DEFAULT_TRANSPORT_LIMIT)?,
            reddit_client_id: optional("REDDIT_CLIENT_ID"),
            reddit_client_secret: optional("REDDIT_CLIENT_SECRET"),
            subreddit: optional("SUBREDDIT").unwrap_or_else(|| "wallstreetbets".to_string()),
            feeds,
        })
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("invalid {name}={raw}: {e}")),
        None => Ok(default),
    }
}

/// A mounted /data volume wins over the working directory.
fn default_history_path() -> PathBuf {
    let volume = Path::new("/data");
    if volume.is_dir() {
        volume.join("sent_news_history.json")
    } else {
        PathBuf::from("sent_news_history.json")
    }
}

/// Feeds override file:
/// ```toml
/// [[feeds]]
/// name = "MarketWatch"
/// url = "https://www.marketwatch.com/rss/topstories"
/// ```
pub fn load_feeds_file(path: &Path) -> Result<Vec<FeedConfig>> {
    #[derive(Deserialize)]
    struct FeedsFile {
        feeds: Vec<FeedConfig>,
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feeds file {}", path.display()))?;
    let parsed: FeedsFile = toml::from_str(&content).context("parsing feeds file")?;
    let feeds: Vec<FeedConfig> = parsed
        .feeds
        .into_iter()
        .filter(|f| !f.name.trim().is_empty() && !f.url.trim().is_empty())
        .collect();
    if feeds.is_empty() {
        return Err(anyhow!("feeds file {} defines no feeds", path.display()));
    }
    Ok(feeds)
}

pub fn default_feeds() -> Vec<FeedConfig> {
    let table = [
        // General market news
        ("MarketWatch", "https://www.marketwatch.com/rss/topstories"),
        (
            "Reuters Business",
            "https://www.reutersagency.com/feed/?taxonomy=best-topics&post_type=best",
        ),
        ("Bloomberg Markets", "https://feeds.bloomberg.com/markets/news.rss"),
        (
            "CNBC Top News",
            "https://www.cnbc.com/id/100003114/device/rss/rss.html",
        ),
        ("Yahoo Finance", "https://finance.yahoo.com/news/rssindex"),
        ("Investing.com", "https://www.investing.com/rss/news.rss"),
        // Tech / startups
        ("TechCrunch", "https://techcrunch.com/feed/"),
        ("The Verge", "https://www.theverge.com/rss/index.xml"),
        // Macro
        ("Financial Times", "https://www.ft.com/?format=rss"),
        (
            "Wall Street Journal",
            "https://feeds.a.dj.com/rss/RSSMarketsMain.xml",
        ),
    ];
    table
        .into_iter()
        .map(|(name, url)| FeedConfig {
            name: name.to_string(),
            url: url.to_string(),
        })
        .collect()
}
