// src/rollup/social.rs
// Optional auxiliary ranking inputs for the weekly rollup: ticker-mention
// frequency from a forum and search-interest scores. Both are strictly
// best-effort; absence or failure degrades to an empty signal set.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Representative high-engagement post for a mentioned symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionPost {
    pub title: String,
    pub score: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerMentions {
    pub symbol: String,
    pub count: u32,
    pub top_post: Option<MentionPost>,
}

#[async_trait]
pub trait MentionSource: Send + Sync {
    /// Top mentioned ticker symbols with counts, most-mentioned first.
    async fn top_mentions(&self) -> Result<Vec<TickerMentions>>;
}

#[async_trait]
pub trait InterestSource: Send + Sync {
    /// Search-interest score per symbol, 0-100.
    async fn interest_scores(&self, symbols: &[String]) -> Result<BTreeMap<String, u8>>;
}

/// Uppercase words that match the ticker pattern but never are tickers.
const TICKER_STOPWORDS: &[&str] = &[
    "TO", "FOR", "THE", "AND", "OR", "BUT", "NOT", "ARE", "WAS", "HAS", "HAD", "CAN", "ALL",
    "NEW", "NOW", "OUT", "ANY", "WHO", "HOW", "WHY", "GET", "GOT", "SEE", "SAW", "WAY", "OUR",
    "YOU", "YOUR", "WILL", "WOULD", "COULD", "SHOULD", "MAY", "MIGHT", "BEEN", "BEING", "HAVE",
    "HIS", "HER", "ITS", "THEIR", "THERE", "WHAT", "WHEN", "WHERE", "WHICH", "THIS", "THAT",
    "THESE", "THOSE", "FROM", "WITH", "INTO", "OVER", "AFTER", "BEFORE", "ABOUT", "AGAINST",
    "BETWEEN", "DURING", "WITHOUT", "THROUGH", "THAN", "USA", "CEO", "IPO", "ETF", "WSB",
    "YOLO", "DD", "TA", "IMO",
];

/// Pull candidate ticker symbols (`$TSLA` or bare `TSLA`, 2-5 uppercase
/// letters) out of free text, stopwords removed.
pub fn extract_tickers(text: &str) -> Vec<String> {
    static RE: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re = RE.get_or_init(|| regex::Regex::new(r"\$?\b([A-Z]{2,5})\b").unwrap());
    re.captures_iter(text)
        .map(|c| c[1].to_string())
        .filter(|t| !TICKER_STOPWORDS.contains(&t.as_str()))
        .collect()
}

// ---------- Reddit-backed mention source ----------

#[derive(Deserialize)]
struct RedditToken {
    access_token: String,
}

#[derive(Deserialize)]
struct RedditListing {
    data: RedditListingData,
}

#[derive(Deserialize)]
struct RedditListingData {
    #[serde(default)]
    children: Vec<RedditChild>,
}

#[derive(Deserialize)]
struct RedditChild {
    data: RedditPost,
}

#[derive(Deserialize)]
struct RedditPost {
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    permalink: String,
}

pub struct RedditMentions {
    client_id: String,
    client_secret: String,
    subreddit: String,
    post_limit: u32,
    top_n: usize,
    http: reqwest::Client,
}

impl RedditMentions {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("usstock-news-digest/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            subreddit: "wallstreetbets".to_string(),
            post_limit: 100,
            top_n: 20,
            http,
        }
    }

    pub fn with_subreddit(mut self, subreddit: impl Into<String>) -> Self {
        self.subreddit = subreddit.into();
        self
    }

    async fn access_token(&self) -> Result<String> {
        let token: RedditToken = self
            .http
            .post("https://www.reddit.com/api/v1/access_token")
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("reddit token request")?
            .error_for_status()
            .context("reddit token non-2xx")?
            .json()
            .await
            .context("reddit token body")?;
        Ok(token.access_token)
    }
}

/// Count mentions across posts and keep the highest-scored post per symbol.
pub fn tally_mentions(posts: &[(String, String, i64, String)], top_n: usize) -> Vec<TickerMentions> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    let mut contexts: HashMap<String, MentionPost> = HashMap::new();

    for (title, body, score, url) in posts {
        let text = format!("{title} {body}");
        for ticker in extract_tickers(&text) {
            *counts.entry(ticker.clone()).or_insert(0) += 1;
            let replace = contexts
                .get(&ticker)
                .map(|p| *score > p.score)
                .unwrap_or(true);
            if replace {
                contexts.insert(
                    ticker,
                    MentionPost {
                        title: title.clone(),
                        score: *score,
                        url: url.clone(),
                    },
                );
            }
        }
    }

    let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
    // count desc, then symbol for a stable order
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(top_n)
        .map(|(symbol, count)| {
            let top_post = contexts.remove(&symbol);
            TickerMentions {
                symbol,
                count,
                top_post,
            }
        })
        .collect()
}

#[async_trait]
impl MentionSource for RedditMentions {
    async fn top_mentions(&self) -> Result<Vec<TickerMentions>> {
        let token = self.access_token().await?;
        let url = format!(
            "https://oauth.reddit.com/r/{}/hot?limit={}",
            self.subreddit, self.post_limit
        );
        let listing: RedditListing = self
            .http
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .context("reddit hot posts request")?
            .error_for_status()
            .context("reddit hot posts non-2xx")?
            .json()
            .await
            .context("reddit hot posts body")?;

        let posts: Vec<(String, String, i64, String)> = listing
            .data
            .children
            .into_iter()
            .map(|c| {
                (
                    c.data.title,
                    c.data.selftext,
                    c.data.score,
                    format!("https://reddit.com{}", c.data.permalink),
                )
            })
            .collect();

        let mentions = tally_mentions(&posts, self.top_n);
        tracing::info!(posts = posts.len(), tickers = mentions.len(), "forum mentions gathered");
        Ok(mentions)
    }
}

// ---------- Search-interest source ----------

/// Interest scores from the unofficial trends endpoint: an explore call
/// yields a widget token, the multiline call yields the 0-100 series.
/// Symbols are requested in batches of at most 5 with a fixed delay in
/// between to respect the provider's rate limits.
pub struct TrendsInterest {
    http: reqwest::Client,
    base_url: String,
}

/// Provider allows at most this many keywords per request.
pub const INTEREST_BATCH: usize = 5;
const BATCH_DELAY: Duration = Duration::from_secs(2);

#[derive(Deserialize)]
struct ExploreResponse {
    #[serde(default)]
    widgets: Vec<ExploreWidget>,
}

#[derive(Deserialize)]
struct ExploreWidget {
    #[serde(default)]
    id: String,
    token: Option<String>,
    request: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct MultilineResponse {
    default: MultilineDefault,
}

#[derive(Deserialize)]
struct MultilineDefault {
    #[serde(rename = "timelineData", default)]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Deserialize)]
struct TimelinePoint {
    #[serde(default)]
    value: Vec<i64>,
}

/// The endpoint prefixes JSON bodies with `)]}'`-style garbage.
fn strip_json_prefix(body: &str) -> Result<&str> {
    let start = body
        .find('{')
        .ok_or_else(|| anyhow!("no JSON object in response"))?;
    Ok(&body[start..])
}

impl TrendsInterest {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent("usstock-news-digest/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: "https://trends.google.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn batch_scores(&self, batch: &[String]) -> Result<BTreeMap<String, u8>> {
        let comparison: Vec<serde_json::Value> = batch
            .iter()
            .map(|kw| serde_json::json!({"keyword": kw, "geo": "", "time": "now 7-d"}))
            .collect();
        let req = serde_json::json!({
            "comparisonItem": comparison,
            "category": 0,
            "property": "",
        });

        let req_json = req.to_string();
        let body = self
            .http
            .get(format!("{}/trends/api/explore", self.base_url))
            .query(&[("hl", "en-US"), ("tz", "360"), ("req", req_json.as_str())])
            .send()
            .await
            .context("interest explore request")?
            .error_for_status()
            .context("interest explore non-2xx")?
            .text()
            .await?;
        let explore: ExploreResponse = serde_json::from_str(strip_json_prefix(&body)?)
            .context("interest explore body")?;

        let widget = explore
            .widgets
            .into_iter()
            .find(|w| w.id == "TIMESERIES")
            .ok_or_else(|| anyhow!("no timeseries widget in explore response"))?;
        let (token, request) = match (widget.token, widget.request) {
            (Some(t), Some(r)) => (t, r),
            _ => return Err(anyhow!("timeseries widget missing token")),
        };

        let widget_json = request.to_string();
        let body = self
            .http
            .get(format!("{}/trends/api/widgetdata/multiline", self.base_url))
            .query(&[
                ("hl", "en-US"),
                ("tz", "360"),
                ("req", widget_json.as_str()),
                ("token", token.as_str()),
            ])
            .send()
            .await
            .context("interest series request")?
            .error_for_status()
            .context("interest series non-2xx")?
            .text()
            .await?;
        let series: MultilineResponse =
            serde_json::from_str(strip_json_prefix(&body)?).context("interest series body")?;

        Ok(mean_interest(batch, &series.default.timeline_data))
    }
}

impl Default for TrendsInterest {
    fn default() -> Self {
        Self::new()
    }
}

fn mean_interest(batch: &[String], points: &[TimelinePoint]) -> BTreeMap<String, u8> {
    let mut out = BTreeMap::new();
    if points.is_empty() {
        return out;
    }
    for (i, symbol) in batch.iter().enumerate() {
        let values: Vec<i64> = points.iter().filter_map(|p| p.value.get(i).copied()).collect();
        if values.is_empty() {
            continue;
        }
        let mean = values.iter().sum::<i64>() / values.len() as i64;
        out.insert(symbol.clone(), mean.clamp(0, 100) as u8);
    }
    out
}

#[async_trait]
impl InterestSource for TrendsInterest {
    async fn interest_scores(&self, symbols: &[String]) -> Result<BTreeMap<String, u8>> {
        let mut scores = BTreeMap::new();
        for (i, batch) in symbols.chunks(INTEREST_BATCH).enumerate() {
            if i > 0 {
                tokio::time::sleep(BATCH_DELAY).await;
            }
            match self.batch_scores(batch).await {
                Ok(batch_scores) => scores.extend(batch_scores),
                Err(e) => {
                    // One failed batch does not sink the rest.
                    tracing::warn!(batch = ?batch, error = ?e, "interest batch failed");
                }
            }
        }
        tracing::info!(scored = scores.len(), "search interest gathered");
        Ok(scores)
    }
}
