// src/rollup/weekly.rs
// Weekly "hot topics" rollup: trailing 7 days of delivery history, plus
// optional forum-mention and search-interest signals, ranked into TOP 10.

use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::ai::{extract_json, ChatRequest, SharedCapability};
use crate::curate::Topic;
use crate::history::{filter_window, HistoryRecord};
use crate::ingest::truncate_chars;
use crate::rollup::history_block;
use crate::rollup::social::{InterestSource, MentionSource, TickerMentions};

pub const WINDOW_DAYS: i64 = 7;
pub const MAX_RECORDS: usize = 100;
pub const TOP_TOPICS: usize = 10;

#[derive(Deserialize)]
struct WeeklyResponse {
    #[serde(default)]
    weekly_hot_topics: Vec<WeeklyTopic>,
}

#[derive(Deserialize)]
struct WeeklyTopic {
    title: String,
    summary: String,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    heat_score: u8,
    #[serde(default)]
    related_tickers: Vec<String>,
}

pub struct WeeklyRollup {
    ai: SharedCapability,
    model: String,
    locale: String,
    mentions: Option<Arc<dyn MentionSource>>,
    interest: Option<Arc<dyn InterestSource>>,
}

impl WeeklyRollup {
    pub fn new(
        ai: SharedCapability,
        model: impl Into<String>,
        locale: impl Into<String>,
        mentions: Option<Arc<dyn MentionSource>>,
        interest: Option<Arc<dyn InterestSource>>,
    ) -> Self {
        Self {
            ai,
            model: model.into(),
            locale: locale.into(),
            mentions,
            interest,
        }
    }

    async fn gather_signals(&self) -> (Vec<TickerMentions>, BTreeMap<String, u8>) {
        let mentions = match &self.mentions {
            Some(source) => match source.top_mentions().await {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(error = ?e, "mention source failed, continuing without it");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let interest = match (&self.interest, mentions.is_empty()) {
            (Some(source), false) => {
                let symbols: Vec<String> = mentions.iter().map(|m| m.symbol.clone()).collect();
                match source.interest_scores(&symbols).await {
                    Ok(scores) => scores,
                    Err(e) => {
                        tracing::warn!(error = ?e, "interest source failed, continuing without it");
                        BTreeMap::new()
                    }
                }
            }
            _ => BTreeMap::new(),
        };

        (mentions, interest)
    }

    /// Ranks the week's hot topics. An empty window yields an empty list;
    /// so does any capability failure.
    pub async fn analyze(&self, records: &[HistoryRecord]) -> Vec<Topic> {
        let window = filter_window(records, WINDOW_DAYS, Utc::now());
        if window.is_empty() {
            tracing::info!("no delivered news in the weekly window");
            return Vec::new();
        }

        let (mentions, interest) = self.gather_signals().await;

        let news_block = history_block(&window, MAX_RECORDS);
        let social_block = if mentions.is_empty() {
            "no social data".to_string()
        } else {
            let mut lines = vec!["forum hot tickers:".to_string()];
            for m in mentions.iter().take(15) {
                let mut line = format!("- {}: {} mentions", m.symbol, m.count);
                if let Some(score) = interest.get(&m.symbol) {
                    line.push_str(&format!(" | search interest {score}/100"));
                }
                if let Some(post) = &m.top_post {
                    line.push_str(&format!(
                        "\n  top post: {}",
                        truncate_chars(&post.title, 80)
                    ));
                }
                lines.push(line);
            }
            lines.join("\n")
        };

        let user = format!(
            "Analyze the past 7 days of US stock news and social data and pick \
the weekly hot issue TOP {top}.\n\n\
News delivered over the past 7 days ({count} items):\n{news_block}\n\n\
Social media analysis:\n{social_block}\n\n---\n\n\
Selection criteria, in priority order:\n\
1. recurring themes that appeared across several days\n\
2. tickers and issues the forum talked about most\n\
3. symbols with high search interest\n\
4. impact on indices, sectors and the macro picture\n\
5. investor-relevant events: earnings, M&A, regulation\n\n\
Exclude one-off minor news, single-day stories without recurrence, and pure \
forum memes.\n\n\
Respond with JSON only:\n\
{{\n  \"weekly_hot_topics\": [\n    {{\n      \"rank\": 1,\n      \
\"title\": \"theme or ticker ({locale})\",\n      \
\"summary\": \"3-4 sentence recap of the week's development ({locale})\",\n      \
\"frequency\": \"seen 3 days\" or \"234 forum mentions\",\n      \
\"heat_score\": 95,\n      \"related_tickers\": [\"NVDA\", \"AMD\"]\n    }}\n  ]\n}}\n\n\
Write title and summary in {locale}. Select exactly {top} topics, ordered by score.",
            top = TOP_TOPICS,
            count = window.len().min(MAX_RECORDS),
            locale = self.locale,
        );

        let req = ChatRequest {
            system: "You are a financial news analysis expert. Respond in JSON format only."
                .to_string(),
            user,
            model: self.model.clone(),
            temperature: 0.3,
            max_tokens: 3000,
            timeout: Duration::from_secs(120),
        };

        tracing::info!(
            records = window.len().min(MAX_RECORDS),
            tickers = mentions.len(),
            "running weekly rollup"
        );

        let text = match self.ai.complete(&req).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = ?e, "weekly rollup request failed");
                return Vec::new();
            }
        };

        let parsed: WeeklyResponse = match serde_json::from_str(extract_json(&text)) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "weekly rollup response unparseable");
                return Vec::new();
            }
        };

        let topics: Vec<Topic> = parsed
            .weekly_hot_topics
            .into_iter()
            .take(TOP_TOPICS)
            .enumerate()
            .map(|(i, t)| Topic {
                rank: (i + 1) as u32,
                title: t.title,
                summary: t.summary,
                heat_score: t.heat_score.min(100),
                link: None,
                source: None,
                related_tickers: t
                    .related_tickers
                    .into_iter()
                    .map(|s| s.to_uppercase())
                    .collect(),
                frequency: t.frequency,
                impact: None,
                outlook: None,
            })
            .collect();

        tracing::info!(topics = topics.len(), "weekly hot topics selected");
        topics
    }
}
