// src/rollup/monthly.rs
// Monthly rollup: trailing 30 days of delivery history ranked into TOP 10,
// with a market-mood classification, a one-line month summary, and a
// per-topic outlook.

use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

use crate::ai::{extract_json, ChatRequest, SharedCapability};
use crate::curate::Topic;
use crate::history::{filter_window, HistoryRecord};
use crate::rollup::history_block;

pub const WINDOW_DAYS: i64 = 30;
pub const MAX_RECORDS: usize = 300;
pub const TOP_TOPICS: usize = 10;

/// Monthly analysis result: the ranked topics plus month-level annotations
/// the composer renders into the digest header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyReport {
    pub summary: String,
    pub market_mood: String,
    pub topics: Vec<Topic>,
}

#[derive(Deserialize)]
struct MonthlyResponse {
    #[serde(default)]
    monthly_summary: String,
    #[serde(default)]
    market_mood: String,
    #[serde(default)]
    monthly_hot_topics: Vec<MonthlyTopic>,
}

#[derive(Deserialize)]
struct MonthlyTopic {
    title: String,
    summary: String,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default)]
    heat_score: u8,
    #[serde(default)]
    related_tickers: Vec<String>,
    #[serde(default)]
    outlook: Option<String>,
}

pub struct MonthlyRollup {
    ai: SharedCapability,
    model: String,
    locale: String,
}

impl MonthlyRollup {
    pub fn new(ai: SharedCapability, model: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            ai,
            model: model.into(),
            locale: locale.into(),
        }
    }

    /// Ranks the month's defining topics. `None` when the window is empty or
    /// the capability fails; the cycle is skipped downstream.
    pub async fn analyze(&self, records: &[HistoryRecord]) -> Option<MonthlyReport> {
        let window = filter_window(records, WINDOW_DAYS, Utc::now());
        if window.is_empty() {
            tracing::info!("no delivered news in the monthly window");
            return None;
        }
        if window.len() < 50 {
            tracing::warn!(records = window.len(), "thin monthly window, analysis may be shallow");
        }

        let news_block = history_block(&window, MAX_RECORDS);

        let user = format!(
            "Analyze the past 30 days of US stock market news and pick the \
TOP {top} issues that defined the month.\n\n\
News delivered over the past 30 days ({count} items):\n{news_block}\n\n---\n\n\
Selection criteria, in priority order:\n\
1. impact on the S&P 500, Nasdaq and other major indices\n\
2. persistence: themes that ran all month or kept recurring\n\
3. structural shifts in industries, policy or technology\n\
4. major investor events: earnings, M&A, regulation\n\
5. macro: Fed policy, inflation, employment\n\n\
Exclude one-off short-lived stories, minor small-cap news, and memes.\n\n\
Angles to cover: the month's biggest overall trend, the most-watched \
names and sectors, what an investor had to know, and what is likely to \
carry into next month.\n\n\
Respond with JSON only:\n\
{{\n  \"monthly_summary\": \"the month in one sentence ({locale})\",\n  \
\"market_mood\": \"optimistic, cautious or pessimistic\",\n  \
\"monthly_hot_topics\": [\n    {{\n      \"rank\": 1,\n      \
\"title\": \"issue title ({locale})\",\n      \
\"summary\": \"4-5 sentence analysis of why it mattered and how it moved the market ({locale})\",\n      \
\"impact\": \"high or medium\",\n      \"heat_score\": 95,\n      \
\"related_tickers\": [\"NVDA\", \"AMD\"],\n      \
\"outlook\": \"one-line outlook for next month ({locale})\"\n    }}\n  ]\n}}\n\n\
Write all free text in {locale}. Select exactly {top} topics, ordered by score.",
            top = TOP_TOPICS,
            count = window.len().min(MAX_RECORDS),
            locale = self.locale,
        );

        let req = ChatRequest {
            system: "You are a senior financial market analyst. Provide deep analysis \
and insight. Respond in JSON format only."
                .to_string(),
            user,
            model: self.model.clone(),
            temperature: 0.4,
            max_tokens: 4000,
            timeout: Duration::from_secs(120),
        };

        tracing::info!(records = window.len().min(MAX_RECORDS), "running monthly rollup");

        let text = match self.ai.complete(&req).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = ?e, "monthly rollup request failed");
                return None;
            }
        };

        let parsed: MonthlyResponse = match serde_json::from_str(extract_json(&text)) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "monthly rollup response unparseable");
                return None;
            }
        };

        let topics: Vec<Topic> = parsed
            .monthly_hot_topics
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
                frequency: None,
                impact: t.impact,
                outlook: t.outlook,
            })
            .collect();

        if topics.is_empty() {
            tracing::warn!("monthly rollup returned no topics");
            return None;
        }

        tracing::info!(topics = topics.len(), mood = %parsed.market_mood, "monthly hot topics selected");
        Some(MonthlyReport {
            summary: parsed.monthly_summary,
            market_mood: parsed.market_mood,
            topics,
        })
    }
}
