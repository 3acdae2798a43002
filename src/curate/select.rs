// src/curate/select.rs
// Curation stage: one ranking request selects and summarizes the top-N
// candidates for a digest cycle. Any failure yields an empty topic list and
// the cycle is simply skipped downstream.

use serde::Deserialize;
use std::time::Duration;

use crate::ai::{extract_json, ChatRequest, SharedCapability};
use crate::curate::Topic;
use crate::ingest::truncate_chars;
use crate::ingest::types::NewsItem;

/// At most this many candidates are submitted for ranking.
pub const MAX_CANDIDATES: usize = 100;

const CONTEXT_CHARS: usize = 300;

#[derive(Deserialize)]
struct SelectResponse {
    #[serde(default)]
    selected_news: Vec<Selection>,
}

#[derive(Deserialize)]
struct Selection {
    news_number: usize,
    title: String,
    summary: String,
    #[serde(default)]
    importance_score: u8,
}

pub struct Curator {
    ai: SharedCapability,
    model: String,
    locale: String,
    top_n: usize,
}

impl Curator {
    pub fn new(
        ai: SharedCapability,
        model: impl Into<String>,
        locale: impl Into<String>,
        top_n: usize,
    ) -> Self {
        Self {
            ai,
            model: model.into(),
            locale: locale.into(),
            top_n,
        }
    }

    /// Selects the most important topics from the candidates, in descending
    /// importance order with dense ranks 1..N.
    pub async fn select(&self, candidates: &[NewsItem]) -> Vec<Topic> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let submitted = &candidates[..candidates.len().min(MAX_CANDIDATES)];
        let listing = submitted
            .iter()
            .enumerate()
            .map(|(i, n)| {
                format!(
                    "[news {}]\ntitle: {}\nsource: {}\nlink: {}\nbody: {}",
                    i + 1,
                    n.title,
                    n.source,
                    n.link,
                    truncate_chars(&n.summary, CONTEXT_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let user = format!(
            "You are a news curator for US stock investors.\n\n\
From the news items below, select the {n} most important for investors and \
summarize each in 2-3 sentences.\n\n\
Selection criteria, in priority order:\n\
1. earnings, M&A and product launches at major companies\n\
2. Fed rates, economic indicators and macro issues\n\
3. regulatory change and policy announcements\n\
4. sharp moves in major indices and market trends\n\
5. important sector themes (tech, financials, energy, ...)\n\n\
Exclude:\n\
- pure opinion or analysis pieces\n\
- small-cap company news\n\
- low-importance rumor pieces\n\n\
News items:\n{listing}\n\n\
Respond with JSON only:\n\
{{\n  \"selected_news\": [\n    {{\n      \"news_number\": 1,\n      \
\"title\": \"title translated into {locale}\",\n      \
\"summary\": \"2-3 sentence summary in {locale}\",\n      \
\"importance_score\": 95\n    }}\n  ]\n}}\n\n\
The title and summary MUST be written in {locale}. Order by importance.",
            n = self.top_n,
            locale = self.locale,
        );

        let req = ChatRequest {
            system: "You are a financial news analyst. Respond in JSON format only.".to_string(),
            user,
            model: self.model.clone(),
            temperature: 0.3,
            max_tokens: 2000,
            timeout: Duration::from_secs(60),
        };

        tracing::info!(candidates = submitted.len(), top_n = self.top_n, "ranking candidates");

        let text = match self.ai.complete(&req).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = ?e, "ranking request failed, skipping this cycle");
                return Vec::new();
            }
        };

        let parsed: SelectResponse = match serde_json::from_str(extract_json(&text)) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "ranking response unparseable, skipping this cycle");
                return Vec::new();
            }
        };

        let mut topics: Vec<Topic> = Vec::new();
        for sel in parsed.selected_news {
            if topics.len() == self.top_n {
                break;
            }
            // 1-based index back into the original candidate list;
            // out-of-range selections are dropped, not fatal.
            let Some(original) = sel
                .news_number
                .checked_sub(1)
                .and_then(|i| candidates.get(i))
            else {
                tracing::warn!(news_number = sel.news_number, "selection index out of range, dropped");
                continue;
            };
            topics.push(Topic {
                rank: 0,
                title: sel.title,
                summary: sel.summary,
                heat_score: sel.importance_score.min(100),
                link: Some(original.link.clone()),
                source: Some(original.source.clone()),
                related_tickers: Vec::new(),
                frequency: None,
                impact: None,
                outlook: None,
            });
        }

        // Descending importance; Vec::sort_by is stable, so tied scores keep
        // the capability's selection order.
        topics.sort_by(|a, b| b.heat_score.cmp(&a.heat_score));
        for (i, t) in topics.iter_mut().enumerate() {
            t.rank = (i + 1) as u32;
        }

        tracing::info!(selected = topics.len(), "topics curated");
        topics
    }
}
