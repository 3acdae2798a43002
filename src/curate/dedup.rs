// src/curate/dedup.rs
// Best-effort semantic dedup against recently delivered items. Nothing in
// here can fail the pipeline: on any transport or parse problem the
// candidate list passes through unchanged.

use serde::Deserialize;
use std::time::Duration;

use crate::ai::{extract_json, ChatRequest, SharedCapability};
use crate::history::HistoryRecord;
use crate::ingest::truncate_chars;
use crate::ingest::types::NewsItem;

/// Only the first 50 candidates are checked; the rest always pass through.
pub const MAX_CANDIDATES: usize = 50;
/// Only the most recent 30 history records are offered as context.
pub const MAX_HISTORY: usize = 30;

const CONTEXT_CHARS: usize = 200;

#[derive(Deserialize)]
struct DupResponse {
    #[serde(default)]
    duplicate_news_numbers: Vec<usize>,
}

pub struct SemanticDeduplicator {
    ai: SharedCapability,
    model: String,
}

impl SemanticDeduplicator {
    pub fn new(ai: SharedCapability, model: impl Into<String>) -> Self {
        Self {
            ai,
            model: model.into(),
        }
    }

    /// Drops candidates whose core event/entity and development already
    /// appeared in recent history. Returns the input unchanged when history
    /// is empty or the capability call fails in any way.
    pub async fn filter(
        &self,
        candidates: Vec<NewsItem>,
        history: &[HistoryRecord],
    ) -> Vec<NewsItem> {
        if history.is_empty() {
            tracing::debug!("no delivery history, skipping semantic dedup");
            return candidates;
        }
        if candidates.is_empty() {
            return candidates;
        }

        let recent = &history[history.len().saturating_sub(MAX_HISTORY)..];
        let checked = candidates.len().min(MAX_CANDIDATES);

        let past_block = recent
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "[past {}] title: {}\nsummary: {}",
                    i + 1,
                    r.title,
                    truncate_chars(&r.summary, CONTEXT_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let new_block = candidates[..checked]
            .iter()
            .enumerate()
            .map(|(i, n)| {
                format!(
                    "[new {}] title: {}\nsummary: {}",
                    i + 1,
                    n.title,
                    truncate_chars(&n.summary, CONTEXT_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let user = format!(
            "These news items were already delivered recently:\n\n{past_block}\n\n---\n\n\
These are the new candidates:\n\n{new_block}\n\n---\n\n\
Task: find the new items whose topic duplicates an already-delivered item.\n\n\
An item is a duplicate only when its core event or development is the same:\n\
1. the same incident or issue (e.g. the same CEO interview)\n\
2. the same company/person with the same news (same earnings, same announcement)\n\
3. the same move in the same stock or index\n\
4. not mere keyword overlap; the core content itself must repeat\n\n\
Not duplicates:\n\
- the same company or person with a *different* event\n\
- price/level stories, unless same date and same magnitude\n\
- follow-ups that add a new development\n\n\
Respond with JSON only:\n\
{{\"duplicate_news_numbers\": [2, 5, 7]}}  (numbers of duplicate new items, or an empty array)"
        );

        let req = ChatRequest {
            system: "You are a news duplication checker. Respond in JSON format only.".to_string(),
            user,
            model: self.model.clone(),
            temperature: 0.2,
            max_tokens: 500,
            timeout: Duration::from_secs(30),
        };

        tracing::info!(
            candidates = checked,
            history = recent.len(),
            "checking topic duplicates"
        );

        let text = match self.ai.complete(&req).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = ?e, "duplicate check failed, keeping all candidates");
                return candidates;
            }
        };

        let parsed: DupResponse = match serde_json::from_str(extract_json(&text)) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "duplicate check response unparseable, keeping all candidates");
                return candidates;
            }
        };

        if parsed.duplicate_news_numbers.is_empty() {
            tracing::info!("no duplicate topics found");
            return candidates;
        }

        let dupes = parsed.duplicate_news_numbers;
        let before = candidates.len();
        let filtered: Vec<NewsItem> = candidates
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i >= checked || !dupes.contains(&(i + 1)))
            .map(|(_, item)| item)
            .collect();

        tracing::info!(removed = before - filtered.len(), kept = filtered.len(), "duplicate topics removed");
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockCapability;
    use chrono::Utc;
    use std::sync::Arc;

    fn item(n: usize) -> NewsItem {
        NewsItem {
            title: format!("title {n}"),
            link: format!("https://e/{n}"),
            summary: String::new(),
            source: "Wire".into(),
            published: None,
        }
    }

    fn record() -> HistoryRecord {
        HistoryRecord {
            title: "old".into(),
            link: "https://e/old".into(),
            summary: String::new(),
            sent_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_history_skips_the_call() {
        // A failing capability proves no call is made.
        let dedup = SemanticDeduplicator::new(Arc::new(MockCapability::failing()), "m");
        let out = dedup.filter(vec![item(1), item(2)], &[]).await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn indicated_indices_are_removed() {
        let mock = MockCapability::with_reply(r#"{"duplicate_news_numbers": [1, 3]}"#);
        let dedup = SemanticDeduplicator::new(Arc::new(mock), "m");
        let out = dedup
            .filter(vec![item(1), item(2), item(3)], &[record()])
            .await;
        assert_eq!(out, vec![item(2)]);
    }

    #[tokio::test]
    async fn fenced_response_is_accepted() {
        let mock =
            MockCapability::with_reply("```json\n{\"duplicate_news_numbers\": [2]}\n```");
        let dedup = SemanticDeduplicator::new(Arc::new(mock), "m");
        let out = dedup.filter(vec![item(1), item(2)], &[record()]).await;
        assert_eq!(out, vec![item(1)]);
    }

    #[tokio::test]
    async fn transport_failure_passes_candidates_through() {
        let dedup = SemanticDeduplicator::new(Arc::new(MockCapability::failing()), "m");
        let out = dedup.filter(vec![item(1), item(2)], &[record()]).await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn garbage_response_passes_candidates_through() {
        let mock = MockCapability::with_reply("sorry, I cannot help with that");
        let dedup = SemanticDeduplicator::new(Arc::new(mock), "m");
        let out = dedup.filter(vec![item(1)], &[record()]).await;
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn candidates_beyond_the_checked_slice_always_pass() {
        // 52 candidates; the response flags 1 and (bogus) 51. Only the
        // first is inside the checked slice, so exactly one item drops.
        let mock = MockCapability::with_reply(r#"{"duplicate_news_numbers": [1, 51]}"#);
        let dedup = SemanticDeduplicator::new(Arc::new(mock), "m");
        let candidates: Vec<NewsItem> = (1..=52).map(item).collect();
        let out = dedup.filter(candidates, &[record()]).await;
        assert_eq!(out.len(), 51);
        assert!(out.iter().any(|i| i.title == "title 51"));
        assert!(out.iter().any(|i| i.title == "title 52"));
        assert!(!out.iter().any(|i| i.title == "title 1"));
    }
}
