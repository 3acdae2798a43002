//! history.rs — durable rolling log of delivered items, used both for
//! semantic dedup and for the weekly/monthly rollups.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::curate::Topic;

/// One delivered item. Created exactly once per delivery, never mutated,
/// removed only by pruning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryRecord {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub sent_at: DateTime<Utc>,
}

/// On-disk document: `{"sent_news": [...]}`, insertion order = delivery
/// order. Schema-versionless; absence is a valid cold-start state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDoc {
    sent_news: Vec<HistoryRecord>,
}

/// Pure window filter: records with `sent_at` within the last `window_days`
/// of `now`. Comparison is on parsed timestamps, not serialized strings.
pub fn filter_window(
    records: &[HistoryRecord],
    window_days: i64,
    now: DateTime<Utc>,
) -> Vec<HistoryRecord> {
    let cutoff = now - Duration::days(window_days);
    records
        .iter()
        .filter(|r| r.sent_at > cutoff)
        .cloned()
        .collect()
}

/// Window filter that logs how many records fell out.
pub fn prune(records: Vec<HistoryRecord>, window_days: i64, now: DateTime<Utc>) -> Vec<HistoryRecord> {
    let before = records.len();
    let kept = filter_window(&records, window_days, now);
    let removed = before - kept.len();
    if removed > 0 {
        tracing::info!(removed, window_days, "pruned old history records");
    }
    kept
}

pub struct HistoryStore {
    path: PathBuf,
    retention_days: i64,
}

impl HistoryStore {
    /// `retention_days` is the prune-on-write window; it must be at least as
    /// long as the longest reader window (the monthly rollup reads 30 days).
    pub fn new(path: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self {
            path: path.into(),
            retention_days,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the persisted sequence. A missing or unreadable file is a
    /// cold start, never an error.
    pub fn load(&self) -> Vec<HistoryRecord> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str::<HistoryDoc>(&raw) {
            Ok(doc) => doc.sent_news,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "history unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Appends one record per delivered topic with the shared `sent_at`,
    /// pruning to the retention window first, then persists the whole
    /// document.
    pub fn append(&self, topics: &[Topic], sent_at: DateTime<Utc>) -> Result<()> {
        let mut records = prune(self.load(), self.retention_days, sent_at);
        for topic in topics {
            records.push(HistoryRecord {
                title: topic.title.clone(),
                link: topic.link.clone().unwrap_or_default(),
                summary: topic.summary.clone(),
                sent_at,
            });
        }
        self.persist(&records)?;
        tracing::info!(appended = topics.len(), total = records.len(), "history updated");
        Ok(())
    }

    fn persist(&self, records: &[HistoryRecord]) -> Result<()> {
        let doc = HistoryDoc {
            sent_news: records.to_vec(),
        };
        let json = serde_json::to_string_pretty(&doc).context("serializing history")?;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("creating history dir {}", dir.display()))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes()).context("writing history")?;
        fs::rename(&tmp, &self.path).context("replacing history file")?;
        Ok(())
    }
}
