// src/rollup/mod.rs
pub mod monthly;
pub mod social;
pub mod weekly;

use crate::history::HistoryRecord;
use crate::ingest::truncate_chars;

/// Enumerated history listing fed to the rollup ranking requests.
pub(crate) fn history_block(records: &[HistoryRecord], cap: usize) -> String {
    records
        .iter()
        .take(cap)
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[{}] {}\nsummary: {}\nsent: {}",
                i + 1,
                r.title,
                truncate_chars(&r.summary, 200),
                r.sent_at.format("%Y-%m-%d")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
