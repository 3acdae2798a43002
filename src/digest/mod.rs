// src/digest/mod.rs
// Renders ranked topics into MarkdownV2 text and splits the result into
// ordered chunks that each fit the transport's payload limit. Topic blocks
// are atomic: a chunk never splits one mid-way, and header and footer are
// re-emitted on every chunk so each is independently renderable.

use chrono::{DateTime, FixedOffset};

use crate::curate::Topic;
use crate::rollup::monthly::MonthlyReport;

/// Default chunk ceiling, safely under Telegram's 4096-char message limit.
pub const DEFAULT_TRANSPORT_LIMIT: usize = 4000;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";

/// Which daily brief is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BriefKind {
    Morning,
    Evening,
}

/// Escape MarkdownV2-reserved punctuation in free text.
pub fn escape(text: &str) -> String {
    const RESERVED: &[char] = &[
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if RESERVED.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub struct DigestComposer {
    limit: usize,
}

impl DigestComposer {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Split rendered blocks into chunks under the limit. Header and footer
    /// go on every chunk; blocks are never split.
    fn chunk(&self, header: &str, blocks: &[String], footer: &str) -> Vec<String> {
        let assemble = |blocks: &[&str]| -> String {
            format!("{header}\n\n{}\n\n{footer}", blocks.join("\n\n"))
        };

        let all: Vec<&str> = blocks.iter().map(String::as_str).collect();
        let whole = assemble(&all);
        if char_len(&whole) <= self.limit {
            return vec![whole];
        }

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for block in all.iter().copied() {
            let mut candidate = current.clone();
            candidate.push(block);
            if !current.is_empty() && char_len(&assemble(&candidate)) > self.limit {
                chunks.push(assemble(&current));
                current = vec![block];
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            chunks.push(assemble(&current));
        }
        chunks
    }

    fn daily_block(topic: &Topic) -> String {
        let mut block = format!("{}\\. *{}*\n>{}", topic.rank, escape(&topic.title), escape(&topic.summary));
        if let Some(link) = &topic.link {
            block.push_str(&format!(" [source]({link})"));
        }
        block
    }

    pub fn compose_daily(
        &self,
        kind: BriefKind,
        topics: &[Topic],
        now: DateTime<FixedOffset>,
    ) -> Vec<String> {
        let (title, subtitle) = match kind {
            BriefKind::Morning => ("☀️ *US Stocks Morning Brief*", "key headlines after the US close"),
            BriefKind::Evening => ("🌙 *US Stocks Evening Brief*", "key headlines around the US open"),
        };
        let header = format!(
            "{title}\n_{subtitle}_\n\n📅 {}\n\n{RULE}",
            escape(&now.format("%Y-%m-%d %H:%M KST").to_string()),
        );
        let footer = format!("{RULE}\n{} curated headlines", topics.len());
        let blocks: Vec<String> = topics.iter().map(Self::daily_block).collect();
        self.chunk(&header, &blocks, &footer)
    }

    fn weekly_block(topic: &Topic) -> String {
        let mut block = format!("{}\\. *{}*\n>{}", topic.rank, escape(&topic.title), escape(&topic.summary));
        let mut info = Vec::new();
        if let Some(freq) = &topic.frequency {
            info.push(format!("📊 {}", escape(freq)));
        }
        if !topic.related_tickers.is_empty() {
            let symbols = topic.related_tickers[..topic.related_tickers.len().min(3)].join(", ");
            info.push(format!("tickers: {}", escape(&symbols)));
        }
        if !info.is_empty() {
            block.push_str(&format!("\n_{}_", info.join(" \\| ")));
        }
        block
    }

    pub fn compose_weekly(&self, topics: &[Topic], now: DateTime<FixedOffset>) -> Vec<String> {
        let header = format!(
            "🔥 *Weekly Hot Topics TOP {}*\n_the week's most talked\\-about issues_\n\n📅 {}\n\n{RULE}",
            topics.len(),
            escape(&now.format("%Y-%m-%d").to_string()),
        );
        let footer = format!(
            "{RULE}\n📌 forum mentions \\+ search trends \\+ model analysis\n🔄 compiled from the past 7 days"
        );
        let blocks: Vec<String> = topics.iter().map(Self::weekly_block).collect();
        self.chunk(&header, &blocks, &footer)
    }

    fn monthly_block(topic: &Topic) -> String {
        let mut block = format!("{}\\. *{}*\n>{}", topic.rank, escape(&topic.title), escape(&topic.summary));
        let mut info = Vec::new();
        if let Some(impact) = &topic.impact {
            let emoji = if impact.eq_ignore_ascii_case("high") { "🔴" } else { "🟡" };
            info.push(format!("{emoji} {}", escape(&impact.to_uppercase())));
        }
        if !topic.related_tickers.is_empty() {
            let symbols = topic.related_tickers[..topic.related_tickers.len().min(3)].join(", ");
            info.push(format!("tickers: {}", escape(&symbols)));
        }
        if !info.is_empty() {
            block.push_str(&format!("\n_{}_", info.join(" \\| ")));
        }
        if let Some(outlook) = &topic.outlook {
            block.push_str(&format!("\n💡 _{}_", escape(outlook)));
        }
        block
    }

    pub fn compose_monthly(&self, report: &MonthlyReport, now: DateTime<FixedOffset>) -> Vec<String> {
        let header = format!(
            "📅 *{} Monthly Hot Topics TOP {}*\n_the month's defining issues_\n\n📝 {}\n📊 market mood: {}\n\n{RULE}",
            escape(&now.format("%Y-%m").to_string()),
            report.topics.len(),
            escape(&report.summary),
            escape(&report.market_mood),
        );
        let footer = format!(
            "{RULE}\n📌 monthly deep\\-dive analysis\n🔄 compiled from the past 30 days"
        );
        let blocks: Vec<String> = report.topics.iter().map(Self::monthly_block).collect();
        self.chunk(&header, &blocks, &footer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kst_now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 8, 8, 8, 0, 0)
            .unwrap()
    }

    fn topic(rank: u32, title: &str) -> Topic {
        let mut t = Topic::ranked(rank, title, "summary text", 90);
        t.link = Some(format!("https://e/{rank}"));
        t.source = Some("Wire".into());
        t
    }

    #[test]
    fn reserved_punctuation_is_escaped() {
        assert_eq!(escape("a.b!c-d (e)"), "a\\.b\\!c\\-d \\(e\\)");
        assert_eq!(escape("plain text"), "plain text");
    }

    #[test]
    fn short_digest_is_a_single_chunk() {
        let composer = DigestComposer::new(DEFAULT_TRANSPORT_LIMIT);
        let topics = vec![topic(1, "One"), topic(2, "Two")];
        let chunks = composer.compose_daily(BriefKind::Morning, &topics, kst_now());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("Morning Brief"));
        assert!(chunks[0].contains("1\\. *One*"));
        assert!(chunks[0].contains("[source](https://e/1)"));
    }

    #[test]
    fn long_digest_chunks_reconstruct_in_rank_order() {
        // A tight limit forces one topic per chunk.
        let composer = DigestComposer::new(350);
        let topics: Vec<Topic> = (1..=3)
            .map(|i| {
                let mut t = topic(i, &format!("Topic number {i}"));
                t.summary = "long summary ".repeat(8);
                t
            })
            .collect();
        let chunks = composer.compose_daily(BriefKind::Evening, &topics, kst_now());
        assert_eq!(chunks.len(), 3);

        for chunk in &chunks {
            assert!(chunk.chars().count() <= 350);
            // header and footer on every chunk
            assert!(chunk.contains("Evening Brief"));
            assert!(chunk.contains("curated headlines"));
        }
        // topic order across chunks equals rank order
        let joined = chunks.join("\n");
        let p1 = joined.find("Topic number 1").unwrap();
        let p2 = joined.find("Topic number 2").unwrap();
        let p3 = joined.find("Topic number 3").unwrap();
        assert!(p1 < p2 && p2 < p3);
    }

    #[test]
    fn oversize_block_still_gets_its_own_chunk() {
        let composer = DigestComposer::new(100);
        let mut big = topic(1, "Big");
        big.summary = "x".repeat(400);
        let chunks = composer.compose_daily(BriefKind::Morning, &[big], kst_now());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("Big"));
    }

    #[test]
    fn weekly_blocks_carry_metadata_line() {
        let composer = DigestComposer::new(DEFAULT_TRANSPORT_LIMIT);
        let mut t = Topic::ranked(1, "AI theme", "hot all week", 95);
        t.frequency = Some("seen 4 days".into());
        t.related_tickers = vec!["NVDA".into(), "AMD".into(), "TSM".into(), "AVGO".into()];
        let chunks = composer.compose_weekly(&[t], kst_now());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("📊 seen 4 days"));
        // at most three tickers are shown
        assert!(chunks[0].contains("NVDA, AMD, TSM"));
        assert!(!chunks[0].contains("AVGO"));
    }

    #[test]
    fn monthly_header_carries_summary_and_mood() {
        let composer = DigestComposer::new(DEFAULT_TRANSPORT_LIMIT);
        let mut t = Topic::ranked(1, "Rate path", "the story of the month", 92);
        t.impact = Some("high".into());
        t.outlook = Some("likely to continue".into());
        let report = MonthlyReport {
            summary: "A month of rate repricing.".into(),
            market_mood: "cautious".into(),
            topics: vec![t],
        };
        let chunks = composer.compose_monthly(&report, kst_now());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("2025\\-08 Monthly Hot Topics"));
        assert!(chunks[0].contains("market mood: cautious"));
        assert!(chunks[0].contains("🔴 HIGH"));
        assert!(chunks[0].contains("💡 _likely to continue_"));
    }
}
