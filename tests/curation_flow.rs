// tests/curation_flow.rs
// Full cycle against fixtures and a scripted capability: ingest → semantic
// dedup → curation → composition. No network anywhere.

use chrono::Utc;
use std::sync::Arc;

use usstock_news_digest::ai::MockCapability;
use usstock_news_digest::curate::dedup::SemanticDeduplicator;
use usstock_news_digest::curate::select::Curator;
use usstock_news_digest::digest::{BriefKind, DigestComposer, DEFAULT_TRANSPORT_LIMIT};
use usstock_news_digest::history::HistoryRecord;
use usstock_news_digest::ingest::providers::rss::FixtureFeedSource;
use usstock_news_digest::ingest::types::FeedSource;
use usstock_news_digest::ingest::FeedAggregator;

fn fixture() -> String {
    let items: String = [
        ("Nvidia beats on earnings", "https://w/nvda"),
        ("Fed minutes strike dovish tone", "https://w/fed"),
        ("Oil spikes on supply fears", "https://w/oil"),
    ]
    .iter()
    .map(|(t, l)| format!("<item><title>{t}</title><link>{l}</link><description>body</description></item>"))
    .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel>{items}</channel></rss>"#)
}

#[tokio::test]
async fn a_digest_cycle_flows_end_to_end() {
    // 1. ingest
    let sources: Vec<Box<dyn FeedSource>> =
        vec![Box::new(FixtureFeedSource::new("Test Wire", fixture()))];
    let candidates = FeedAggregator::new(sources, 12).collect().await;
    assert_eq!(candidates.len(), 3);

    // 2. semantic dedup: the Fed story (index 2) was already delivered
    let history = vec![HistoryRecord {
        title: "Fed leaning dovish".into(),
        link: "https://old/fed".into(),
        summary: "minutes preview".into(),
        sent_at: Utc::now(),
    }];
    let dedup = SemanticDeduplicator::new(
        Arc::new(MockCapability::with_reply(
            r#"{"duplicate_news_numbers": [2]}"#,
        )),
        "test-model",
    );
    let fresh = dedup.filter(candidates, &history).await;
    assert_eq!(fresh.len(), 2);
    assert!(fresh.iter().all(|i| !i.title.contains("Fed")));

    // 3. curation: rank the remaining two
    let reply = r#"{"selected_news": [
        {"news_number": 1, "title": "Nvidia tops estimates", "summary": "Data center demand keeps climbing.", "importance_score": 96},
        {"news_number": 2, "title": "Crude jumps", "summary": "Supply risk repriced.", "importance_score": 74}
    ]}"#;
    let curator = Curator::new(
        Arc::new(MockCapability::with_reply(reply)),
        "test-model",
        "English",
        10,
    );
    let topics = curator.select(&fresh).await;
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[0].rank, 1);
    assert_eq!(topics[0].link.as_deref(), Some("https://w/nvda"));
    assert_eq!(topics[1].link.as_deref(), Some("https://w/oil"));

    // 4. composition
    let chunks = DigestComposer::new(DEFAULT_TRANSPORT_LIMIT).compose_daily(
        BriefKind::Morning,
        &topics,
        Utc::now().with_timezone(&usstock_news_digest::scheduler::kst()),
    );
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].contains("Nvidia tops estimates"));
    assert!(chunks[0].contains("[source](https://w/nvda)"));
    assert!(chunks[0].contains("2 curated headlines"));
}

#[tokio::test]
async fn a_ranking_outage_skips_the_cycle_quietly() {
    let sources: Vec<Box<dyn FeedSource>> =
        vec![Box::new(FixtureFeedSource::new("Test Wire", fixture()))];
    let candidates = FeedAggregator::new(sources, 12).collect().await;

    // dedup degrades to passthrough, curation degrades to empty
    let dedup = SemanticDeduplicator::new(Arc::new(MockCapability::failing()), "test-model");
    let fresh = dedup
        .filter(
            candidates,
            &[HistoryRecord {
                title: "old".into(),
                link: "l".into(),
                summary: "s".into(),
                sent_at: Utc::now(),
            }],
        )
        .await;
    assert_eq!(fresh.len(), 3);

    let curator = Curator::new(
        Arc::new(MockCapability::failing()),
        "test-model",
        "English",
        10,
    );
    let topics = curator.select(&fresh).await;
    assert!(topics.is_empty());
}
