// tests/ingest_dedup.rs
use usstock_news_digest::ingest::providers::rss::FixtureFeedSource;
use usstock_news_digest::ingest::types::FeedSource;
use usstock_news_digest::ingest::FeedAggregator;

fn rss(items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link)| {
            format!("<item><title>{title}</title><link>{link}</link><description>d</description></item>")
        })
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel>{body}</channel></rss>"#)
}

#[tokio::test]
async fn case_insensitive_titles_collapse_across_sources() {
    let first = rss(&[
        ("Fed Holds Rates Steady", "https://a/1"),
        ("Oil rallies", "https://a/2"),
    ]);
    let second = rss(&[
        ("FED HOLDS RATES STEADY", "https://b/1"),
        ("Chipmakers slide", "https://b/2"),
    ]);

    let sources: Vec<Box<dyn FeedSource>> = vec![
        Box::new(FixtureFeedSource::new("Alpha Wire", first)),
        Box::new(FixtureFeedSource::new("Beta Wire", second)),
    ];
    let aggregator = FeedAggregator::new(sources, 12);
    let items = aggregator.collect().await;

    assert_eq!(items.len(), 3);
    // first-seen source order wins for the duplicate
    let fed = items
        .iter()
        .find(|i| i.title.eq_ignore_ascii_case("fed holds rates steady"))
        .unwrap();
    assert_eq!(fed.source, "Alpha Wire");
    assert_eq!(fed.link, "https://a/1");
}

#[tokio::test]
async fn a_broken_source_is_skipped_not_fatal() {
    let sources: Vec<Box<dyn FeedSource>> = vec![
        Box::new(FixtureFeedSource::new("Broken", "this is not xml")),
        Box::new(FixtureFeedSource::new("Good", rss(&[("Works", "https://g/1")]))),
    ];
    let aggregator = FeedAggregator::new(sources, 12);
    let items = aggregator.collect().await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source, "Good");
}
