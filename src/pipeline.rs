// src/pipeline.rs
// Wires one digest cycle end to end. Nothing here returns an error: every
// stage degrades to fewer (or zero) results and the next scheduled cycle
// runs independently.

use chrono::Utc;
use std::sync::Arc;

use crate::ai::{OpenAiClient, SharedCapability};
use crate::config::AppConfig;
use crate::curate::dedup::SemanticDeduplicator;
use crate::curate::select::Curator;
use crate::digest::{BriefKind, DigestComposer};
use crate::history::HistoryStore;
use crate::ingest::providers::rss::RssFeedSource;
use crate::ingest::types::FeedSource;
use crate::ingest::FeedAggregator;
use crate::notify::TelegramNotifier;
use crate::rollup::monthly::MonthlyRollup;
use crate::rollup::social::{InterestSource, MentionSource, RedditMentions, TrendsInterest};
use crate::rollup::weekly::WeeklyRollup;
use crate::scheduler::kst;

pub struct Pipeline {
    aggregator: FeedAggregator,
    dedup: SemanticDeduplicator,
    curator: Curator,
    weekly: WeeklyRollup,
    monthly: MonthlyRollup,
    composer: DigestComposer,
    notifier: TelegramNotifier,
    history: HistoryStore,
    header_image_url: Option<String>,
}

impl Pipeline {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let ai: SharedCapability = Arc::new(OpenAiClient::new(&cfg.openai_api_key));

        let sources: Vec<Box<dyn FeedSource>> = cfg
            .feeds
            .iter()
            .map(|f| Box::new(RssFeedSource::new(&f.name, &f.url)) as Box<dyn FeedSource>)
            .collect();

        let mentions: Option<Arc<dyn MentionSource>> =
            match (&cfg.reddit_client_id, &cfg.reddit_client_secret) {
                (Some(id), Some(secret)) => Some(Arc::new(
                    RedditMentions::new(id, secret).with_subreddit(&cfg.subreddit),
                )),
                _ => {
                    tracing::info!("no forum credentials, weekly rollup runs without mentions");
                    None
                }
            };
        let interest: Option<Arc<dyn InterestSource>> = Some(Arc::new(TrendsInterest::new()));

        Self {
            aggregator: FeedAggregator::new(sources, cfg.window_hours),
            dedup: SemanticDeduplicator::new(ai.clone(), &cfg.brief_model),
            curator: Curator::new(ai.clone(), &cfg.brief_model, &cfg.locale, cfg.top_n),
            weekly: WeeklyRollup::new(
                ai.clone(),
                &cfg.rollup_model,
                &cfg.locale,
                mentions,
                interest,
            ),
            monthly: MonthlyRollup::new(ai, &cfg.rollup_model, &cfg.locale),
            composer: DigestComposer::new(cfg.transport_limit),
            notifier: TelegramNotifier::new(&cfg.telegram_token, cfg.telegram_chat_ids.clone()),
            history: HistoryStore::new(&cfg.history_path, cfg.history_retention_days),
            header_image_url: cfg.header_image_url.clone(),
        }
    }

    /// One daily brief cycle: ingest, dedup against history, curate,
    /// compose, deliver, record. Returns the number of topics delivered.
    pub async fn run_daily(&self, kind: BriefKind) -> usize {
        let candidates = self.aggregator.collect().await;
        if candidates.is_empty() {
            tracing::info!("no news collected, skipping this cycle");
            return 0;
        }

        let history = self.history.load();
        let fresh = self.dedup.filter(candidates, &history).await;

        let topics = self.curator.select(&fresh).await;
        if topics.is_empty() {
            tracing::info!("no topics selected, skipping this cycle");
            return 0;
        }

        let chunks = self
            .composer
            .compose_daily(kind, &topics, Utc::now().with_timezone(&kst()));
        self.notifier
            .broadcast(&chunks, self.header_image_url.as_deref())
            .await;

        // One record per item handed to the delivery collaborator, with a
        // shared sent_at for the batch.
        if let Err(e) = self.history.append(&topics, Utc::now()) {
            tracing::warn!(error = ?e, "failed to record delivered news");
        }

        topics.len()
    }

    /// Weekly hot-topics cycle. Reads history only; nothing is appended.
    pub async fn run_weekly(&self) -> usize {
        let history = self.history.load();
        let topics = self.weekly.analyze(&history).await;
        if topics.is_empty() {
            tracing::info!("weekly rollup produced no topics, skipping");
            return 0;
        }
        let chunks = self
            .composer
            .compose_weekly(&topics, Utc::now().with_timezone(&kst()));
        self.notifier.broadcast(&chunks, None).await;
        topics.len()
    }

    /// Monthly hot-topics cycle. Reads history only; nothing is appended.
    pub async fn run_monthly(&self) -> usize {
        let history = self.history.load();
        let Some(report) = self.monthly.analyze(&history).await else {
            tracing::info!("monthly rollup produced no report, skipping");
            return 0;
        };
        let chunks = self
            .composer
            .compose_monthly(&report, Utc::now().with_timezone(&kst()));
        self.notifier.broadcast(&chunks, None).await;
        report.topics.len()
    }
}
