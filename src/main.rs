//! US Stock News Digest — Binary Entrypoint
//! Loads configuration, wires the curation pipeline, and runs the KST
//! scheduler loop. `--once <morning|evening|weekly|monthly>` runs a single
//! cycle and exits, which is handy for operations and smoke testing.

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use usstock_news_digest::digest::BriefKind;
use usstock_news_digest::{scheduler, AppConfig, Pipeline};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

// All external calls are sequential by design; one thread is all we need.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env().context("loading configuration")?;
    tracing::info!(
        feeds = cfg.feeds.len(),
        chats = cfg.telegram_chat_ids.len(),
        history = %cfg.history_path.display(),
        "configuration loaded"
    );

    let pipeline = Pipeline::from_config(&cfg);

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("--once") => {
            let cycle = args
                .next()
                .ok_or_else(|| anyhow!("--once requires a cycle: morning|evening|weekly|monthly"))?;
            let sent = match cycle.as_str() {
                "morning" => pipeline.run_daily(BriefKind::Morning).await,
                "evening" => pipeline.run_daily(BriefKind::Evening).await,
                "weekly" => pipeline.run_weekly().await,
                "monthly" => pipeline.run_monthly().await,
                other => return Err(anyhow!("unknown cycle {other:?}")),
            };
            tracing::info!(%cycle, sent, "one-shot cycle finished");
            Ok(())
        }
        Some(other) => Err(anyhow!("unknown argument {other:?}")),
        None => {
            scheduler::run(&pipeline, &cfg).await;
            Ok(())
        }
    }
}
