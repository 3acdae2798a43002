// src/scheduler.rs
// Fixed KST wall-clock loop: a 60-second tick fires the morning and evening
// briefs once per day each. Sunday mornings add the weekly rollup, the 1st
// of the month adds the monthly rollup. No catch-up and no retry; a missed
// cycle waits for the next scheduled one.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Weekday};
use std::time::Duration;

use crate::config::AppConfig;
use crate::digest::BriefKind;
use crate::pipeline::Pipeline;

/// Korea Standard Time, no DST.
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("valid fixed offset")
}

pub fn is_sunday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
}

pub fn is_first_of_month(date: NaiveDate) -> bool {
    date.day() == 1
}

/// Which slot, if any, fires at this wall-clock minute.
fn due_slot(now: DateTime<FixedOffset>, cfg: &AppConfig) -> Option<BriefKind> {
    let hhmm = now.format("%H:%M").to_string();
    if hhmm == cfg.morning_time {
        Some(BriefKind::Morning)
    } else if hhmm == cfg.evening_time {
        Some(BriefKind::Evening)
    } else {
        None
    }
}

pub struct Scheduler {
    last_morning: Option<NaiveDate>,
    last_evening: Option<NaiveDate>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            last_morning: None,
            last_evening: None,
        }
    }

    /// Returns the slot to fire now, marking it as done for today.
    pub fn take_due(&mut self, now: DateTime<FixedOffset>, cfg: &AppConfig) -> Option<BriefKind> {
        let today = now.date_naive();
        match due_slot(now, cfg)? {
            BriefKind::Morning if self.last_morning != Some(today) => {
                self.last_morning = Some(today);
                Some(BriefKind::Morning)
            }
            BriefKind::Evening if self.last_evening != Some(today) => {
                self.last_evening = Some(today);
                Some(BriefKind::Evening)
            }
            _ => None,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocking scheduler loop; runs until the process is stopped.
pub async fn run(pipeline: &Pipeline, cfg: &AppConfig) {
    tracing::info!(
        morning = %cfg.morning_time,
        evening = %cfg.evening_time,
        "scheduler started (KST)"
    );

    let mut state = Scheduler::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(60));
    loop {
        ticker.tick().await;
        let now = chrono::Utc::now().with_timezone(&kst());
        let Some(kind) = state.take_due(now, cfg) else {
            continue;
        };

        let sent = pipeline.run_daily(kind).await;
        tracing::info!(?kind, sent, "daily brief cycle finished");

        if kind == BriefKind::Morning {
            let today = now.date_naive();
            if is_sunday(today) {
                tokio::time::sleep(Duration::from_secs(5)).await;
                let sent = pipeline.run_weekly().await;
                tracing::info!(sent, "weekly rollup cycle finished");
            }
            if is_first_of_month(today) {
                tokio::time::sleep(Duration::from_secs(10)).await;
                let sent = pipeline.run_monthly().await;
                tracing::info!(sent, "monthly rollup cycle finished");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cfg_times() -> AppConfig {
        AppConfig {
            telegram_token: "t".into(),
            telegram_chat_ids: vec!["-1".into()],
            openai_api_key: "k".into(),
            header_image_url: None,
            morning_time: "08:00".into(),
            evening_time: "22:00".into(),
            window_hours: 12,
            top_n: 10,
            locale: "Korean".into(),
            brief_model: "m".into(),
            rollup_model: "m".into(),
            history_path: "h.json".into(),
            history_retention_days: 30,
            transport_limit: 4000,
            reddit_client_id: None,
            reddit_client_secret: None,
            subreddit: "wallstreetbets".into(),
            feeds: Vec::new(),
        }
    }

    fn at(h: u32, m: u32) -> DateTime<FixedOffset> {
        kst().with_ymd_and_hms(2025, 8, 8, h, m, 0).unwrap()
    }

    #[test]
    fn calendar_helpers() {
        assert!(is_sunday(NaiveDate::from_ymd_opt(2025, 8, 10).unwrap()));
        assert!(!is_sunday(NaiveDate::from_ymd_opt(2025, 8, 8).unwrap()));
        assert!(is_first_of_month(NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()));
    }

    #[test]
    fn each_slot_fires_once_per_day() {
        let cfg = cfg_times();
        let mut s = Scheduler::new();
        assert_eq!(s.take_due(at(7, 59), &cfg), None);
        assert_eq!(s.take_due(at(8, 0), &cfg), Some(BriefKind::Morning));
        // same minute seen again by the next tick
        assert_eq!(s.take_due(at(8, 0), &cfg), None);
        assert_eq!(s.take_due(at(22, 0), &cfg), Some(BriefKind::Evening));
        assert_eq!(s.take_due(at(22, 0), &cfg), None);
    }

    #[test]
    fn slots_reset_on_a_new_day() {
        let cfg = cfg_times();
        let mut s = Scheduler::new();
        assert_eq!(s.take_due(at(8, 0), &cfg), Some(BriefKind::Morning));
        let next_day = kst().with_ymd_and_hms(2025, 8, 9, 8, 0, 0).unwrap();
        assert_eq!(s.take_due(next_day, &cfg), Some(BriefKind::Morning));
    }
}
