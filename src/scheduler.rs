//! Daily scheduling: sleep until the configured wall-clock time, run the
//! pipeline, repeat. A failed run is not retried; the next day's run is the
//! retry mechanism.

use anyhow::Result;
use chrono::{DateTime, Local, NaiveTime, TimeZone};
use tracing::{info, warn};

use crate::config::Config;
use crate::notify::Notifier;
use crate::pipeline;
use crate::scraping::QuoteSource;

/// First occurrence of `run_time` strictly after `now`
pub fn next_run_after(now: DateTime<Local>, run_time: NaiveTime) -> DateTime<Local> {
    let mut date = now.date_naive();
    if now.time() >= run_time {
        date = date.succ_opt().unwrap_or(date);
    }

    let naive = date.and_time(run_time);
    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt,
        // DST gap/fold: take the earliest valid interpretation, or push an hour
        chrono::LocalResult::Ambiguous(earliest, _) => earliest,
        chrono::LocalResult::None => {
            let shifted = naive + chrono::Duration::hours(1);
            Local
                .from_local_datetime(&shifted)
                .earliest()
                .unwrap_or_else(Local::now)
        }
    }
}

/// Run the pipeline once per day at `config.run_time`.
///
/// With `immediate`, a run is also executed right away on startup. Run
/// failures are logged (and emailed by the pipeline) but do not stop the
/// loop.
pub async fn run_daily(
    config: &Config,
    source: &dyn QuoteSource,
    notifier: Option<&dyn Notifier>,
    immediate: bool,
) -> Result<()> {
    info!(
        "Scheduler started; scraper will run daily at {}",
        config.run_time.format("%H:%M")
    );

    if immediate {
        let trade_date = Local::now().date_naive();
        if let Err(e) = pipeline::run_once(config, source, notifier, trade_date).await {
            warn!("Startup run failed: {:#}", e);
        }
    }

    loop {
        let now = Local::now();
        let next = next_run_after(now, config.run_time);
        let wait = (next - now)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(0));
        info!("Next run scheduled for {}", next.format("%Y-%m-%d %H:%M"));

        tokio::time::sleep(wait).await;

        let trade_date = Local::now().date_naive();
        if let Err(e) = pipeline::run_once(config, source, notifier, trade_date).await {
            warn!("Scheduled run failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(h, min, 0)
                    .unwrap(),
            )
            .earliest()
            .unwrap()
    }

    fn four_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(16, 0, 0).unwrap()
    }

    #[test]
    fn test_before_run_time_schedules_today() {
        let now = local(2024, 1, 10, 9, 0);
        let next = next_run_after(now, four_pm());

        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(next.time(), four_pm());
    }

    #[test]
    fn test_after_run_time_schedules_tomorrow() {
        let now = local(2024, 1, 10, 16, 30);
        let next = next_run_after(now, four_pm());

        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
        assert_eq!(next.time(), four_pm());
    }

    #[test]
    fn test_exactly_at_run_time_schedules_tomorrow() {
        let now = local(2024, 1, 10, 16, 0);
        let next = next_run_after(now, four_pm());

        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
    }

    #[test]
    fn test_next_run_is_always_in_the_future() {
        let now = Local::now();
        let next = next_run_after(now, four_pm());
        assert!(next > now);
    }
}
