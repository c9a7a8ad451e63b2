//! The daily scrape pipeline: fetch -> parse -> store -> notify.
//!
//! Any fetch/parse/persist error aborts the run with zero rows written and is
//! reported through the failure notification. A notification error is logged
//! and never escalated; the data outcome of the run stands.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db;
use crate::notify::{Notifier, RunOutcome};
use crate::scraping::QuoteSource;
use crate::workbook;

/// Summary of one completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub trade_date: NaiveDate,
    /// Rows written to the store and to the workbook (always equal)
    pub rows: usize,
}

/// Execute one full run for `trade_date`.
///
/// On success the returned report carries the row count; on failure the error
/// is returned after the failure notification has been attempted.
pub async fn run_once(
    config: &Config,
    source: &dyn QuoteSource,
    notifier: Option<&dyn Notifier>,
    trade_date: NaiveDate,
) -> Result<RunReport> {
    info!("----- Daily scrape started for {} -----", trade_date);

    match fetch_and_store(config, source, trade_date).await {
        Ok(rows) => {
            let outcome = RunOutcome::Success { trade_date, rows };
            send_notification(notifier, &outcome).await;
            info!("Daily scrape completed successfully ({} rows)", rows);
            Ok(RunReport { trade_date, rows })
        }
        Err(e) => {
            let outcome = RunOutcome::Failure {
                trade_date,
                error: format!("{:#}", e),
            };
            error!("Daily scrape failed: {:#}", e);
            send_notification(notifier, &outcome).await;
            Err(e)
        }
    }
}

/// The data half of the run: everything that can abort it
async fn fetch_and_store(
    config: &Config,
    source: &dyn QuoteSource,
    trade_date: NaiveDate,
) -> Result<usize> {
    let quotes = source.fetch_quotes(trade_date).await?;
    info!("Parsed {} quotes", quotes.len());

    db::init_database(Some(config.db_path.clone()))?;
    let mut conn = db::open_db(Some(config.db_path.clone()))?;
    let stored = db::upsert_quotes(&mut conn, &quotes)
        .context("Failed to write quotes to the database")?;
    info!("Stored {} rows in {:?}", stored, config.db_path);

    let appended = workbook::append_quotes(&config.workbook_path, &quotes)
        .context("Failed to write quotes to the workbook")?;

    debug_assert_eq!(stored, appended);
    Ok(stored)
}

async fn send_notification(notifier: Option<&dyn Notifier>, outcome: &RunOutcome) {
    let Some(notifier) = notifier else {
        warn!("Notifications disabled (no email credentials configured)");
        return;
    };

    if let Err(e) = notifier.notify(outcome).await {
        // logged only, never escalated
        error!("Failed to send notification: {:#}", e);
    }
}
