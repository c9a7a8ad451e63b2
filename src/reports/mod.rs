// Reports module - offline analysis over the accumulated quote store

pub mod analysis;

pub use analysis::{compute_stats, StatPoint, SymbolStats};

use anyhow::{Context, Result};
use rust_decimal::prelude::ToPrimitive;
use std::path::Path;

use crate::error::ScrapeError;

pub const ANALYSIS_SHEET_NAME: &str = "Analysis";

/// Export the full per-symbol series to a workbook, one row per
/// (symbol, date), mirroring the columns of the terminal report.
pub fn export_stats(path: &Path, stats: &[SymbolStats]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(ANALYSIS_SHEET_NAME)
        .map_err(|e| ScrapeError::Persistence(format!("cannot name worksheet: {}", e)))?;

    let headers = [
        "Symbol",
        "Date",
        "Close",
        "Daily Return %",
        "MA 20",
        "Volatility 20",
        "Cumulative Return %",
        "Volume MA 7",
    ];
    for (col, header) in headers.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .map_err(|e| ScrapeError::Persistence(format!("cannot write header: {}", e)))?;
    }

    let mut r: u32 = 1;
    for symbol_stats in stats {
        for point in &symbol_stats.points {
            let close = point.close.to_f64().ok_or_else(|| {
                ScrapeError::Persistence(format!("{}: close out of range", symbol_stats.symbol))
            })?;
            let ma_20 = point.ma_20.to_f64().ok_or_else(|| {
                ScrapeError::Persistence(format!("{}: ma_20 out of range", symbol_stats.symbol))
            })?;

            worksheet
                .write_string(r, 0, &symbol_stats.symbol)
                .and_then(|ws| ws.write_string(r, 1, point.trade_date.format("%Y-%m-%d").to_string()))
                .and_then(|ws| ws.write_number(r, 2, close))
                .and_then(|ws| match point.daily_return_pct {
                    Some(v) => ws.write_number(r, 3, v),
                    None => Ok(ws),
                })
                .and_then(|ws| ws.write_number(r, 4, ma_20))
                .and_then(|ws| match point.volatility_20 {
                    Some(v) => ws.write_number(r, 5, v),
                    None => Ok(ws),
                })
                .and_then(|ws| match point.cumulative_return_pct {
                    Some(v) => ws.write_number(r, 6, v),
                    None => Ok(ws),
                })
                .and_then(|ws| ws.write_number(r, 7, point.volume_ma_7))
                .map_err(|e| ScrapeError::Persistence(format!("cannot write row {}: {}", r, e)))?;
            r += 1;
        }
    }

    workbook
        .save(path)
        .map_err(|e| ScrapeError::Persistence(format!("cannot save workbook {:?}: {}", path, e)))?;

    Ok(())
}
