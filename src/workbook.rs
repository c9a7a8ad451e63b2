//! Excel workbook output
//!
//! The workbook holds one sheet with every quote ever scraped, one row per
//! (date, symbol). xlsx files cannot be appended in place, so each run reads
//! the existing sheet back, merges the new rows in (new values win on a key
//! collision), and rewrites the file.

use anyhow::{Context, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::db::DailyQuote;
use crate::error::ScrapeError;

pub const SHEET_NAME: &str = "Daily Prices";
const HEADERS: [&str; 4] = ["Date", "Symbol", "Close", "Volume"];

/// One spreadsheet data row
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookRow {
    pub trade_date: NaiveDate,
    pub symbol: String,
    pub close: Decimal,
    pub volume: i64,
}

impl From<&DailyQuote> for WorkbookRow {
    fn from(quote: &DailyQuote) -> Self {
        Self {
            trade_date: quote.trade_date,
            symbol: quote.symbol.clone(),
            close: quote.closing_price,
            volume: quote.volume,
        }
    }
}

impl WorkbookRow {
    fn key(&self) -> (NaiveDate, String) {
        (self.trade_date, self.symbol.clone())
    }
}

/// Merge the run's quotes into the workbook, returning how many rows were
/// written for this run (the quote count, whether fresh or replaced).
pub fn append_quotes(path: &Path, quotes: &[DailyQuote]) -> Result<usize> {
    let mut rows = if path.exists() {
        read_rows(path)?
    } else {
        Vec::new()
    };

    let mut index: HashMap<(NaiveDate, String), usize> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| (row.key(), i))
        .collect();

    for quote in quotes {
        let row = WorkbookRow::from(quote);
        match index.get(&row.key()) {
            Some(&i) => rows[i] = row,
            None => {
                index.insert(row.key(), rows.len());
                rows.push(row);
            }
        }
    }

    write_rows(path, &rows)?;
    info!(
        "Saved workbook {:?} ({} rows total, {} from this run)",
        path,
        rows.len(),
        quotes.len()
    );

    Ok(quotes.len())
}

/// Read all data rows from the quotes sheet
pub fn read_rows(path: &Path) -> Result<Vec<WorkbookRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| ScrapeError::Persistence(format!("cannot open workbook {:?}: {}", path, e)))?;

    let range = workbook
        .worksheet_range(SHEET_NAME)
        .or_else(|_| {
            // older files may predate the sheet name; fall back to the first sheet
            let first = workbook.sheet_names().first().cloned();
            match first {
                Some(name) => workbook.worksheet_range(&name),
                None => Err(calamine::XlsxError::WorksheetNotFound(SHEET_NAME.to_string())),
            }
        })
        .map_err(|e| ScrapeError::Persistence(format!("cannot read workbook sheet: {}", e)))?;

    let mut rows = Vec::new();
    for (i, row) in range.rows().enumerate() {
        if i == 0 {
            continue; // header
        }
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }

        let trade_date = parse_date(row.first())
            .with_context(|| format!("workbook row {}: bad date", i + 1))?;
        let symbol = row
            .get(1)
            .map(|c| c.to_string().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ScrapeError::Persistence(format!("workbook row {}: empty symbol", i + 1)))?;
        let close = parse_decimal(row.get(2))
            .with_context(|| format!("workbook row {}: bad close", i + 1))?;
        let volume = parse_decimal(row.get(3))
            .with_context(|| format!("workbook row {}: bad volume", i + 1))?
            .to_i64()
            .ok_or_else(|| ScrapeError::Persistence(format!("workbook row {}: bad volume", i + 1)))?;

        rows.push(WorkbookRow {
            trade_date,
            symbol,
            close,
            volume,
        });
    }

    debug!("Read {} rows from workbook {:?}", rows.len(), path);
    Ok(rows)
}

/// Rewrite the workbook file with a header row plus the given rows
fn write_rows(path: &Path, rows: &[WorkbookRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(SHEET_NAME)
        .map_err(|e| ScrapeError::Persistence(format!("cannot name worksheet: {}", e)))?;

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .map_err(|e| ScrapeError::Persistence(format!("cannot write header: {}", e)))?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        let close = row.close.to_f64().ok_or_else(|| {
            ScrapeError::Persistence(format!("{}: close out of range", row.symbol))
        })?;

        worksheet
            .write_string(r, 0, row.trade_date.format("%Y-%m-%d").to_string())
            .and_then(|ws| ws.write_string(r, 1, &row.symbol))
            .and_then(|ws| ws.write_number(r, 2, close))
            .and_then(|ws| ws.write_number(r, 3, row.volume as f64))
            .map_err(|e| ScrapeError::Persistence(format!("cannot write row {}: {}", r, e)))?;
    }

    workbook
        .save(path)
        .map_err(|e| ScrapeError::Persistence(format!("cannot save workbook {:?}: {}", path, e)))?;

    Ok(())
}

/// Parse a date cell: string form preferred, Excel serial dates accepted
fn parse_date(cell: Option<&Data>) -> Result<NaiveDate> {
    let cell = cell.ok_or_else(|| anyhow::anyhow!("missing cell"))?;
    match cell {
        Data::DateTime(dt) => {
            let days_since_epoch = dt.as_f64().floor() as i64;
            let excel_epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
                .ok_or_else(|| anyhow::anyhow!("Invalid Excel epoch"))?;
            excel_epoch
                .checked_add_signed(chrono::Duration::days(days_since_epoch))
                .ok_or_else(|| anyhow::anyhow!("Date overflow"))
        }
        _ => {
            let date_str = cell.to_string();
            NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .with_context(|| format!("Could not parse date: {}", date_str))
        }
    }
}

/// Parse a numeric cell (number cells and plain string numbers)
fn parse_decimal(cell: Option<&Data>) -> Result<Decimal> {
    let cell = cell.ok_or_else(|| anyhow::anyhow!("missing cell"))?;
    match cell {
        Data::Int(i) => Ok(Decimal::from(*i)),
        Data::Float(f) => Decimal::from_f64_retain(*f)
            .map(|d| d.round_dp(6).normalize())
            .ok_or_else(|| anyhow::anyhow!("Invalid number: {}", f)),
        _ => {
            let text = cell.to_string().replace(',', "");
            Decimal::from_str(text.trim()).context("Failed to parse number")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    fn quote(date: NaiveDate, symbol: &str, price: Decimal, volume: i64) -> DailyQuote {
        DailyQuote::new(date, symbol, price, volume)
    }

    #[test]
    fn test_create_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mse_daily.xlsx");

        let quotes = vec![
            quote(sample_date(), "AIRTEL", dec!(120.50), 3400),
            quote(sample_date(), "NBM", dec!(5400.00), 120),
        ];
        let written = append_quotes(&path, &quotes).unwrap();
        assert_eq!(written, 2);

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "AIRTEL");
        assert_eq!(rows[0].close, dec!(120.50));
        assert_eq!(rows[0].volume, 3400);
        assert_eq!(rows[1].symbol, "NBM");
    }

    #[test]
    fn test_append_merges_across_dates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mse_daily.xlsx");
        let next_day = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();

        append_quotes(&path, &[quote(sample_date(), "AIRTEL", dec!(120.50), 3400)]).unwrap();
        append_quotes(&path, &[quote(next_day, "AIRTEL", dec!(121.00), 1200)]).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].trade_date, sample_date());
        assert_eq!(rows[1].trade_date, next_day);
    }

    #[test]
    fn test_rerun_same_date_does_not_duplicate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mse_daily.xlsx");
        let quotes = vec![quote(sample_date(), "AIRTEL", dec!(120.50), 3400)];

        append_quotes(&path, &quotes).unwrap();
        append_quotes(&path, &quotes).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_rerun_same_key_takes_latest_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mse_daily.xlsx");

        append_quotes(&path, &[quote(sample_date(), "AIRTEL", dec!(120.50), 3400)]).unwrap();
        append_quotes(&path, &[quote(sample_date(), "AIRTEL", dec!(121.00), 3500)]).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, dec!(121.00));
        assert_eq!(rows[0].volume, 3500);
    }
}
