// Database module - SQLite connection and models

pub mod models;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

pub use models::DailyQuote;

/// Get the default database path (~/.msetrack/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let msetrack_dir = PathBuf::from(home).join(".msetrack");

    // Create directory if it doesn't exist
    std::fs::create_dir_all(&msetrack_dir).context("Failed to create .msetrack directory")?;

    Ok(msetrack_dir.join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = db_path.unwrap_or(get_default_db_path()?);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Initialize the database with schema
///
/// This function creates the database file and runs the schema SQL
/// to set up the daily_prices table and its index.
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = db_path.unwrap_or(get_default_db_path()?);

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;

    // Read schema SQL
    let schema_sql = include_str!("schema.sql");

    // Execute schema
    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")?;

    info!("Database initialized successfully");
    Ok(())
}

/// Upsert a quote keyed by (trade_date, symbol).
///
/// Re-running the same date overwrites price and volume, so a repeated run
/// with identical input leaves the table unchanged.
pub fn upsert_quote(conn: &Connection, quote: &DailyQuote) -> Result<i64> {
    conn.execute(
        "INSERT INTO daily_prices (trade_date, symbol, closing_price, volume)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (trade_date, symbol) DO UPDATE SET
             closing_price = excluded.closing_price,
             volume = excluded.volume",
        params![
            quote.trade_date,
            quote.symbol,
            quote.closing_price.to_string(),
            quote.volume,
        ],
    )?;

    let id: i64 = conn.query_row(
        "SELECT id FROM daily_prices WHERE trade_date = ?1 AND symbol = ?2",
        params![quote.trade_date, quote.symbol],
        |row| row.get(0),
    )?;

    Ok(id)
}

/// Upsert a full run's worth of quotes, returning the number written
pub fn upsert_quotes(conn: &mut Connection, quotes: &[DailyQuote]) -> Result<usize> {
    let tx = conn.transaction().context("Failed to start transaction")?;
    for quote in quotes {
        tx.execute(
            "INSERT INTO daily_prices (trade_date, symbol, closing_price, volume)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (trade_date, symbol) DO UPDATE SET
                 closing_price = excluded.closing_price,
                 volume = excluded.volume",
            params![
                quote.trade_date,
                quote.symbol,
                quote.closing_price.to_string(),
                quote.volume,
            ],
        )
        .with_context(|| format!("Failed to upsert quote for {}", quote.symbol))?;
    }
    tx.commit().context("Failed to commit quote batch")?;

    Ok(quotes.len())
}

type RawQuoteRow = (i64, NaiveDate, String, String, i64, chrono::DateTime<chrono::Utc>);

fn quote_from_row(row: &Row) -> rusqlite::Result<RawQuoteRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn build_quote(raw: RawQuoteRow) -> Result<DailyQuote> {
    let (id, trade_date, symbol, price_str, volume, created_at) = raw;
    let closing_price = Decimal::from_str(&price_str)
        .with_context(|| format!("Invalid stored price '{}' for {}", price_str, symbol))?;

    Ok(DailyQuote {
        id: Some(id),
        trade_date,
        symbol,
        closing_price,
        volume,
        created_at,
    })
}

const QUOTE_COLUMNS: &str = "id, trade_date, symbol, closing_price, volume, created_at";

/// Fetch all quotes for a trading date, ordered by symbol
pub fn quotes_for_date(conn: &Connection, date: NaiveDate) -> Result<Vec<DailyQuote>> {
    let sql = format!(
        "SELECT {} FROM daily_prices WHERE trade_date = ?1 ORDER BY symbol",
        QUOTE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![date])?;

    let mut quotes = Vec::new();
    while let Some(row) = rows.next()? {
        quotes.push(build_quote(quote_from_row(row)?)?);
    }

    Ok(quotes)
}

/// Fetch every stored quote for a symbol, date-ascending
pub fn quotes_for_symbol(conn: &Connection, symbol: &str) -> Result<Vec<DailyQuote>> {
    let sql = format!(
        "SELECT {} FROM daily_prices WHERE symbol = ?1 ORDER BY trade_date",
        QUOTE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![symbol])?;

    let mut quotes = Vec::new();
    while let Some(row) = rows.next()? {
        quotes.push(build_quote(quote_from_row(row)?)?);
    }

    Ok(quotes)
}

/// Fetch the whole store, ordered by (symbol, trade_date) for analysis
pub fn all_quotes(conn: &Connection) -> Result<Vec<DailyQuote>> {
    let sql = format!(
        "SELECT {} FROM daily_prices ORDER BY symbol, trade_date",
        QUOTE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;

    let mut quotes = Vec::new();
    while let Some(row) = rows.next()? {
        quotes.push(build_quote(quote_from_row(row)?)?);
    }

    Ok(quotes)
}

/// Most recent trade date in the store, if any
pub fn latest_trade_date(conn: &Connection) -> Result<Option<NaiveDate>> {
    let date: Option<NaiveDate> = conn
        .query_row("SELECT MAX(trade_date) FROM daily_prices", [], |row| {
            row.get(0)
        })
        .optional()?
        .flatten();

    Ok(date)
}

/// Count rows stored for a trading date
pub fn count_for_date(conn: &Connection, date: NaiveDate) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM daily_prices WHERE trade_date = ?1",
        params![date],
        |row| row.get(0),
    )?;

    Ok(count)
}
