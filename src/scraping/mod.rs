// Web scraping module for the MSE mainboard page
//
// One HTTP GET of the published mainboard listing, then HTML table
// extraction. The page renders a single quote table whose header names the
// columns; rows are mapped by header text so column reordering on the site
// does not break the parse.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::db::DailyQuote;
use crate::error::ScrapeError;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; msetrack/0.1)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A source of one day's quote listing.
///
/// The production implementation scrapes the MSE site; tests substitute
/// in-memory sources so the pipeline runs without network.
#[async_trait]
pub trait QuoteSource {
    async fn fetch_quotes(&self, trade_date: NaiveDate) -> Result<Vec<DailyQuote>>;
}

/// Scraper for the MSE mainboard listing
pub struct MseScraper {
    client: Client,
    url: String,
}

impl MseScraper {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Fetch the raw mainboard page body
    async fn fetch_page(&self) -> Result<String> {
        info!("Fetching MSE mainboard from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ScrapeError::Fetch(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Fetch(format!(
                "mainboard returned status {}",
                status
            ))
            .into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::Fetch(format!("failed to read response body: {}", e)))?;

        debug!("Fetched {} bytes", body.len());
        Ok(body)
    }
}

#[async_trait]
impl QuoteSource for MseScraper {
    async fn fetch_quotes(&self, trade_date: NaiveDate) -> Result<Vec<DailyQuote>> {
        let body = self.fetch_page().await?;
        let quotes = parse_mainboard(&body, trade_date)?;
        info!("Fetched {} quotes from MSE", quotes.len());
        Ok(quotes)
    }
}

/// Column indexes resolved from the table header row
#[derive(Debug, Clone)]
struct ColumnMapping {
    symbol: Option<usize>,
    price: Option<usize>,
    volume: Option<usize>,
}

impl ColumnMapping {
    /// Create column mapping by scanning header cell text
    fn from_header(header: &[String]) -> Self {
        let mut mapping = ColumnMapping {
            symbol: None,
            price: None,
            volume: None,
        };

        for (idx, cell) in header.iter().enumerate() {
            let text = cell.to_lowercase();

            if mapping.symbol.is_none()
                && (text.contains("counter") || text.contains("symbol") || text.contains("ticker"))
            {
                mapping.symbol = Some(idx);
            }

            // Prefer an explicit closing-price column over generic "price"
            if text.contains("clos") {
                mapping.price = Some(idx);
            } else if mapping.price.is_none() && text.contains("price") {
                mapping.price = Some(idx);
            }

            if mapping.volume.is_none() && text.contains("volume") {
                mapping.volume = Some(idx);
            }
        }

        mapping
    }
}

/// Parse the mainboard page body into quote records.
///
/// Order-preserving: records come out in page row order. Missing table,
/// missing required columns, or unparseable numeric cells are parse errors;
/// rows are never silently skipped.
pub fn parse_mainboard(html: &str, trade_date: NaiveDate) -> Result<Vec<DailyQuote>> {
    let document = Html::parse_document(html);

    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let header_cell_sel = selector("th, td")?;
    let cell_sel = selector("td")?;

    let table = document.select(&table_sel).next().ok_or_else(|| {
        ScrapeError::Parse("no table found on the page; the site may have changed".to_string())
    })?;

    let mut rows = table.select(&row_sel);

    let header_row = rows
        .next()
        .ok_or_else(|| ScrapeError::Parse("quote table has no rows".to_string()))?;
    let header: Vec<String> = header_row
        .select(&header_cell_sel)
        .map(cell_text)
        .collect();

    let mapping = ColumnMapping::from_header(&header);
    let symbol_col = mapping.symbol.ok_or_else(|| {
        ScrapeError::Parse(format!("no symbol column in header {:?}", header))
    })?;
    let price_col = mapping.price.ok_or_else(|| {
        ScrapeError::Parse(format!("no closing price column in header {:?}", header))
    })?;
    let volume_col = mapping.volume.ok_or_else(|| {
        ScrapeError::Parse(format!("no volume column in header {:?}", header))
    })?;

    let mut quotes = Vec::new();

    for row in rows {
        let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
        if cells.is_empty() {
            // header rows inside tbody render as all-<th>; skip them
            continue;
        }

        let symbol = cells
            .get(symbol_col)
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ScrapeError::Parse(format!("row missing symbol cell: {:?}", cells)))?;

        let price_raw = cells
            .get(price_col)
            .ok_or_else(|| ScrapeError::Parse(format!("{}: missing price cell", symbol)))?;
        let closing_price = parse_price(price_raw)
            .ok_or_else(|| ScrapeError::Parse(format!("{}: bad price '{}'", symbol, price_raw)))?;

        let volume_raw = cells
            .get(volume_col)
            .ok_or_else(|| ScrapeError::Parse(format!("{}: missing volume cell", symbol)))?;
        let volume = parse_volume(volume_raw)
            .ok_or_else(|| ScrapeError::Parse(format!("{}: bad volume '{}'", symbol, volume_raw)))?;

        quotes.push(DailyQuote::new(trade_date, &symbol, closing_price, volume));
    }

    if quotes.is_empty() {
        return Err(ScrapeError::Parse("quote table has no data rows".to_string()).into());
    }

    Ok(quotes)
}

fn selector(spec: &str) -> Result<Selector> {
    Selector::parse(spec).map_err(|e| ScrapeError::Parse(format!("selector '{}': {}", spec, e)).into())
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Strip thousands separators and the MWK/MK currency prefix, then parse
fn parse_price(raw: &str) -> Option<Decimal> {
    let cleaned = raw
        .trim()
        .trim_start_matches("MWK")
        .trim_start_matches("MK")
        .replace(',', "")
        .trim()
        .to_string();

    Decimal::from_str(&cleaned).ok()
}

/// Volume cells use thousands separators; a dash means no trades
fn parse_volume(raw: &str) -> Option<i64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() || cleaned == "-" {
        return Some(0);
    }

    Decimal::from_str(&cleaned).ok().and_then(|d| d.to_i64())
}
