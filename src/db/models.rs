use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One listed security's closing data for a single trading date.
///
/// Produced by the parser, written once, never mutated. All quotes from one
/// run share the same `trade_date`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyQuote {
    pub id: Option<i64>,
    pub trade_date: NaiveDate,
    pub symbol: String,
    pub closing_price: Decimal,
    pub volume: i64,
    pub created_at: DateTime<Utc>,
}

impl DailyQuote {
    pub fn new(trade_date: NaiveDate, symbol: &str, closing_price: Decimal, volume: i64) -> Self {
        Self {
            id: None,
            trade_date,
            symbol: symbol.to_string(),
            closing_price,
            volume,
            created_at: Utc::now(),
        }
    }
}
