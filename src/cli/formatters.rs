//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of data calculation from presentation.

use chrono::NaiveDate;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::db::DailyQuote;
use crate::reports::SymbolStats;
use crate::utils::{format_price, format_volume};

/// Format one day's stored quotes as a terminal table
pub fn format_quotes_table(date: NaiveDate, quotes: &[DailyQuote]) -> String {
    #[derive(Tabled)]
    struct QuoteRow {
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Close (MK)")]
        close: String,
        #[tabled(rename = "Volume")]
        volume: String,
    }

    let rows: Vec<QuoteRow> = quotes
        .iter()
        .map(|q| QuoteRow {
            symbol: q.symbol.clone(),
            close: format_price(q.closing_price),
            volume: format_volume(q.volume),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    format!(
        "\n{} Quotes for {} ({} counters)\n\n{}\n",
        "📈".cyan().bold(),
        date,
        quotes.len(),
        table
    )
}

/// Format one day's stored quotes as JSON
pub fn format_quotes_json(date: NaiveDate, quotes: &[DailyQuote]) -> String {
    #[derive(Serialize)]
    struct JsonQuote {
        symbol: String,
        closing_price: String,
        volume: i64,
    }

    #[derive(Serialize)]
    struct JsonDay {
        trade_date: String,
        quotes: Vec<JsonQuote>,
    }

    let day = JsonDay {
        trade_date: date.to_string(),
        quotes: quotes
            .iter()
            .map(|q| JsonQuote {
                symbol: q.symbol.clone(),
                closing_price: q.closing_price.to_string(),
                volume: q.volume,
            })
            .collect(),
    };

    serde_json::to_string_pretty(&day)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Format the latest metric point per symbol as a terminal table
pub fn format_stats_table(stats: &[SymbolStats]) -> String {
    #[derive(Tabled)]
    struct StatRow {
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Close (MK)")]
        close: String,
        #[tabled(rename = "Return %")]
        daily_return: String,
        #[tabled(rename = "MA 20")]
        ma_20: String,
        #[tabled(rename = "Vol 20")]
        volatility: String,
        #[tabled(rename = "Cum %")]
        cumulative: String,
        #[tabled(rename = "Vol MA 7")]
        volume_ma: String,
    }

    let rows: Vec<StatRow> = stats
        .iter()
        .filter_map(|s| s.latest().map(|p| (s, p)))
        .map(|(s, p)| StatRow {
            symbol: s.symbol.clone(),
            date: p.trade_date.to_string(),
            close: format_price(p.close),
            daily_return: format_opt_pct(p.daily_return_pct),
            ma_20: format_price(p.ma_20),
            volatility: format_opt_pct(p.volatility_20),
            cumulative: format_opt_pct(p.cumulative_return_pct),
            volume_ma: format!("{:.0}", p.volume_ma_7),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    format!(
        "\n{} Symbol metrics ({} counters)\n\n{}\n",
        "📊".cyan().bold(),
        stats.len(),
        table
    )
}

/// Format the latest metric point per symbol as JSON
pub fn format_stats_json(stats: &[SymbolStats]) -> String {
    #[derive(Serialize)]
    struct JsonStat {
        symbol: String,
        trade_date: String,
        close: String,
        daily_return_pct: Option<f64>,
        ma_20: String,
        volatility_20: Option<f64>,
        cumulative_return_pct: Option<f64>,
        volume_ma_7: f64,
    }

    let rows: Vec<JsonStat> = stats
        .iter()
        .filter_map(|s| s.latest().map(|p| (s, p)))
        .map(|(s, p)| JsonStat {
            symbol: s.symbol.clone(),
            trade_date: p.trade_date.to_string(),
            close: p.close.to_string(),
            daily_return_pct: p.daily_return_pct,
            ma_20: p.ma_20.to_string(),
            volatility_20: p.volatility_20,
            cumulative_return_pct: p.cumulative_return_pct,
            volume_ma_7: p.volume_ma_7,
        })
        .collect();

    serde_json::to_string_pretty(&rows)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

fn format_opt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::compute_stats;
    use rust_decimal_macros::dec;

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    fn sample_quotes() -> Vec<DailyQuote> {
        vec![
            DailyQuote::new(sample_date(), "AIRTEL", dec!(120.50), 3400),
            DailyQuote::new(sample_date(), "NBM", dec!(5400.00), 120),
        ]
    }

    #[test]
    fn test_quotes_table_contains_values() {
        let output = format_quotes_table(sample_date(), &sample_quotes());

        assert!(output.contains("AIRTEL"));
        assert!(output.contains("120.50"));
        assert!(output.contains("3,400"));
        assert!(output.contains("5,400.00"));
        assert!(output.contains("2 counters"));
    }

    #[test]
    fn test_quotes_json_round_trips() {
        let output = format_quotes_json(sample_date(), &sample_quotes());
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["trade_date"], "2024-01-10");
        assert_eq!(parsed["quotes"][0]["symbol"], "AIRTEL");
        assert_eq!(parsed["quotes"][0]["closing_price"], "120.50");
        assert_eq!(parsed["quotes"][1]["volume"], 120);
    }

    #[test]
    fn test_stats_table_shows_latest_point() {
        let stats = compute_stats(&sample_quotes());
        let output = format_stats_table(&stats);

        assert!(output.contains("AIRTEL"));
        assert!(output.contains("NBM"));
        // single-point series: no daily return yet
        assert!(output.contains('-'));
    }
}
