//! Per-symbol price and volume metrics over the accumulated store.
//!
//! Mirrors the classic daily-quote dashboard set: daily percentage return,
//! 20-day moving average of the close, 20-day rolling volatility of the
//! daily returns, cumulative return since the first stored date, and 7-day
//! rolling mean volume. Rolling windows are trailing and shrink at the start
//! of the series rather than emitting empty leading values.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::db::DailyQuote;

const MA_WINDOW: usize = 20;
const VOLATILITY_WINDOW: usize = 20;
const VOLUME_WINDOW: usize = 7;

/// Metrics for one symbol on one date
#[derive(Debug, Clone, PartialEq)]
pub struct StatPoint {
    pub trade_date: NaiveDate,
    pub close: Decimal,
    pub volume: i64,
    /// None on the first stored date (no prior close)
    pub daily_return_pct: Option<f64>,
    pub ma_20: Decimal,
    /// Sample standard deviation of daily returns; None until two returns exist
    pub volatility_20: Option<f64>,
    /// None when the first stored close is zero
    pub cumulative_return_pct: Option<f64>,
    pub volume_ma_7: f64,
}

/// Date-ordered metric series for one symbol
#[derive(Debug, Clone)]
pub struct SymbolStats {
    pub symbol: String,
    pub points: Vec<StatPoint>,
}

impl SymbolStats {
    pub fn latest(&self) -> Option<&StatPoint> {
        self.points.last()
    }
}

/// Compute metric series for every symbol in the store.
///
/// Input must be ordered by (symbol, trade_date) ascending, which is what
/// `db::all_quotes` returns. Output preserves symbol order.
pub fn compute_stats(quotes: &[DailyQuote]) -> Vec<SymbolStats> {
    let mut stats: Vec<SymbolStats> = Vec::new();

    for quote in quotes {
        let start_new = stats
            .last()
            .map(|s| s.symbol != quote.symbol)
            .unwrap_or(true);
        if start_new {
            stats.push(SymbolStats {
                symbol: quote.symbol.clone(),
                points: Vec::new(),
            });
        }
        if let Some(current) = stats.last_mut() {
            push_point(current, quote);
        }
    }

    stats
}

/// Extend a symbol's series with one more quote, computing its metrics from
/// the points already present.
fn push_point(series: &mut SymbolStats, quote: &DailyQuote) {
    let closes: Vec<Decimal> = series.points.iter().map(|p| p.close).collect();

    let daily_return_pct = closes.last().and_then(|prev| pct_change(*prev, quote.closing_price));

    let mut window_closes: Vec<Decimal> = closes
        .iter()
        .rev()
        .take(MA_WINDOW - 1)
        .cloned()
        .collect();
    window_closes.push(quote.closing_price);
    let ma_20 = decimal_mean(&window_closes);

    let mut returns: Vec<f64> = series
        .points
        .iter()
        .filter_map(|p| p.daily_return_pct)
        .collect();
    if let Some(r) = daily_return_pct {
        returns.push(r);
    }
    let window_start = returns.len().saturating_sub(VOLATILITY_WINDOW);
    let volatility_20 = sample_std_dev(&returns[window_start..]);

    let first_close = closes.first().copied().unwrap_or(quote.closing_price);
    let cumulative_return_pct = pct_change(first_close, quote.closing_price);

    let mut window_volumes: Vec<i64> = series
        .points
        .iter()
        .rev()
        .take(VOLUME_WINDOW - 1)
        .map(|p| p.volume)
        .collect();
    window_volumes.push(quote.volume);
    let volume_ma_7 =
        window_volumes.iter().map(|v| *v as f64).sum::<f64>() / window_volumes.len() as f64;

    series.points.push(StatPoint {
        trade_date: quote.trade_date,
        close: quote.closing_price,
        volume: quote.volume,
        daily_return_pct,
        ma_20,
        volatility_20,
        cumulative_return_pct,
        volume_ma_7,
    });
}

/// Percentage change from `base` to `value`; None when base is zero
fn pct_change(base: Decimal, value: Decimal) -> Option<f64> {
    if base.is_zero() {
        return None;
    }
    ((value - base) / base * Decimal::ONE_HUNDRED).to_f64()
}

fn decimal_mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = values.iter().sum();
    sum / Decimal::from(values.len())
}

/// Sample standard deviation (n - 1 denominator); None below two samples
fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(day: u32, symbol: &str, price: Decimal, volume: i64) -> DailyQuote {
        DailyQuote::new(
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            symbol,
            price,
            volume,
        )
    }

    #[test]
    fn test_single_point_series() {
        let stats = compute_stats(&[quote(10, "AIRTEL", dec!(120.50), 3400)]);

        assert_eq!(stats.len(), 1);
        let point = stats[0].latest().unwrap();
        assert_eq!(point.daily_return_pct, None);
        assert_eq!(point.ma_20, dec!(120.50));
        assert_eq!(point.volatility_20, None);
        assert_eq!(point.cumulative_return_pct, Some(0.0));
        assert_eq!(point.volume_ma_7, 3400.0);
    }

    #[test]
    fn test_daily_return_and_cumulative_return() {
        let stats = compute_stats(&[
            quote(10, "AIRTEL", dec!(100.00), 1000),
            quote(11, "AIRTEL", dec!(110.00), 2000),
            quote(12, "AIRTEL", dec!(99.00), 3000),
        ]);

        let points = &stats[0].points;
        assert_eq!(points[0].daily_return_pct, None);
        assert!((points[1].daily_return_pct.unwrap() - 10.0).abs() < 1e-9);
        assert!((points[2].daily_return_pct.unwrap() - (-10.0)).abs() < 1e-9);

        assert!((points[1].cumulative_return_pct.unwrap() - 10.0).abs() < 1e-9);
        assert!((points[2].cumulative_return_pct.unwrap() - (-1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_moving_average_shrinks_at_series_start() {
        let stats = compute_stats(&[
            quote(10, "AIRTEL", dec!(100.00), 0),
            quote(11, "AIRTEL", dec!(200.00), 0),
        ]);

        let points = &stats[0].points;
        assert_eq!(points[0].ma_20, dec!(100.00));
        assert_eq!(points[1].ma_20, dec!(150.00));
    }

    #[test]
    fn test_volatility_needs_two_returns() {
        let stats = compute_stats(&[
            quote(10, "AIRTEL", dec!(100.00), 0),
            quote(11, "AIRTEL", dec!(110.00), 0),
            quote(12, "AIRTEL", dec!(121.00), 0),
        ]);

        let points = &stats[0].points;
        assert_eq!(points[0].volatility_20, None);
        assert_eq!(points[1].volatility_20, None);
        // two returns of exactly 10% each: zero spread
        assert!((points[2].volatility_20.unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_volume_moving_average_window() {
        let quotes: Vec<DailyQuote> = (1..=9)
            .map(|day| quote(day, "NBM", dec!(100.00), day as i64 * 100))
            .collect();
        let stats = compute_stats(&quotes);

        let points = &stats[0].points;
        // day 3: mean of 100, 200, 300
        assert!((points[2].volume_ma_7 - 200.0).abs() < 1e-9);
        // day 9: trailing 7 days = 300..=900
        assert!((points[8].volume_ma_7 - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_symbols_split_into_separate_series() {
        let stats = compute_stats(&[
            quote(10, "AIRTEL", dec!(120.50), 3400),
            quote(11, "AIRTEL", dec!(121.00), 1200),
            quote(10, "NBM", dec!(5400.00), 120),
        ]);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].symbol, "AIRTEL");
        assert_eq!(stats[0].points.len(), 2);
        assert_eq!(stats[1].symbol, "NBM");
        assert_eq!(stats[1].points.len(), 1);
    }

    #[test]
    fn test_zero_base_close_has_no_returns() {
        let stats = compute_stats(&[
            quote(10, "ZERO", dec!(0.00), 0),
            quote(11, "ZERO", dec!(5.00), 10),
        ]);

        let points = &stats[0].points;
        assert_eq!(points[0].cumulative_return_pct, None);
        assert_eq!(points[1].daily_return_pct, None);
        assert_eq!(points[1].cumulative_return_pct, None);
    }
}
