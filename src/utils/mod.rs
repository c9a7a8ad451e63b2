//! Utility functions for formatting and common operations
//!
//! Centralized formatting for kwacha amounts and share volumes so tables and
//! notifications render consistently.

use rust_decimal::Decimal;

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Include "MK " prefix (Malawian Kwacha)
    MWK,
    /// No currency symbol (for table cells)
    None,
}

/// Core formatting function with full control over output.
///
/// Formats a Decimal value with `,` thousands separators and two decimal
/// places.
///
/// # Examples
/// ```
/// use msetrack::utils::{format_amount_with_width, CurrencySymbol};
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let value = Decimal::from_str("1234.56").unwrap();
/// assert_eq!(
///     format_amount_with_width(value, 0, CurrencySymbol::MWK),
///     "MK 1,234.56"
/// );
/// ```
pub fn format_amount_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let is_negative = value < Decimal::ZERO;
    let abs_value = value.abs();

    let formatted = format!("{:.2}", abs_value);
    let parts: Vec<&str> = formatted.split('.').collect();

    let integer_part = parts[0];
    let decimal_part = parts.get(1).unwrap_or(&"00");

    let with_separators = group_thousands(integer_part);

    let sign = if is_negative { "-" } else { "" };
    let prefix = match symbol {
        CurrencySymbol::MWK => "MK ",
        CurrencySymbol::None => "",
    };

    let result = format!("{}{}{}.{}", prefix, sign, with_separators, decimal_part);

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Format as kwacha with symbol: "MK 1,234.56"
pub fn format_kwacha(value: Decimal) -> String {
    format_amount_with_width(value, 0, CurrencySymbol::MWK)
}

/// Format a price without symbol: "1,234.56"
pub fn format_price(value: Decimal) -> String {
    format_amount_with_width(value, 0, CurrencySymbol::None)
}

/// Format a share volume with thousands separators: "3,400"
pub fn format_volume(volume: i64) -> String {
    let sign = if volume < 0 { "-" } else { "" };
    format!("{}{}", sign, group_thousands(&volume.abs().to_string()))
}

fn group_thousands(digits: &str) -> String {
    digits
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_kwacha_basic() {
        assert_eq!(format_kwacha(dec!(1234.56)), "MK 1,234.56");
        assert_eq!(format_kwacha(dec!(0.99)), "MK 0.99");
        assert_eq!(format_kwacha(dec!(1000000)), "MK 1,000,000.00");
    }

    #[test]
    fn test_format_kwacha_negative() {
        assert_eq!(format_kwacha(dec!(-1234.56)), "MK -1,234.56");
        assert_eq!(format_kwacha(dec!(-0.01)), "MK -0.01");
    }

    #[test]
    fn test_format_price_no_symbol() {
        assert_eq!(format_price(dec!(120.50)), "120.50");
        assert_eq!(format_price(dec!(5400)), "5,400.00");
    }

    #[test]
    fn test_format_volume() {
        assert_eq!(format_volume(0), "0");
        assert_eq!(format_volume(120), "120");
        assert_eq!(format_volume(3400), "3,400");
        assert_eq!(format_volume(25000000), "25,000,000");
    }

    #[test]
    fn test_format_with_width_right_aligns() {
        let result = format_amount_with_width(dec!(100), 15, CurrencySymbol::MWK);
        assert_eq!(result.len(), 15);
        assert_eq!(result, "      MK 100.00");
    }

    #[test]
    fn test_format_with_width_no_padding_needed() {
        let result = format_amount_with_width(dec!(1000000), 5, CurrencySymbol::MWK);
        assert_eq!(result, "MK 1,000,000.00");
    }
}
