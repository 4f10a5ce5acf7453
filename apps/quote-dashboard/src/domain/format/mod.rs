//! Display Formatting
//!
//! Pure number formatters used by the formatted dashboard nodes.
//!
//! | Format   | Pattern       | Example        |
//! |----------|---------------|----------------|
//! | currency | `$0,0.00`     | `$1,234.50`    |
//! | decimal  | `0.00`        | `3.00`         |
//! | percent  | `0.00%`       | `3.06%`        |
//!
//! Values are rounded half away from zero at two decimal places. Non-finite
//! inputs render as `∞`, `-∞` or `NaN` so a present number never formats to
//! an absent string.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Number formatting contract for dashboard display strings.
pub trait NumberFormat: Send + Sync {
    /// Currency amount, e.g. `$1,234.50`.
    fn currency(&self, value: f64) -> String;

    /// Plain two-decimal number, e.g. `3.00`.
    fn decimal(&self, value: f64) -> String;

    /// Ratio rendered as a percentage, e.g. `0.0306` → `3.06%`.
    fn percent(&self, value: f64) -> String;
}

/// US dollar formatting.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsdFormat;

impl NumberFormat for UsdFormat {
    fn currency(&self, value: f64) -> String {
        let Some(rounded) = round_cents(value) else {
            return format!("${}", non_finite(value));
        };

        let text = format!("{:.2}", rounded.abs());
        let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };

        format!("{sign}${}.{frac_part}", group_thousands(int_part))
    }

    fn decimal(&self, value: f64) -> String {
        round_cents(value).map_or_else(|| non_finite(value), |d| format!("{d:.2}"))
    }

    fn percent(&self, value: f64) -> String {
        Decimal::from_f64(value)
            .and_then(|d| d.checked_mul(Decimal::ONE_HUNDRED))
            .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
            .map_or_else(
                || format!("{}%", non_finite(value)),
                |d| format!("{d:.2}%"),
            )
    }
}

fn round_cents(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

fn non_finite(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "∞".to_string()
    } else if value == f64::NEG_INFINITY {
        "-∞".to_string()
    } else {
        // Finite but outside the decimal range.
        format!("{value:.2}")
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(101.0, "$101.00")]
    #[test_case(1234.5, "$1,234.50")]
    #[test_case(1_234_567.891, "$1,234,567.89")]
    #[test_case(0.0, "$0.00")]
    #[test_case(-42.1, "-$42.10")]
    #[test_case(999.999, "$1,000.00")]
    fn currency(value: f64, expected: &str) {
        assert_eq!(UsdFormat.currency(value), expected);
    }

    #[test_case(3.0, "3.00")]
    #[test_case(0.125, "0.13")]
    #[test_case(1234.5, "1234.50")]
    fn decimal(value: f64, expected: &str) {
        assert_eq!(UsdFormat.decimal(value), expected);
    }

    #[test_case(0.01, "1.00%")]
    #[test_case(3.0 / 98.0, "3.06%")]
    #[test_case(0.5, "50.00%")]
    #[test_case(0.0, "0.00%")]
    fn percent(value: f64, expected: &str) {
        assert_eq!(UsdFormat.percent(value), expected);
    }

    #[test]
    fn non_finite_values_render() {
        assert_eq!(UsdFormat.percent(f64::INFINITY), "∞%");
        assert_eq!(UsdFormat.percent(f64::NAN), "NaN%");
        assert_eq!(UsdFormat.decimal(f64::NEG_INFINITY), "-∞");
        assert_eq!(UsdFormat.currency(f64::INFINITY), "$∞");
    }

    #[test]
    fn grouping() {
        assert_eq!(group_thousands("1"), "1");
        assert_eq!(group_thousands("123"), "123");
        assert_eq!(group_thousands("1234"), "1,234");
        assert_eq!(group_thousands("123456"), "123,456");
        assert_eq!(group_thousands("1234567"), "1,234,567");
    }
}
