//! Price Diff Primitive
//!
//! Signed delta and percent change between a baseline and a current price.
//!
//! No validation is applied. A zero baseline yields the IEEE-754 special
//! values for `change_percent` (`inf`, `-inf` or `NaN`); callers that must
//! display a number are responsible for special-casing them.

use serde::Serialize;

/// Direction of a price change. Zero change counts as positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "i8")]
pub enum Sign {
    /// `change >= 0`
    Positive,
    /// `change < 0`
    Negative,
}

impl Sign {
    /// `+1` or `-1`.
    #[must_use]
    pub const fn as_i8(self) -> i8 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }
}

impl From<Sign> for i8 {
    fn from(sign: Sign) -> Self {
        sign.as_i8()
    }
}

/// Result of [`diff`].
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceDiff {
    /// `current - baseline`
    pub change: f64,
    /// `|change|`
    pub absolute_change: f64,
    /// Direction of `change`
    pub sign: Sign,
    /// `change / baseline`
    pub change_percent: f64,
}

/// Structural equality. Floats compare by total order so a `NaN` percent
/// equals itself and re-delivering the same inputs is not seen as a change.
impl PartialEq for PriceDiff {
    fn eq(&self, other: &Self) -> bool {
        self.change.total_cmp(&other.change).is_eq()
            && self.absolute_change.total_cmp(&other.absolute_change).is_eq()
            && self.sign == other.sign
            && self.change_percent.total_cmp(&other.change_percent).is_eq()
    }
}

/// Compute the change from `baseline` to `current`.
#[must_use]
pub fn diff(baseline: f64, current: f64) -> PriceDiff {
    let change = current - baseline;

    PriceDiff {
        change,
        absolute_change: change.abs(),
        sign: if change >= 0.0 {
            Sign::Positive
        } else {
            Sign::Negative
        },
        change_percent: change / baseline,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn positive_change() {
        let d = diff(98.0, 101.0);
        assert_eq!(d.change, 3.0);
        assert_eq!(d.absolute_change, 3.0);
        assert_eq!(d.sign, Sign::Positive);
        assert_eq!(d.change_percent, 3.0 / 98.0);
    }

    #[test]
    fn negative_change() {
        let d = diff(100.0, 95.0);
        assert_eq!(d.change, -5.0);
        assert_eq!(d.absolute_change, 5.0);
        assert_eq!(d.sign, Sign::Negative);
        assert_eq!(d.sign.as_i8(), -1);
        assert_eq!(d.change_percent, -0.05);
    }

    #[test]
    fn zero_change_is_positive() {
        let d = diff(50.0, 50.0);
        assert_eq!(d.change, 0.0);
        assert_eq!(d.sign, Sign::Positive);
        assert_eq!(d.change_percent, 0.0);
    }

    #[test]
    fn zero_baseline_passes_through_ieee_values() {
        assert_eq!(diff(0.0, 5.0).change_percent, f64::INFINITY);
        assert_eq!(diff(0.0, -5.0).change_percent, f64::NEG_INFINITY);
        assert!(diff(0.0, 0.0).change_percent.is_nan());
    }

    #[test]
    fn nan_percent_diffs_compare_equal() {
        assert_eq!(diff(0.0, 0.0), diff(0.0, 0.0));
        assert_ne!(diff(0.0, 0.0), diff(0.0, 1.0));
    }

    #[test]
    fn sign_serializes_as_integer() {
        let json = serde_json::to_value(diff(10.0, 9.0)).unwrap();
        assert_eq!(json["sign"], -1);
        assert_eq!(json["absoluteChange"], 1.0);
    }

    proptest! {
        #[test]
        fn diff_matches_definition(
            a in -1.0e6f64..1.0e6,
            b in -1.0e6f64..1.0e6,
        ) {
            prop_assume!(a != 0.0);
            let d = diff(a, b);
            prop_assert_eq!(d.change, b - a);
            prop_assert_eq!(d.absolute_change, (b - a).abs());
            prop_assert_eq!(d.sign.as_i8(), if b >= a { 1 } else { -1 });
            prop_assert_eq!(d.change_percent, (b - a) / a);
        }
    }
}
