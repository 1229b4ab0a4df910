//! # Money Module
//!
//! Sale prices as integer minor units.
//!
//! Registers carry prices as floats ("1250.5") or as text in whatever
//! locale the farmer uses ("1.250,50 €"). Both end up as cents here and are
//! stored as `sale_price_cents`.
//!
//! ## Usage
//! ```rust
//! use herd_core::money::Money;
//!
//! let price = Money::parse("1.250,50").unwrap();
//! assert_eq!(price.cents(), 125050);
//!
//! let price = Money::from_units_f64(99.999).unwrap();
//! assert_eq!(price.cents(), 10000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Major unit portion, truncated toward zero.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0 / 100
    }

    /// Minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Converts a spreadsheet float, rounding half away from zero.
    ///
    /// Returns `None` for NaN, infinities and values outside the i64 range.
    pub fn from_units_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let cents = (value * 100.0).round();
        if cents.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Money(cents as i64))
    }

    /// Parses a price typed by a person.
    ///
    /// ## Rules
    /// - currency symbols, letters and spaces are ignored
    /// - when both `,` and `.` appear, the last one is the decimal separator
    /// - a lone `,` is a decimal separator
    /// - more than two fraction digits are rounded
    ///
    /// ```rust
    /// use herd_core::money::Money;
    ///
    /// assert_eq!(Money::parse("€ 850").unwrap().cents(), 85000);
    /// assert_eq!(Money::parse("1,250.75").unwrap().cents(), 125075);
    /// assert_eq!(Money::parse("12,5").unwrap().cents(), 1250);
    /// assert!(Money::parse("n/a").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidFormat {
            field: "sale_price".to_string(),
            reason: format!("'{}' is not a price", text.trim()),
        };

        let kept: String = text
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
            .collect();
        if !kept.chars().any(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let decimal_sep = match (kept.rfind(','), kept.rfind('.')) {
            (Some(c), Some(d)) => Some(if c > d { ',' } else { '.' }),
            (Some(_), None) => Some(','),
            (None, Some(_)) => Some('.'),
            (None, None) => None,
        };

        let (whole, fraction) = match decimal_sep {
            Some(sep) => {
                let idx = kept.rfind(sep).ok_or_else(invalid)?;
                (&kept[..idx], &kept[idx + 1..])
            }
            None => (kept.as_str(), ""),
        };

        let negative = whole.starts_with('-');
        let whole_digits: String = whole.chars().filter(char::is_ascii_digit).collect();
        if fraction.chars().any(|c| !c.is_ascii_digit()) {
            return Err(invalid());
        }

        let units: i64 = if whole_digits.is_empty() {
            0
        } else {
            whole_digits.parse().map_err(|_| invalid())?
        };

        let mut digits = fraction.chars().filter_map(|c| c.to_digit(10));
        let tens = digits.next().unwrap_or(0) as i64;
        let ones = digits.next().unwrap_or(0) as i64;
        let round_up = digits.next().map(|d| d >= 5).unwrap_or(false);

        let cents = units
            .checked_mul(100)
            .and_then(|c| c.checked_add(tens * 10 + ones + i64::from(round_up)))
            .ok_or_else(invalid)?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.units().abs(), self.cents_part())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locales() {
        assert_eq!(Money::parse("1250").unwrap().cents(), 125000);
        assert_eq!(Money::parse("1250.5").unwrap().cents(), 125050);
        assert_eq!(Money::parse("1.250,50 €").unwrap().cents(), 125050);
        assert_eq!(Money::parse("£1,250.50").unwrap().cents(), 125050);
        assert_eq!(Money::parse("0.125").unwrap().cents(), 13);
    }

    #[test]
    fn test_parse_rejects_text() {
        assert!(Money::parse("").is_err());
        assert!(Money::parse("free").is_err());
    }

    #[test]
    fn test_from_float_rounds() {
        assert_eq!(Money::from_units_f64(1.999).map(|m| m.cents()), Some(200));
        assert_eq!(Money::from_units_f64(-3.2).map(|m| m.cents()), Some(-320));
        assert_eq!(Money::from_units_f64(f64::NAN), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(125050).to_string(), "1250.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }
}
