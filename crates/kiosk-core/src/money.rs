//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The payment terminal expects amounts as decimal strings: "12.50"      │
//! │                                                                         │
//! │  With floats:   0.1 + 0.2 = 0.30000000000000004  → "0.30" by luck     │
//! │  With cents:    10 + 20 = 30                      → "0.30" always      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents, formatted with exactly two decimals      │
//! │  only at the gateway boundary.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kiosk_core::money::Money;
//!
//! let price = Money::from_cents(1250);
//! let line = price.multiply_quantity(2);
//! assert_eq!(line.to_decimal_string(), "25.00");
//!
//! let parsed = Money::parse_decimal("25").unwrap();
//! assert_eq!(parsed, line);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

use crate::error::MoneyParseError;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  CatalogProduct.price_cents ──► × quantity ──► order total             │
/// │                                                     │                   │
/// │                           ┌─────────────────────────┤                   │
/// │                           ▼                         ▼                   │
/// │               Order.total_cents (store)   "12.50" (gateway payload)     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use kiosk_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Checked variant of [`Money::multiply_quantity`].
    pub fn checked_multiply(&self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Formats the amount with exactly two decimal places and no currency sign.
    ///
    /// This is the wire format the payment terminal expects for
    /// `transactions.payments[].amount`.
    ///
    /// ## Example
    /// ```rust
    /// use kiosk_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1250).to_decimal_string(), "12.50");
    /// assert_eq!(Money::from_cents(7).to_decimal_string(), "0.07");
    /// assert_eq!(Money::from_cents(-550).to_decimal_string(), "-5.50");
    /// ```
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }

    /// Parses a decimal amount such as `"12.5"` or `"12.50"` into cents.
    ///
    /// ## Rules
    /// - At most two fractional digits (no silent rounding)
    /// - Optional leading `-`
    /// - No exponent, no thousands separators
    pub fn parse_decimal(input: &str) -> Result<Money, MoneyParseError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(MoneyParseError::Empty);
        }

        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(fraction) {
            return Err(MoneyParseError::NotDecimal(s.to_string()));
        }
        if fraction.len() > 2 {
            return Err(MoneyParseError::TooPrecise(s.to_string()));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| MoneyParseError::Overflow(s.to_string()))?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().unwrap_or(0) * 10,
            _ => fraction.parse::<i64>().unwrap_or(0),
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .ok_or_else(|| MoneyParseError::Overflow(s.to_string()))?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the amount with a currency sign, for logs.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_string_always_has_two_places() {
        assert_eq!(Money::from_cents(0).to_decimal_string(), "0.00");
        assert_eq!(Money::from_cents(5).to_decimal_string(), "0.05");
        assert_eq!(Money::from_cents(1000).to_decimal_string(), "10.00");
        assert_eq!(Money::from_cents(123456).to_decimal_string(), "1234.56");
    }

    #[test]
    fn test_display_includes_sign() {
        assert_eq!(Money::from_cents(1099).to_string(), "$10.99");
        assert_eq!(Money::from_cents(-5).to_string(), "-$0.05");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(Money::parse_decimal("12.5").unwrap().cents(), 1250);
        assert_eq!(Money::parse_decimal("12.50").unwrap().cents(), 1250);
        assert_eq!(Money::parse_decimal("12").unwrap().cents(), 1200);
        assert_eq!(Money::parse_decimal(" 0.07 ").unwrap().cents(), 7);
        assert_eq!(Money::parse_decimal("-3.10").unwrap().cents(), -310);
    }

    #[test]
    fn test_parse_decimal_rejects_bad_input() {
        assert_eq!(Money::parse_decimal(""), Err(MoneyParseError::Empty));
        assert!(matches!(
            Money::parse_decimal("1.234"),
            Err(MoneyParseError::TooPrecise(_))
        ));
        assert!(matches!(
            Money::parse_decimal("abc"),
            Err(MoneyParseError::NotDecimal(_))
        ));
        assert!(matches!(
            Money::parse_decimal(".50"),
            Err(MoneyParseError::NotDecimal(_))
        ));
        assert!(matches!(
            Money::parse_decimal("1e3"),
            Err(MoneyParseError::NotDecimal(_))
        ));
    }

    #[test]
    fn test_sum_and_multiply() {
        let total: Money = [Money::from_cents(250), Money::from_cents(1000)]
            .into_iter()
            .sum();
        assert_eq!(total.cents(), 1250);
        assert_eq!(Money::from_cents(i64::MAX).checked_multiply(2), None);
    }
}
