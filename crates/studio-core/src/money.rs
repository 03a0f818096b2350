//! # Money Module
//!
//! Integer cents as the only stored representation of money, with a derived
//! decimal view and exact parsing of dollar strings.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    price_cents = 1999    ──► display_decimal() ──► "19.99"             │
//! │    "19.99" (form input)  ──► parse_dollars()   ──► 1999                │
//! │                                                                         │
//! │  Dollar strings are parsed with rust_decimal, never with f64.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding
//! Inputs with more than two fraction digits are rounded to the nearest cent
//! with **round half to even** (bankers rounding):
//! `"19.999"` → 2000, `"0.125"` → 12, `"0.135"` → 14.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents for USD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use studio_core::money::Money;
    ///
    /// let price = Money::from_cents(1999);
    /// assert_eq!(price.cents(), 1999);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Decimal view with exactly two fraction digits and no currency symbol.
    ///
    /// This is the `price` field the API layer shows next to `price_cents`.
    ///
    /// ## Example
    /// ```rust
    /// use studio_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1999).display_decimal(), "19.99");
    /// assert_eq!(Money::from_cents(5).display_decimal(), "0.05");
    /// ```
    pub fn display_decimal(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

/// Human-readable format with a dollar sign, e.g. `$19.99`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Money(cents)
    }
}

// =============================================================================
// Dollar Parsing
// =============================================================================

/// Parses a major-unit string such as `"19.99"` into non-negative cents.
///
/// ## Rules
/// - Parsed exactly with `rust_decimal` (no floating point)
/// - Rounded to whole cents with round-half-to-even
/// - Negative amounts, unparsable text and overflow are rejected
///
/// Errors are keyed to `field` so the caller can report them against the
/// input that carried the string (e.g. `price_dollars`).
///
/// ## Example
/// ```rust
/// use studio_core::money::parse_dollars;
///
/// assert_eq!(parse_dollars("price_dollars", "19.99").unwrap(), 1999);
/// assert_eq!(parse_dollars("price_dollars", "19.999").unwrap(), 2000);
/// assert!(parse_dollars("price_dollars", "nineteen").is_err());
/// ```
pub fn parse_dollars(field: &str, input: &str) -> Result<i64, ValidationError> {
    let input = input.trim();

    if input.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    let invalid = |reason: &str| ValidationError::InvalidMoney {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let amount = Decimal::from_str_exact(input).map_err(|_| invalid("not a decimal number"))?;

    let cents = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(|| invalid("amount is too large"))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);

    if cents < Decimal::ZERO {
        return Err(invalid("amount must not be negative"));
    }

    cents.to_i64().ok_or_else(|| invalid("amount is too large"))
}

// =============================================================================
// Commission Rate
// =============================================================================

/// Gallery commission as a percentage with two decimal places, stored in
/// basis points (1 bps = 0.01%, so 40.00% = 4000).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// 100.00%
    pub const MAX_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        CommissionRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Parses a percentage such as `"40"` or `"37.50"`.
    ///
    /// At most two decimal places are accepted and the value must lie in
    /// `0.00..=100.00`.
    pub fn parse(field: &str, input: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        let pct = Decimal::from_str_exact(input.trim()).map_err(|_| invalid("not a decimal number"))?;

        if pct.normalize().scale() > 2 {
            return Err(invalid("at most 2 decimal places"));
        }

        if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                min: 0,
                max: 100,
            });
        }

        (pct * Decimal::ONE_HUNDRED)
            .to_u32()
            .map(CommissionRate)
            .ok_or_else(|| invalid("not a valid percentage"))
    }
}

/// Percentage with two decimals, e.g. `40.00`.
impl fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_display_decimal() {
        assert_eq!(Money::from_cents(1999).display_decimal(), "19.99");
        assert_eq!(Money::from_cents(0).display_decimal(), "0.00");
        assert_eq!(Money::from_cents(7).display_decimal(), "0.07");
        assert_eq!(Money::from_cents(120000).display_decimal(), "1200.00");
    }

    #[test]
    fn test_parse_round_trips_through_display() {
        let cents = parse_dollars("price_dollars", "19.99").unwrap();
        assert_eq!(cents, 1999);
        assert_eq!(Money::from_cents(cents).display_decimal(), "19.99");
    }

    #[test]
    fn test_parse_whole_and_short_amounts() {
        assert_eq!(parse_dollars("p", "20").unwrap(), 2000);
        assert_eq!(parse_dollars("p", "0.5").unwrap(), 50);
        assert_eq!(parse_dollars("p", " 7.10 ").unwrap(), 710);
        assert_eq!(parse_dollars("p", "0").unwrap(), 0);
    }

    /// Pins the rounding mode: half-to-even, not half-up.
    #[test]
    fn test_parse_uses_bankers_rounding() {
        assert_eq!(parse_dollars("p", "19.999").unwrap(), 2000);
        assert_eq!(parse_dollars("p", "0.125").unwrap(), 12);
        assert_eq!(parse_dollars("p", "0.135").unwrap(), 14);
        assert_eq!(parse_dollars("p", "0.1251").unwrap(), 13);
        assert_eq!(parse_dollars("p", "-0.001").unwrap(), 0);
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for bad in ["abc", "19.99.1", "$19.99", "1e3", "NaN"] {
            let err = parse_dollars("price_dollars", bad).unwrap_err();
            assert!(
                matches!(&err, ValidationError::InvalidMoney { field, .. } if field == "price_dollars"),
                "{bad} gave {err:?}"
            );
        }
        assert!(matches!(
            parse_dollars("price_dollars", "  "),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_negative_and_overflow() {
        assert!(parse_dollars("p", "-1.00").is_err());
        assert!(parse_dollars("p", "792281625142643375935439503").is_err());
        assert!(parse_dollars("p", "99999999999999999999").is_err());
    }

    #[test]
    fn test_commission_rate_parse_and_display() {
        let rate = CommissionRate::parse("commission_rate", "40").unwrap();
        assert_eq!(rate.bps(), 4000);
        assert_eq!(rate.to_string(), "40.00");

        let rate = CommissionRate::parse("commission_rate", "37.5").unwrap();
        assert_eq!(rate.bps(), 3750);
        assert_eq!(rate.to_string(), "37.50");

        assert!(CommissionRate::parse("commission_rate", "12.345").is_err());
        assert!(CommissionRate::parse("commission_rate", "100.01").is_err());
        assert!(CommissionRate::parse("commission_rate", "-1").is_err());
        assert!(CommissionRate::parse("commission_rate", "forty").is_err());
    }
}
