//! Decimal money amounts.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Money amount backed by a decimal to avoid floating point drift.
///
/// Serialized as a decimal string (e.g. `"10.00"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Parses a price string such as `"19.99"`.
    pub fn parse(s: &str) -> Result<Self, rust_decimal::Error> {
        Decimal::from_str(s.trim()).map(Self)
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies by a quantity, or `None` if the result does not fit.
    pub fn checked_multiply(&self, quantity: i32) -> Option<Money> {
        self.0.checked_mul(Decimal::from(quantity)).map(Money)
    }

    /// Adds two amounts, or `None` if the result does not fit.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Formats the amount with exactly two decimal places, rounding half
    /// away from zero. This is the persisted representation of order totals
    /// and line prices.
    pub fn to_fixed_2(&self) -> String {
        let mut rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);
        rounded.to_string()
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_fixed_2())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_prices() {
        assert_eq!(Money::parse("10.00").unwrap(), Money::from_cents(1000));
        assert_eq!(Money::parse(" 19.99 ").unwrap(), Money::from_cents(1999));
        assert_eq!(Money::parse("5").unwrap().to_fixed_2(), "5.00");
    }

    #[test]
    fn test_parse_malformed_price() {
        assert!(Money::parse("abc").is_err());
        assert!(Money::parse("").is_err());
        assert!(Money::parse("1.2.3").is_err());
    }

    #[test]
    fn test_fixed_two_decimal_formatting() {
        assert_eq!(Money::from_cents(4000).to_fixed_2(), "40.00");
        assert_eq!(Money::parse("0.1").unwrap().to_fixed_2(), "0.10");
        assert_eq!(Money::parse("2.005").unwrap().to_fixed_2(), "2.01");
        assert_eq!(Money::parse("2.004").unwrap().to_fixed_2(), "2.00");
    }

    #[test]
    fn test_multiply_and_add_have_no_drift() {
        let line = Money::parse("0.10").unwrap().checked_multiply(3).unwrap();
        let total = line.checked_add(Money::parse("0.20").unwrap()).unwrap();
        assert_eq!(total.to_fixed_2(), "0.50");
    }

    #[test]
    fn test_overflow_is_reported_not_panicked() {
        let max = Money::parse("79228162514264337593543950335").unwrap();
        assert!(max.checked_multiply(2).is_none());
        assert!(max.checked_add(Money::from_cents(100)).is_none());
        assert_eq!(max.checked_multiply(1), Some(max));
    }

    #[test]
    fn test_negative_detection() {
        assert!(Money::parse("-1.00").unwrap().is_negative());
        assert!(!Money::zero().is_negative());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::from_cents(1050)).unwrap();
        assert_eq!(json, "\"10.50\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Money::from_cents(1050));
    }
}
