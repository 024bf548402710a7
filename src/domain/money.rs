//! Lossless monetary amount backed by rust_decimal.
//!
//! Ledger amounts are persisted as canonical strings and never pass through
//! floating point.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A monetary amount (lead fee, offer principal, commission).
///
/// Serializes to a JSON number by default; use `to_canonical_string` for
/// persistence.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Money {
    /// Parse an amount from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Money)
    }

    /// Format as a canonical string (normalized, no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Money(RustDecimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Commission on this amount at the given rate (e.g. rate 0.02 = 2%).
    pub fn commission_at(&self, rate: Money) -> Money {
        Money(self.0 * rate.0)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl From<RustDecimal> for Money {
    fn from(value: RustDecimal) -> Self {
        Money(value)
    }
}

impl From<Money> for RustDecimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_string_normalizes_trailing_zeros() {
        let m = Money::from_str("250.00").unwrap();
        assert_eq!(m.to_canonical_string(), "250");
        let m = Money::from_str("0.0200").unwrap();
        assert_eq!(m.to_canonical_string(), "0.02");
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let m = Money::from_str("12345.6789").unwrap();
        let s = m.to_canonical_string();
        assert_eq!(Money::from_str(&s).unwrap(), m);
    }

    #[test]
    fn test_commission_at() {
        let deal = Money::from_str("10000").unwrap();
        let rate = Money::from_str("0.02").unwrap();
        assert_eq!(deal.commission_at(rate).to_canonical_string(), "200");
    }

    #[test]
    fn test_commission_preserves_precision() {
        let deal = Money::from_str("3333.33").unwrap();
        let rate = Money::from_str("0.015").unwrap();
        assert_eq!(deal.commission_at(rate).to_canonical_string(), "49.99995");
    }

    #[test]
    fn test_sign_predicates() {
        assert!(Money::from_str("1").unwrap().is_positive());
        assert!(Money::from_str("-1").unwrap().is_negative());
        assert!(Money::zero().is_zero());
        assert!(!Money::zero().is_positive());
        assert!(!Money::zero().is_negative());
    }

    #[test]
    fn test_invalid_parse_rejected() {
        assert!(Money::from_str("not-a-number").is_err());
    }
}
