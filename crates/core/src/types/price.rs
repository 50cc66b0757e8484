//! Monetary amounts using decimal arithmetic.
//!
//! The backend sends prices as bare JSON numbers in euros (`"price": 20`).
//! `Money` keeps them as [`Decimal`] so sums shown to the user never pick up
//! floating point noise. The client never computes checkout totals itself;
//! summing is only used for display of server-provided line prices.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount of money in the marketplace currency (EUR).
///
/// Deserializes from JSON numbers or numeric strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero euros.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create an amount from a whole number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiply a unit price by a quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<i64> for Money {
    fn from(amount: i64) -> Self {
        Self(Decimal::from(amount))
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// Formats as `12.50 €`, matching the French storefront display.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} €", self.0.round_dp(2))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_from_number_and_string() {
        let from_int: Money = serde_json::from_str("40").unwrap();
        assert_eq!(from_int, Money::from(40));

        let from_str: Money = serde_json::from_str("\"12.5\"").unwrap();
        assert_eq!(from_str, Money::from_cents(1250));
    }

    #[test]
    fn test_times_and_sum() {
        let unit = Money::from_cents(1999);
        assert_eq!(unit.times(3), Money::from_cents(5997));

        let total: Money = [Money::from(20), Money::from(30)].into_iter().sum();
        assert_eq!(total, Money::from(50));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1250).to_string(), "12.50 €");
        assert_eq!(Money::ZERO.to_string(), "0.00 €");
    }
}
