use crate::error::EngineError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

/// A non-negative monetary value in the order currency.
///
/// Wraps `rust_decimal::Decimal` so prices, fees and totals can never be
/// constructed negative and arithmetic stays exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, EngineError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EngineError::ValidationError(
                "Monetary amounts must not be negative".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Amount in minor currency units (e.g. kobo, cents), as processors expect.
    pub fn to_minor_units(&self) -> Option<i64> {
        (self.0 * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }

    pub fn from_minor_units(units: i64) -> Result<Self, EngineError> {
        Self::new(Decimal::new(units, 2))
    }

    /// Subtraction clamped at zero; a discount can never push a total negative.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if rhs.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - rhs.0)
        }
    }
}

impl TryFrom<Decimal> for Money {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Mul<Quantity> for Money {
    type Output = Self;
    fn mul(self, rhs: Quantity) -> Self::Output {
        Self(self.0 * Decimal::from(rhs.value()))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// A line quantity; always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, EngineError> {
        if value >= 1 {
            Ok(Self(value))
        } else {
            Err(EngineError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ))
        }
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Quantity {
    type Error = EngineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_rejects_negative() {
        assert!(Money::new(dec!(0.0)).is_ok());
        assert!(matches!(
            Money::new(dec!(-0.01)),
            Err(EngineError::ValidationError(_))
        ));
    }

    #[test]
    fn test_money_arithmetic() {
        let price = Money::new(dec!(10.00)).unwrap();
        let qty = Quantity::new(2).unwrap();
        assert_eq!(price * qty, Money::new(dec!(20.00)).unwrap());
        assert_eq!(price.saturating_sub(Money::new(dec!(15)).unwrap()), Money::ZERO);
        let total: Money = [price, price, price].into_iter().sum();
        assert_eq!(total, Money::new(dec!(30)).unwrap());
    }

    #[test]
    fn test_minor_units() {
        let m = Money::new(dec!(1234.565)).unwrap();
        assert_eq!(m.to_minor_units(), Some(123457));
        assert_eq!(
            Money::from_minor_units(2000).unwrap(),
            Money::new(dec!(20.00)).unwrap()
        );
    }

    #[test]
    fn test_quantity_validation() {
        assert!(Quantity::new(1).is_ok());
        assert!(Quantity::new(0).is_err());
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("3").unwrap().value(), 3);
    }
}
