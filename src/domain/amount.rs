//! Amount type
//!
//! Domain primitive for authorization amounts, expressed in minor currency
//! units (cents). Validated at construction so invalid values cannot exist
//! in the system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum allowed amount: 1,000,000.00 in whatever currency's minor unit.
const MAX_AMOUNT_CENTS: i64 = 100_000_000;

/// A positive amount of minor currency units.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Value does not exceed `MAX_AMOUNT_CENTS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct AmountCents(i64);

/// Errors that can occur when creating an AmountCents
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount_cents must be positive (got {0})")]
    NotPositive(i64),

    #[error("amount_cents exceeds maximum allowed value ({MAX_AMOUNT_CENTS})")]
    Overflow,
}

impl AmountCents {
    /// Create a new AmountCents with validation.
    pub fn new(value: i64) -> Result<Self, AmountError> {
        if value <= 0 {
            return Err(AmountError::NotPositive(value));
        }
        if value > MAX_AMOUNT_CENTS {
            return Err(AmountError::Overflow);
        }
        Ok(Self(value))
    }

    /// Get the underlying value in cents.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for AmountCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for AmountCents {
    type Error = AmountError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        AmountCents::new(value)
    }
}

impl From<AmountCents> for i64 {
    fn from(amount: AmountCents) -> Self {
        amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_positive() {
        let amount = AmountCents::new(1050);
        assert!(amount.is_ok());
        assert_eq!(amount.unwrap().value(), 1050);
    }

    #[test]
    fn test_amount_zero_rejected() {
        let amount = AmountCents::new(0);
        assert!(matches!(amount, Err(AmountError::NotPositive(0))));
    }

    #[test]
    fn test_amount_negative_rejected() {
        let amount = AmountCents::new(-100);
        assert!(matches!(amount, Err(AmountError::NotPositive(-100))));
    }

    #[test]
    fn test_amount_overflow() {
        let amount = AmountCents::new(MAX_AMOUNT_CENTS + 1);
        assert!(matches!(amount, Err(AmountError::Overflow)));
    }

    #[test]
    fn test_amount_max_value_ok() {
        let amount = AmountCents::new(MAX_AMOUNT_CENTS);
        assert!(amount.is_ok());
    }
}
