//! # Deposit Amount
//!
//! Non-negative decimal amount carried by a payment event.
//!
//! The wire form is an exact JSON number: the decimal digits are written
//! as-is, so `10` stays `10` and `10.50` stays `10.50` with no float
//! round-trip in between.

use crate::domain::errors::{DomainError, DomainResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A deposit amount.
///
/// # Invariants
///
/// - Never negative
///
/// # Examples
///
/// ```
/// use payment_pipeline::domain::value_objects::DepositAmount;
/// use rust_decimal::Decimal;
///
/// let amount = DepositAmount::new(Decimal::new(1050, 2)).unwrap();
/// assert_eq!(amount.to_string(), "10.50");
/// assert!(DepositAmount::new(Decimal::new(-1, 0)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepositAmount(Decimal);

impl DepositAmount {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates an amount.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if `value` is negative.
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::invalid_value(
                "deposit_amount",
                format!("must not be negative, got {value}"),
            ));
        }
        Ok(Self(value))
    }

    /// Creates a whole-unit amount.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if `units` is negative.
    pub fn from_units(units: i64) -> DomainResult<Self> {
        Self::new(Decimal::from(units))
    }

    /// Returns the decimal value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for DepositAmount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for DepositAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DepositAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::arbitrary_precision::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for DepositAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Only JSON numbers; `Number` keeps the literal digits.
        let number = serde_json::Number::deserialize(deserializer)?;
        let digits = number.as_str();
        let value = Decimal::from_str_exact(digits)
            .or_else(|_| Decimal::from_scientific(digits))
            .map_err(|e| {
                serde::de::Error::custom(format!("deposit_amount {digits} is not a decimal: {e}"))
            })?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}
