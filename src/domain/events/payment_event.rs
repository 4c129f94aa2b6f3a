//! # Payment Event
//!
//! The record moved through the pipeline, and its wire codec.
//!
//! The wire form is a JSON object with exactly two fields, `user_id` and
//! `deposit_amount`. Publisher and consumer both go through
//! [`PaymentEvent::encode`] / [`PaymentEvent::decode`], so they agree on the
//! bytes.
//!
//! # Examples
//!
//! ```
//! use payment_pipeline::domain::events::PaymentEvent;
//!
//! let event = PaymentEvent::from_parts(1, 10).unwrap();
//! let bytes = event.encode().unwrap();
//! assert_eq!(bytes, br#"{"user_id":1,"deposit_amount":10}"#);
//! assert_eq!(PaymentEvent::decode(&bytes).unwrap(), event);
//! ```

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{DepositAmount, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content type tag attached to every encoded event.
pub const CONTENT_TYPE: &str = "application/json";

/// One payment event.
///
/// Carries no identity of its own; the store assigns a surrogate id on
/// insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentEvent {
    user_id: UserId,
    deposit_amount: DepositAmount,
}

impl PaymentEvent {
    /// Creates an event from validated parts.
    #[must_use]
    pub fn new(user_id: UserId, deposit_amount: DepositAmount) -> Self {
        Self {
            user_id,
            deposit_amount,
        }
    }

    /// Creates an event from raw integers, validating both.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if `user_id` is not positive or
    /// `deposit_units` is negative.
    pub fn from_parts(user_id: i64, deposit_units: i64) -> DomainResult<Self> {
        Ok(Self::new(
            UserId::new(user_id)?,
            DepositAmount::from_units(deposit_units)?,
        ))
    }

    /// Returns the payer.
    #[inline]
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the deposited amount.
    #[inline]
    #[must_use]
    pub fn deposit_amount(&self) -> DepositAmount {
        self.deposit_amount
    }

    /// Serializes the event to its wire form.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Encode` if serialization fails.
    pub fn encode(&self) -> DomainResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| DomainError::encode(e.to_string()))
    }

    /// Parses an event from its wire form.
    ///
    /// Rejects malformed JSON, missing or unknown fields, and values that
    /// break the [`UserId`] / [`DepositAmount`] invariants.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Decode` describing the first problem found.
    pub fn decode(payload: &[u8]) -> DomainResult<Self> {
        serde_json::from_slice(payload).map_err(|e| DomainError::decode(e.to_string()))
    }
}

impl fmt::Display for PaymentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PaymentEvent(user_id={}, deposit_amount={})",
            self.user_id, self.deposit_amount
        )
    }
}
