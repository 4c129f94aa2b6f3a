//! # Identifiers
//!
//! Identity value objects.
//!
//! - [`UserId`]: positive integer identifying the payer
//! - [`MessageId`]: opaque transport message identifier, used as the
//!   idempotency key at the store boundary

use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of the paying user.
///
/// # Invariants
///
/// - Strictly positive
///
/// # Examples
///
/// ```
/// use payment_pipeline::domain::value_objects::UserId;
///
/// let id = UserId::new(42).unwrap();
/// assert_eq!(id.get(), 42);
/// assert!(UserId::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct UserId(i64);

impl UserId {
    /// Creates a user id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if `value` is zero or negative.
    pub fn new(value: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::invalid_value(
                "user_id",
                format!("must be positive, got {value}"),
            ));
        }
        Ok(Self(value))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for UserId {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-level message identifier.
///
/// Travels as message metadata, never inside the event body.
///
/// # Examples
///
/// ```
/// use payment_pipeline::domain::value_objects::MessageId;
///
/// let generated = MessageId::generate();
/// assert!(!generated.as_str().is_empty());
///
/// let parsed = MessageId::new("msg-1").unwrap();
/// assert_eq!(parsed.as_str(), "msg-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Longest identifier accepted, matching the store column width.
    pub const MAX_LEN: usize = 64;

    /// Creates a message id from an existing value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidValue` if the value is blank or longer
    /// than [`MessageId::MAX_LEN`].
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_value("message_id", "must not be empty"));
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(DomainError::invalid_value(
                "message_id",
                format!("longer than {} bytes", Self::MAX_LEN),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_non_positive() {
        assert!(UserId::new(0).unwrap_err().is_validation());
        assert!(UserId::new(-7).is_err());
        assert_eq!(UserId::new(1).unwrap().get(), 1);
    }

    #[test]
    fn user_id_serde_validates() {
        let id: UserId = serde_json::from_str("9").unwrap();
        assert_eq!(id.get(), 9);
        assert!(serde_json::from_str::<UserId>("0").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "9");
    }

    #[test]
    fn message_id_trims_and_validates() {
        assert_eq!(MessageId::new("  abc ").unwrap().as_str(), "abc");
        assert!(MessageId::new("   ").is_err());
        assert!(MessageId::new("x".repeat(MessageId::MAX_LEN + 1)).is_err());
    }

    #[test]
    fn generated_message_ids_are_unique() {
        assert_ne!(MessageId::generate(), MessageId::generate());
    }
}
