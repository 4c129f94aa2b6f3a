//! # Domain Errors
//!
//! Error type for value-object validation and event encoding.
//!
//! # Examples
//!
//! ```
//! use payment_pipeline::domain::errors::DomainError;
//!
//! let err = DomainError::invalid_value("user_id", "must be positive");
//! assert!(err.is_validation());
//! assert!(!err.is_codec());
//! ```

use thiserror::Error;

/// Error type for domain operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A value violated its invariant.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// An event could not be serialized to its wire form.
    #[error("encode error: {0}")]
    Encode(String),

    /// A wire payload could not be turned back into an event.
    #[error("decode error: {0}")]
    Decode(String),
}

impl DomainError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// Creates an encode error.
    #[must_use]
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Returns true if this is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidValue { .. })
    }

    /// Returns true if this is an encode or decode failure.
    #[must_use]
    pub fn is_codec(&self) -> bool {
        matches!(self, Self::Encode(_) | Self::Decode(_))
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
