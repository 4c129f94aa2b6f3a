//! # Transport Errors
//!
//! Error types for message transport operations.
//!
//! # Examples
//!
//! ```
//! use payment_pipeline::infrastructure::messaging::error::TransportError;
//!
//! let error = TransportError::connection("connection refused");
//! assert!(error.is_startup());
//!
//! let error = TransportError::publish("no responders");
//! assert!(!error.is_startup());
//! ```

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Broker could not be reached or the channel could not be opened.
    #[error("transport connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Queue declaration was rejected.
    #[error("queue declaration failed for {queue}: {message}")]
    Declare {
        /// Queue name.
        queue: String,
        /// Error message.
        message: String,
    },

    /// Subscription to a queue failed.
    #[error("subscription failed for {queue}: {message}")]
    Subscribe {
        /// Queue name.
        queue: String,
        /// Error message.
        message: String,
    },

    /// A message could not be handed to the broker.
    #[error("publish failed: {message}")]
    Publish {
        /// Error message.
        message: String,
    },

    /// A delivery could not be acknowledged.
    #[error("acknowledge failed: {message}")]
    Acknowledge {
        /// Error message.
        message: String,
    },

    /// The delivery stream broke mid-flight.
    #[error("delivery stream error: {message}")]
    Stream {
        /// Error message.
        message: String,
    },

    /// The session has been closed.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Creates a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a declaration error.
    #[must_use]
    pub fn declare(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Declare {
            queue: queue.into(),
            message: message.into(),
        }
    }

    /// Creates a subscription error.
    #[must_use]
    pub fn subscribe(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscribe {
            queue: queue.into(),
            message: message.into(),
        }
    }

    /// Creates a publish error.
    #[must_use]
    pub fn publish(message: impl Into<String>) -> Self {
        Self::Publish {
            message: message.into(),
        }
    }

    /// Creates an acknowledge error.
    #[must_use]
    pub fn acknowledge(message: impl Into<String>) -> Self {
        Self::Acknowledge {
            message: message.into(),
        }
    }

    /// Creates a stream error.
    #[must_use]
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Returns true if this error belongs to session establishment.
    ///
    /// These are fatal before the consumer reaches steady state.
    #[must_use]
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Declare { .. } | Self::Subscribe { .. }
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_classification() {
        assert!(TransportError::connection("x").is_startup());
        assert!(TransportError::declare("q", "x").is_startup());
        assert!(TransportError::subscribe("q", "x").is_startup());
        assert!(!TransportError::publish("x").is_startup());
        assert!(!TransportError::acknowledge("x").is_startup());
        assert!(!TransportError::stream("x").is_startup());
        assert!(!TransportError::Closed.is_startup());
    }

    #[test]
    fn messages_name_the_queue() {
        let err = TransportError::declare("payment_events", "access refused");
        assert!(err.to_string().contains("payment_events"));
        assert!(err.to_string().contains("access refused"));
    }
}
