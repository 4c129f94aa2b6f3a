//! # Application Errors
//!
//! Error types for the application layer.
//!
//! Two failure paths are kept apart:
//!
//! ```text
//! StartupError  - establishing transport/store/subscription failed;
//!                 returned to the caller, which decides to abort
//! PublishError  - one send failed; only that unit of work is affected
//! ```
//!
//! Per-message consumer failures are not errors at this level: they are
//! logged and counted in the consumer report.
//!
//! # Examples
//!
//! ```
//! use payment_pipeline::application::error::{PublishError, StartupError};
//! use payment_pipeline::infrastructure::messaging::TransportError;
//!
//! let err: StartupError = TransportError::connection("refused").into();
//! assert!(err.to_string().contains("refused"));
//!
//! let err = PublishError::deadline_exceeded(5000);
//! assert!(err.is_deadline_exceeded());
//! ```

use crate::domain::errors::DomainError;
use crate::infrastructure::messaging::error::TransportError;
use crate::infrastructure::persistence::RepositoryError;
use thiserror::Error;

/// Failure while bringing a consumer or publisher into steady state.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Dialing the broker, declaring or subscribing failed.
    #[error("transport startup failed: {0}")]
    Transport(#[from] TransportError),

    /// Opening or pinging the store failed.
    #[error("store startup failed: {0}")]
    Store(#[from] RepositoryError),
}

impl StartupError {
    /// Returns true if the transport side failed.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if the store side failed.
    #[must_use]
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Failure of a single send.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The event could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] DomainError),

    /// The transport rejected the message.
    #[error("transport rejected message: {0}")]
    Transport(#[from] TransportError),

    /// The send did not complete within its deadline.
    #[error("publish deadline of {timeout_ms}ms exceeded")]
    DeadlineExceeded {
        /// Deadline in milliseconds.
        timeout_ms: u64,
    },

    /// The task running the send panicked or was aborted.
    #[error("publish task failed: {0}")]
    TaskFailed(String),
}

impl PublishError {
    /// Creates a deadline exceeded error.
    #[must_use]
    pub fn deadline_exceeded(timeout_ms: u64) -> Self {
        Self::DeadlineExceeded { timeout_ms }
    }

    /// Creates a task failure error.
    #[must_use]
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::TaskFailed(message.into())
    }

    /// Returns true if the deadline was exceeded.
    #[must_use]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }
}
