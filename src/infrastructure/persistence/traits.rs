//! # Repository Traits
//!
//! Port definition for the persistence gateway.
//!
//! [`PaymentEventStore`] is the narrow interface the consumer writes
//! through: check the connection, insert one event, close. Each insert is
//! its own unit of work; there is no transaction spanning several events.
//!
//! # Examples
//!
//! ```ignore
//! use payment_pipeline::infrastructure::persistence::traits::PaymentEventStore;
//!
//! async fn store_one(store: &impl PaymentEventStore, event: &PaymentEvent) {
//!     let outcome = store.insert(event, None).await?;
//!     assert!(outcome.is_inserted());
//! }
//! ```

use crate::domain::events::PaymentEvent;
use crate::domain::value_objects::MessageId;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Error type for repository operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error.
    #[error("Query error: {0}")]
    Query(String),

    /// The store handle has been closed.
    #[error("Store closed")]
    Closed,
}

impl RepositoryError {
    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error.
    #[must_use]
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Returns true if this is a connection error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns true if this is a query error.
    #[must_use]
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query(_))
    }

    /// Returns true if the store has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Outcome of a single insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertOutcome {
    /// A new row was written.
    Inserted,
    /// The message id was already stored; nothing was written.
    Duplicate,
}

impl InsertOutcome {
    /// Returns true if a row was written.
    #[must_use]
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

impl fmt::Display for InsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inserted => write!(f, "INSERTED"),
            Self::Duplicate => write!(f, "DUPLICATE"),
        }
    }
}

/// Persistence gateway for payment events.
///
/// Used sequentially by a single consumer, so implementations need no
/// locking of their own beyond what their connection pool does.
#[async_trait]
pub trait PaymentEventStore: Send + Sync + fmt::Debug {
    /// Round-trips to the store to verify the connection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Connection` if the store is unreachable.
    async fn ping(&self) -> RepositoryResult<()>;

    /// Inserts one event as one row.
    ///
    /// When the store runs in idempotent mode and `message_id` is present, a
    /// second insert with the same id yields [`InsertOutcome::Duplicate`].
    /// Otherwise every call writes a new row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Query` or `RepositoryError::Connection` if
    /// the write fails, `RepositoryError::Closed` after [`close`](Self::close).
    async fn insert(
        &self,
        event: &PaymentEvent,
        message_id: Option<&MessageId>,
    ) -> RepositoryResult<InsertOutcome>;

    /// Returns true once the store handle has been closed.
    fn is_closed(&self) -> bool;

    /// Closes the store handle.
    async fn close(&self);
}
