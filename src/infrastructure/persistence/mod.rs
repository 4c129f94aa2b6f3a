//! # Persistence Layer
//!
//! The persistence gateway port and its implementations.
//!
//! ## Repository Traits (Ports)
//!
//! - [`PaymentEventStore`]: ping, insert one event, close
//!
//! ## Implementations
//!
//! - `in_memory`: In-memory implementation for testing
//! - `mysql`: MySQL implementation over sqlx

pub mod in_memory;
pub mod mysql;
pub mod traits;

pub use traits::{InsertOutcome, PaymentEventStore, RepositoryError, RepositoryResult};
