//! # In-Memory Repositories
//!
//! In-memory implementations for testing without database dependencies.
//!
//! ## Available Repositories
//!
//! - [`InMemoryPaymentEventStore`]: payment event persistence
//!
//! ## Thread Safety
//!
//! Rows sit behind `Arc<RwLock<..>>`; clones share the same storage.

pub mod payment_event_store;

pub use payment_event_store::{InMemoryPaymentEventStore, StoredPaymentEvent};
