//! # MySQL Repositories
//!
//! - [`MySqlPaymentEventStore`]: payment event persistence over sqlx

pub mod payment_event_store;

pub use payment_event_store::MySqlPaymentEventStore;
