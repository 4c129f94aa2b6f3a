//! # Value Objects
//!
//! Immutable types with validation and domain semantics.
//!
//! - [`UserId`]: positive payer identifier
//! - [`DepositAmount`]: non-negative decimal amount
//! - [`MessageId`]: transport message identifier / idempotency key

pub mod amount;
pub mod ids;

pub use amount::DepositAmount;
pub use ids::{MessageId, UserId};
