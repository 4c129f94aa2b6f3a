//! # Domain Layer
//!
//! Value objects, the payment event and its codec. No I/O happens here.

pub mod errors;
pub mod events;
pub mod value_objects;

pub use errors::{DomainError, DomainResult};
