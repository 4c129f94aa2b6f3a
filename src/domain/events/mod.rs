//! # Domain Events
//!
//! - [`PaymentEvent`]: one deposit made by a user, plus its wire codec

pub mod payment_event;

pub use payment_event::{CONTENT_TYPE, PaymentEvent};
