//! # Messaging
//!
//! Broker session port and its adapters.
//!
//! ## Port
//!
//! - [`Transport`]: declare / publish / consume / close
//!
//! ## Implementations
//!
//! - [`InMemoryTransport`]: in-process queues for tests and local runs
//! - `NatsTransport`: NATS core and JetStream (feature `nats`)

pub mod error;
pub mod in_memory;
#[cfg(feature = "nats")]
pub mod nats;
pub mod traits;

pub use error::{TransportError, TransportResult};
pub use in_memory::{AckBehavior, InMemoryTransport};
#[cfg(feature = "nats")]
pub use nats::{NatsOptions, NatsTransport};
pub use traits::{
    Acknowledger, DEFAULT_QUEUE_NAME, Delivery, DeliveryStream, OutboundMessage, QueueSpec,
    Transport,
};
