//! # Application Services
//!
//! Services that orchestrate domain logic and infrastructure.
//!
//! - [`PaymentPublisher`]: deadline-bounded sends of payment events
//! - [`PaymentConsumer`]: the consume, decode and persist loop

pub mod consumer;
pub mod publisher;

pub use consumer::{
    AckMode, ActiveConsumer, ConsumerOptions, ConsumerReport, ConsumerState, ConsumerStats,
    PaymentConsumer, StopReason,
};
pub use publisher::{
    DEFAULT_PUBLISH_TIMEOUT, PaymentPublisher, PublishFailure, PublishReport, PublisherOptions,
    default_batch,
};
