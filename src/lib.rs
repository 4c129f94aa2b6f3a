//! # Payment Pipeline
//!
//! Moves payment events from producers to a relational store through a
//! message broker.
//!
//! ```text
//! PaymentPublisher --> Transport (queue) --> PaymentConsumer --> PaymentEventStore
//! ```
//!
//! # Layers
//!
//! - [`domain`]: the [`PaymentEvent`](domain::events::PaymentEvent) record,
//!   its value objects and the JSON wire codec
//! - [`application`]: publisher and consumer services, startup errors and
//!   shutdown signalling
//! - [`infrastructure`]: the [`Transport`](infrastructure::messaging::Transport)
//!   and [`PaymentEventStore`](infrastructure::persistence::PaymentEventStore)
//!   ports with in-memory, NATS and MySQL adapters
//! - [`config`] and [`telemetry`]: process configuration and logging
//!
//! # Features
//!
//! - `nats` (default): NATS transport and the [`bootstrap`] wiring
//! - `cli`: the `payment-consumer` and `payment-publisher` binaries

pub mod application;
#[cfg(feature = "nats")]
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod telemetry;
