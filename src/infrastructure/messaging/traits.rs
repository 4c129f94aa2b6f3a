//! # Transport Trait
//!
//! Port definition for the message broker session.
//!
//! A [`Transport`] is one connection plus one logical channel to a broker.
//! It declares named queues, publishes raw payloads to them, and hands out
//! a lazy, non-restartable stream of [`Delivery`] values per queue.
//!
//! # Examples
//!
//! ```ignore
//! use payment_pipeline::infrastructure::messaging::{OutboundMessage, QueueSpec, Transport};
//!
//! async fn send(transport: &impl Transport) -> TransportResult<()> {
//!     let queue = QueueSpec::new("payment_events");
//!     transport.declare_queue(&queue).await?;
//!     transport
//!         .publish(queue.name(), OutboundMessage::json(br#"{"user_id":1,"deposit_amount":10}"#.to_vec()))
//!         .await
//! }
//! ```

use crate::domain::events::CONTENT_TYPE;
use crate::domain::value_objects::MessageId;
use crate::infrastructure::messaging::error::TransportResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Queue used when none is configured.
pub const DEFAULT_QUEUE_NAME: &str = "payment_events";

/// Queue declaration parameters.
///
/// Defaults describe the reference deployment: non-durable, non-exclusive,
/// auto-delete disabled, no extra arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSpec {
    name: String,
    durable: bool,
    auto_delete: bool,
    exclusive: bool,
}

impl Default for QueueSpec {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_NAME)
    }
}

impl QueueSpec {
    /// Creates a declaration with the default flags.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: false,
            auto_delete: false,
            exclusive: false,
        }
    }

    /// Sets whether the queue survives broker restarts.
    #[must_use]
    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Sets whether the broker removes the queue once unused.
    #[must_use]
    pub fn with_auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }

    /// Sets whether the queue is restricted to this session.
    #[must_use]
    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Returns the queue name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the queue is durable.
    #[inline]
    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Returns true if the queue is auto-deleted.
    #[inline]
    #[must_use]
    pub fn is_auto_delete(&self) -> bool {
        self.auto_delete
    }

    /// Returns true if the queue is exclusive.
    #[inline]
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

/// A message on its way to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Raw body.
    pub body: Bytes,
    /// Content type tag.
    pub content_type: String,
    /// Identifier used to collapse redeliveries.
    pub message_id: Option<MessageId>,
}

impl OutboundMessage {
    /// Creates a JSON message without an identifier.
    #[must_use]
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: CONTENT_TYPE.to_string(),
            message_id: None,
        }
    }

    /// Attaches a message identifier.
    #[must_use]
    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }
}

/// Acknowledges one delivery back to the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync + fmt::Debug {
    /// Confirms the delivery so the broker drops it.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Acknowledge` if the broker rejects the ack.
    async fn ack(&self) -> TransportResult<()>;
}

/// A raw message received from the broker.
///
/// Deliveries without an [`Acknowledger`] were acknowledged by the
/// transport at delivery time; [`Delivery::ack`] is a no-op for them.
#[derive(Debug)]
pub struct Delivery {
    /// Raw body.
    pub body: Bytes,
    /// Content type tag, if the publisher set one.
    pub content_type: Option<String>,
    /// Message identifier, if the publisher set one.
    pub message_id: Option<MessageId>,
    acker: Option<Box<dyn Acknowledger>>,
}

impl Delivery {
    /// Creates a delivery that the transport already acknowledged.
    #[must_use]
    pub fn auto_acked(body: Bytes) -> Self {
        Self {
            body,
            content_type: None,
            message_id: None,
            acker: None,
        }
    }

    /// Creates a delivery that still needs an explicit ack.
    #[must_use]
    pub fn with_acker(body: Bytes, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            body,
            content_type: None,
            message_id: None,
            acker: Some(acker),
        }
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Sets the message identifier.
    #[must_use]
    pub fn with_message_id(mut self, message_id: Option<MessageId>) -> Self {
        self.message_id = message_id;
        self
    }

    /// Returns true if the delivery still waits for an explicit ack.
    #[must_use]
    pub fn requires_ack(&self) -> bool {
        self.acker.is_some()
    }

    /// Acknowledges the delivery. Calling it twice only acks once.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Acknowledge` if the broker rejects the ack.
    pub async fn ack(&mut self) -> TransportResult<()> {
        match self.acker.take() {
            Some(acker) => acker.ack().await,
            None => Ok(()),
        }
    }

    /// Returns a bounded, lossy UTF-8 preview of the body for log lines.
    #[must_use]
    pub fn body_preview(&self, max_chars: usize) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let mut preview: String = text.chars().take(max_chars).collect();
        if text.chars().count() > max_chars {
            preview.push('…');
        }
        preview
    }
}

/// Stream of deliveries for one queue.
///
/// Ends when the broker connection goes away; an `Err` item reports a
/// mid-stream failure.
pub type DeliveryStream = BoxStream<'static, TransportResult<Delivery>>;

/// Broker session.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Declares a queue. Declaring an existing queue again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Declare` if the broker refuses the queue.
    async fn declare_queue(&self, queue: &QueueSpec) -> TransportResult<()>;

    /// Publishes one message to the named queue.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Publish` if the broker does not accept it,
    /// or `TransportError::Closed` after [`Transport::close`].
    async fn publish(&self, queue: &str, message: OutboundMessage) -> TransportResult<()>;

    /// Subscribes to the named queue.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Subscribe` if the subscription is refused.
    async fn consume(&self, queue: &str) -> TransportResult<DeliveryStream>;

    /// Closes the session, flushing anything buffered.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    async fn close(&self) -> TransportResult<()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct CountingAcker(Arc<AtomicUsize>);

    #[async_trait]
    impl Acknowledger for CountingAcker {
        async fn ack(&self) -> TransportResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn queue_spec_defaults() {
        let spec = QueueSpec::new("payment_events");
        assert_eq!(spec.name(), "payment_events");
        assert!(!spec.is_durable());
        assert!(!spec.is_auto_delete());
        assert!(!spec.is_exclusive());

        let durable = spec.with_durable(true);
        assert!(durable.is_durable());
    }

    #[test]
    fn outbound_json_sets_content_type() {
        let message = OutboundMessage::json(b"{}".to_vec());
        assert_eq!(message.content_type, "application/json");
        assert!(message.message_id.is_none());
    }

    #[tokio::test]
    async fn auto_acked_delivery_ack_is_noop() {
        let mut delivery = Delivery::auto_acked(Bytes::from_static(b"x"));
        assert!(!delivery.requires_ack());
        assert!(delivery.ack().await.is_ok());
    }

    #[tokio::test]
    async fn explicit_ack_happens_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut delivery = Delivery::with_acker(
            Bytes::from_static(b"x"),
            Box::new(CountingAcker(Arc::clone(&count))),
        );
        assert!(delivery.requires_ack());
        delivery.ack().await.unwrap();
        delivery.ack().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!delivery.requires_ack());
    }

    #[test]
    fn body_preview_truncates() {
        let delivery = Delivery::auto_acked(Bytes::from_static(b"abcdefgh"));
        assert_eq!(delivery.body_preview(3), "abc…");
        assert_eq!(delivery.body_preview(20), "abcdefgh");
    }
}
