//! # In-Memory Transport
//!
//! In-process implementation of [`Transport`] for tests and local runs.
//!
//! Each declared queue is an unbounded tokio channel with a single consumer.
//! Closing the transport drops every sender, which ends the consumer streams
//! the same way a broker disconnect would.

use crate::infrastructure::messaging::error::{TransportError, TransportResult};
use crate::infrastructure::messaging::traits::{
    Acknowledger, Delivery, DeliveryStream, OutboundMessage, QueueSpec, Transport,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// How deliveries are acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckBehavior {
    /// Deliveries count as acknowledged when handed out.
    #[default]
    Auto,
    /// Deliveries carry an acknowledger the consumer must call.
    Explicit,
}

#[derive(Debug)]
struct QueueSlot {
    spec: QueueSpec,
    sender: mpsc::UnboundedSender<OutboundMessage>,
    receiver: Option<mpsc::UnboundedReceiver<OutboundMessage>>,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicUsize,
    delivered: AtomicUsize,
    acked: AtomicUsize,
}

/// In-memory implementation of [`Transport`].
///
/// Cloning shares the same queues and counters.
#[derive(Debug, Clone)]
pub struct InMemoryTransport {
    queues: Arc<Mutex<HashMap<String, QueueSlot>>>,
    counters: Arc<Counters>,
    closed: Arc<AtomicBool>,
    ack_behavior: AckBehavior,
    publish_delay: Option<Duration>,
}

impl InMemoryTransport {
    /// Creates a transport whose deliveries are auto-acknowledged.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
            closed: Arc::new(AtomicBool::new(false)),
            ack_behavior: AckBehavior::Auto,
            publish_delay: None,
        }
    }

    /// Sets the acknowledgment behavior.
    #[must_use]
    pub fn with_ack_behavior(mut self, ack_behavior: AckBehavior) -> Self {
        self.ack_behavior = ack_behavior;
        self
    }

    /// Delays every publish, to exercise publish deadlines.
    #[must_use]
    pub fn with_publish_delay(mut self, delay: Duration) -> Self {
        self.publish_delay = Some(delay);
        self
    }

    /// Number of messages accepted by [`Transport::publish`].
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.counters.published.load(Ordering::SeqCst)
    }

    /// Number of messages handed to a consumer.
    #[must_use]
    pub fn delivered_count(&self) -> usize {
        self.counters.delivered.load(Ordering::SeqCst)
    }

    /// Number of deliveries acknowledged, automatically or explicitly.
    #[must_use]
    pub fn acked_count(&self) -> usize {
        self.counters.acked.load(Ordering::SeqCst)
    }

    /// Returns true once [`Transport::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn to_delivery(&self, message: OutboundMessage) -> Delivery {
        self.counters.delivered.fetch_add(1, Ordering::SeqCst);
        let delivery = match self.ack_behavior {
            AckBehavior::Auto => {
                self.counters.acked.fetch_add(1, Ordering::SeqCst);
                Delivery::auto_acked(message.body)
            }
            AckBehavior::Explicit => Delivery::with_acker(
                message.body,
                Box::new(InMemoryAcker {
                    counters: Arc::clone(&self.counters),
                }),
            ),
        };
        delivery
            .with_content_type(Some(message.content_type))
            .with_message_id(message.message_id)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct InMemoryAcker {
    counters: Arc<Counters>,
}

#[async_trait]
impl Acknowledger for InMemoryAcker {
    async fn ack(&self) -> TransportResult<()> {
        self.counters.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn declare_queue(&self, queue: &QueueSpec) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut queues = self.queues.lock().await;
        match queues.get(queue.name()) {
            Some(slot) if slot.spec != *queue => Err(TransportError::declare(
                queue.name(),
                "queue already declared with different flags",
            )),
            Some(_) => Ok(()),
            None => {
                let (sender, receiver) = mpsc::unbounded_channel();
                queues.insert(
                    queue.name().to_string(),
                    QueueSlot {
                        spec: queue.clone(),
                        sender,
                        receiver: Some(receiver),
                    },
                );
                Ok(())
            }
        }
    }

    async fn publish(&self, queue: &str, message: OutboundMessage) -> TransportResult<()> {
        if let Some(delay) = self.publish_delay {
            tokio::time::sleep(delay).await;
        }
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let queues = self.queues.lock().await;
        let slot = queues
            .get(queue)
            .ok_or_else(|| TransportError::publish(format!("queue {queue} is not declared")))?;
        slot.sender
            .send(message)
            .map_err(|_| TransportError::publish(format!("queue {queue} has been dropped")))?;
        self.counters.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn consume(&self, queue: &str) -> TransportResult<DeliveryStream> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut queues = self.queues.lock().await;
        let slot = queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::subscribe(queue, "queue is not declared"))?;
        let receiver = slot
            .receiver
            .take()
            .ok_or_else(|| TransportError::subscribe(queue, "queue already has a consumer"))?;

        let transport = self.clone();
        let stream = UnboundedReceiverStream::new(receiver)
            .map(move |message| Ok(transport.to_delivery(message)))
            .boxed();
        Ok(stream)
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.queues.lock().await.clear();
        Ok(())
    }
}
