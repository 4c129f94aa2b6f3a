//! # Payment Publisher
//!
//! Encodes payment events and sends them to one queue, each send bounded
//! by a deadline.
//!
//! [`PaymentPublisher::publish_all`] fans a batch out as concurrent tasks
//! and waits for every one of them. A failing or stalled send only fails
//! its own entry in the [`PublishReport`].

use crate::application::error::{PublishError, StartupError};
use crate::domain::events::PaymentEvent;
use crate::domain::value_objects::MessageId;
use crate::infrastructure::messaging::traits::{OutboundMessage, QueueSpec, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Default per-send deadline.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Publisher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherOptions {
    /// Deadline for each individual send.
    pub timeout: Duration,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }
}

/// One send that did not make it.
#[derive(Debug)]
pub struct PublishFailure {
    /// The event that was not sent.
    pub event: PaymentEvent,
    /// Why.
    pub error: PublishError,
}

/// Outcome of a batch.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Message ids of the sends the broker accepted.
    pub sent: Vec<MessageId>,
    /// Sends that failed or timed out.
    pub failures: Vec<PublishFailure>,
}

impl PublishReport {
    /// Returns true if every send succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The three events the reference producer sends.
#[must_use]
pub fn default_batch() -> Vec<PaymentEvent> {
    [(1, 10), (1, 20), (2, 20)]
        .into_iter()
        .filter_map(|(user_id, units)| PaymentEvent::from_parts(user_id, units).ok())
        .collect()
}

/// Publishes payment events to a single queue.
#[derive(Debug)]
pub struct PaymentPublisher<T: ?Sized> {
    transport: Arc<T>,
    queue: QueueSpec,
    options: PublisherOptions,
}

impl<T> Clone for PaymentPublisher<T>
where
    T: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            queue: self.queue.clone(),
            options: self.options,
        }
    }
}

impl<T> PaymentPublisher<T>
where
    T: Transport + ?Sized + 'static,
{
    /// Creates a publisher.
    #[must_use]
    pub fn new(transport: Arc<T>, queue: QueueSpec, options: PublisherOptions) -> Self {
        Self {
            transport,
            queue,
            options,
        }
    }

    /// Returns the target queue.
    #[must_use]
    pub fn queue(&self) -> &QueueSpec {
        &self.queue
    }

    /// Declares the target queue.
    ///
    /// # Errors
    ///
    /// Returns `StartupError::Transport` if the broker refuses the queue.
    pub async fn declare(&self) -> Result<(), StartupError> {
        self.transport.declare_queue(&self.queue).await?;
        Ok(())
    }

    /// Sends one event and returns the message id it was tagged with.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::Encode` if the event cannot be serialized,
    /// `PublishError::Transport` if the broker rejects it, or
    /// `PublishError::DeadlineExceeded` if the send takes longer than the
    /// configured timeout.
    pub async fn publish(&self, event: &PaymentEvent) -> Result<MessageId, PublishError> {
        let body = event.encode()?;
        let message_id = MessageId::generate();
        let message = OutboundMessage::json(body).with_message_id(message_id.clone());
        let queue = self.queue.name();

        match tokio::time::timeout(self.options.timeout, self.transport.publish(queue, message))
            .await
        {
            Ok(Ok(())) => {
                tracing::info!(
                    queue,
                    %message_id,
                    user_id = event.user_id().get(),
                    deposit_amount = %event.deposit_amount(),
                    "sent payment event"
                );
                Ok(message_id)
            }
            Ok(Err(e)) => {
                tracing::error!(queue, %message_id, error = %e, "failed to send payment event");
                Err(e.into())
            }
            Err(_) => {
                let timeout_ms = u64::try_from(self.options.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::error!(queue, %message_id, timeout_ms, "payment event send timed out");
                Err(PublishError::deadline_exceeded(timeout_ms))
            }
        }
    }

    /// Sends every event concurrently and waits for all of them.
    ///
    /// Returns only after each send has completed, failed, or hit its
    /// deadline. Order of `sent` follows completion, not input order.
    pub async fn publish_all(&self, events: Vec<PaymentEvent>) -> PublishReport {
        let mut tasks = JoinSet::new();
        let mut pending = Vec::with_capacity(events.len());

        for event in events {
            let publisher = self.clone();
            let handle = tasks.spawn(async move { (event, publisher.publish(&event).await) });
            pending.push((handle.id(), event));
        }

        let mut report = PublishReport::default();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (_, Ok(message_id)))) => report.sent.push(message_id),
                Ok((_, (event, Err(error)))) => {
                    report.failures.push(PublishFailure { event, error });
                }
                Err(e) => {
                    tracing::error!(error = %e, "publish task failed");
                    if let Some((_, event)) = pending.iter().find(|(id, _)| *id == e.id()) {
                        report.failures.push(PublishFailure {
                            event: *event,
                            error: PublishError::task_failed(e.to_string()),
                        });
                    }
                }
            }
        }

        tracing::info!(
            queue = self.queue.name(),
            sent = report.sent.len(),
            failed = report.failures.len(),
            "batch finished"
        );
        report
    }
}
