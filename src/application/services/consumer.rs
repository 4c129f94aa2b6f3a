//! # Payment Consumer
//!
//! The consumption loop: take deliveries from one queue in order, decode
//! each into a [`PaymentEvent`] and write it through the persistence
//! gateway.
//!
//! # Lifecycle
//!
//! ```text
//! Idle -> Connected -> Consuming -> Draining -> Stopped
//! ```
//!
//! - `Idle -> Connected`: the store answers a ping.
//! - `Connected -> Consuming`: the queue is declared and subscribed.
//! - `Consuming`: one delivery at a time. Undecodable payloads and failed
//!   inserts are logged and discarded; the loop keeps going.
//! - `Consuming -> Draining`: shutdown was requested, the delivery stream
//!   ended or failed, or the store handle was closed.
//! - `Draining -> Stopped`: store and transport handles are released.
//!   `Stopped` is terminal.
//!
//! Startup failures come back synchronously from [`PaymentConsumer::start`];
//! per-message failures are only logged and counted in the
//! [`ConsumerReport`].
//!
//! # Examples
//!
//! ```ignore
//! let consumer = PaymentConsumer::new(transport, store, ConsumerOptions::default());
//! let active = consumer.start().await?;
//! let handle = tokio::spawn(active.run(shutdown_signal));
//! // ...
//! trigger.trigger();
//! let report = handle.await?;
//! ```

use crate::application::error::StartupError;
use crate::application::shutdown::ShutdownSignal;
use crate::domain::events::PaymentEvent;
use crate::infrastructure::messaging::traits::{Delivery, DeliveryStream, QueueSpec, Transport};
use crate::infrastructure::persistence::traits::{InsertOutcome, PaymentEventStore};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Longest payload excerpt written to a log line.
const PAYLOAD_PREVIEW_CHARS: usize = 256;

/// Consumer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumerState {
    /// Constructed, nothing verified yet.
    Idle,
    /// Store reachable.
    Connected,
    /// Subscribed and processing deliveries.
    Consuming,
    /// Releasing handles.
    Draining,
    /// Terminal.
    Stopped,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Consuming => write!(f, "CONSUMING"),
            Self::Draining => write!(f, "DRAINING"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// When a delivery is acknowledged to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// On receipt, before any processing. A failed insert loses the event.
    #[default]
    OnDelivery,
    /// After the insert succeeded or was recognized as a duplicate. A failed
    /// insert leaves the delivery to the broker's redelivery. Undecodable
    /// payloads are still acknowledged so they are not redelivered forever.
    AfterInsert,
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown signal fired.
    ShutdownRequested,
    /// The delivery stream ended.
    StreamEnded,
    /// The delivery stream reported an error.
    StreamFailed(String),
    /// The store handle was closed underneath the loop.
    StoreClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShutdownRequested => write!(f, "shutdown requested"),
            Self::StreamEnded => write!(f, "delivery stream ended"),
            Self::StreamFailed(e) => write!(f, "delivery stream failed: {e}"),
            Self::StoreClosed => write!(f, "store closed"),
        }
    }
}

/// Per-message counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsumerStats {
    /// Deliveries taken from the stream.
    pub received: u64,
    /// Rows written.
    pub persisted: u64,
    /// Inserts collapsed by the idempotency key.
    pub duplicates: u64,
    /// Payloads discarded because they did not decode.
    pub decode_failures: u64,
    /// Events discarded because the insert failed.
    pub insert_failures: u64,
    /// Acknowledgments the broker rejected.
    pub ack_failures: u64,
}

/// Summary returned when the loop reaches `Stopped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Counters at stop time.
    pub stats: ConsumerStats,
    /// Why the loop stopped.
    pub stop_reason: StopReason,
}

/// Consumer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsumerOptions {
    queue: QueueSpec,
    ack_mode: AckMode,
}

impl ConsumerOptions {
    /// Creates options for the given queue with the default ack mode.
    #[must_use]
    pub fn new(queue: QueueSpec) -> Self {
        Self {
            queue,
            ack_mode: AckMode::default(),
        }
    }

    /// Sets the ack mode.
    #[must_use]
    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    /// Returns the queue.
    #[must_use]
    pub fn queue(&self) -> &QueueSpec {
        &self.queue
    }

    /// Returns the ack mode.
    #[must_use]
    pub fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }
}

fn transition(state: &watch::Sender<ConsumerState>, to: ConsumerState) {
    let from = state.send_replace(to);
    tracing::debug!(%from, %to, "consumer state change");
}

/// A consumer that has not been started yet.
#[derive(Debug)]
pub struct PaymentConsumer<T: ?Sized, S: ?Sized> {
    transport: Arc<T>,
    store: Arc<S>,
    options: ConsumerOptions,
    state: watch::Sender<ConsumerState>,
}

impl<T, S> PaymentConsumer<T, S>
where
    T: Transport + ?Sized,
    S: PaymentEventStore + ?Sized,
{
    /// Creates a consumer in the `Idle` state.
    #[must_use]
    pub fn new(transport: Arc<T>, store: Arc<S>, options: ConsumerOptions) -> Self {
        let (state, _) = watch::channel(ConsumerState::Idle);
        Self {
            transport,
            store,
            options,
            state,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes the latest state.
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    /// Verifies the store, declares the queue and subscribes to it.
    ///
    /// # Errors
    ///
    /// Returns `StartupError::Store` if the store does not answer a ping and
    /// `StartupError::Transport` if declaration or subscription fails. The
    /// consumer ends up `Stopped` in both cases.
    pub async fn start(self) -> Result<ActiveConsumer<T, S>, StartupError> {
        let queue = self.options.queue().name().to_string();
        match self.subscribe().await {
            Ok(deliveries) => {
                tracing::info!(%queue, ack_mode = ?self.options.ack_mode(), "waiting for messages");
                Ok(ActiveConsumer {
                    transport: self.transport,
                    store: self.store,
                    options: self.options,
                    state: self.state,
                    deliveries,
                    stats: ConsumerStats::default(),
                })
            }
            Err(e) => {
                tracing::error!(%queue, error = %e, "consumer failed to start");
                transition(&self.state, ConsumerState::Stopped);
                Err(e)
            }
        }
    }

    /// Starts the consumer and runs it until it stops.
    ///
    /// # Errors
    ///
    /// Returns the startup error, if any; see [`start`](Self::start).
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<ConsumerReport, StartupError> {
        let active = self.start().await?;
        Ok(active.run(shutdown).await)
    }

    async fn subscribe(&self) -> Result<DeliveryStream, StartupError> {
        self.store.ping().await?;
        transition(&self.state, ConsumerState::Connected);

        let queue = self.options.queue();
        self.transport.declare_queue(queue).await?;
        let deliveries = self.transport.consume(queue.name()).await?;
        transition(&self.state, ConsumerState::Consuming);
        Ok(deliveries)
    }
}

/// A consumer in the `Consuming` state.
pub struct ActiveConsumer<T: ?Sized, S: ?Sized> {
    transport: Arc<T>,
    store: Arc<S>,
    options: ConsumerOptions,
    state: watch::Sender<ConsumerState>,
    deliveries: DeliveryStream,
    stats: ConsumerStats,
}

impl<T: fmt::Debug + ?Sized, S: fmt::Debug + ?Sized> fmt::Debug for ActiveConsumer<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveConsumer")
            .field("transport", &self.transport)
            .field("store", &self.store)
            .field("options", &self.options)
            .field("state", &*self.state.borrow())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

enum Step {
    Shutdown,
    Next(Option<Delivery>),
    Failed(String),
}

impl<T, S> ActiveConsumer<T, S>
where
    T: Transport + ?Sized,
    S: PaymentEventStore + ?Sized,
{
    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes the latest state.
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    /// Processes deliveries until shutdown, stream end or store closure.
    ///
    /// The shutdown signal is checked between messages only; a delivery
    /// that is being decoded or inserted always finishes first.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> ConsumerReport {
        let queue = self.options.queue().name().to_string();

        let stop_reason = loop {
            if self.store.is_closed() {
                break StopReason::StoreClosed;
            }
            let step = tokio::select! {
                biased;
                () = shutdown.wait() => Step::Shutdown,
                next = self.deliveries.next() => match next {
                    Some(Ok(delivery)) => Step::Next(Some(delivery)),
                    Some(Err(e)) => Step::Failed(e.to_string()),
                    None => Step::Next(None),
                },
            };
            match step {
                Step::Shutdown => break StopReason::ShutdownRequested,
                Step::Failed(e) => break StopReason::StreamFailed(e),
                Step::Next(None) => break StopReason::StreamEnded,
                Step::Next(Some(delivery)) => self.handle(&queue, delivery).await,
            }
        };

        match &stop_reason {
            StopReason::StreamFailed(e) => {
                tracing::error!(%queue, error = %e, "delivery stream failed, stopping consumer");
            }
            reason => tracing::info!(%queue, %reason, "stopping consumer"),
        }

        transition(&self.state, ConsumerState::Draining);
        self.store.close().await;
        if let Err(e) = self.transport.close().await {
            tracing::warn!(%queue, error = %e, "transport did not close cleanly");
        }
        transition(&self.state, ConsumerState::Stopped);

        tracing::info!(
            %queue,
            received = self.stats.received,
            persisted = self.stats.persisted,
            duplicates = self.stats.duplicates,
            decode_failures = self.stats.decode_failures,
            insert_failures = self.stats.insert_failures,
            "consumer stopped"
        );
        ConsumerReport {
            stats: self.stats,
            stop_reason,
        }
    }

    async fn handle(&mut self, queue: &str, mut delivery: Delivery) {
        self.stats.received += 1;
        let message_id = delivery.message_id.clone();
        let message_id_field = message_id.as_ref().map(ToString::to_string);

        if self.options.ack_mode() == AckMode::OnDelivery {
            self.acknowledge(queue, &mut delivery).await;
        }

        let event = match PaymentEvent::decode(&delivery.body) {
            Ok(event) => event,
            Err(e) => {
                self.stats.decode_failures += 1;
                tracing::warn!(
                    queue,
                    message_id = message_id_field.as_deref(),
                    payload = %delivery.body_preview(PAYLOAD_PREVIEW_CHARS),
                    error = %e,
                    "discarding undecodable message"
                );
                self.acknowledge(queue, &mut delivery).await;
                return;
            }
        };

        match self.store.insert(&event, message_id.as_ref()).await {
            Ok(InsertOutcome::Inserted) => {
                self.stats.persisted += 1;
                tracing::debug!(
                    queue,
                    message_id = message_id_field.as_deref(),
                    user_id = event.user_id().get(),
                    deposit_amount = %event.deposit_amount(),
                    "stored payment event"
                );
                self.acknowledge(queue, &mut delivery).await;
            }
            Ok(InsertOutcome::Duplicate) => {
                self.stats.duplicates += 1;
                tracing::info!(
                    queue,
                    message_id = message_id_field.as_deref(),
                    "skipping redelivered payment event"
                );
                self.acknowledge(queue, &mut delivery).await;
            }
            Err(e) => {
                self.stats.insert_failures += 1;
                tracing::error!(
                    queue,
                    message_id = message_id_field.as_deref(),
                    user_id = event.user_id().get(),
                    deposit_amount = %event.deposit_amount(),
                    error = %e,
                    "discarding payment event after failed insert"
                );
            }
        }
    }

    async fn acknowledge(&mut self, queue: &str, delivery: &mut Delivery) {
        if let Err(e) = delivery.ack().await {
            self.stats.ack_failures += 1;
            tracing::warn!(queue, error = %e, "failed to acknowledge delivery");
        }
    }
}
