//! # NATS Transport
//!
//! [`Transport`] implementation over NATS JetStream using `async-nats`.
//!
//! Every queue is a JetStream work-queue stream with one durable pull
//! consumer, so messages published before the consumer subscribes are kept
//! until it does. Queue flags pick the storage:
//!
//! - non-durable queues live in server memory and are lost on a server
//!   restart. The adapter acks each message as it hands it out, which
//!   matches auto-ack semantics.
//! - durable queues are file-backed and use explicit acks driven by the
//!   consumer.
//!
//! The `Nats-Msg-Id` header also lets the server drop duplicate publishes
//! inside its dedup window.

use crate::domain::value_objects::MessageId;
use crate::infrastructure::messaging::error::{TransportError, TransportResult};
use crate::infrastructure::messaging::traits::{
    Acknowledger, Delivery, DeliveryStream, OutboundMessage, QueueSpec, Transport,
};
use async_nats::HeaderMap;
use async_nats::jetstream::stream::{RetentionPolicy, StorageType};
use async_nats::jetstream::{self, consumer::AckPolicy, consumer::PullConsumer, consumer::pull};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Header carrying the content type.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// Header carrying the message identifier.
pub const MESSAGE_ID_HEADER: &str = "Nats-Msg-Id";

/// Default connection timeout in milliseconds.
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Connection options for [`NatsTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatsOptions {
    /// Client name reported to the server.
    pub client_name: String,
    /// Name of the durable consumer.
    pub consumer_name: String,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for NatsOptions {
    fn default() -> Self {
        Self {
            client_name: "payment-pipeline".to_string(),
            consumer_name: "payment-consumer".to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

/// NATS-backed broker session.
#[derive(Debug, Clone)]
pub struct NatsTransport {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    queues: Arc<Mutex<HashMap<String, QueueSpec>>>,
    consumer_name: String,
}

impl NatsTransport {
    /// Connects to the server at `url`.
    ///
    /// Fails fast: there is no retry of the initial connection.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connection` if the server cannot be reached.
    pub async fn connect(url: &str, options: NatsOptions) -> TransportResult<Self> {
        let client = async_nats::ConnectOptions::new()
            .name(&options.client_name)
            .connection_timeout(Duration::from_millis(options.connect_timeout_ms))
            .connect(url)
            .await
            .map_err(|e| TransportError::connection(format!("{url}: {e}")))?;

        tracing::info!(url, client = %options.client_name, "connected to NATS");

        Ok(Self {
            jetstream: jetstream::new(client.clone()),
            client,
            queues: Arc::new(Mutex::new(HashMap::new())),
            consumer_name: options.consumer_name,
        })
    }

    async fn spec_for(&self, queue: &str) -> Option<QueueSpec> {
        self.queues.lock().await.get(queue).cloned()
    }
}

/// Derives a JetStream stream name from a queue name.
///
/// Stream names may not contain `.`, `*`, `>` or whitespace.
#[must_use]
pub fn stream_name(queue: &str) -> String {
    queue
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Stream configuration backing a queue.
#[must_use]
pub fn stream_config(queue: &QueueSpec) -> jetstream::stream::Config {
    jetstream::stream::Config {
        name: stream_name(queue.name()),
        subjects: vec![queue.name().to_string()],
        retention: RetentionPolicy::WorkQueue,
        storage: if queue.is_durable() {
            StorageType::File
        } else {
            StorageType::Memory
        },
        ..Default::default()
    }
}

fn outbound_headers(message: &OutboundMessage) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE_HEADER, message.content_type.as_str());
    if let Some(id) = &message.message_id {
        headers.insert(MESSAGE_ID_HEADER, id.as_str());
    }
    headers
}

fn content_type_of(message: &async_nats::Message) -> Option<String> {
    message
        .headers
        .as_ref()
        .and_then(|h| h.get(CONTENT_TYPE_HEADER))
        .map(|v| v.as_str().to_string())
}

fn message_id_of(message: &async_nats::Message) -> Option<MessageId> {
    message
        .headers
        .as_ref()
        .and_then(|h| h.get(MESSAGE_ID_HEADER))
        .and_then(|v| MessageId::new(v.as_str()).ok())
}

struct JetStreamAcker(jetstream::Message);

impl fmt::Debug for JetStreamAcker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JetStreamAcker")
            .field(&self.0.message.subject)
            .finish()
    }
}

#[async_trait]
impl Acknowledger for JetStreamAcker {
    async fn ack(&self) -> TransportResult<()> {
        self.0
            .ack()
            .await
            .map_err(|e| TransportError::acknowledge(e.to_string()))
    }
}

#[async_trait]
impl Transport for NatsTransport {
    async fn declare_queue(&self, queue: &QueueSpec) -> TransportResult<()> {
        let mut queues = self.queues.lock().await;
        if let Some(existing) = queues.get(queue.name()) {
            if existing != queue {
                return Err(TransportError::declare(
                    queue.name(),
                    "queue already declared with different flags",
                ));
            }
            return Ok(());
        }

        self.jetstream
            .get_or_create_stream(stream_config(queue))
            .await
            .map_err(|e| TransportError::declare(queue.name(), e.to_string()))?;
        if queue.is_exclusive() || queue.is_auto_delete() {
            tracing::debug!(
                queue = queue.name(),
                "exclusive/auto-delete flags have no NATS equivalent, ignoring"
            );
        }

        tracing::info!(queue = queue.name(), durable = queue.is_durable(), "queue declared");
        queues.insert(queue.name().to_string(), queue.clone());
        Ok(())
    }

    async fn publish(&self, queue: &str, message: OutboundMessage) -> TransportResult<()> {
        let spec = self
            .spec_for(queue)
            .await
            .ok_or_else(|| TransportError::publish(format!("queue {queue} is not declared")))?;
        let headers = outbound_headers(&message);

        // The server ack confirms the stream stored the message.
        let ack = self
            .jetstream
            .publish_with_headers(spec.name().to_string(), headers, message.body)
            .await
            .map_err(|e| TransportError::publish(e.to_string()))?;
        ack.await
            .map_err(|e| TransportError::publish(e.to_string()))?;
        Ok(())
    }

    async fn consume(&self, queue: &str) -> TransportResult<DeliveryStream> {
        let spec = self
            .spec_for(queue)
            .await
            .ok_or_else(|| TransportError::subscribe(queue, "queue is not declared"))?;

        let stream = self
            .jetstream
            .get_stream(stream_name(queue))
            .await
            .map_err(|e| TransportError::subscribe(queue, e.to_string()))?;
        let consumer: PullConsumer = stream
            .get_or_create_consumer(
                &self.consumer_name,
                pull::Config {
                    durable_name: Some(self.consumer_name.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| TransportError::subscribe(queue, e.to_string()))?;
        let messages = consumer
            .messages()
            .await
            .map_err(|e| TransportError::subscribe(queue, e.to_string()))?;

        let auto_ack = !spec.is_durable();
        let queue = queue.to_string();
        let stream = messages
            .then(move |item| {
                let queue = queue.clone();
                async move {
                    let message = match item {
                        Ok(message) => message,
                        Err(e) => return Err(TransportError::stream(e.to_string())),
                    };
                    let body = message.message.payload.clone();
                    let content_type = content_type_of(&message.message);
                    let message_id = message_id_of(&message.message);
                    let delivery = if auto_ack {
                        if let Err(e) = message.ack().await {
                            tracing::warn!(%queue, error = %e, "failed to ack on receipt");
                        }
                        Delivery::auto_acked(body)
                    } else {
                        Delivery::with_acker(body, Box::new(JetStreamAcker(message)))
                    };
                    Ok(delivery
                        .with_content_type(content_type)
                        .with_message_id(message_id))
                }
            })
            .boxed();
        Ok(stream)
    }

    async fn close(&self) -> TransportResult<()> {
        self.client
            .flush()
            .await
            .map_err(|e| TransportError::connection(e.to_string()))
    }
}
