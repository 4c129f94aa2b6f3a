//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use payment_pipeline::application::services::consumer::{
    ConsumerOptions, ConsumerReport, PaymentConsumer,
};
use payment_pipeline::application::services::publisher::{PaymentPublisher, PublisherOptions};
use payment_pipeline::application::shutdown::{ShutdownTrigger, shutdown_channel};
use payment_pipeline::infrastructure::messaging::{InMemoryTransport, QueueSpec};
use payment_pipeline::infrastructure::persistence::in_memory::InMemoryPaymentEventStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const QUEUE: &str = "payment_events";

/// A running consumer over in-memory adapters.
pub struct Pipeline {
    pub transport: Arc<InMemoryTransport>,
    pub store: Arc<InMemoryPaymentEventStore>,
    pub publisher: PaymentPublisher<InMemoryTransport>,
    trigger: ShutdownTrigger,
    consumer: JoinHandle<ConsumerReport>,
}

impl Pipeline {
    pub async fn start(
        transport: InMemoryTransport,
        store: InMemoryPaymentEventStore,
        options: ConsumerOptions,
    ) -> Self {
        let transport = Arc::new(transport);
        let store = Arc::new(store);
        let (trigger, signal) = shutdown_channel();

        let active = PaymentConsumer::new(Arc::clone(&transport), Arc::clone(&store), options)
            .start()
            .await
            .expect("consumer starts");
        let consumer = tokio::spawn(active.run(signal));

        let publisher = PaymentPublisher::new(
            Arc::clone(&transport),
            QueueSpec::new(QUEUE),
            PublisherOptions::default(),
        );
        publisher.declare().await.expect("queue declared");

        Self {
            transport,
            store,
            publisher,
            trigger,
            consumer,
        }
    }

    pub async fn with_defaults() -> Self {
        Self::start(
            InMemoryTransport::new(),
            InMemoryPaymentEventStore::new(),
            ConsumerOptions::new(QueueSpec::new(QUEUE)),
        )
        .await
    }

    /// Waits until the store holds `count` rows, or panics after two seconds.
    pub async fn wait_for_rows(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.store.rows().await.len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("rows persisted in time");
    }

    /// Waits until the consumer has taken `count` deliveries.
    pub async fn wait_for_deliveries(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.transport.delivered_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("messages delivered in time");
    }

    /// Requests shutdown and waits for the consumer's report.
    pub async fn shutdown(self) -> ConsumerReport {
        self.trigger.trigger();
        self.consumer.await.expect("consumer task joins")
    }

    /// Waits for the consumer to stop on its own.
    pub async fn join(self) -> ConsumerReport {
        tokio::time::timeout(Duration::from_secs(2), self.consumer)
            .await
            .expect("consumer stops in time")
            .expect("consumer task joins")
    }
}
