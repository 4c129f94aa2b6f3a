//! End-to-end pipeline behavior over the in-memory adapters.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

mod common;

use common::{Pipeline, QUEUE};
use payment_pipeline::application::services::consumer::{
    AckMode, ConsumerOptions, ConsumerState, PaymentConsumer, StopReason,
};
use payment_pipeline::application::services::publisher::default_batch;
use payment_pipeline::application::shutdown::shutdown_channel;
use payment_pipeline::domain::events::PaymentEvent;
use payment_pipeline::domain::value_objects::{DepositAmount, MessageId};
use payment_pipeline::infrastructure::messaging::{
    AckBehavior, InMemoryTransport, OutboundMessage, QueueSpec, Transport,
};
use payment_pipeline::infrastructure::persistence::{
    InsertOutcome, PaymentEventStore, RepositoryResult,
};
use payment_pipeline::infrastructure::persistence::in_memory::InMemoryPaymentEventStore;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

fn amount(units: i64) -> DepositAmount {
    DepositAmount::from_units(units).unwrap()
}

async fn sorted_pairs(pipeline: &Pipeline) -> Vec<(i64, DepositAmount)> {
    let mut pairs: Vec<_> = pipeline.store.rows().await.iter().map(|row| row.pair()).collect();
    pairs.sort();
    pairs
}

#[tokio::test]
async fn default_batch_lands_in_store() {
    let pipeline = Pipeline::with_defaults().await;

    let report = pipeline.publisher.publish_all(default_batch()).await;
    assert!(report.is_complete());
    pipeline.wait_for_rows(3).await;

    assert_eq!(
        sorted_pairs(&pipeline).await,
        vec![(1, amount(10)), (1, amount(20)), (2, amount(20))]
    );
    let report = pipeline.shutdown().await;
    assert_eq!(report.stats.persisted, 3);
}

#[tokio::test]
async fn every_published_event_becomes_one_row() {
    let pipeline = Pipeline::with_defaults().await;

    let events: Vec<PaymentEvent> = (1..=50)
        .map(|n| PaymentEvent::from_parts(n, n * 3).unwrap())
        .collect();
    let report = pipeline.publisher.publish_all(events).await;
    assert_eq!(report.sent.len(), 50);
    pipeline.wait_for_rows(50).await;

    let report = pipeline.shutdown().await;
    assert_eq!(report.stats.received, 50);
    assert_eq!(report.stats.persisted, 50);
}

#[tokio::test]
async fn malformed_payload_is_skipped() {
    let pipeline = Pipeline::with_defaults().await;

    pipeline
        .transport
        .publish(QUEUE, OutboundMessage::json(&b"not json at all"[..]))
        .await
        .unwrap();
    pipeline
        .publisher
        .publish(&PaymentEvent::from_parts(5, 7).unwrap())
        .await
        .unwrap();
    pipeline.wait_for_rows(1).await;

    let report = pipeline.shutdown().await;
    assert_eq!(report.stats.decode_failures, 1);
    assert_eq!(report.stats.persisted, 1);
}

#[tokio::test]
async fn only_the_malformed_row_is_missing() {
    let pipeline = Pipeline::with_defaults().await;

    pipeline
        .transport
        .publish(QUEUE, OutboundMessage::json(&br#"{"user_id":"one","deposit_amount":5}"#[..]))
        .await
        .unwrap();
    pipeline
        .publisher
        .publish(&PaymentEvent::from_parts(5, 7).unwrap())
        .await
        .unwrap();
    pipeline.wait_for_rows(1).await;

    assert_eq!(sorted_pairs(&pipeline).await, vec![(5, amount(7))]);
    pipeline.shutdown().await;
}

#[tokio::test]
async fn store_outage_discards_message_and_recovers() {
    let pipeline = Pipeline::with_defaults().await;

    pipeline.store.fail_next_inserts(1);
    pipeline
        .publisher
        .publish(&PaymentEvent::from_parts(1, 10).unwrap())
        .await
        .unwrap();
    pipeline
        .publisher
        .publish(&PaymentEvent::from_parts(2, 20).unwrap())
        .await
        .unwrap();
    pipeline.wait_for_rows(1).await;

    assert_eq!(sorted_pairs(&pipeline).await, vec![(2, amount(20))]);
    let report = pipeline.shutdown().await;
    assert_eq!(report.stats.insert_failures, 1);
    assert_eq!(report.stop_reason, StopReason::ShutdownRequested);
}

/// Store that records the consumer state at the moment it is closed.
#[derive(Debug)]
struct StateRecordingStore {
    inner: InMemoryPaymentEventStore,
    states: Mutex<Option<watch::Receiver<ConsumerState>>>,
    state_at_close: Mutex<Option<ConsumerState>>,
}

#[async_trait]
impl PaymentEventStore for StateRecordingStore {
    async fn ping(&self) -> RepositoryResult<()> {
        self.inner.ping().await
    }

    async fn insert(
        &self,
        event: &PaymentEvent,
        message_id: Option<&MessageId>,
    ) -> RepositoryResult<InsertOutcome> {
        self.inner.insert(event, message_id).await
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    async fn close(&self) {
        let state = self.states.lock().unwrap().as_ref().map(|rx| *rx.borrow());
        *self.state_at_close.lock().unwrap() = state;
        self.inner.close().await;
    }
}

#[tokio::test]
async fn shutdown_drains_and_closes_store() {
    let transport = Arc::new(InMemoryTransport::new());
    let store = Arc::new(StateRecordingStore {
        inner: InMemoryPaymentEventStore::new(),
        states: Mutex::new(None),
        state_at_close: Mutex::new(None),
    });
    let (trigger, signal) = shutdown_channel();
    let consumer = PaymentConsumer::new(
        Arc::clone(&transport),
        Arc::clone(&store),
        ConsumerOptions::new(QueueSpec::new(QUEUE)),
    );
    *store.states.lock().unwrap() = Some(consumer.state_watch());
    let mut states = consumer.state_watch();
    let active = consumer.start().await.unwrap();
    let handle = tokio::spawn(active.run(signal));

    trigger.trigger();
    let mut seen = vec![*states.borrow_and_update()];
    while states.changed().await.is_ok() {
        seen.push(*states.borrow_and_update());
    }
    let report = handle.await.unwrap();

    assert_eq!(report.stop_reason, StopReason::ShutdownRequested);
    assert_eq!(
        *store.state_at_close.lock().unwrap(),
        Some(ConsumerState::Draining)
    );
    assert_eq!(seen.last(), Some(&ConsumerState::Stopped));
    assert!(store.is_closed());
    assert!(transport.is_closed());
}

#[tokio::test]
async fn broker_disconnect_stops_consumer() {
    let pipeline = Pipeline::with_defaults().await;
    pipeline.publisher.publish_all(default_batch()).await;
    pipeline.wait_for_rows(3).await;

    pipeline.transport.close().await.unwrap();
    let report = pipeline.join().await;
    assert_eq!(report.stop_reason, StopReason::StreamEnded);
}

#[tokio::test]
async fn redelivered_message_id_is_stored_once() {
    let pipeline = Pipeline::start(
        InMemoryTransport::new(),
        InMemoryPaymentEventStore::new().with_idempotency(true),
        ConsumerOptions::new(QueueSpec::new(QUEUE)),
    )
    .await;

    let event = PaymentEvent::from_parts(9, 90).unwrap();
    let id = pipeline.publisher.publish(&event).await.unwrap();
    let body = event.encode().unwrap();
    pipeline
        .transport
        .publish(QUEUE, OutboundMessage::json(body).with_message_id(id))
        .await
        .unwrap();
    pipeline.publisher.publish(&event).await.unwrap();
    pipeline.wait_for_deliveries(3).await;
    pipeline.wait_for_rows(2).await;

    let report = pipeline.shutdown().await;
    assert_eq!(report.stats.persisted, 2);
    assert_eq!(report.stats.duplicates, 1);
}

#[tokio::test]
async fn after_insert_mode_acks_only_handled_messages() {
    let pipeline = Pipeline::start(
        InMemoryTransport::new().with_ack_behavior(AckBehavior::Explicit),
        InMemoryPaymentEventStore::new(),
        ConsumerOptions::new(QueueSpec::new(QUEUE)).with_ack_mode(AckMode::AfterInsert),
    )
    .await;

    let transport = Arc::clone(&pipeline.transport);

    pipeline.store.fail_next_inserts(1);
    pipeline.publisher.publish_all(default_batch()).await;
    pipeline.wait_for_rows(2).await;

    let report = pipeline.shutdown().await;
    assert_eq!(report.stats.insert_failures, 1);
    assert_eq!(report.stats.persisted, 2);
    assert_eq!(transport.delivered_count(), 3);
    assert_eq!(transport.acked_count(), 2);
}
