//! # In-Memory Payment Event Store
//!
//! In-memory implementation of [`PaymentEventStore`] for testing.
//!
//! Rows live in a thread-safe `Vec` with surrogate ids assigned on insert.
//! Failures can be injected to exercise the consumer's per-message error
//! handling.

use crate::domain::events::PaymentEvent;
use crate::domain::value_objects::{DepositAmount, MessageId, UserId};
use crate::infrastructure::persistence::traits::{
    InsertOutcome, PaymentEventStore, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// A stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPaymentEvent {
    /// Surrogate id assigned by the store.
    pub id: u64,
    /// Payer.
    pub user_id: UserId,
    /// Amount.
    pub deposit_amount: DepositAmount,
    /// Message id, when the event arrived with one.
    pub message_id: Option<MessageId>,
}

impl StoredPaymentEvent {
    /// Returns the `(user_id, deposit_amount)` pair of the row.
    #[must_use]
    pub fn pair(&self) -> (i64, DepositAmount) {
        (self.user_id.get(), self.deposit_amount)
    }
}

#[derive(Debug, Default)]
struct Tables {
    rows: Vec<StoredPaymentEvent>,
    message_ids: HashSet<MessageId>,
    next_id: u64,
}

/// In-memory implementation of [`PaymentEventStore`].
#[derive(Debug, Clone)]
pub struct InMemoryPaymentEventStore {
    storage: Arc<RwLock<Tables>>,
    row_count: Arc<AtomicUsize>,
    idempotent: bool,
    failing_inserts: Arc<AtomicUsize>,
    unreachable: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl InMemoryPaymentEventStore {
    /// Creates an empty store that writes every insert.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(Tables::default())),
            row_count: Arc::new(AtomicUsize::new(0)),
            idempotent: false,
            failing_inserts: Arc::new(AtomicUsize::new(0)),
            unreachable: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enables collapsing of inserts that repeat a message id.
    #[must_use]
    pub fn with_idempotency(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// Makes the next `count` inserts fail with a connection error.
    pub fn fail_next_inserts(&self, count: usize) {
        self.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// Makes pings and inserts fail until reset.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Returns a snapshot of all rows in insert order.
    pub async fn rows(&self) -> Vec<StoredPaymentEvent> {
        self.storage.read().await.rows.clone()
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.row_count.load(Ordering::SeqCst)
    }

    /// Returns true if the store holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for InMemoryPaymentEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentEventStore for InMemoryPaymentEventStore {
    async fn ping(&self) -> RepositoryResult<()> {
        if self.is_closed() {
            return Err(RepositoryError::Closed);
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RepositoryError::connection("store unreachable"));
        }
        Ok(())
    }

    async fn insert(
        &self,
        event: &PaymentEvent,
        message_id: Option<&MessageId>,
    ) -> RepositoryResult<InsertOutcome> {
        if self.is_closed() {
            return Err(RepositoryError::Closed);
        }
        if self.unreachable.load(Ordering::SeqCst) || self.take_injected_failure() {
            return Err(RepositoryError::connection("store unreachable"));
        }

        let mut storage = self.storage.write().await;
        let fresh = match message_id {
            Some(id) if self.idempotent => storage.message_ids.insert(id.clone()),
            _ => true,
        };
        if !fresh {
            return Ok(InsertOutcome::Duplicate);
        }

        storage.next_id += 1;
        let row = StoredPaymentEvent {
            id: storage.next_id,
            user_id: event.user_id(),
            deposit_amount: event.deposit_amount(),
            message_id: message_id.cloned(),
        };
        storage.rows.push(row);
        self.row_count.fetch_add(1, Ordering::SeqCst);
        Ok(InsertOutcome::Inserted)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event(user_id: i64, units: i64) -> PaymentEvent {
        PaymentEvent::from_parts(user_id, units).unwrap()
    }

    #[tokio::test]
    async fn new_store_is_empty() {
        let store = InMemoryPaymentEventStore::new();
        assert!(store.is_empty());
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn insert_assigns_surrogate_ids() {
        let store = InMemoryPaymentEventStore::new();
        store.insert(&event(1, 10), None).await.unwrap();
        store.insert(&event(2, 20), None).await.unwrap();

        let rows = store.rows().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[1].id, 2);
        assert_eq!(rows[1].pair(), (2, DepositAmount::from_units(20).unwrap()));
    }

    #[tokio::test]
    async fn duplicates_are_kept_without_idempotency() {
        let store = InMemoryPaymentEventStore::new();
        let id = MessageId::new("m-1").unwrap();
        store.insert(&event(1, 10), Some(&id)).await.unwrap();
        let outcome = store.insert(&event(1, 10), Some(&id)).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn idempotent_store_collapses_repeated_message_ids() {
        let store = InMemoryPaymentEventStore::new().with_idempotency(true);
        let id = MessageId::new("m-1").unwrap();
        assert_eq!(
            store.insert(&event(1, 10), Some(&id)).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert(&event(1, 10), Some(&id)).await.unwrap(),
            InsertOutcome::Duplicate
        );
        // events without an id cannot be deduplicated
        store.insert(&event(1, 10), None).await.unwrap();
        store.insert(&event(1, 10), None).await.unwrap();
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn injected_failures_affect_only_the_next_inserts() {
        let store = InMemoryPaymentEventStore::new();
        store.fail_next_inserts(1);
        let err = store.insert(&event(1, 10), None).await.unwrap_err();
        assert!(err.is_connection());
        store.insert(&event(1, 20), None).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_store_fails_ping_and_insert() {
        let store = InMemoryPaymentEventStore::new();
        store.set_unreachable(true);
        assert!(store.ping().await.is_err());
        assert!(store.insert(&event(1, 1), None).await.is_err());
        store.set_unreachable(false);
        assert!(store.insert(&event(1, 1), None).await.is_ok());
    }

    #[tokio::test]
    async fn closed_store_rejects_work() {
        let store = InMemoryPaymentEventStore::new();
        store.close().await;
        assert!(store.is_closed());
        assert!(matches!(
            store.insert(&event(1, 1), None).await,
            Err(RepositoryError::Closed)
        ));
    }

    #[tokio::test]
    async fn len_is_accurate_while_storage_is_locked() {
        let store = InMemoryPaymentEventStore::new();
        store.insert(&event(1, 10), None).await.unwrap();
        store.insert(&event(2, 20), None).await.unwrap();

        let _writer = store.storage.write().await;
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
    }
}
