//! # MySQL Payment Event Store
//!
//! MySQL implementation of [`PaymentEventStore`] using sqlx.
//!
//! Expects a `payment_events` table managed outside this crate:
//!
//! ```sql
//! CREATE TABLE payment_events (
//!     id             BIGINT AUTO_INCREMENT PRIMARY KEY,
//!     message_id     VARCHAR(64) NULL UNIQUE,
//!     user_id        BIGINT NOT NULL,
//!     deposit_amount DECIMAL(20, 8) NOT NULL
//! );
//! ```
//!
//! `message_id` is only written in idempotent mode.

use crate::config::StoreConfig;
use crate::domain::events::PaymentEvent;
use crate::domain::value_objects::MessageId;
use crate::infrastructure::persistence::traits::{
    InsertOutcome, PaymentEventStore, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use sqlx::Connection;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::time::Duration;

const INSERT_EVENT: &str = "INSERT INTO payment_events (user_id, deposit_amount) VALUES (?, ?)";

// A repeated message id fails on the unique key and is reported as a duplicate.
const INSERT_EVENT_IDEMPOTENT: &str =
    "INSERT INTO payment_events (message_id, user_id, deposit_amount) VALUES (?, ?, ?)";

/// MySQL implementation of [`PaymentEventStore`].
///
/// Uses connection pooling via `sqlx::MySqlPool`; the pool reconnects on its
/// own, so a store outage only fails the inserts attempted during it.
///
/// # Examples
///
/// ```ignore
/// use payment_pipeline::config::StoreConfig;
/// use payment_pipeline::infrastructure::persistence::mysql::MySqlPaymentEventStore;
///
/// let store = MySqlPaymentEventStore::connect(&StoreConfig::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MySqlPaymentEventStore {
    pool: MySqlPool,
    idempotent: bool,
}

impl MySqlPaymentEventStore {
    /// Creates a store over an existing pool.
    #[must_use]
    pub fn new(pool: MySqlPool, idempotent: bool) -> Self {
        Self { pool, idempotent }
    }

    /// Opens a pool and verifies it with a ping.
    ///
    /// Fails fast; the initial connection is never retried.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Connection` if the database cannot be
    /// reached or rejects the credentials.
    pub async fn connect(config: &StoreConfig) -> RepositoryResult<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(config.password.expose())
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
            .connect_with(options)
            .await
            .map_err(|e| RepositoryError::connection(e.to_string()))?;

        let store = Self::new(pool, config.idempotent);
        store.ping().await?;
        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            idempotent = config.idempotent,
            "connected to MySQL"
        );
        Ok(store)
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

/// Turns a failed insert into an outcome: a unique key violation means the
/// message id is already stored, anything else is an error.
fn insert_failure(e: &sqlx::Error) -> RepositoryResult<InsertOutcome> {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => Ok(InsertOutcome::Duplicate),
        _ => Err(map_sqlx_error(e)),
    }
}

fn map_sqlx_error(e: &sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolClosed => RepositoryError::Closed,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
            RepositoryError::connection(e.to_string())
        }
        _ => RepositoryError::query(e.to_string()),
    }
}

#[async_trait]
impl PaymentEventStore for MySqlPaymentEventStore {
    async fn ping(&self) -> RepositoryResult<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| map_sqlx_error(&e))?;
        conn.ping()
            .await
            .map_err(|e| RepositoryError::connection(e.to_string()))
    }

    async fn insert(
        &self,
        event: &PaymentEvent,
        message_id: Option<&MessageId>,
    ) -> RepositoryResult<InsertOutcome> {
        let user_id = event.user_id().get();
        let amount = event.deposit_amount().value();

        let executed = match message_id {
            Some(id) if self.idempotent => {
                sqlx::query(INSERT_EVENT_IDEMPOTENT)
                    .bind(id.as_str())
                    .bind(user_id)
                    .bind(amount)
                    .execute(&self.pool)
                    .await
            }
            _ => {
                sqlx::query(INSERT_EVENT)
                    .bind(user_id)
                    .bind(amount)
                    .execute(&self.pool)
                    .await
            }
        };
        let result = match executed {
            Ok(result) => result,
            Err(e) => return insert_failure(&e),
        };

        tracing::debug!(
            user_id,
            deposit_amount = %amount,
            row_id = result.last_insert_id(),
            "inserted payment event"
        );
        Ok(InsertOutcome::Inserted)
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
