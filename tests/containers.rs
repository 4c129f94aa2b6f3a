//! Full pipeline against real NATS (JetStream) and MySQL containers.
//!
//! Needs Docker; run with `cargo test --test containers -- --ignored`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use payment_pipeline::application::services::publisher::default_batch;
use payment_pipeline::application::shutdown::shutdown_channel;
use payment_pipeline::bootstrap;
use payment_pipeline::config::{AppConfig, Secret};
use payment_pipeline::infrastructure::messaging::QueueSpec;
use payment_pipeline::infrastructure::persistence::mysql::MySqlPaymentEventStore;
use rust_decimal::Decimal;
use sqlx::MySqlPool;
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

const SCHEMA: &str = "CREATE TABLE payment_events (
    id             BIGINT AUTO_INCREMENT PRIMARY KEY,
    message_id     VARCHAR(64) NULL UNIQUE,
    user_id        BIGINT NOT NULL,
    deposit_amount DECIMAL(20, 8) NOT NULL
)";

struct Services {
    _nats: ContainerAsync<GenericImage>,
    _mysql: ContainerAsync<GenericImage>,
    config: AppConfig,
    admin: MySqlPaymentEventStore,
}

async fn start_services() -> Services {
    let nats = GenericImage::new("nats", "2.10")
        .with_exposed_port(4222.tcp())
        .with_wait_for(WaitFor::message_on_stderr("Server is ready"))
        .with_cmd(["-js"])
        .start()
        .await
        .expect("nats container");
    let mysql = GenericImage::new("mysql", "8.0")
        .with_exposed_port(3306.tcp())
        .with_wait_for(WaitFor::message_on_stderr(
            "port: 3306  MySQL Community Server",
        ))
        .with_env_var("MYSQL_ROOT_PASSWORD", "secret")
        .with_env_var("MYSQL_DATABASE", "payments")
        .start()
        .await
        .expect("mysql container");

    let mut config = AppConfig::default();
    config.broker.url = format!(
        "nats://127.0.0.1:{}",
        nats.get_host_port_ipv4(4222).await.unwrap()
    );
    config.store.host = "127.0.0.1".to_string();
    config.store.port = mysql.get_host_port_ipv4(3306).await.unwrap();
    config.store.password = Secret::new("secret");

    let admin = MySqlPaymentEventStore::connect(&config.store)
        .await
        .expect("mysql reachable");
    sqlx::query(SCHEMA).execute(admin.pool()).await.unwrap();

    Services {
        _nats: nats,
        _mysql: mysql,
        config,
        admin,
    }
}

async fn wait_for_rows(pool: &MySqlPool, count: usize) -> Vec<(i64, Decimal)> {
    let mut rows: Vec<(i64, Decimal)> = Vec::new();
    for _ in 0..100 {
        rows = sqlx::query_as(
            "SELECT user_id, deposit_amount FROM payment_events ORDER BY user_id, deposit_amount",
        )
        .fetch_all(pool)
        .await
        .unwrap();
        if rows.len() >= count {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    rows
}

fn default_rows() -> Vec<(i64, Decimal)> {
    vec![
        (1, Decimal::from(10)),
        (1, Decimal::from(20)),
        (2, Decimal::from(20)),
    ]
}

#[tokio::test]
#[ignore = "requires docker"]
async fn default_queue_keeps_messages_published_before_the_consumer_starts() {
    let services = start_services().await;
    let config = services.config.clone();
    assert!(!config.broker.queue.is_durable());

    let report = bootstrap::run_publisher(&config, default_batch())
        .await
        .expect("publisher starts");
    assert!(report.is_complete());

    let (trigger, signal) = shutdown_channel();
    let consumer_config = config.clone();
    let consumer =
        tokio::spawn(async move { bootstrap::run_consumer(&consumer_config, signal).await });

    let rows = wait_for_rows(services.admin.pool(), 3).await;
    assert_eq!(rows, default_rows());

    trigger.trigger();
    let report = consumer.await.unwrap().expect("consumer starts");
    assert_eq!(report.stats.persisted, 3);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn durable_queue_persists_with_explicit_acks() {
    let services = start_services().await;
    let mut config = services.config.clone();
    config.broker.queue = QueueSpec::new("payment_events").with_durable(true);
    config.store.idempotent = true;

    let (trigger, signal) = shutdown_channel();
    let consumer_config = config.clone();
    let consumer =
        tokio::spawn(async move { bootstrap::run_consumer(&consumer_config, signal).await });

    let report = bootstrap::run_publisher(&config, default_batch())
        .await
        .expect("publisher starts");
    assert!(report.is_complete());

    let rows = wait_for_rows(services.admin.pool(), 3).await;
    assert_eq!(rows, default_rows());

    trigger.trigger();
    let report = consumer.await.unwrap().expect("consumer starts");
    assert_eq!(report.stats.persisted, 3);
}
