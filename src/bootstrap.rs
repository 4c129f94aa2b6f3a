//! # Bootstrap
//!
//! Wires the NATS transport and the MySQL store into the application
//! services from an [`AppConfig`].

use crate::application::error::StartupError;
use crate::application::services::consumer::{ConsumerOptions, ConsumerReport, PaymentConsumer};
use crate::application::services::publisher::{PaymentPublisher, PublishReport, PublisherOptions};
use crate::application::shutdown::ShutdownSignal;
use crate::config::{AppConfig, BrokerConfig};
use crate::domain::events::PaymentEvent;
use crate::infrastructure::messaging::nats::{NatsOptions, NatsTransport};
use crate::infrastructure::messaging::traits::Transport;
use crate::infrastructure::persistence::mysql::MySqlPaymentEventStore;
use std::sync::Arc;

/// Converts broker settings into NATS connection options.
#[must_use]
pub fn nats_options(broker: &BrokerConfig) -> NatsOptions {
    NatsOptions {
        client_name: broker.client_name.clone(),
        consumer_name: broker.consumer_name.clone(),
        connect_timeout_ms: broker.connect_timeout_ms,
    }
}

/// Connects to the broker and the database, then runs the consumer until
/// `shutdown` fires or the delivery stream ends.
///
/// # Errors
///
/// Returns `StartupError` if the broker or the database cannot be reached,
/// or the queue cannot be declared or subscribed.
pub async fn run_consumer(
    config: &AppConfig,
    shutdown: ShutdownSignal,
) -> Result<ConsumerReport, StartupError> {
    let transport = Arc::new(
        NatsTransport::connect(&config.broker.url, nats_options(&config.broker)).await?,
    );
    let store = match MySqlPaymentEventStore::connect(&config.store).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            if let Err(close) = transport.close().await {
                tracing::warn!(error = %close, "transport did not close cleanly");
            }
            return Err(e.into());
        }
    };

    let options = ConsumerOptions::new(config.broker.queue.clone())
        .with_ack_mode(config.consumer.ack_mode);
    PaymentConsumer::new(transport, store, options)
        .run(shutdown)
        .await
}

/// Connects to the broker, declares the queue and publishes `events`
/// concurrently.
///
/// # Errors
///
/// Returns `StartupError` if the broker cannot be reached or the queue
/// cannot be declared. Individual send failures are in the report.
pub async fn run_publisher(
    config: &AppConfig,
    events: Vec<PaymentEvent>,
) -> Result<PublishReport, StartupError> {
    let transport = Arc::new(
        NatsTransport::connect(&config.broker.url, nats_options(&config.broker)).await?,
    );
    let publisher = PaymentPublisher::new(
        Arc::clone(&transport),
        config.broker.queue.clone(),
        PublisherOptions {
            timeout: config.publisher.timeout(),
        },
    );
    publisher.declare().await?;
    let report = publisher.publish_all(events).await;

    if let Err(e) = transport.close().await {
        tracing::warn!(error = %e, "transport did not close cleanly");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nats_options_follow_broker_config() {
        let mut broker = BrokerConfig::default();
        broker.consumer_name = "ledger-writer".to_string();
        broker.connect_timeout_ms = 750;

        let options = nats_options(&broker);
        assert_eq!(options.client_name, "payment-pipeline");
        assert_eq!(options.consumer_name, "ledger-writer");
        assert_eq!(options.connect_timeout_ms, 750);
    }
}
