//! Publishes payment events to the broker.

use anyhow::{Context, bail};
use clap::Parser;
use payment_pipeline::application::services::publisher::default_batch;
use payment_pipeline::bootstrap;
use payment_pipeline::config::AppConfig;
use payment_pipeline::domain::events::PaymentEvent;
use payment_pipeline::domain::value_objects::{DepositAmount, UserId};
use payment_pipeline::telemetry;
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./payments.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Payer of each event; pairs with --amount in order
    #[arg(long = "user-id")]
    user_ids: Vec<i64>,

    /// Deposit amount of each event; pairs with --user-id in order
    #[arg(long = "amount")]
    amounts: Vec<Decimal>,
}

impl Cli {
    fn events(&self) -> anyhow::Result<Vec<PaymentEvent>> {
        if self.user_ids.len() != self.amounts.len() {
            bail!(
                "got {} --user-id and {} --amount values",
                self.user_ids.len(),
                self.amounts.len()
            );
        }
        if self.user_ids.is_empty() {
            return Ok(default_batch());
        }
        self.user_ids
            .iter()
            .zip(&self.amounts)
            .map(|(&user_id, &amount)| -> anyhow::Result<PaymentEvent> {
                Ok(PaymentEvent::new(
                    UserId::new(user_id)?,
                    DepositAmount::new(amount)?,
                ))
            })
            .collect()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let events = cli.events()?;
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    telemetry::init(&config.logging).context("installing log subscriber")?;

    let report = bootstrap::run_publisher(&config, events)
        .await
        .context("publisher failed to start")?;

    for failure in &report.failures {
        tracing::error!(event = %failure.event, error = %failure.error, "event not sent");
    }
    if !report.is_complete() {
        let total = report.failures.len() + report.sent.len();
        bail!("{} of {total} events not sent", report.failures.len());
    }
    Ok(())
}
