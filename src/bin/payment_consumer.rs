//! Consumes payment events from the broker and stores them in MySQL.

use anyhow::Context;
use clap::Parser;
use payment_pipeline::application::shutdown::shutdown_channel;
use payment_pipeline::bootstrap;
use payment_pipeline::config::AppConfig;
use payment_pipeline::telemetry;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./payments.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    telemetry::init(&config.logging).context("installing log subscriber")?;

    let (trigger, signal) = shutdown_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupt received, shutting down"),
            Err(e) => tracing::error!(error = %e, "failed to listen for interrupt"),
        }
        trigger.trigger();
    });

    let report = bootstrap::run_consumer(&config, signal)
        .await
        .context("consumer failed to start")?;

    tracing::info!(
        reason = %report.stop_reason,
        received = report.stats.received,
        persisted = report.stats.persisted,
        "consumer exited"
    );
    Ok(())
}
