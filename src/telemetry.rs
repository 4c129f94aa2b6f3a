//! # Telemetry
//!
//! Global `tracing` subscriber setup.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::TryInitError;

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Only the first call in
/// a process installs anything; later calls return an error.
///
/// # Errors
///
/// Returns `TryInitError` if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<(), TryInitError> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let config = LoggingConfig::default();
        let _ = init(&config);
        assert!(init(&config).is_err());
    }
}
