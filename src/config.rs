//! # Configuration
//!
//! Layered process configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults (local broker, local MySQL, queue `payment_events`).
//! 2. An optional TOML file, `payments.toml` unless a path is given.
//! 3. `PAYMENTS__*` environment variables, `__` separating nested keys,
//!    e.g. `PAYMENTS__BROKER__QUEUE__DURABLE=true`.
//! 4. The flat variables `BROKER_URL`, `QUEUE_NAME`, `DB_USER`,
//!    `DB_PASSWORD`, `DB_HOST`, `DB_PORT` and `DB_NAME`.
//!
//! A `.env` file in the working directory is loaded into the process
//! environment first, if present.
//!
//! # Examples
//!
//! ```
//! use payment_pipeline::config::AppConfig;
//!
//! let config = AppConfig::from_toml_str(
//!     r#"
//!     [broker.queue]
//!     name = "deposits"
//!
//!     [store]
//!     password = "hunter2"
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.broker.queue.name(), "deposits");
//! assert!(!format!("{:?}", config.store).contains("hunter2"));
//! ```

use crate::application::services::consumer::AckMode;
use crate::infrastructure::messaging::traits::QueueSpec;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment prefix for structured overrides.
pub const ENV_PREFIX: &str = "PAYMENTS";

/// File read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "payments.toml";

/// Flat variables and the keys they override.
const LEGACY_VARS: [(&str, &str); 7] = [
    ("BROKER_URL", "broker.url"),
    ("QUEUE_NAME", "broker.queue.name"),
    ("DB_USER", "store.user"),
    ("DB_PASSWORD", "store.password"),
    ("DB_HOST", "store.host"),
    ("DB_PORT", "store.port"),
    ("DB_NAME", "store.database"),
];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or did not deserialize.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The `.env` file exists but could not be read.
    #[error("failed to read .env file: {0}")]
    DotEnv(String),

    /// A value is out of range.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Dotted key.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// A string that is never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the wrapped value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

/// Broker connection and queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker URL.
    pub url: String,
    /// Queue declaration.
    pub queue: QueueSpec,
    /// Connection name reported to the broker.
    pub client_name: String,
    /// Durable consumer name.
    pub consumer_name: String,
    /// Dial timeout.
    pub connect_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            queue: QueueSpec::default(),
            client_name: "payment-pipeline".to_string(),
            consumer_name: "payment-consumer".to_string(),
            connect_timeout_ms: 5_000,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Host name.
    pub host: String,
    /// Port.
    pub port: u16,
    /// User.
    pub user: String,
    /// Password.
    pub password: Secret,
    /// Schema.
    pub database: String,
    /// Pool size.
    pub max_connections: u32,
    /// Connection acquire timeout.
    pub connect_timeout_ms: u64,
    /// Collapse redelivered messages by message id.
    pub idempotent: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: Secret::default(),
            database: "payments".to_string(),
            max_connections: 5,
            connect_timeout_ms: 5_000,
            idempotent: false,
        }
    }
}

/// Consumer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// When deliveries are acknowledged.
    pub ack_mode: AckMode,
}

/// Publisher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Per-send deadline.
    pub timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

impl PublisherConfig {
    /// Returns the per-send deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Broker settings.
    pub broker: BrokerConfig,
    /// Database settings.
    pub store: StoreConfig,
    /// Consumer settings.
    pub consumer: ConsumerConfig,
    /// Publisher settings.
    pub publisher: PublisherConfig,
    /// Log settings.
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads `.env`, then all sources against the process environment, and
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read, a value does not
    /// parse, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Err(e) if !e.not_found() => return Err(ConfigError::DotEnv(e.to_string())),
            _ => {}
        }
        Self::load_from(path, std::env::vars().collect())
    }

    /// Loads all sources against the given variables instead of the process
    /// environment, and validates the result.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn load_from(
        path: Option<&Path>,
        vars: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        let mut builder = Config::builder().add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(Some(vars.clone())),
        );
        for (var, key) in LEGACY_VARS {
            builder = builder.set_override_option(key, vars.get(var).cloned())?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document on top of the defaults and validates it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the document does not parse or validation
    /// fails.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.url.trim().is_empty() {
            return Err(ConfigError::invalid("broker.url", "must not be empty"));
        }
        if self.broker.queue.name().trim().is_empty() {
            return Err(ConfigError::invalid("broker.queue.name", "must not be empty"));
        }
        if self.broker.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "broker.connect_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.store.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "store.connect_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.store.max_connections == 0 {
            return Err(ConfigError::invalid(
                "store.max_connections",
                "must be greater than zero",
            ));
        }
        if self.consumer.ack_mode == AckMode::AfterInsert && !self.broker.queue.is_durable() {
            return Err(ConfigError::invalid(
                "consumer.ack_mode",
                "after_insert needs a durable queue; non-durable queues are acked on receipt",
            ));
        }
        if self.publisher.timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "publisher.timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}
