//! # Application Layer
//!
//! Use cases on top of the messaging and persistence ports.

pub mod error;
pub mod services;
pub mod shutdown;

pub use error::{PublishError, StartupError};
pub use shutdown::{ShutdownSignal, ShutdownTrigger, shutdown_channel};
