//! # Shutdown
//!
//! Explicit, externally triggered shutdown for long-running loops.
//!
//! # Examples
//!
//! ```
//! use payment_pipeline::application::shutdown::shutdown_channel;
//!
//! # tokio_test::block_on(async {
//! let (trigger, mut signal) = shutdown_channel();
//! assert!(!signal.is_triggered());
//! trigger.trigger();
//! signal.wait().await;
//! assert!(signal.is_triggered());
//! # });
//! ```

use tokio::sync::watch;

/// Sending half: requests shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Requests shutdown. Calling it again has no further effect.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

/// Receiving half: observed by loops between units of work.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Returns true once shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Waits until shutdown is requested.
    ///
    /// Never returns if every trigger is dropped without firing.
    pub async fn wait(&mut self) {
        if self.receiver.wait_for(|triggered| *triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a connected trigger/signal pair.
#[must_use]
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownTrigger { sender }, ShutdownSignal { receiver })
}
