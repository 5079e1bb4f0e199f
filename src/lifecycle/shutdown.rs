//! Shutdown coordination.
//!
//! The trigger is sticky: a task that subscribes after it still observes it.

use tokio::sync::watch;

/// Handle that stops every listener and background task.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// A signal that resolves once [`Shutdown::trigger`] has been called.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal { rx: self.tx.subscribe() }
    }

    /// Start shutting down. Repeated calls are no-ops.
    pub fn trigger(&self) {
        let first = self.tx.send_if_modified(|stopping| !std::mem::replace(stopping, true));
        if first {
            tracing::info!("Shutdown triggered");
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for shutdown. Returns immediately if it already happened.
    pub async fn wait(&mut self) {
        // A dropped sender counts as shutdown.
        let _ = self.rx.wait_for(|stopping| *stopping).await;
    }
}
