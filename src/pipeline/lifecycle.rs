//! Shutdown signalling and loop state

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Observable state of the ingestion loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting on the next event
    Idle,
    /// At least one event is in decode/filter/fetch/store
    Processing,
    /// Cancellation requested; finishing in-flight events, accepting none
    Draining,
    Stopped,
}

/// Cloneable shutdown trigger/listener
///
/// Every clone observes the same signal. Triggering is idempotent.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been triggered (immediately if it already was)
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so the channel cannot close under us
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    /// Trigger on SIGINT (Ctrl+C)
    pub fn on_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        self.on_signal("CTRL+C", tokio::signal::ctrl_c())
    }

    /// Trigger once `signal` resolves. A signal that could not be registered
    /// leaves the service running.
    pub fn on_signal<F>(&self, name: &'static str, signal: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = std::io::Result<()>> + Send + 'static,
    {
        let shutdown = self.clone();
        tokio::spawn(async move {
            match signal.await {
                Ok(()) => {
                    log::info!("⚠️  Received {}, shutting down...", name);
                    shutdown.trigger();
                }
                Err(err) => {
                    log::error!("❌ Failed to listen for {}: {}", name, err);
                }
            }
        })
    }
}
