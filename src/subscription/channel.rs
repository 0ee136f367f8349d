use super::{Subscription, SubscriptionError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Payloads pushed through an in-process channel
///
/// The feed closes when every sender has been dropped.
pub struct ChannelSubscription {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl ChannelSubscription {
    pub fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { rx }
    }

    /// Bounded channel plus the subscription reading from it
    pub fn bounded(capacity: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl Subscription for ChannelSubscription {
    async fn next(&mut self) -> Result<Option<Vec<u8>>, SubscriptionError> {
        Ok(self.rx.recv().await)
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}
