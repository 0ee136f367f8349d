//! Event feed adapters
//!
//! The ingestion loop consumes opaque payloads from a [`Subscription`]. The
//! broker transport itself lives outside this crate; these adapters cover the
//! feeds a deployment can hand over directly:
//!
//! - [`ChannelSubscription`] - in-process `mpsc` channel (embedders, tests)
//! - [`JsonlTailSubscription`] - follows a newline-delimited file with rotation detection
//! - [`StdinSubscription`] - newline-delimited payloads on stdin
//!
//! Payloads are treated as delivered once `next()` returns them (implicit
//! acknowledgement); redelivered duplicates are absorbed by the store.

mod channel;
mod stdin;
mod tail;

pub use channel::ChannelSubscription;
pub use stdin::StdinSubscription;
pub use tail::JsonlTailSubscription;

use async_trait::async_trait;

#[derive(Debug)]
pub enum SubscriptionError {
    /// Feed hiccup; the loop backs off and calls `reconnect()`
    Transient(String),
    /// Feed is unusable; the loop stops
    Fatal(String),
}

impl From<std::io::Error> for SubscriptionError {
    fn from(err: std::io::Error) -> Self {
        SubscriptionError::Transient(err.to_string())
    }
}

impl std::fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionError::Transient(e) => write!(f, "Transient subscription error: {}", e),
            SubscriptionError::Fatal(e) => write!(f, "Fatal subscription error: {}", e),
        }
    }
}

impl std::error::Error for SubscriptionError {}

/// Source of raw event payloads
#[async_trait]
pub trait Subscription: Send {
    /// Next payload; `Ok(None)` once the feed has closed for good
    async fn next(&mut self) -> Result<Option<Vec<u8>>, SubscriptionError>;

    /// Re-establish the feed after a transient error
    async fn reconnect(&mut self) -> Result<(), SubscriptionError> {
        Ok(())
    }

    /// Feed name for logging
    fn name(&self) -> &'static str;
}

/// Strip surrounding ASCII whitespace (including the line terminator)
pub(crate) fn trim_line(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}
