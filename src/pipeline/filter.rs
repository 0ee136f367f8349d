//! Event filtering and identifier extraction

use super::types::Event;

/// Why an event was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// `sourceTag` differs from the configured tag
    ForeignSource(String),
    /// `message` is too short or not wrapped in one layer of quotes
    MalformedMessage,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::ForeignSource(tag) => write!(f, "foreign source tag {:?}", tag),
            RejectReason::MalformedMessage => write!(f, "message carries no quoted identifier"),
        }
    }
}

/// Accepts events from a single expected producer
#[derive(Debug, Clone)]
pub struct EventFilter {
    expected_tag: String,
}

impl EventFilter {
    pub fn new(expected_tag: impl Into<String>) -> Self {
        Self {
            expected_tag: expected_tag.into(),
        }
    }

    pub fn expected_tag(&self) -> &str {
        &self.expected_tag
    }

    /// Returns the paste identifier when the event is relevant.
    ///
    /// A rejection is a per-event skip; callers move on to the next event.
    pub fn accept(&self, event: &Event) -> Result<String, RejectReason> {
        if event.source_tag != self.expected_tag {
            return Err(RejectReason::ForeignSource(event.source_tag.clone()));
        }

        extract_identifier(&event.message).ok_or(RejectReason::MalformedMessage)
    }
}

/// Strip exactly one layer of matching surrounding quotes.
fn extract_identifier(message: &str) -> Option<String> {
    let mut chars = message.chars();
    let first = chars.next()?;
    let last = chars.next_back()?;

    if first != last || !matches!(first, '"' | '\'') {
        return None;
    }

    let inner = chars.as_str();
    if inner.is_empty() {
        return None;
    }

    Some(inner.to_string())
}
