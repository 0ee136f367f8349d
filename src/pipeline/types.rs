//! Core data types flowing through the ingestion pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification that a paste of interest has appeared
///
/// Decoded from one subscription payload. Fields other than `message` and
/// `sourceTag` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Free-form reference, normally a quoted paste identifier (`"\"abc123\""`)
    pub message: String,

    /// Producer/agent that emitted the event
    #[serde(rename = "sourceTag", alias = "source_tag", alias = "user_agent", alias = "UserAgent")]
    pub source_tag: String,
}

/// Unit persisted to storage, keyed by `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteRecord {
    #[serde(rename = "paste_id")]
    pub id: String,
    pub content: String,
    pub fetched_at: DateTime<Utc>,
}

impl PasteRecord {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            fetched_at: Utc::now(),
        }
    }
}
