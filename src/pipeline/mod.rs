//! # Paste ingestion pipeline
//!
//! ```text
//! subscription → decode → filter → fetch → store
//! ```
//!
//! Each event is independent: no stage keeps state across events, and the
//! store's uniqueness constraint on `paste_id` is the only dedupe authority.
//!
//! ## Module Organization
//!
//! - `types` - `Event` and `PasteRecord`
//! - `decoder` - payload → `Event`
//! - `filter` - source-tag policy and identifier extraction
//! - `fetcher` - content retrieval with retry/timeout policy
//! - `store` - idempotent persistence
//! - `ingestion` - the loop, its context and worker pool
//! - `lifecycle` - shutdown signal and loop states

pub mod decoder;
pub mod fetcher;
pub mod filter;
pub mod ingestion;
pub mod lifecycle;
pub mod store;
pub mod types;

pub use decoder::{decode, DecodeError};
pub use fetcher::{fetch_with_retry, ContentFetcher, FetchError, FetchPolicy, HttpContentFetcher};
pub use filter::{EventFilter, RejectReason};
pub use ingestion::{
    process_event, EventOutcome, IngestContext, IngestError, IngestSettings, IngestStats, IngestionLoop,
};
pub use lifecycle::{LoopState, Shutdown};
pub use store::{InsertOutcome, RecordStore, SqliteRecordStore, StoreError};
pub use types::{Event, PasteRecord};
