//! Event-driven paste archival.
//!
//! Consumes notifications that a paste has appeared, fetches the paste body
//! from the content service and stores it once per identifier.

pub mod config;
pub mod error_handler;
pub mod pipeline;
pub mod subscription;

pub use config::{ConfigError, IngestConfig};

