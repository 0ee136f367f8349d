//! Runtime configuration from environment variables
//!
//! Loaded once at startup and immutable afterwards.

use crate::pipeline::{FetchPolicy, IngestSettings};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the paste ingestion runtime
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Only events whose `sourceTag` equals this value are ingested
    pub source_tag: String,

    /// Base URL of the content service (`{content_url}/raw/{id}`)
    pub content_url: String,

    /// Path to SQLite database file holding paste records
    pub db_path: String,

    /// JSONL event feed to follow, `-` for stdin
    pub events_path: String,

    /// Per-attempt fetch timeout
    pub fetch_timeout: Duration,

    /// Retries after the first attempt for retryable fetch failures
    pub fetch_retries: u32,

    /// Initial delay between fetch attempts
    pub retry_backoff: Duration,

    /// Width of the fetch+store worker pool
    pub workers: usize,

    /// How long in-flight work may run after shutdown is requested
    pub shutdown_grace: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_tag: "psbmon".to_string(),
            content_url: "https://pastebin.com".to_string(),
            db_path: "pastes.db".to_string(),
            events_path: "-".to_string(),
            fetch_timeout: Duration::from_millis(10_000),
            fetch_retries: 3,
            retry_backoff: Duration::from_millis(500),
            workers: 4,
            shutdown_grace: Duration::from_millis(5_000),
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `PASTE_SOURCE_TAG` (default: psbmon)
    /// - `PASTE_CONTENT_URL` (default: https://pastebin.com)
    /// - `PASTE_DB_PATH` (default: pastes.db)
    /// - `PASTE_EVENTS_PATH` (default: `-`, stdin)
    /// - `PASTE_FETCH_TIMEOUT_MS` (default: 10000)
    /// - `PASTE_FETCH_RETRIES` (default: 3)
    /// - `PASTE_RETRY_BACKOFF_MS` (default: 500)
    /// - `PASTE_WORKERS` (default: 4)
    /// - `PASTE_SHUTDOWN_GRACE_MS` (default: 5000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            source_tag: env::var("PASTE_SOURCE_TAG").unwrap_or(defaults.source_tag),
            content_url: env::var("PASTE_CONTENT_URL")
                .unwrap_or(defaults.content_url)
                .trim_end_matches('/')
                .to_string(),
            db_path: env::var("PASTE_DB_PATH").unwrap_or(defaults.db_path),
            events_path: env::var("PASTE_EVENTS_PATH").unwrap_or(defaults.events_path),
            fetch_timeout: parse_var::<u64>("PASTE_FETCH_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.fetch_timeout),
            fetch_retries: parse_var("PASTE_FETCH_RETRIES")?.unwrap_or(defaults.fetch_retries),
            retry_backoff: parse_var::<u64>("PASTE_RETRY_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
            workers: parse_var("PASTE_WORKERS")?.unwrap_or(defaults.workers),
            shutdown_grace: parse_var::<u64>("PASTE_SHUTDOWN_GRACE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_grace),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_tag.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "PASTE_SOURCE_TAG cannot be empty".to_string(),
            ));
        }

        if !self.content_url.starts_with("http://") && !self.content_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "PASTE_CONTENT_URL must start with http:// or https://".to_string(),
            ));
        }

        if self.db_path.is_empty() {
            return Err(ConfigError::MissingVariable("PASTE_DB_PATH".to_string()));
        }

        if self.workers == 0 {
            return Err(ConfigError::InvalidValue(
                "PASTE_WORKERS must be at least 1".to_string(),
            ));
        }

        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "PASTE_FETCH_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Loop tunables derived from this configuration
    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            workers: self.workers,
            fetch_policy: FetchPolicy::new(self.fetch_retries, self.retry_backoff),
            shutdown_grace: self.shutdown_grace,
            ..IngestSettings::default()
        }
    }
}

/// Unset is `None`; set but unparseable is an error rather than a silent default.
fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(format!("{} is not a valid number: {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 9] = [
        "PASTE_SOURCE_TAG",
        "PASTE_CONTENT_URL",
        "PASTE_DB_PATH",
        "PASTE_EVENTS_PATH",
        "PASTE_FETCH_TIMEOUT_MS",
        "PASTE_FETCH_RETRIES",
        "PASTE_RETRY_BACKOFF_MS",
        "PASTE_WORKERS",
        "PASTE_SHUTDOWN_GRACE_MS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    // Environment is process-global, so every case runs inside one test
    #[test]
    fn test_config_from_env() {
        // Defaults when nothing is set
        clear_env();
        let config = IngestConfig::from_env().unwrap();
        assert_eq!(config.source_tag, "psbmon");
        assert_eq!(config.content_url, "https://pastebin.com");
        assert_eq!(config.db_path, "pastes.db");
        assert_eq!(config.events_path, "-");
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.fetch_retries, 3);
        assert_eq!(config.workers, 4);

        // Custom values
        env::set_var("PASTE_SOURCE_TAG", "agent");
        env::set_var("PASTE_CONTENT_URL", "http://127.0.0.1:8080/");
        env::set_var("PASTE_WORKERS", "8");
        env::set_var("PASTE_FETCH_TIMEOUT_MS", "2500");
        let config = IngestConfig::from_env().unwrap();
        assert_eq!(config.source_tag, "agent");
        assert_eq!(config.content_url, "http://127.0.0.1:8080");
        assert_eq!(config.workers, 8);
        assert_eq!(config.fetch_timeout, Duration::from_millis(2500));

        let settings = config.ingest_settings();
        assert_eq!(settings.workers, 8);
        assert_eq!(settings.fetch_policy.max_retries, 3);
        assert_eq!(settings.fetch_policy.max_backoff, Duration::from_millis(4000));

        // Zero workers is rejected
        env::set_var("PASTE_WORKERS", "0");
        assert!(matches!(IngestConfig::from_env(), Err(ConfigError::InvalidValue(_))));

        // Unparseable numbers are rejected, not defaulted
        env::set_var("PASTE_WORKERS", "four");
        assert!(matches!(IngestConfig::from_env(), Err(ConfigError::InvalidValue(_))));
        env::remove_var("PASTE_WORKERS");

        // Bad scheme
        env::set_var("PASTE_CONTENT_URL", "ftp://example.com");
        assert!(matches!(IngestConfig::from_env(), Err(ConfigError::InvalidValue(_))));

        clear_env();
    }
}
