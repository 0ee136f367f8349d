//! Paste Ingest - production runtime
//!
//! Follows an event feed, fetches each announced paste and archives it to
//! SQLite once per identifier.
//!
//! Usage:
//!   cargo run --release --bin paste_ingest
//!   tail -F events.jsonl | PASTE_EVENTS_PATH=- paste_ingest
//!
//! Environment variables: see `IngestConfig::from_env` (a `.env` file is
//! honoured). Exits non-zero if the store or the feed cannot be opened.

use dotenv::dotenv;
use log::{error, info};
use pasteflow::pipeline::{EventFilter, HttpContentFetcher, IngestContext, IngestionLoop, Shutdown, SqliteRecordStore};
use pasteflow::subscription::{JsonlTailSubscription, StdinSubscription, Subscription};
use pasteflow::IngestConfig;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("🚀 Paste Ingest starting");

    let config = IngestConfig::from_env().map_err(|e| {
        error!("❌ {}", e);
        e
    })?;

    info!("📊 Configuration:");
    info!("   ├─ Source tag: {}", config.source_tag);
    info!("   ├─ Content service: {}", config.content_url);
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Events: {}", config.events_path);
    info!("   ├─ Fetch timeout: {}ms", config.fetch_timeout.as_millis());
    info!("   ├─ Fetch retries: {}", config.fetch_retries);
    info!("   └─ Workers: {}", config.workers);

    let store = SqliteRecordStore::open(&config.db_path).map_err(|e| {
        error!("❌ Failed to open paste store {}: {}", config.db_path, e);
        e
    })?;

    let fetcher = HttpContentFetcher::new(&config.content_url, config.fetch_timeout)?;

    let mut subscription: Box<dyn Subscription> = if config.events_path == "-" {
        Box::new(StdinSubscription::new())
    } else {
        let mut tail = JsonlTailSubscription::new(&config.events_path);
        tail.start().await.map_err(|e| {
            error!("❌ Failed to open event feed {}: {}", config.events_path, e);
            e
        })?;
        Box::new(tail)
    };

    let ingestion = IngestionLoop::new(IngestContext {
        filter: EventFilter::new(config.source_tag.clone()),
        fetcher: Arc::new(fetcher),
        store: Arc::new(store),
        settings: config.ingest_settings(),
    });

    let shutdown = Shutdown::new();
    shutdown.on_ctrl_c();

    info!("🔄 Waiting for events. Press CTRL+C to shutdown gracefully");

    let stats = ingestion.run(subscription.as_mut(), &shutdown).await.map_err(|e| {
        error!("❌ Ingestion stopped: {}", e);
        e
    })?;

    info!("✅ Paste Ingest stopped ({} stored, {} duplicates)", stats.stored, stats.duplicates);
    Ok(())
}
