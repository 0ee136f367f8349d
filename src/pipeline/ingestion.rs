//! Ingestion loop - subscription → decode → filter → fetch → store
//!
//! One loop pulls payloads serially from the subscription. Decode and filter
//! run inline; fetch+store run on a bounded worker pool so a slow content
//! service never blocks the next pull beyond the pool width.
//!
//! Per-event failures (decode, reject, fetch, insert, duplicate) are logged and
//! counted, never propagated. Only the subscription failing for good, or the
//! store staying unavailable past the backoff budget, stops the loop with an
//! error.
//!
//! Lifecycle: `Idle ⇄ Processing → Draining → Stopped`. On shutdown no new
//! payload is pulled; in-flight events get `shutdown_grace` to finish.

use super::decoder::{decode, DecodeError};
use super::fetcher::{fetch_with_retry, ContentFetcher, FetchError, FetchPolicy};
use super::filter::{EventFilter, RejectReason};
use super::lifecycle::{LoopState, Shutdown};
use super::store::{InsertOutcome, RecordStore, StoreError};
use super::types::PasteRecord;
use crate::error_handler::ExponentialBackoff;
use crate::subscription::{Subscription, SubscriptionError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// Tunables for the loop, fixed at startup
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Max events in fetch+store at once
    pub workers: usize,
    pub fetch_policy: FetchPolicy,
    pub shutdown_grace: Duration,
    /// Pause schedule after transient subscription errors or store unavailability
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub reconnect_retries: u32,
    pub stats_interval: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            fetch_policy: FetchPolicy::default(),
            shutdown_grace: Duration::from_secs(5),
            reconnect_initial: Duration::from_millis(250),
            reconnect_max: Duration::from_secs(30),
            reconnect_retries: 10,
            stats_interval: Duration::from_secs(10),
        }
    }
}

/// Everything one event needs, built once at startup and shared by reference
pub struct IngestContext {
    pub filter: EventFilter,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub store: Arc<dyn RecordStore>,
    pub settings: IngestSettings,
}

/// Result of processing one payload
#[derive(Debug)]
pub enum EventOutcome {
    Stored { id: String, bytes: usize },
    Duplicate { id: String },
    Rejected(RejectReason),
    DecodeFailed(DecodeError),
    FetchFailed { id: String, error: FetchError },
    StoreFailed { id: String, error: StoreError },
}

impl EventOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            EventOutcome::Stored { .. } => "stored",
            EventOutcome::Duplicate { .. } => "duplicate",
            EventOutcome::Rejected(_) => "rejected",
            EventOutcome::DecodeFailed(_) => "decode_failed",
            EventOutcome::FetchFailed { .. } => "fetch_failed",
            EventOutcome::StoreFailed { .. } => "store_failed",
        }
    }

    /// One structured line per outcome
    pub fn log(&self) {
        match self {
            EventOutcome::Stored { id, bytes } => {
                log::info!("outcome=stored id={} bytes={}", id, bytes)
            }
            EventOutcome::Duplicate { id } => log::debug!("outcome=duplicate id={}", id),
            EventOutcome::Rejected(reason) => log::debug!("outcome=rejected reason=\"{}\"", reason),
            EventOutcome::DecodeFailed(e) => log::warn!("outcome=decode_failed error=\"{}\"", e),
            EventOutcome::FetchFailed { id, error } => {
                log::warn!("outcome=fetch_failed id={} error=\"{}\"", id, error)
            }
            EventOutcome::StoreFailed { id, error } => {
                log::error!("outcome=store_failed id={} error=\"{}\"", id, error)
            }
        }
    }
}

/// Decode and filter; `Ok(id)` when the event should be fetched
pub fn prepare(ctx: &IngestContext, payload: &[u8]) -> Result<String, EventOutcome> {
    let event = decode(payload).map_err(EventOutcome::DecodeFailed)?;
    ctx.filter.accept(&event).map_err(EventOutcome::Rejected)
}

/// Fetch content for `id` and insert it
pub async fn fetch_and_store(ctx: &IngestContext, id: String) -> EventOutcome {
    let content = match fetch_with_retry(ctx.fetcher.as_ref(), &id, &ctx.settings.fetch_policy).await {
        Ok(content) => content,
        Err(error) => return EventOutcome::FetchFailed { id, error },
    };

    let record = PasteRecord::new(id, content);
    match ctx.store.insert(&record).await {
        Ok(InsertOutcome::Stored) => EventOutcome::Stored {
            bytes: record.content.len(),
            id: record.id,
        },
        Ok(InsertOutcome::Duplicate) => EventOutcome::Duplicate { id: record.id },
        Err(error) => EventOutcome::StoreFailed { id: record.id, error },
    }
}

/// Full pipeline for a single payload, serially
pub async fn process_event(ctx: &IngestContext, payload: &[u8]) -> EventOutcome {
    match prepare(ctx, payload) {
        Ok(id) => fetch_and_store(ctx, id).await,
        Err(outcome) => outcome,
    }
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub stored: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub decode_failures: u64,
    pub fetch_failures: u64,
    pub store_failures: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    stored: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    decode_failures: AtomicU64,
    fetch_failures: AtomicU64,
    store_failures: AtomicU64,
    /// Set by workers when the store reports itself unreachable, cleared by
    /// the next insert that reaches it
    store_unavailable: AtomicBool,
    /// Every `Unavailable` report, so the loop pauses once per report
    unavailable_reports: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: &EventOutcome) {
        let counter = match outcome {
            EventOutcome::Stored { .. } => &self.stored,
            EventOutcome::Duplicate { .. } => &self.duplicates,
            EventOutcome::Rejected(_) => &self.rejected,
            EventOutcome::DecodeFailed(_) => &self.decode_failures,
            EventOutcome::FetchFailed { .. } => &self.fetch_failures,
            EventOutcome::StoreFailed { .. } => &self.store_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        match outcome {
            EventOutcome::Stored { .. } | EventOutcome::Duplicate { .. } => {
                self.store_unavailable.store(false, Ordering::Relaxed);
            }
            EventOutcome::StoreFailed {
                error: StoreError::Unavailable(_),
                ..
            } => {
                self.unavailable_reports.fetch_add(1, Ordering::Relaxed);
                self.store_unavailable.store(true, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn snapshot(&self) -> IngestStats {
        IngestStats {
            received: self.received.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

/// Loop-level failure; per-event failures never surface here
#[derive(Debug)]
pub enum IngestError {
    Subscription(String),
    StoreUnavailable,
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Subscription(e) => write!(f, "Subscription failed: {}", e),
            IngestError::StoreUnavailable => write!(f, "Store unavailable, backoff budget exhausted"),
        }
    }
}

impl std::error::Error for IngestError {}

pub struct IngestionLoop {
    ctx: Arc<IngestContext>,
    state_tx: watch::Sender<LoopState>,
}

impl IngestionLoop {
    pub fn new(ctx: IngestContext) -> Self {
        let (state_tx, _) = watch::channel(LoopState::Idle);
        Self {
            ctx: Arc::new(ctx),
            state_tx,
        }
    }

    pub fn context(&self) -> &IngestContext {
        &self.ctx
    }

    /// Watch the loop's lifecycle state
    pub fn state(&self) -> watch::Receiver<LoopState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: LoopState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                log::debug!("Loop state: {:?} → {:?}", current, state);
                *current = state;
                true
            }
        });
    }

    /// Consume `subscription` until it closes, fails for good, or `shutdown` fires
    pub async fn run<S>(&self, subscription: &mut S, shutdown: &Shutdown) -> Result<IngestStats, IngestError>
    where
        S: Subscription + ?Sized,
    {
        let settings = &self.ctx.settings;
        let workers = settings.workers.max(1);

        log::info!("🚀 Starting ingestion loop");
        log::info!("   ├─ Feed: {}", subscription.name());
        log::info!("   ├─ Source tag: {}", self.ctx.filter.expected_tag());
        log::info!("   ├─ Store: {}", self.ctx.store.backend_type());
        log::info!("   └─ Workers: {}", workers);

        let semaphore = Arc::new(Semaphore::new(workers));
        let counters = Arc::new(Counters::default());
        let mut in_flight: JoinSet<()> = JoinSet::new();

        let mut reconnect = ExponentialBackoff::new(
            settings.reconnect_initial,
            settings.reconnect_max,
            settings.reconnect_retries,
        );
        let mut store_backoff = reconnect.clone();
        let mut reports_paused_for = 0u64;

        let mut last_log_time = Instant::now();
        let mut last_logged = 0u64;
        let mut exit: Result<(), IngestError> = Ok(());

        self.set_state(LoopState::Idle);

        loop {
            while let Some(result) = in_flight.try_join_next() {
                if let Err(e) = result {
                    log::error!("❌ Ingestion worker failed: {}", e);
                }
            }

            if in_flight.is_empty() {
                self.set_state(LoopState::Idle);
            }

            if last_log_time.elapsed() >= settings.stats_interval {
                let received = counters.received.load(Ordering::Relaxed);
                let rate = (received - last_logged) as f64 / last_log_time.elapsed().as_secs_f64();
                log::info!(
                    "📊 Ingestion rate: {:.1} events/sec (total: {}, in flight: {})",
                    rate,
                    received,
                    in_flight.len()
                );
                last_log_time = Instant::now();
                last_logged = received;
            }

            // Backpressure: never pull more than the pool can take
            let permit = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            // Events that never reach the store neither pause intake nor
            // spend the budget; only a fresh Unavailable report does
            if counters.store_unavailable.load(Ordering::Relaxed) {
                let reports = counters.unavailable_reports.load(Ordering::Relaxed);
                if reports > reports_paused_for {
                    reports_paused_for = reports;
                    log::warn!("⚠️  Store unavailable, pausing intake");
                    let paused = tokio::select! {
                        biased;
                        _ = shutdown.wait() => break,
                        paused = store_backoff.sleep() => paused,
                    };
                    if paused.is_err() {
                        exit = Err(IngestError::StoreUnavailable);
                        break;
                    }
                }
            } else {
                store_backoff.reset();
            }

            let next = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                next = subscription.next() => next,
            };

            match next {
                Ok(Some(payload)) => {
                    reconnect.reset();
                    counters.received.fetch_add(1, Ordering::Relaxed);
                    self.set_state(LoopState::Processing);

                    match prepare(&self.ctx, &payload) {
                        Ok(id) => {
                            let ctx = Arc::clone(&self.ctx);
                            let counters = Arc::clone(&counters);
                            in_flight.spawn(async move {
                                let outcome = fetch_and_store(&ctx, id).await;
                                outcome.log();
                                counters.record(&outcome);
                                drop(permit);
                            });
                        }
                        Err(outcome) => {
                            outcome.log();
                            counters.record(&outcome);
                        }
                    }
                }
                Ok(None) => {
                    log::warn!("⚠️  {} feed closed, stopping ingestion", subscription.name());
                    break;
                }
                Err(SubscriptionError::Transient(e)) => {
                    drop(permit);
                    log::warn!("⚠️  Subscription error: {}", e);

                    let paused = tokio::select! {
                        biased;
                        _ = shutdown.wait() => break,
                        paused = reconnect.sleep() => paused,
                    };
                    if paused.is_err() {
                        exit = Err(IngestError::Subscription(e));
                        break;
                    }

                    match subscription.reconnect().await {
                        Ok(()) => log::info!("🔌 Reconnected to {} feed", subscription.name()),
                        Err(err) => log::warn!("⚠️  Reconnect failed: {}", err),
                    }
                }
                Err(SubscriptionError::Fatal(e)) => {
                    log::error!("❌ Subscription failed: {}", e);
                    exit = Err(IngestError::Subscription(e));
                    break;
                }
            }
        }

        self.set_state(LoopState::Draining);
        if !in_flight.is_empty() {
            log::info!("🔄 Draining {} in-flight events...", in_flight.len());
        }

        let drained = tokio::time::timeout(settings.shutdown_grace, async {
            while let Some(result) = in_flight.join_next().await {
                if let Err(e) = result {
                    log::error!("❌ Ingestion worker failed: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            log::warn!(
                "⚠️  Shutdown grace period elapsed, abandoning {} in-flight events",
                in_flight.len()
            );
            in_flight.shutdown().await;
        }

        self.set_state(LoopState::Stopped);

        let stats = counters.snapshot();
        log::info!(
            "✅ Ingestion stopped: received={} stored={} duplicates={} rejected={} decode_failed={} fetch_failed={} store_failed={}",
            stats.received,
            stats.stored,
            stats.duplicates,
            stats.rejected,
            stats.decode_failures,
            stats.fetch_failures,
            stats.store_failures
        );

        exit.map(|_| stats)
    }
}
