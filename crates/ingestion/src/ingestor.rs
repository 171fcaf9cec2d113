//! Stream ingestion.
//!
//! One task per symbol: subscribe, parse, append to the tick store, and
//! reconnect forever when the transport drops. Tasks share nothing but the
//! store, and each owns its own write handle.

use crate::feed::MarketFeed;
use crate::parser::parse_trade;
use crate::store::{TickSink, TickStore};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use pairs_core::Error;
use tracing::{debug, error, info, warn, Level};

/// Counters for one symbol's ingestion task.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    stored: AtomicU64,
    dropped: AtomicU64,
    write_failures: AtomicU64,
    reconnects: AtomicU64,
    subscribe_failures: AtomicU64,
}

impl IngestStats {
    /// Raw messages received.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Ticks appended to the store.
    pub fn stored(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    /// Malformed messages discarded.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Parsed ticks the store rejected.
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Subscription attempts after the first.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Subscription attempts the feed refused.
    pub fn subscribe_failures(&self) -> u64 {
        self.subscribe_failures.load(Ordering::Relaxed)
    }
}

/// Spawns and owns the per-symbol ingestion tasks.
pub struct StreamIngestor<F, S> {
    feed: Arc<F>,
    store: Arc<S>,
    reconnect_delay: Duration,
}

impl<F: MarketFeed, S: TickStore> StreamIngestor<F, S> {
    pub fn new(feed: Arc<F>, store: Arc<S>) -> Self {
        Self {
            feed,
            store,
            reconnect_delay: Duration::ZERO,
        }
    }

    /// Pause between a disconnect and the next subscription attempt.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Start one independent task per symbol. Must be called inside a tokio runtime.
    pub fn spawn(&self, symbols: &[String]) -> IngestorHandle {
        let mut tasks = Vec::with_capacity(symbols.len());
        let mut stats = HashMap::with_capacity(symbols.len());

        for symbol in symbols {
            let symbol = symbol.to_ascii_uppercase();
            let symbol_stats = Arc::new(IngestStats::default());

            let task = tokio::spawn(run_symbol(
                symbol.clone(),
                Arc::clone(&self.feed),
                Arc::clone(&self.store),
                self.reconnect_delay,
                Arc::clone(&symbol_stats),
            ));

            stats.insert(symbol.clone(), symbol_stats);
            tasks.push((symbol, task));
        }

        IngestorHandle { tasks, stats }
    }
}

/// Running ingestion tasks.
pub struct IngestorHandle {
    tasks: Vec<(String, JoinHandle<()>)>,
    stats: HashMap<String, Arc<IngestStats>>,
}

impl IngestorHandle {
    pub fn stats(&self, symbol: &str) -> Option<&Arc<IngestStats>> {
        self.stats.get(&symbol.to_ascii_uppercase())
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|(symbol, _)| symbol.as_str())
    }

    /// Stop every task.
    pub fn abort_all(&self) {
        for (_, task) in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for IngestorHandle {
    fn drop(&mut self) {
        self.abort_all();
    }
}

async fn run_symbol<F: MarketFeed, S: TickStore>(
    symbol: String,
    feed: Arc<F>,
    store: Arc<S>,
    reconnect_delay: Duration,
    stats: Arc<IngestStats>,
) {
    let mut writer: Option<S::Writer> = None;
    let mut first_attempt = true;
    let mut consecutive_failures = 0u64;

    // Unbounded retry: the feed has no replay window, so it is always pursued.
    loop {
        if !first_attempt {
            stats.reconnects.fetch_add(1, Ordering::Relaxed);
            debug!(symbol = %symbol, attempt = stats.reconnects(), "reconnecting");
        }
        first_attempt = false;

        match feed.subscribe(&symbol).await {
            Ok(mut stream) => {
                consecutive_failures = 0;
                info!(symbol = %symbol, "feed connected");

                while let Some(message) = stream.next().await {
                    match message {
                        Ok(raw) => handle_message(&symbol, &raw, &store, &mut writer, &stats).await,
                        Err(e) => {
                            warn!(symbol = %symbol, error = %e, "feed error");
                            break;
                        }
                    }
                }

                warn!(symbol = %symbol, stored = stats.stored(), "feed disconnected");
            }
            Err(e) => {
                stats.subscribe_failures.fetch_add(1, Ordering::Relaxed);
                log_subscribe_failure(&symbol, &e, consecutive_failures);
                consecutive_failures += 1;
            }
        }

        if reconnect_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(reconnect_delay).await;
        }
    }
}

/// Warn on the first failure of a streak; later retries log at debug.
fn log_subscribe_failure(symbol: &str, error: &Error, consecutive: u64) -> Level {
    if consecutive == 0 {
        warn!(symbol = %symbol, error = %error, "feed subscription failed");
        Level::WARN
    } else {
        debug!(symbol = %symbol, error = %error, retries = consecutive, "feed subscription failed");
        Level::DEBUG
    }
}

enum WriteOutcome<W> {
    Stored(W),
    WriteFailed(Error),
    OpenFailed(Error),
}

async fn handle_message<S: TickStore>(
    symbol: &str,
    raw: &str,
    store: &Arc<S>,
    writer: &mut Option<S::Writer>,
    stats: &IngestStats,
) {
    stats.received.fetch_add(1, Ordering::Relaxed);

    let tick = match parse_trade(raw) {
        Ok(tick) => tick,
        Err(e) => {
            stats.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(symbol = %symbol, error = %e, "dropping malformed message");
            return;
        }
    };

    // Store I/O may wait on locks and fsync; keep it off the runtime workers.
    let store = Arc::clone(store);
    let current = writer.take();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut w = match current {
            Some(w) => w,
            None => match store.writer() {
                Ok(w) => w,
                Err(e) => return WriteOutcome::OpenFailed(e),
            },
        };
        match w.write_tick(&tick) {
            Ok(()) => WriteOutcome::Stored(w),
            // The writer is dropped and reopened on the next message.
            Err(e) => WriteOutcome::WriteFailed(e),
        }
    })
    .await;

    match outcome {
        Ok(WriteOutcome::Stored(w)) => {
            *writer = Some(w);
            stats.stored.fetch_add(1, Ordering::Relaxed);
        }
        Ok(WriteOutcome::WriteFailed(e)) => {
            stats.write_failures.fetch_add(1, Ordering::Relaxed);
            error!(symbol = %symbol, error = %e, "tick write failed");
        }
        Ok(WriteOutcome::OpenFailed(e)) => {
            stats.write_failures.fetch_add(1, Ordering::Relaxed);
            error!(symbol = %symbol, error = %e, "cannot open store writer");
        }
        Err(e) => {
            stats.write_failures.fetch_add(1, Ordering::Relaxed);
            error!(symbol = %symbol, error = %e, "tick write task failed");
        }
    }
}
