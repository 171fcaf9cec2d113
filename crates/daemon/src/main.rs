//! Pairs analytics daemon.
//!
//! Ingests live trades for every configured symbol into the tick store and
//! recomputes the pair signals on a fixed interval.
//!
//! Usage: `pairs-daemon [config.json]`

mod cycle;
mod logging;

use anyhow::{Context, Result};
use pairs_core::Config;
use pairs_features::CycleEngine;
use pairs_ingestion::{
    install_crypto_provider, BinanceTradeFeed, IngestorHandle, SqliteTickStore, StreamIngestor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

fn load_config() -> Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path).with_context(|| format!("loading config {path}")),
        None => {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    logging::init(&config.logging)?;
    install_crypto_provider();

    let store = Arc::new(
        SqliteTickStore::from_config(&config.store)
            .with_context(|| format!("opening tick store {}", config.store.db_path))?,
    );
    info!(path = %store.path().display(), "tick store ready");

    let feed = Arc::new(BinanceTradeFeed::from_config(&config.feed));
    let ingestor = StreamIngestor::new(feed, Arc::clone(&store))
        .with_reconnect_delay(Duration::from_millis(config.feed.reconnect_delay_ms));
    let handle = ingestor.spawn(&config.feed.symbols);
    info!(symbols = ?config.feed.symbols, "ingestion started");

    let engine = Arc::new(CycleEngine::new(&config));
    let z_threshold = config.analytics.z_threshold;
    let config = Arc::new(config);
    let mut interval =
        tokio::time::interval(Duration::from_millis(config.analytics.cycle_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        primary = %config.pair.primary,
        hedge = %config.pair.hedge,
        timeframe = %config.analytics.timeframe,
        window = config.analytics.window,
        z_threshold = config.analytics.z_threshold,
        "analytics loop started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let store = Arc::clone(&store);
                let engine = Arc::clone(&engine);
                let cycle_config = Arc::clone(&config);
                let cycle = tokio::task::spawn_blocking(move || {
                    cycle::run_cycle(store.as_ref(), &engine, &cycle_config)
                })
                .await;

                match cycle {
                    Ok(Ok(result)) => {
                        cycle::report_cycle(&result, z_threshold);
                    }
                    // Store busy or unavailable: retry on the next tick.
                    Ok(Err(e)) => error!(error = %format!("{e:#}"), "analytics cycle failed"),
                    Err(e) => error!(error = %e, "analytics task panicked"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "cannot listen for shutdown signal");
                }
                break;
            }
        }
    }

    shutdown(&handle);
    Ok(())
}

fn shutdown(handle: &IngestorHandle) {
    info!("shutting down");
    handle.abort_all();
    for symbol in handle.symbols() {
        if let Some(stats) = handle.stats(symbol) {
            info!(
                symbol,
                received = stats.received(),
                stored = stats.stored(),
                dropped = stats.dropped(),
                write_failures = stats.write_failures(),
                reconnects = stats.reconnects(),
                "ingestion summary"
            );
        }
    }
}
