//! Tracing subscriber setup.

use anyhow::{Context, Result};
use pairs_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Crates whose per-frame logs drown out the pipeline.
const QUIET_TARGETS: [&str; 4] = ["tungstenite=warn", "tokio_tungstenite=warn", "rustls=warn", "rusqlite=warn"];

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let mut filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level {:?}", config.level))?;
    for directive in QUIET_TARGETS {
        filter = filter.add_directive(directive.parse()?);
    }

    let builder = tracing_subscriber::fmt().with_target(true).with_env_filter(filter);
    let installed = if config.json {
        builder.json().with_thread_ids(true).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("logging already initialized: {e}"))?;

    tracing::info!(level = %config.level, json = config.json, "logging initialized");
    Ok(())
}
