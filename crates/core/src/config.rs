//! Configuration structures for the pairs analytics system.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Timeframe;

/// Allowed rolling window sizes.
pub const WINDOW_RANGE: std::ops::RangeInclusive<usize> = 20..=200;

/// Allowed z-score alert thresholds.
pub const Z_THRESHOLD_RANGE: std::ops::RangeInclusive<f64> = 1.0..=3.0;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Live market feed configuration.
    pub feed: FeedConfig,
    /// Tick store configuration.
    pub store: StoreConfig,
    /// The instrument pair being analysed.
    pub pair: PairConfig,
    /// Analytics cycle configuration.
    pub analytics: AnalyticsConfig,
    /// Output files for the dashboard.
    pub output: OutputConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load a JSON configuration file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let symbols = &self.feed.symbols;
        if symbols.len() < 2 {
            return Err(Error::config("at least two symbols must be tracked"));
        }
        for (i, sym) in symbols.iter().enumerate() {
            if sym.trim().is_empty() {
                return Err(Error::config("empty symbol in feed.symbols"));
            }
            if symbols[..i].iter().any(|s| s.eq_ignore_ascii_case(sym)) {
                return Err(Error::config(format!("duplicate symbol: {sym}")));
            }
        }

        if self.pair.primary.eq_ignore_ascii_case(&self.pair.hedge) {
            return Err(Error::config("primary and hedge symbols must differ"));
        }
        for leg in [&self.pair.primary, &self.pair.hedge] {
            if !symbols.iter().any(|s| s.eq_ignore_ascii_case(leg)) {
                return Err(Error::config(format!("pair symbol {leg} is not tracked by the feed")));
            }
        }

        let a = &self.analytics;
        if !WINDOW_RANGE.contains(&a.window) {
            return Err(Error::config(format!(
                "window {} outside {}..={}",
                a.window,
                WINDOW_RANGE.start(),
                WINDOW_RANGE.end()
            )));
        }
        if !Z_THRESHOLD_RANGE.contains(&a.z_threshold) {
            return Err(Error::config(format!(
                "z_threshold {} outside {}..={}",
                a.z_threshold,
                Z_THRESHOLD_RANGE.start(),
                Z_THRESHOLD_RANGE.end()
            )));
        }
        if a.min_regression_rows < 2 {
            return Err(Error::config("min_regression_rows must be at least 2"));
        }
        if a.min_zscores < 1 {
            return Err(Error::config("min_zscores must be at least 1"));
        }
        if a.cycle_interval_ms == 0 {
            return Err(Error::config("cycle_interval_ms must be positive"));
        }
        Ok(())
    }
}

/// Market feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Websocket base URL; the stream path `<symbol>@trade` is appended.
    pub ws_base_url: String,
    /// Symbols to subscribe to (e.g., "BTCUSDT").
    pub symbols: Vec<String>,
    /// Delay before reconnecting after a disconnect (0 = immediate).
    pub reconnect_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_base_url: "wss://stream.binance.com:9443/ws".to_string(),
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            reconnect_delay_ms: 0,
        }
    }
}

/// Tick store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub db_path: String,
    /// How long a writer waits on a locked database (ms).
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "ticks.db".to_string(),
            busy_timeout_ms: 5_000,
        }
    }
}

/// Instrument pair configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairConfig {
    /// Dependent leg of the regression.
    pub primary: String,
    /// Hedge leg (regressor).
    pub hedge: String,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            primary: "BTCUSDT".to_string(),
            hedge: "ETHUSDT".to_string(),
        }
    }
}

/// Analytics cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Resampling granularity.
    pub timeframe: Timeframe,
    /// Rolling z-score window (observations).
    pub window: usize,
    /// Absolute z-score above which an alert is raised.
    pub z_threshold: f64,
    /// Minimum ticks in the store before a cycle proceeds.
    pub min_total_ticks: usize,
    /// Minimum aligned rows for the hedge-ratio regression.
    pub min_regression_rows: usize,
    /// Minimum defined z-scores before signals are reported.
    pub min_zscores: usize,
    /// Interval between cycles (ms).
    pub cycle_interval_ms: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::OneSecond,
            window: 50,
            z_threshold: 2.0,
            min_total_ticks: 100,
            min_regression_rows: 5,
            min_zscores: 5,
            cycle_interval_ms: 1_000,
        }
    }
}

/// Output files written after each cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON snapshot of the latest cycle result.
    pub snapshot_path: Option<String>,
    /// CSV export of aligned prices, spread and z-score.
    pub csv_path: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
