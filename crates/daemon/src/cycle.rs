//! One analytics cycle: snapshot, compute, write outputs, log.

use anyhow::{Context, Result};
use pairs_core::{Config, CycleResult, CycleState};
use pairs_features::{report, CycleEngine};
use pairs_ingestion::TickStore;
use tracing::{info, warn};

/// One consistent snapshot, one straight-line computation, then outputs.
pub fn run_cycle<S: TickStore>(
    store: &S,
    engine: &CycleEngine,
    config: &Config,
) -> Result<CycleResult> {
    let snapshot = store.snapshot(&engine.symbols()).context("reading tick snapshot")?;
    let result = engine.run_cycle(&snapshot)?;

    if let Some(path) = &config.output.snapshot_path {
        report::write_snapshot(path, &result).with_context(|| format!("writing {path}"))?;
    }
    if let Some(path) = &config.output.csv_path {
        report::write_csv(path, &result).with_context(|| format!("writing {path}"))?;
    }
    Ok(result)
}

/// Log the cycle outcome. Returns true when a z-score alert was raised.
pub fn report_cycle(result: &CycleResult, z_threshold: f64) -> bool {
    match result.state {
        CycleState::SignalReady => {
            info!(
                beta = result.beta,
                latest_zscore = result.latest_zscore,
                adf_p_value = result.adf_p_value,
                regime = %result.regime,
                "signal ready"
            );
            if let Some(e) = &result.stationarity_error {
                warn!(error = %e, "regime unavailable this cycle");
            }
            if result.alert {
                warn!(
                    primary = %result.primary,
                    hedge = %result.hedge,
                    latest_zscore = result.latest_zscore,
                    z_threshold,
                    "z-score alert"
                );
            }
            result.alert
        }
        state => {
            let reason = result.wait_reason.as_ref().map(ToString::to_string).unwrap_or_default();
            info!(state = ?state, reason = %reason, "cycle waiting");
            false
        }
    }
}
