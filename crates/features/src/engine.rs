//! Analytics cycle engine.
//!
//! Runs resample, align, hedge ratio, spread/z-score and stationarity in a
//! straight line against one tick snapshot. Nothing is carried between
//! cycles.

use crate::hedge_ratio::{HedgeRatioEstimator, OlsEstimator};
use crate::stationarity::adf_test;
use crate::zscore::{compute_spread, ZScoreEngine};
use pairs_core::{
    Config, CycleResult, CycleState, Readiness, Regime, Result, StationarityResult, Timeframe,
    WaitReason,
};
use pairs_ingestion::{align, Resampler, TickSnapshot};
use tracing::{debug, warn};

/// Stateless recomputation of the pair signals.
pub struct CycleEngine {
    primary: String,
    hedge: String,
    timeframe: Timeframe,
    z_threshold: f64,
    min_total_ticks: usize,
    estimator: OlsEstimator,
    zscore: ZScoreEngine,
}

impl CycleEngine {
    /// Create a cycle engine from configuration.
    pub fn new(config: &Config) -> Self {
        let a = &config.analytics;
        Self {
            primary: config.pair.primary.to_ascii_uppercase(),
            hedge: config.pair.hedge.to_ascii_uppercase(),
            timeframe: a.timeframe,
            z_threshold: a.z_threshold,
            min_total_ticks: a.min_total_ticks,
            estimator: OlsEstimator::new(a.min_regression_rows),
            zscore: ZScoreEngine::new(a.window, a.min_zscores),
        }
    }

    /// Symbols a snapshot must contain, primary first.
    pub fn symbols(&self) -> [&str; 2] {
        [self.primary.as_str(), self.hedge.as_str()]
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Run one cycle over a snapshot.
    pub fn run_cycle(&self, snapshot: &TickSnapshot) -> Result<CycleResult> {
        debug!(state = ?CycleState::Loading, total_rows = snapshot.total_rows(), "cycle started");

        let total = snapshot.total_rows();
        if total < self.min_total_ticks {
            return Ok(self.waiting(
                CycleState::WaitingForData,
                WaitReason::TooFewTicks {
                    have: total,
                    need: self.min_total_ticks,
                },
            ));
        }

        let primary =
            Resampler::resample(&self.primary, snapshot.ticks_for(&self.primary), self.timeframe);
        let hedge =
            Resampler::resample(&self.hedge, snapshot.ticks_for(&self.hedge), self.timeframe);
        debug!(
            state = ?CycleState::Resampled,
            primary_points = primary.len(),
            hedge_points = hedge.len(),
            "resampled"
        );

        let aligned = align(&primary, &hedge)?;
        debug!(state = ?CycleState::Aligned, rows = aligned.len(), "aligned");

        let hedge_ratio = match self.estimator.estimate(&aligned) {
            Readiness::Ready(fit) => fit,
            Readiness::Waiting(reason) => {
                let mut result = self.waiting(CycleState::WaitingForHedgeRatio, reason);
                result.aligned = aligned.rows;
                return Ok(result);
            }
        };

        let spread = compute_spread(&aligned, hedge_ratio.beta);
        debug!(
            state = ?CycleState::SpreadComputed,
            beta = hedge_ratio.beta,
            r_squared = hedge_ratio.r_squared,
            points = spread.len(),
            "spread computed"
        );

        let zscores = match self.zscore.compute(&spread) {
            Readiness::Ready(z) => z,
            Readiness::Waiting(reason) => {
                let mut result = self.waiting(CycleState::WarmingUp, reason);
                result.beta = Some(hedge_ratio.beta);
                result.hedge_ratio = Some(hedge_ratio);
                result.aligned = aligned.rows;
                result.spread_series = spread;
                return Ok(result);
            }
        };

        let latest_zscore = zscores.last().map(|z| z.value);
        let alert = latest_zscore.is_some_and(|z| z.abs() > self.z_threshold);

        let values: Vec<f64> = spread.iter().map(|p| p.value).collect();
        let (stationarity, stationarity_error, regime) = classify_regime(adf_test(&values));

        debug!(
            state = ?CycleState::SignalReady,
            latest_zscore,
            regime = %regime,
            alert,
            "signal ready"
        );

        Ok(CycleResult {
            state: CycleState::SignalReady,
            wait_reason: None,
            primary: self.primary.clone(),
            hedge: self.hedge.clone(),
            timeframe: self.timeframe,
            beta: Some(hedge_ratio.beta),
            hedge_ratio: Some(hedge_ratio),
            latest_zscore,
            adf_statistic: stationarity.map(|s| s.statistic),
            adf_p_value: stationarity.map(|s| s.p_value),
            stationarity,
            stationarity_error,
            regime,
            alert,
            aligned: aligned.rows,
            spread_series: spread,
            zscore_series: zscores,
        })
    }

    fn waiting(&self, state: CycleState, reason: WaitReason) -> CycleResult {
        debug!(state = ?state, reason = %reason, "cycle ended early");
        CycleResult::waiting(state, reason, &self.primary, &self.hedge, self.timeframe)
    }
}

/// Regime from an ADF outcome. A failed test leaves the cycle usable with
/// an unknown regime and the failure recorded.
fn classify_regime(
    adf: Result<StationarityResult>,
) -> (Option<StationarityResult>, Option<String>, Regime) {
    match adf {
        Ok(adf) => (Some(adf), None, adf.regime()),
        Err(e) => {
            warn!(error = %e, "stationarity test failed, regime unknown this cycle");
            (None, Some(e.to_string()), Regime::Unknown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairs_core::Tick;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const BASE: i64 = 1_704_067_200_000;

    fn config(window: usize) -> Config {
        let mut config = Config::default();
        config.analytics.window = window;
        config
    }

    /// Two ticks per symbol per second; the second tick carries the price
    /// the bucket should resolve to.
    fn pair_ticks(seconds: usize, seed: u64) -> Vec<Tick> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut eth = 2_500.0;
        let mut noise = 0.0;
        let mut ticks = Vec::with_capacity(seconds * 4);

        for s in 0..seconds {
            eth += rng.random_range(-1.0..1.0);
            noise = 0.2 * noise + rng.random_range(-1.0..1.0);
            let btc = 2.0 * eth + 3.0 + noise;
            let ts = BASE + s as i64 * 1_000;

            ticks.push(Tick::new(ts + 100, "BTCUSDT", btc + 50.0, 0.1));
            ticks.push(Tick::new(ts + 200, "ETHUSDT", eth - 20.0, 1.0));
            ticks.push(Tick::new(ts + 700, "BTCUSDT", btc, 0.1));
            ticks.push(Tick::new(ts + 900, "ETHUSDT", eth, 1.0));
        }
        ticks
    }

    #[test]
    fn test_waiting_for_data() {
        let engine = CycleEngine::new(&config(20));
        let ticks: Vec<Tick> = pair_ticks(10, 1);
        let result = engine.run_cycle(&TickSnapshot::from_ticks(ticks)).unwrap();

        assert_eq!(result.state, CycleState::WaitingForData);
        assert_eq!(result.wait_reason, Some(WaitReason::TooFewTicks { have: 40, need: 100 }));
        assert!(result.beta.is_none());
        assert!(result.latest_zscore.is_none());
        assert_eq!(result.regime, Regime::Unknown);
    }

    #[test]
    fn test_too_few_aligned_rows() {
        // 120 ticks but only three shared seconds.
        let mut ticks = Vec::new();
        for i in 0..60 {
            let ts = BASE + (i % 3) * 1_000 + i;
            ticks.push(Tick::new(ts, "BTCUSDT", 100.0 + i as f64, 0.1));
            ticks.push(Tick::new(ts, "ETHUSDT", 50.0 + i as f64 * 0.5, 0.1));
        }
        let engine = CycleEngine::new(&config(20));
        let result = engine.run_cycle(&TickSnapshot::from_ticks(ticks)).unwrap();

        assert_eq!(result.state, CycleState::WaitingForHedgeRatio);
        assert_eq!(
            result.wait_reason,
            Some(WaitReason::TooFewAlignedRows { have: 3, need: 5 })
        );
        assert_eq!(result.aligned.len(), 3);
        assert!(result.beta.is_none());
    }

    #[test]
    fn test_constant_hedge_is_degenerate() {
        let mut ticks = Vec::new();
        for s in 0..60 {
            let ts = BASE + s * 1_000;
            ticks.push(Tick::new(ts, "BTCUSDT", 40_000.0 + s as f64, 0.1));
            ticks.push(Tick::new(ts, "ETHUSDT", 2_500.0, 0.1));
        }
        let engine = CycleEngine::new(&config(20));
        let result = engine.run_cycle(&TickSnapshot::from_ticks(ticks)).unwrap();

        assert_eq!(result.state, CycleState::WaitingForHedgeRatio);
        assert_eq!(result.wait_reason, Some(WaitReason::DegenerateRegression));
    }

    #[test]
    fn test_warming_up() {
        let engine = CycleEngine::new(&config(50));
        let result = engine
            .run_cycle(&TickSnapshot::from_ticks(pair_ticks(40, 2)))
            .unwrap();

        assert_eq!(result.state, CycleState::WarmingUp);
        assert_eq!(
            result.wait_reason,
            Some(WaitReason::TooFewZScores { have: 0, need: 5 })
        );
        assert!(result.beta.is_some());
        assert_eq!(result.spread_series.len(), 40);
        assert!(result.zscore_series.is_empty());
        assert!(result.latest_zscore.is_none());
        assert!(result.adf_p_value.is_none());
    }

    #[test]
    fn test_signal_ready() {
        let engine = CycleEngine::new(&config(20));
        let result = engine
            .run_cycle(&TickSnapshot::from_ticks(pair_ticks(300, 3)))
            .unwrap();

        assert_eq!(result.state, CycleState::SignalReady);
        assert!(result.is_ready());
        assert!(result.wait_reason.is_none());

        let beta = result.beta.unwrap();
        assert!((beta - 2.0).abs() < 0.05, "beta = {beta}");

        assert_eq!(result.aligned.len(), 300);
        assert_eq!(result.spread_series.len(), 300);
        assert!(result.zscore_series.len() <= 300 - 19);
        assert_eq!(result.zscore_series[0].bucket_start, BASE + 19 * 1_000);

        let z = result.latest_zscore.unwrap();
        assert_eq!(Some(z), result.zscore_series.last().map(|p| p.value));
        assert_eq!(result.alert, z.abs() > 2.0);

        assert_eq!(result.regime, Regime::MeanReverting);
        assert!(result.adf_p_value.unwrap() < 0.05);
        assert!(result.stationarity_error.is_none());
    }

    #[test]
    fn test_cycles_are_stateless() {
        let engine = CycleEngine::new(&config(20));
        let snapshot = TickSnapshot::from_ticks(pair_ticks(120, 4));

        let first = engine.run_cycle(&snapshot).unwrap();
        let second = engine.run_cycle(&snapshot).unwrap();
        assert_eq!(first, second);

        let small = engine
            .run_cycle(&TickSnapshot::from_ticks(pair_ticks(10, 4)))
            .unwrap();
        assert_eq!(small.state, CycleState::WaitingForData);
    }

    #[test]
    fn test_cycle_over_sqlite_snapshot() {
        use pairs_ingestion::{SqliteTickStore, TickSink, TickStore};
        use std::time::Duration;

        let path = std::env::temp_dir().join(format!("pairs-engine-{}.db", std::process::id()));
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
        let store = SqliteTickStore::open(&path, Duration::from_secs(5)).unwrap();
        let mut writer = store.writer().unwrap();
        let ticks = pair_ticks(150, 5);
        for tick in &ticks {
            writer.write_tick(tick).unwrap();
        }

        let engine = CycleEngine::new(&config(20));
        let from_store = engine.run_cycle(&store.snapshot(&engine.symbols()).unwrap()).unwrap();
        let in_memory = engine.run_cycle(&TickSnapshot::from_ticks(ticks)).unwrap();

        assert_eq!(from_store.state, CycleState::SignalReady);
        assert_eq!(from_store.aligned, in_memory.aligned);
        assert_eq!(from_store.beta, in_memory.beta);
        assert_eq!(from_store.zscore_series, in_memory.zscore_series);
    }

    #[test]
    fn test_symbols_are_normalized() {
        let mut config = config(20);
        config.pair.primary = "btcusdt".to_string();
        let engine = CycleEngine::new(&config);
        assert_eq!(engine.symbols(), ["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_failed_stationarity_leaves_regime_unknown() {
        let (stationarity, error, regime) =
            classify_regime(Err(pairs_core::Error::stationarity("singular regression")));
        assert!(stationarity.is_none());
        assert_eq!(regime, Regime::Unknown);
        assert!(error.unwrap().contains("singular regression"));

        // A flat spread cannot be tested either.
        let (stationarity, error, regime) = classify_regime(adf_test(&[3.0; 60]));
        assert!(stationarity.is_none());
        assert!(error.is_some());
        assert_eq!(regime, Regime::Unknown);
    }

    #[test]
    fn test_stationarity_result_sets_regime() {
        let adf = StationarityResult {
            statistic: -4.2,
            p_value: 0.001,
            used_lag: 1,
            nobs: 98,
            critical_values: pairs_core::CriticalValues {
                one_pct: -3.5,
                five_pct: -2.89,
                ten_pct: -2.58,
            },
        };
        let (stationarity, error, regime) = classify_regime(Ok(adf));
        assert_eq!(stationarity, Some(adf));
        assert!(error.is_none());
        assert_eq!(regime, Regime::MeanReverting);
    }
}
