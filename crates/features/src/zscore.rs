//! Spread and rolling z-score computation.
//!
//! The spread is `price_primary - beta * price_hedge` over the aligned
//! series. Z-scores use a trailing window of the last `window` spread values
//! with the sample standard deviation.

use pairs_core::{AlignedPairSeries, Readiness, SpreadPoint, WaitReason, ZScorePoint};
use std::collections::VecDeque;

/// Spread for every aligned row. The regression intercept is not subtracted.
pub fn compute_spread(series: &AlignedPairSeries, beta: f64) -> Vec<SpreadPoint> {
    series
        .rows
        .iter()
        .map(|row| SpreadPoint {
            bucket_start: row.bucket_start,
            value: row.price_primary - beta * row.price_hedge,
        })
        .collect()
}

/// Trailing window over spread values.
pub struct RollingZScore {
    /// Window size in observations.
    window: usize,
    values: VecDeque<f64>,
}

impl RollingZScore {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window),
        }
    }

    /// Push a value and return its z-score against the window ending at it.
    ///
    /// `None` until the window is full, and whenever the window has no
    /// spread (all values equal or a non-finite deviation).
    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.values.len() >= self.window {
            self.values.pop_front();
        }
        self.values.push_back(value);
        self.zscore_of(value)
    }

    fn zscore_of(&self, value: f64) -> Option<f64> {
        let n = self.values.len();
        if n < self.window || n < 2 {
            return None;
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in &self.values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        if min == max {
            return None;
        }

        let mean = sum / n as f64;
        let var = self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let std = var.sqrt();
        if !std.is_finite() || std <= 0.0 {
            return None;
        }

        let z = (value - mean) / std;
        z.is_finite().then_some(z)
    }

    /// Check if the window is full.
    pub fn is_ready(&self) -> bool {
        self.values.len() >= self.window
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Produces the z-score series for a spread and gates it on readiness.
#[derive(Debug, Clone, Copy)]
pub struct ZScoreEngine {
    window: usize,
    /// Minimum defined z-scores before the series is reported.
    min_zscores: usize,
}

impl ZScoreEngine {
    pub fn new(window: usize, min_zscores: usize) -> Self {
        Self { window, min_zscores }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Every defined z-score, in spread order. Undefined entries are omitted.
    pub fn rolling(&self, spread: &[SpreadPoint]) -> Vec<ZScorePoint> {
        let mut rolling = RollingZScore::new(self.window);
        spread
            .iter()
            .filter_map(|point| {
                rolling.push(point.value).map(|value| ZScorePoint {
                    bucket_start: point.bucket_start,
                    value,
                })
            })
            .collect()
    }

    /// Rolling z-scores, or a warming-up reason when too few are defined.
    pub fn compute(&self, spread: &[SpreadPoint]) -> Readiness<Vec<ZScorePoint>> {
        let zscores = self.rolling(spread);
        if zscores.len() < self.min_zscores {
            return Readiness::Waiting(WaitReason::TooFewZScores {
                have: zscores.len(),
                need: self.min_zscores,
            });
        }
        Readiness::Ready(zscores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pairs_core::{AlignedRow, Timeframe};

    fn spread(values: &[f64]) -> Vec<SpreadPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| SpreadPoint {
                bucket_start: i as i64 * 1_000,
                value,
            })
            .collect()
    }

    #[test]
    fn test_compute_spread() {
        let series = AlignedPairSeries {
            primary: "A".to_string(),
            hedge: "B".to_string(),
            timeframe: Timeframe::OneSecond,
            rows: vec![
                AlignedRow { bucket_start: 0, price_primary: 100.0, price_hedge: 50.0 },
                AlignedRow { bucket_start: 1_000, price_primary: 101.0, price_hedge: 50.5 },
            ],
        };
        let s = compute_spread(&series, 1.5);
        assert_eq!(s.len(), 2);
        assert_relative_eq!(s[0].value, 25.0);
        assert_relative_eq!(s[1].value, 25.25);
        assert_eq!(s[1].bucket_start, 1_000);
    }

    #[test]
    fn test_first_window_minus_one_absent() {
        let engine = ZScoreEngine::new(3, 1);
        let values = [1.0, 2.0, 4.0, 3.0, 7.0];
        let z = engine.rolling(&spread(&values));

        assert_eq!(z.len(), 3);
        assert_eq!(z[0].bucket_start, 2_000);

        // Window [1, 2, 4]: mean 7/3, sample std sqrt(7/3).
        let mean = 7.0 / 3.0;
        let std = (7.0f64 / 3.0).sqrt();
        assert_relative_eq!(z[0].value, (4.0 - mean) / std, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_window_is_undefined() {
        let engine = ZScoreEngine::new(3, 1);
        let values = [5.0, 5.0, 5.0, 5.0, 6.0, 6.0, 6.0];
        let z = engine.rolling(&spread(&values));

        // Windows ending at indices 2, 3 and 6 are constant.
        let ts: Vec<i64> = z.iter().map(|p| p.bucket_start).collect();
        assert_eq!(ts, vec![4_000, 5_000]);
        assert!(z.iter().all(|p| p.value.is_finite()));
    }

    #[test]
    fn test_warming_up() {
        let engine = ZScoreEngine::new(20, 5);
        let values: Vec<f64> = (0..23).map(|i| (i as f64 * 0.7).sin()).collect();

        assert_eq!(
            engine.compute(&spread(&values)),
            Readiness::Waiting(WaitReason::TooFewZScores { have: 4, need: 5 })
        );

        let values: Vec<f64> = (0..24).map(|i| (i as f64 * 0.7).sin()).collect();
        let ready = engine.compute(&spread(&values)).ready().unwrap();
        assert_eq!(ready.len(), 5);
    }

    #[test]
    fn test_short_spread_has_no_zscores() {
        let engine = ZScoreEngine::new(50, 5);
        let values: Vec<f64> = (0..49).map(|i| i as f64).collect();
        assert!(engine.rolling(&spread(&values)).is_empty());
    }

    #[test]
    fn test_rolling_window_size() {
        let mut rolling = RollingZScore::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            rolling.push(v);
        }
        assert_eq!(rolling.count(), 3);
        assert!(rolling.is_ready());

        // Window [3, 4, 5]: mean 4, std 1.
        assert_relative_eq!(rolling.push(5.0).unwrap(), 1.0, epsilon = 1e-12);
        rolling.clear();
        assert!(!rolling.is_ready());
    }
}
