//! Hedge-ratio estimation.
//!
//! Ordinary least squares of the primary price on the hedge price with an
//! intercept. The slope is the hedge ratio; it is recomputed every cycle.

use pairs_core::{AlignedPairSeries, HedgeRatio, Readiness, WaitReason};

/// Estimates the hedge ratio for one aligned snapshot.
pub trait HedgeRatioEstimator {
    fn estimate(&self, series: &AlignedPairSeries) -> Readiness<HedgeRatio>;
}

/// OLS estimator: `price_primary = intercept + beta * price_hedge`.
#[derive(Debug, Clone, Copy)]
pub struct OlsEstimator {
    /// Minimum paired observations required for a fit.
    min_rows: usize,
}

impl OlsEstimator {
    pub fn new(min_rows: usize) -> Self {
        Self { min_rows }
    }

    pub fn min_rows(&self) -> usize {
        self.min_rows
    }
}

impl Default for OlsEstimator {
    fn default() -> Self {
        Self::new(5)
    }
}

impl HedgeRatioEstimator for OlsEstimator {
    fn estimate(&self, series: &AlignedPairSeries) -> Readiness<HedgeRatio> {
        let n = series.len();
        if n < self.min_rows {
            return Readiness::Waiting(WaitReason::TooFewAlignedRows {
                have: n,
                need: self.min_rows,
            });
        }

        match ols_fit(&series.hedge_prices(), &series.primary_prices()) {
            Some(fit) => Readiness::Ready(fit),
            None => Readiness::Waiting(WaitReason::DegenerateRegression),
        }
    }
}

/// Fit `y = intercept + beta * x`.
///
/// Returns `None` when `x` has no variance (the slope is not identified) or
/// the inputs are not finite.
pub fn ols_fit(x: &[f64], y: &[f64]) -> Option<HedgeRatio> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let n_f = n as f64;

    let mean_x = x.iter().sum::<f64>() / n_f;
    let mean_y = y.iter().sum::<f64>() / n_f;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    let mut x_sq = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
        x_sq += xi * xi;
    }

    if !sxx.is_finite() || !sxy.is_finite() || sxx <= f64::EPSILON * x_sq {
        return None;
    }

    let beta = sxy / sxx;
    let intercept = mean_y - beta * mean_x;

    let ssr: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - intercept - beta * xi;
            r * r
        })
        .sum();
    let r_squared = if syy > 0.0 { 1.0 - ssr / syy } else { 1.0 };

    Some(HedgeRatio {
        beta,
        intercept,
        r_squared,
        observations: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pairs_core::{AlignedRow, Timeframe};

    fn pair(rows: &[(f64, f64)]) -> AlignedPairSeries {
        AlignedPairSeries {
            primary: "BTCUSDT".to_string(),
            hedge: "ETHUSDT".to_string(),
            timeframe: Timeframe::OneSecond,
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, &(p, h))| AlignedRow {
                    bucket_start: i as i64 * 1_000,
                    price_primary: p,
                    price_hedge: h,
                })
                .collect(),
        }
    }

    #[test]
    fn test_too_few_rows() {
        let series = pair(&[(100.0, 50.0), (101.0, 50.5), (99.0, 49.7)]);
        let result = OlsEstimator::default().estimate(&series);
        assert_eq!(
            result,
            Readiness::Waiting(WaitReason::TooFewAlignedRows { have: 3, need: 5 })
        );
    }

    #[test]
    fn test_exact_linear_relation() {
        let rows: Vec<(f64, f64)> = (0..10)
            .map(|i| {
                let x = 50.0 + i as f64 * 0.7;
                (2.0 * x + 3.0, x)
            })
            .collect();
        let fit = OlsEstimator::default().estimate(&pair(&rows)).ready().unwrap();

        assert_relative_eq!(fit.beta, 2.0, epsilon = 1e-9);
        assert_relative_eq!(fit.intercept, 3.0, epsilon = 1e-7);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
        assert_eq!(fit.observations, 10);
    }

    #[test]
    fn test_constant_hedge_is_degenerate() {
        let rows: Vec<(f64, f64)> = (0..8).map(|i| (100.0 + i as f64, 2500.1)).collect();
        let result = OlsEstimator::default().estimate(&pair(&rows));
        assert_eq!(result, Readiness::Waiting(WaitReason::DegenerateRegression));
    }

    #[test]
    fn test_noisy_fit() {
        let rows = [
            (101.0, 50.0),
            (103.2, 51.0),
            (104.8, 52.0),
            (107.1, 53.0),
            (108.9, 54.0),
            (111.0, 55.0),
        ];
        let fit = ols_fit(
            &rows.iter().map(|r| r.1).collect::<Vec<_>>(),
            &rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        )
        .unwrap();

        assert!(fit.beta > 1.9 && fit.beta < 2.1);
        assert!(fit.r_squared > 0.99 && fit.r_squared <= 1.0);
    }

    #[test]
    fn test_custom_floor() {
        let rows = [(1.0, 1.0), (2.0, 2.0), (3.0, 3.5)];
        assert!(OlsEstimator::new(3).estimate(&pair(&rows)).is_ready());
        assert!(!OlsEstimator::new(4).estimate(&pair(&rows)).is_ready());
    }
}
