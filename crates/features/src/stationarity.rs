//! Augmented Dickey-Fuller unit-root test.
//!
//! Constant-only regression with the lag order chosen by AIC over
//! `0..=maxlag` on a common sample, `maxlag = ceil(12 * (n/100)^(1/4))`.
//! P-values and critical values use MacKinnon's response surfaces.

use pairs_core::{CriticalValues, Error, Result, StationarityResult};
use statrs::distribution::{ContinuousCDF, Normal};

/// Above this statistic the p-value is 1.
const TAU_MAX: f64 = 2.74;
/// Below this statistic the p-value is 0.
const TAU_MIN: f64 = -18.83;
/// Boundary between the small-p and large-p approximations.
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 3.8269e-2];
const TAU_LARGE_P: [f64; 4] = [1.7339, 9.3202e-1, -1.2745e-1, -1.0368e-2];

/// MacKinnon (2010) finite-sample critical value coefficients, one asset,
/// constant term: `b0 + b1/T + b2/T^2 + b3/T^3`.
const CRIT_1PCT: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const CRIT_5PCT: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
const CRIT_10PCT: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

/// Pivot tolerance relative to the largest diagonal of `X'X`.
const SINGULAR_TOL: f64 = 1e-12;

/// Run the test on a series.
///
/// Fails with [`Error::Stationarity`] when the series is too short or not
/// finite, or the regression is singular (e.g. a constant series).
pub fn adf_test(series: &[f64]) -> Result<StationarityResult> {
    if series.iter().any(|v| !v.is_finite()) {
        return Err(Error::stationarity("series contains non-finite values"));
    }
    let maxlag = max_lag(series.len())?;

    // The intercept absorbs the level shift, so centering leaves the
    // statistic unchanged and keeps X'X well scaled.
    let mean = series.iter().sum::<f64>() / series.len() as f64;
    let x: Vec<f64> = series.iter().map(|v| v - mean).collect();
    let xdiff: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=maxlag {
        let Some(fit) = regress(&x, &xdiff, maxlag, lag) else {
            continue;
        };
        let aic = fit.aic();
        if aic.is_finite() && best.map_or(true, |(best_aic, _)| aic < best_aic) {
            best = Some((aic, lag));
        }
    }
    let (_, used_lag) =
        best.ok_or_else(|| Error::stationarity("no lag order yields a regression"))?;

    let fit = regress(&x, &xdiff, used_lag, used_lag)
        .ok_or_else(|| Error::stationarity("singular regression"))?;
    let statistic = fit
        .t_value(0)
        .ok_or_else(|| Error::stationarity("undefined test statistic"))?;

    Ok(StationarityResult {
        statistic,
        p_value: mackinnon_p(statistic),
        used_lag,
        nobs: fit.nobs,
        critical_values: critical_values(fit.nobs),
    })
}

/// Upper bound on the lag order for a series of `n` observations.
pub fn max_lag(n: usize) -> Result<usize> {
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as i64;
    // One trend term (the constant).
    let cap = (n / 2) as i64 - 2;
    let maxlag = schwert.min(cap);
    if maxlag < 0 {
        return Err(Error::stationarity(format!(
            "sample size {n} is too short for the test"
        )));
    }
    Ok(maxlag as usize)
}

/// Approximate p-value of an ADF statistic.
pub fn mackinnon_p(statistic: f64) -> f64 {
    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }

    let z = if statistic <= TAU_STAR {
        polyval(&TAU_SMALL_P, statistic)
    } else {
        polyval(&TAU_LARGE_P, statistic)
    };

    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.cdf(z),
        Err(_) => f64::NAN,
    }
}

/// Critical values for a regression with `nobs` observations.
pub fn critical_values(nobs: usize) -> CriticalValues {
    let inv = 1.0 / nobs as f64;
    CriticalValues {
        one_pct: polyval(&CRIT_1PCT, inv),
        five_pct: polyval(&CRIT_5PCT, inv),
        ten_pct: polyval(&CRIT_10PCT, inv),
    }
}

/// `c[0] + c[1] x + c[2] x^2 + ...`
fn polyval(coef: &[f64], x: f64) -> f64 {
    coef.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Regress `xdiff[t]` on `[x[t], 1, xdiff[t-1], .., xdiff[t-lags]]` for
/// `t` in `start..xdiff.len()`.
fn regress(x: &[f64], xdiff: &[f64], start: usize, lags: usize) -> Option<OlsFit> {
    debug_assert!(start >= lags);
    let rows: Vec<Vec<f64>> = (start..xdiff.len())
        .map(|t| {
            let mut row = Vec::with_capacity(lags + 2);
            row.push(x[t]);
            row.push(1.0);
            row.extend((1..=lags).map(|i| xdiff[t - i]));
            row
        })
        .collect();
    OlsFit::fit(&rows, &xdiff[start..])
}

struct OlsFit {
    coef: Vec<f64>,
    /// Diagonal of `(X'X)^-1`.
    inv_diag: Vec<f64>,
    ssr: f64,
    nobs: usize,
}

impl OlsFit {
    fn fit(rows: &[Vec<f64>], y: &[f64]) -> Option<Self> {
        let nobs = rows.len();
        let k = rows.first()?.len();
        if nobs <= k {
            return None;
        }

        let mut xtx = vec![vec![0.0; k]; k];
        let mut xty = vec![0.0; k];
        for (row, &yi) in rows.iter().zip(y) {
            for i in 0..k {
                xty[i] += row[i] * yi;
                for j in i..k {
                    xtx[i][j] += row[i] * row[j];
                }
            }
        }
        for i in 0..k {
            for j in 0..i {
                xtx[i][j] = xtx[j][i];
            }
        }

        let inv = invert(xtx)?;
        let coef: Vec<f64> = inv
            .iter()
            .map(|inv_row| inv_row.iter().zip(&xty).map(|(a, b)| a * b).sum())
            .collect();

        let ssr: f64 = rows
            .iter()
            .zip(y)
            .map(|(row, &yi)| {
                let fitted: f64 = row.iter().zip(&coef).map(|(a, b)| a * b).sum();
                (yi - fitted).powi(2)
            })
            .sum();
        if !ssr.is_finite() || coef.iter().any(|c| !c.is_finite()) {
            return None;
        }

        let inv_diag = (0..k).map(|i| inv[i][i]).collect();
        Some(Self { coef, inv_diag, ssr, nobs })
    }

    fn k(&self) -> usize {
        self.coef.len()
    }

    /// Gaussian log-likelihood AIC.
    fn aic(&self) -> f64 {
        let n = self.nobs as f64;
        let llf = -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0);
        -2.0 * llf + 2.0 * self.k() as f64
    }

    fn t_value(&self, i: usize) -> Option<f64> {
        let dof = self.nobs.checked_sub(self.k()).filter(|&d| d > 0)?;
        let s2 = self.ssr / dof as f64;
        let se = (s2 * self.inv_diag[i]).sqrt();
        if !se.is_finite() || se <= 0.0 {
            return None;
        }
        let t = self.coef[i] / se;
        t.is_finite().then_some(t)
    }
}

/// Gauss-Jordan inverse with partial pivoting. `None` if singular.
fn invert(mut a: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let scale = (0..n).map(|i| a[i][i].abs()).fold(0.0, f64::max);
    if scale <= 0.0 || !scale.is_finite() {
        return None;
    }
    let tol = SINGULAR_TOL * scale;

    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))?;
        if a[pivot_row][col].abs() <= tol {
            return None;
        }
        a.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = a[col][col];
        for j in 0..n {
            a[col][j] /= pivot;
            inv[col][j] /= pivot;
        }

        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = a[r][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[r][j] -= factor * a[col][j];
                inv[r][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}
