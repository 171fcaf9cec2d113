//! Signal computation for the pairs analytics system.
//!
//! This crate handles:
//! - Hedge-ratio estimation (OLS with intercept)
//! - Spread and rolling z-score
//! - Augmented Dickey-Fuller stationarity test
//! - The per-cycle state machine tying the stages together
//! - Output files for the dashboard

pub mod engine;
pub mod hedge_ratio;
pub mod report;
pub mod stationarity;
pub mod zscore;

pub use engine::CycleEngine;
pub use hedge_ratio::{HedgeRatioEstimator, OlsEstimator};
pub use stationarity::adf_test;
pub use zscore::{compute_spread, ZScoreEngine};
