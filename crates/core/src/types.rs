//! Core data types for the pairs analytics system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Significance level used to classify the stationarity test outcome.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Convert a millisecond timestamp to a UTC datetime.
#[inline]
pub fn ts_to_datetime(ts_ms: TimestampMs) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts_ms)
}

/// Resampling granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "1s")]
    OneSecond,
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
}

impl Timeframe {
    /// Bucket width in milliseconds.
    #[inline]
    pub fn duration_ms(self) -> i64 {
        match self {
            Timeframe::OneSecond => 1_000,
            Timeframe::OneMinute => 60_000,
            Timeframe::FiveMinutes => 300_000,
        }
    }

    /// Truncate a timestamp to the start of its bucket.
    #[inline]
    pub fn bucket_start(self, ts_ms: TimestampMs) -> TimestampMs {
        let width = self.duration_ms();
        ts_ms.div_euclid(width) * width
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::OneSecond => "1s",
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1s" => Ok(Timeframe::OneSecond),
            "1m" => Ok(Timeframe::OneMinute),
            "5m" => Ok(Timeframe::FiveMinutes),
            other => Err(Error::config(format!("unknown timeframe: {other}"))),
        }
    }
}

/// A single trade event as stored in the tick store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Event time in milliseconds.
    pub timestamp: TimestampMs,
    /// Instrument symbol (upper-case, e.g. "BTCUSDT").
    pub symbol: String,
    /// Trade price.
    pub price: f64,
    /// Trade quantity.
    pub quantity: f64,
}

impl Tick {
    pub fn new(timestamp: TimestampMs, symbol: impl Into<String>, price: f64, quantity: f64) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            price,
            quantity,
        }
    }

    /// Event time as a UTC datetime.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        ts_to_datetime(self.timestamp)
    }
}

/// One bucket of a resampled series: the last observed price in the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResampledPoint {
    pub bucket_start: TimestampMs,
    pub price: f64,
}

/// Regular time-bucketed price series for one symbol.
///
/// Strictly increasing in `bucket_start`; empty buckets are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub points: Vec<ResampledPoint>,
}

impl ResampledSeries {
    pub fn empty(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bucket timestamps in order.
    pub fn timestamps(&self) -> impl Iterator<Item = TimestampMs> + '_ {
        self.points.iter().map(|p| p.bucket_start)
    }
}

/// One synchronized row of the bivariate series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedRow {
    pub bucket_start: TimestampMs,
    pub price_primary: f64,
    pub price_hedge: f64,
}

/// Inner join of two resampled series on bucket timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPairSeries {
    pub primary: String,
    pub hedge: String,
    pub timeframe: Timeframe,
    pub rows: Vec<AlignedRow>,
}

impl AlignedPairSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn primary_prices(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.price_primary).collect()
    }

    pub fn hedge_prices(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.price_hedge).collect()
    }
}

/// Fitted hedge ratio for one aligned snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HedgeRatio {
    /// Slope on the hedge price.
    pub beta: f64,
    /// Regression intercept (not used in the spread).
    pub intercept: f64,
    /// Coefficient of determination of the fit.
    pub r_squared: f64,
    /// Number of paired observations used.
    pub observations: usize,
}

/// Spread value at one bucket: `price_primary - beta * price_hedge`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadPoint {
    pub bucket_start: TimestampMs,
    pub value: f64,
}

/// Defined rolling z-score at one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZScorePoint {
    pub bucket_start: TimestampMs,
    pub value: f64,
}

/// Critical values of the unit-root statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_pct: f64,
    pub five_pct: f64,
    pub ten_pct: f64,
}

/// Output of the augmented Dickey-Fuller test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationarityResult {
    /// ADF test statistic.
    pub statistic: f64,
    /// MacKinnon approximate p-value.
    pub p_value: f64,
    /// Number of lagged differences selected.
    pub used_lag: usize,
    /// Observations in the final regression.
    pub nobs: usize,
    pub critical_values: CriticalValues,
}

impl StationarityResult {
    pub fn regime(&self) -> Regime {
        Regime::from_p_value(self.p_value)
    }
}

/// Current behaviour of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    MeanReverting,
    Trending,
    Unknown,
}

impl Regime {
    /// Strict comparison: a p-value of exactly 0.05 is trending.
    pub fn from_p_value(p_value: f64) -> Self {
        if p_value < SIGNIFICANCE_LEVEL {
            Regime::MeanReverting
        } else {
            Regime::Trending
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::MeanReverting => f.write_str("MEAN_REVERTING"),
            Regime::Trending => f.write_str("TRENDING"),
            Regime::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// Why a stage could not produce a value yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum WaitReason {
    /// Not enough raw ticks in the store.
    TooFewTicks { have: usize, need: usize },
    /// Not enough aligned rows for the regression.
    TooFewAlignedRows { have: usize, need: usize },
    /// The regression design was rank deficient.
    DegenerateRegression,
    /// Rolling statistics still warming up.
    TooFewZScores { have: usize, need: usize },
}

impl fmt::Display for WaitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitReason::TooFewTicks { have, need } => {
                write!(f, "waiting for data ({have}/{need} ticks)")
            }
            WaitReason::TooFewAlignedRows { have, need } => {
                write!(f, "not enough aligned rows ({have}/{need})")
            }
            WaitReason::DegenerateRegression => f.write_str("degenerate regression"),
            WaitReason::TooFewZScores { have, need } => {
                write!(f, "rolling analytics warming up ({have}/{need} z-scores)")
            }
        }
    }
}

/// Tagged stage output: a defined value or a not-ready reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Readiness<T> {
    Ready(T),
    Waiting(WaitReason),
}

impl<T> Readiness<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Readiness::Ready(v) => Some(v),
            Readiness::Waiting(_) => None,
        }
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Readiness::Ready(v) => Some(v),
            Readiness::Waiting(_) => None,
        }
    }

    pub fn wait_reason(&self) -> Option<&WaitReason> {
        match self {
            Readiness::Ready(_) => None,
            Readiness::Waiting(reason) => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Readiness<U> {
        match self {
            Readiness::Ready(v) => Readiness::Ready(f(v)),
            Readiness::Waiting(reason) => Readiness::Waiting(reason),
        }
    }
}

/// Recomputation cycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleState {
    Loading,
    WaitingForData,
    Resampled,
    Aligned,
    WaitingForHedgeRatio,
    SpreadComputed,
    WarmingUp,
    SignalReady,
}

impl CycleState {
    /// Terminal states end the current cycle.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CycleState::WaitingForData
                | CycleState::WaitingForHedgeRatio
                | CycleState::WarmingUp
                | CycleState::SignalReady
        )
    }

    /// Terminal state reached because some stage was not ready.
    pub fn is_waiting(self) -> bool {
        self.is_terminal() && self != CycleState::SignalReady
    }
}

/// Outcome of one analytics cycle, consumed by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    /// Terminal state of the cycle.
    pub state: CycleState,
    /// Set when the cycle stopped early.
    pub wait_reason: Option<WaitReason>,
    pub primary: String,
    pub hedge: String,
    pub timeframe: Timeframe,
    /// Hedge ratio (slope).
    pub beta: Option<f64>,
    pub hedge_ratio: Option<HedgeRatio>,
    pub latest_zscore: Option<f64>,
    pub adf_statistic: Option<f64>,
    pub adf_p_value: Option<f64>,
    pub stationarity: Option<StationarityResult>,
    /// Why the regime could not be classified this cycle.
    pub stationarity_error: Option<String>,
    pub regime: Regime,
    /// `|latest_zscore| > z_threshold`.
    pub alert: bool,
    pub aligned: Vec<AlignedRow>,
    pub spread_series: Vec<SpreadPoint>,
    pub zscore_series: Vec<ZScorePoint>,
}

impl CycleResult {
    /// A cycle that ended in a waiting state, carrying whatever was computed so far.
    pub fn waiting(
        state: CycleState,
        reason: WaitReason,
        primary: impl Into<String>,
        hedge: impl Into<String>,
        timeframe: Timeframe,
    ) -> Self {
        Self {
            state,
            wait_reason: Some(reason),
            primary: primary.into(),
            hedge: hedge.into(),
            timeframe,
            beta: None,
            hedge_ratio: None,
            latest_zscore: None,
            adf_statistic: None,
            adf_p_value: None,
            stationarity: None,
            stationarity_error: None,
            regime: Regime::Unknown,
            alert: false,
            aligned: Vec::new(),
            spread_series: Vec::new(),
            zscore_series: Vec::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == CycleState::SignalReady
    }
}
