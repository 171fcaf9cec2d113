//! Time-bucket resampling.
//!
//! Builds a regular series of last-observed prices from raw ticks. Buckets
//! without ticks are absent from the output, never filled.

use pairs_core::{ResampledPoint, ResampledSeries, Tick, Timeframe, TimestampMs};
use std::collections::BTreeMap;

/// Last observation seen in a bucket.
#[derive(Debug, Clone, Copy)]
struct LastObservation {
    ts_ms: TimestampMs,
    price: f64,
}

/// Accumulates ticks for one symbol into buckets of a fixed timeframe.
pub struct Resampler {
    timeframe: Timeframe,
    /// Buckets keyed by bucket start.
    buckets: BTreeMap<TimestampMs, LastObservation>,
}

impl Resampler {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            buckets: BTreeMap::new(),
        }
    }

    /// Resample a tick series in one call.
    pub fn resample(symbol: &str, ticks: &[Tick], timeframe: Timeframe) -> ResampledSeries {
        let mut resampler = Self::new(timeframe);
        resampler.add_ticks(ticks);
        resampler.finish(symbol)
    }

    /// Add a tick.
    ///
    /// The tick with the latest timestamp wins its bucket; on equal
    /// timestamps the one added later wins.
    pub fn add_tick(&mut self, tick: &Tick) {
        if !tick.price.is_finite() {
            return;
        }

        let bucket = self.timeframe.bucket_start(tick.timestamp);
        let observation = LastObservation {
            ts_ms: tick.timestamp,
            price: tick.price,
        };

        self.buckets
            .entry(bucket)
            .and_modify(|last| {
                if tick.timestamp >= last.ts_ms {
                    *last = observation;
                }
            })
            .or_insert(observation);
    }

    /// Add multiple ticks.
    pub fn add_ticks(&mut self, ticks: &[Tick]) {
        for tick in ticks {
            self.add_tick(tick);
        }
    }

    /// Number of non-empty buckets so far.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Emit one point per non-empty bucket, ascending.
    pub fn finish(self, symbol: &str) -> ResampledSeries {
        let points = self
            .buckets
            .into_iter()
            .map(|(bucket_start, last)| ResampledPoint {
                bucket_start,
                price: last.price,
            })
            .collect();

        ResampledSeries {
            symbol: symbol.to_string(),
            timeframe: self.timeframe,
            points,
        }
    }

    /// Clear all state.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}
