//! Pair alignment.
//!
//! Inner-joins two resampled series on bucket start. Rows missing on either
//! side are dropped; nothing is forward- or back-filled.

use pairs_core::{AlignedPairSeries, AlignedRow, Error, ResampledSeries, Result};
use std::cmp::Ordering;

/// Join `primary` and `hedge` on equal bucket timestamps.
///
/// Both inputs must share a timeframe and be strictly increasing in time.
pub fn align(primary: &ResampledSeries, hedge: &ResampledSeries) -> Result<AlignedPairSeries> {
    if primary.timeframe != hedge.timeframe {
        return Err(Error::data(format!(
            "cannot align {} ({}) with {} ({})",
            primary.symbol, primary.timeframe, hedge.symbol, hedge.timeframe
        )));
    }

    let a = &primary.points;
    let b = &hedge.points;
    let mut rows = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        match a[i].bucket_start.cmp(&b[j].bucket_start) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                rows.push(AlignedRow {
                    bucket_start: a[i].bucket_start,
                    price_primary: a[i].price,
                    price_hedge: b[j].price,
                });
                i += 1;
                j += 1;
            }
        }
    }

    Ok(AlignedPairSeries {
        primary: primary.symbol.clone(),
        hedge: hedge.symbol.clone(),
        timeframe: primary.timeframe,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairs_core::{ResampledPoint, Timeframe};
    use std::collections::BTreeSet;

    fn series(symbol: &str, points: &[(i64, f64)]) -> ResampledSeries {
        ResampledSeries {
            symbol: symbol.to_string(),
            timeframe: Timeframe::OneSecond,
            points: points
                .iter()
                .map(|&(bucket_start, price)| ResampledPoint { bucket_start, price })
                .collect(),
        }
    }

    #[test]
    fn test_full_overlap() {
        let a = series("BTCUSDT", &[(1_000, 100.0), (2_000, 101.0), (3_000, 99.0)]);
        let b = series("ETHUSDT", &[(1_000, 50.0), (2_000, 50.5), (3_000, 49.7)]);

        let aligned = align(&a, &b).unwrap();
        assert_eq!(aligned.len(), 3);
        assert_eq!(aligned.primary, "BTCUSDT");
        assert_eq!(aligned.hedge, "ETHUSDT");
        assert_eq!(
            aligned.rows[1],
            AlignedRow { bucket_start: 2_000, price_primary: 101.0, price_hedge: 50.5 }
        );
    }

    #[test]
    fn test_unmatched_rows_dropped() {
        let a = series("A", &[(1_000, 1.0), (2_000, 2.0), (4_000, 4.0)]);
        let b = series("B", &[(2_000, 20.0), (3_000, 30.0), (4_000, 40.0), (5_000, 50.0)]);

        let aligned = align(&a, &b).unwrap();
        let ts: Vec<i64> = aligned.rows.iter().map(|r| r.bucket_start).collect();
        assert_eq!(ts, vec![2_000, 4_000]);
        assert_eq!(aligned.primary_prices(), vec![2.0, 4.0]);
        assert_eq!(aligned.hedge_prices(), vec![20.0, 40.0]);
    }

    #[test]
    fn test_empty_side() {
        let a = series("A", &[(1_000, 1.0)]);
        let b = series("B", &[]);
        assert!(align(&a, &b).unwrap().is_empty());
    }

    #[test]
    fn test_timeframe_mismatch() {
        let a = series("A", &[(1_000, 1.0)]);
        let mut b = series("B", &[(1_000, 1.0)]);
        b.timeframe = Timeframe::OneMinute;
        assert!(align(&a, &b).is_err());
    }

    #[test]
    fn test_output_is_intersection() {
        for (step_a, step_b, offset) in [(2, 3, 0), (5, 7, 1), (1, 4, 2), (3, 3, 1), (6, 4, 0)] {
            let a_ts: Vec<i64> = (0..60).filter(|t| t % step_a == 0).map(|t| t * 1_000).collect();
            let b_ts: Vec<i64> = (0..60)
                .filter(|t| (t + offset) % step_b == 0)
                .map(|t| t * 1_000)
                .collect();

            let a = series("A", &a_ts.iter().map(|&t| (t, 1.0)).collect::<Vec<_>>());
            let b = series("B", &b_ts.iter().map(|&t| (t, 2.0)).collect::<Vec<_>>());
            let aligned = align(&a, &b).unwrap();

            let got: BTreeSet<i64> = aligned.rows.iter().map(|r| r.bucket_start).collect();
            let expected: BTreeSet<i64> = a_ts
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .intersection(&b_ts.iter().copied().collect())
                .copied()
                .collect();
            assert_eq!(got, expected);
            assert!(aligned.rows.windows(2).all(|w| w[0].bucket_start < w[1].bucket_start));
        }
    }
}
