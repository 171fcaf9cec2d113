//! Cycle output files for the dashboard.

use pairs_core::{ts_to_datetime, CycleResult, Result, TimestampMs};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

const CSV_HEADER: &str = "timestamp,bucket_start_ms,price_primary,price_hedge,spread,zscore\n";

/// Write the cycle result as pretty JSON, replacing the file atomically.
pub fn write_snapshot(path: impl AsRef<Path>, result: &CycleResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    write_atomic(path.as_ref(), json.as_bytes())
}

/// Render aligned prices, spread and z-score, one row per aligned bucket.
///
/// Spread and z-score columns are empty where the cycle did not produce them.
pub fn render_csv(result: &CycleResult) -> String {
    let spread: HashMap<TimestampMs, f64> = result
        .spread_series
        .iter()
        .map(|p| (p.bucket_start, p.value))
        .collect();
    let zscore: HashMap<TimestampMs, f64> = result
        .zscore_series
        .iter()
        .map(|p| (p.bucket_start, p.value))
        .collect();

    let mut out = String::with_capacity(CSV_HEADER.len() + result.aligned.len() * 96);
    out.push_str(CSV_HEADER);
    for row in &result.aligned {
        let ts = ts_to_datetime(row.bucket_start)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            ts,
            row.bucket_start,
            row.price_primary,
            row.price_hedge,
            optional(spread.get(&row.bucket_start)),
            optional(zscore.get(&row.bucket_start)),
        );
    }
    out
}

/// Write the CSV export, replacing the file atomically.
pub fn write_csv(path: impl AsRef<Path>, result: &CycleResult) -> Result<()> {
    write_atomic(path.as_ref(), render_csv(result).as_bytes())
}

fn optional(value: Option<&f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairs_core::{AlignedRow, CycleState, SpreadPoint, Timeframe, WaitReason, ZScorePoint};
    use std::path::PathBuf;

    fn temp_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("pairs-report-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn result() -> CycleResult {
        let mut result = CycleResult::waiting(
            CycleState::WarmingUp,
            WaitReason::TooFewZScores { have: 1, need: 5 },
            "BTCUSDT",
            "ETHUSDT",
            Timeframe::OneSecond,
        );
        result.beta = Some(2.0);
        result.aligned = vec![
            AlignedRow { bucket_start: 1_704_067_200_000, price_primary: 103.0, price_hedge: 50.0 },
            AlignedRow { bucket_start: 1_704_067_201_000, price_primary: 105.5, price_hedge: 51.0 },
        ];
        result.spread_series = vec![
            SpreadPoint { bucket_start: 1_704_067_200_000, value: 3.0 },
            SpreadPoint { bucket_start: 1_704_067_201_000, value: 3.5 },
        ];
        result.zscore_series = vec![ZScorePoint { bucket_start: 1_704_067_201_000, value: 0.75 }];
        result
    }

    #[test]
    fn test_render_csv() {
        let csv = render_csv(&result());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER.trim_end());
        assert_eq!(lines[1], "2024-01-01T00:00:00+00:00,1704067200000,103,50,3,");
        assert_eq!(lines[2], "2024-01-01T00:00:01+00:00,1704067201000,105.5,51,3.5,0.75");
    }

    #[test]
    fn test_write_snapshot() {
        let path = temp_file("snapshot.json");
        write_snapshot(&path, &result()).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["state"], "WARMING_UP");
        assert_eq!(value["regime"], "UNKNOWN");
        assert_eq!(value["beta"], 2.0);
        assert!(value["latest_zscore"].is_null());
        assert_eq!(value["wait_reason"]["reason"], "too_few_z_scores");

        let back: CycleResult = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, result());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_write_csv_replaces_file() {
        let path = temp_file("export.csv");
        std::fs::write(&path, "stale").unwrap();
        write_csv(&path, &result()).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("timestamp,"));
        assert_eq!(raw.lines().count(), 3);
        let _ = std::fs::remove_file(&path);
    }
}
