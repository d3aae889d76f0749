//! Data-quality metrics — late/duplicate rates and threshold comparison.
//!
//! The evaluator is pure and side-effect-free: counts in, one metrics row
//! out. What to do about a breach (gate the gold write, override, abort) is
//! the orchestrator's call.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::RawEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DqStatus {
    Ok,
    Breach,
}

impl DqStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DqStatus::Ok => "ok",
            DqStatus::Breach => "breach",
        }
    }
}

/// Batch-level thresholds. A rate strictly above its threshold is a breach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DqThresholds {
    pub max_late_rate: f64,
    pub max_duplicate_rate: f64,
}

/// Whole-batch counts feeding the evaluator.
///
/// `raw_count` is the validated batch entering dedup; the duplicate count is
/// the difference to `silver_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DqCounts {
    pub raw_count: usize,
    pub silver_count: usize,
    pub late_count: usize,
}

/// One DQ metrics row per run.
///
/// `as_of` is the latest event timestamp in the batch, not wall-clock time,
/// so a rerun under the same run id lands in the same partition with the
/// same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqMetricsRow {
    pub run_id: String,
    pub contract_version: String,
    pub as_of: DateTime<Utc>,
    pub raw_count: u64,
    pub silver_count: u64,
    pub late_count: u64,
    pub duplicate_count: u64,
    pub late_rate: f64,
    pub duplicate_rate: f64,
    pub late_status: DqStatus,
    pub duplicate_status: DqStatus,
}

impl DqMetricsRow {
    pub fn is_breach(&self) -> bool {
        self.late_status == DqStatus::Breach || self.duplicate_status == DqStatus::Breach
    }
}

/// Count events whose ingest lag exceeds the lateness window.
pub fn count_late(events: &[RawEvent], late_after: Duration) -> usize {
    events.iter().filter(|e| e.is_late(late_after)).count()
}

/// Evaluate batch counts against thresholds.
///
/// Both rates are defined as 0 when `raw_count` is 0 — never NaN — and
/// always land in `[0, 1]` for consistent counts.
pub fn evaluate(
    counts: DqCounts,
    thresholds: DqThresholds,
    as_of: DateTime<Utc>,
    run_id: &str,
    contract_version: &str,
) -> DqMetricsRow {
    let duplicate_count = counts.raw_count.saturating_sub(counts.silver_count);
    let duplicate_rate = rate(duplicate_count, counts.raw_count);
    let late_rate = rate(counts.late_count, counts.raw_count);

    DqMetricsRow {
        run_id: run_id.to_string(),
        contract_version: contract_version.to_string(),
        as_of,
        raw_count: counts.raw_count as u64,
        silver_count: counts.silver_count as u64,
        late_count: counts.late_count as u64,
        duplicate_count: duplicate_count as u64,
        late_rate,
        duplicate_rate,
        late_status: status(late_rate, thresholds.max_late_rate),
        duplicate_status: status(duplicate_rate, thresholds.max_duplicate_rate),
    }
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn status(rate: f64, max: f64) -> DqStatus {
    if rate > max {
        DqStatus::Breach
    } else {
        DqStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn thresholds() -> DqThresholds {
        DqThresholds {
            max_late_rate: 0.1,
            max_duplicate_rate: 0.05,
        }
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 20, 10, 0, 0).unwrap()
    }

    #[test]
    fn empty_batch_has_zero_rates() {
        let row = evaluate(
            DqCounts {
                raw_count: 0,
                silver_count: 0,
                late_count: 0,
            },
            thresholds(),
            as_of(),
            "run-1",
            "v1",
        );
        assert_eq!(row.late_rate, 0.0);
        assert_eq!(row.duplicate_rate, 0.0);
        assert_eq!(row.late_status, DqStatus::Ok);
        assert_eq!(row.duplicate_status, DqStatus::Ok);
        assert!(!row.is_breach());
    }

    #[test]
    fn one_duplicate_in_five_is_twenty_percent() {
        let row = evaluate(
            DqCounts {
                raw_count: 5,
                silver_count: 4,
                late_count: 0,
            },
            thresholds(),
            as_of(),
            "run-1",
            "v1",
        );
        assert!((row.duplicate_rate - 0.2).abs() < 1e-12);
        assert_eq!(row.duplicate_count, 1);
        assert_eq!(row.duplicate_status, DqStatus::Breach);
        assert_eq!(row.late_status, DqStatus::Ok);
    }

    #[test]
    fn breach_is_strictly_greater_than_threshold() {
        let row = evaluate(
            DqCounts {
                raw_count: 10,
                silver_count: 10,
                late_count: 1,
            },
            thresholds(),
            as_of(),
            "run-1",
            "v1",
        );
        // 0.1 == threshold, not a breach
        assert_eq!(row.late_status, DqStatus::Ok);

        let row = evaluate(
            DqCounts {
                raw_count: 10,
                silver_count: 10,
                late_count: 2,
            },
            thresholds(),
            as_of(),
            "run-1",
            "v1",
        );
        assert_eq!(row.late_status, DqStatus::Breach);
        assert!(row.is_breach());
    }

    #[test]
    fn counts_late_events() {
        let make = |lag: i64| RawEvent {
            event_id: "evt".into(),
            symbol: "AAPL".into(),
            price: 100.0,
            volume: 1,
            ts_event: as_of(),
            ts_ingest: as_of() + Duration::seconds(lag),
            source: "stooq".into(),
        };
        let events = vec![make(1), make(301), make(600)];
        assert_eq!(count_late(&events, Duration::seconds(300)), 2);
        assert_eq!(count_late(&events, Duration::seconds(599)), 1);
    }
}
