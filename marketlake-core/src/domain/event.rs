//! Market events — the record types moving through the pipeline layers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A validated market event as received from an ingestion connector.
///
/// Immutable once ingested: every downstream stage produces new values
/// instead of mutating the raw batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_id: String,
    pub symbol: String,
    pub price: f64,
    pub volume: u64,
    pub ts_event: DateTime<Utc>,
    pub ts_ingest: DateTime<Utc>,
    pub source: String,
}

impl RawEvent {
    /// Ingest-to-event delay. Negative when a producer clock runs ahead.
    pub fn ingest_lag(&self) -> Duration {
        self.ts_ingest - self.ts_event
    }

    /// True when the event arrived later than the configured lateness window.
    pub fn is_late(&self, late_after: Duration) -> bool {
        self.ingest_lag() > late_after
    }
}

/// A curated event: deduplicated, symbol-canonicalized, window-aligned.
///
/// `event_id` is unique within any silver output set, and `window_start`
/// is `ts_event` truncated to the consumer's window granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilverEvent {
    pub event_id: String,
    pub symbol: String,
    pub price: f64,
    pub volume: u64,
    pub ts_event: DateTime<Utc>,
    pub ts_ingest: DateTime<Utc>,
    pub source: String,
    pub contract_version: String,
    pub window_start: DateTime<Utc>,
}
