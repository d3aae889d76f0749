//! Row → DataFrame conversions for each persisted dataset.

use chrono::{DateTime, Utc};
use polars::prelude::*;

use crate::aggregate::RiskSummaryRow;
use crate::domain::{RawEvent, SilverEvent};
use crate::dq::DqMetricsRow;

fn millis<T, F>(rows: &[&T], get: F) -> Vec<i64>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    rows.iter().map(|r| get(r).timestamp_millis()).collect()
}

fn datetime_column(name: &str, values: Vec<i64>) -> PolarsResult<Column> {
    Column::new(name.into(), values).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
}

pub fn raw_events_frame(events: &[&RawEvent]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new(
            "event_id".into(),
            events.iter().map(|e| e.event_id.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "symbol".into(),
            events.iter().map(|e| e.symbol.clone()).collect::<Vec<_>>(),
        ),
        Column::new("price".into(), events.iter().map(|e| e.price).collect::<Vec<_>>()),
        Column::new(
            "volume".into(),
            events.iter().map(|e| e.volume).collect::<Vec<_>>(),
        ),
        datetime_column("ts_event", millis(events, |e| e.ts_event))?,
        datetime_column("ts_ingest", millis(events, |e| e.ts_ingest))?,
        Column::new(
            "source".into(),
            events.iter().map(|e| e.source.clone()).collect::<Vec<_>>(),
        ),
    ])
}

pub fn silver_events_frame(events: &[&SilverEvent]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new(
            "event_id".into(),
            events.iter().map(|e| e.event_id.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "symbol".into(),
            events.iter().map(|e| e.symbol.clone()).collect::<Vec<_>>(),
        ),
        Column::new("price".into(), events.iter().map(|e| e.price).collect::<Vec<_>>()),
        Column::new(
            "volume".into(),
            events.iter().map(|e| e.volume).collect::<Vec<_>>(),
        ),
        datetime_column("ts_event", millis(events, |e| e.ts_event))?,
        datetime_column("ts_ingest", millis(events, |e| e.ts_ingest))?,
        Column::new(
            "source".into(),
            events.iter().map(|e| e.source.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "contract_version".into(),
            events
                .iter()
                .map(|e| e.contract_version.clone())
                .collect::<Vec<_>>(),
        ),
        datetime_column("window_start", millis(events, |e| e.window_start))?,
    ])
}

pub fn risk_summary_frame(rows: &[&RiskSummaryRow]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new(
            "symbol".into(),
            rows.iter().map(|r| r.symbol.clone()).collect::<Vec<_>>(),
        ),
        datetime_column("window_start", millis(rows, |r| r.window_start))?,
        Column::new(
            "event_count".into(),
            rows.iter().map(|r| r.event_count).collect::<Vec<_>>(),
        ),
        Column::new(
            "open_price".into(),
            rows.iter().map(|r| r.open_price).collect::<Vec<_>>(),
        ),
        Column::new(
            "close_price".into(),
            rows.iter().map(|r| r.close_price).collect::<Vec<_>>(),
        ),
        Column::new(
            "window_return".into(),
            rows.iter().map(|r| r.window_return).collect::<Vec<_>>(),
        ),
        Column::new(
            "volatility".into(),
            rows.iter().map(|r| r.volatility).collect::<Vec<_>>(),
        ),
        Column::new(
            "risk_score".into(),
            rows.iter().map(|r| r.risk_score).collect::<Vec<_>>(),
        ),
        Column::new(
            "contract_version".into(),
            rows.iter()
                .map(|r| r.contract_version.clone())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "run_id".into(),
            rows.iter().map(|r| r.run_id.clone()).collect::<Vec<_>>(),
        ),
    ])
}

pub fn dq_metrics_frame(rows: &[&DqMetricsRow]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new(
            "run_id".into(),
            rows.iter().map(|r| r.run_id.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "contract_version".into(),
            rows.iter()
                .map(|r| r.contract_version.clone())
                .collect::<Vec<_>>(),
        ),
        datetime_column("as_of", millis(rows, |r| r.as_of))?,
        Column::new(
            "raw_count".into(),
            rows.iter().map(|r| r.raw_count).collect::<Vec<_>>(),
        ),
        Column::new(
            "silver_count".into(),
            rows.iter().map(|r| r.silver_count).collect::<Vec<_>>(),
        ),
        Column::new(
            "late_count".into(),
            rows.iter().map(|r| r.late_count).collect::<Vec<_>>(),
        ),
        Column::new(
            "duplicate_count".into(),
            rows.iter().map(|r| r.duplicate_count).collect::<Vec<_>>(),
        ),
        Column::new(
            "late_rate".into(),
            rows.iter().map(|r| r.late_rate).collect::<Vec<_>>(),
        ),
        Column::new(
            "duplicate_rate".into(),
            rows.iter().map(|r| r.duplicate_rate).collect::<Vec<_>>(),
        ),
        Column::new(
            "late_status".into(),
            rows.iter()
                .map(|r| r.late_status.as_str().to_string())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "duplicate_status".into(),
            rows.iter()
                .map(|r| r.duplicate_status.as_str().to_string())
                .collect::<Vec<_>>(),
        ),
    ])
}
