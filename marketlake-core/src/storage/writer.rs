//! Partitioned layer writes — deterministic paths, overwrite-by-run-id.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use polars::prelude::{DataFrame, PolarsError, PolarsResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::frame;
use super::partition::{partition_file, partition_segment, Layer};
use super::store::{PartitionStore, StoreError};
use crate::aggregate::RiskSummaryRow;
use crate::domain::{RawEvent, SilverEvent};
use crate::dq::DqMetricsRow;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("frame conversion failed: {0}")]
    Frame(#[from] PolarsError),
}

/// A row type that knows which hour partition it lands in and how a batch
/// of itself becomes a DataFrame.
pub trait PartitionRecord: Sized {
    fn partition_ts(&self) -> DateTime<Utc>;
    fn to_frame(rows: &[&Self]) -> PolarsResult<DataFrame>;
}

impl PartitionRecord for RawEvent {
    fn partition_ts(&self) -> DateTime<Utc> {
        self.ts_ingest
    }

    fn to_frame(rows: &[&Self]) -> PolarsResult<DataFrame> {
        frame::raw_events_frame(rows)
    }
}

impl PartitionRecord for SilverEvent {
    fn partition_ts(&self) -> DateTime<Utc> {
        self.ts_ingest
    }

    fn to_frame(rows: &[&Self]) -> PolarsResult<DataFrame> {
        frame::silver_events_frame(rows)
    }
}

impl PartitionRecord for RiskSummaryRow {
    fn partition_ts(&self) -> DateTime<Utc> {
        self.window_start
    }

    fn to_frame(rows: &[&Self]) -> PolarsResult<DataFrame> {
        frame::risk_summary_frame(rows)
    }
}

impl PartitionRecord for DqMetricsRow {
    fn partition_ts(&self) -> DateTime<Utc> {
        self.as_of
    }

    fn to_frame(rows: &[&Self]) -> PolarsResult<DataFrame> {
        frame::dq_metrics_frame(rows)
    }
}

/// Paths and row count of one layer-dataset write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerWrite {
    pub rows: usize,
    pub paths: Vec<PathBuf>,
}

/// Writes one layer dataset as one Parquet file per hour partition.
///
/// The target path is a pure function of layer, dataset, contract version,
/// partition timestamp, and run id. Writing the same `run_id` into the same
/// logical partition replaces that run's prior file and nothing else;
/// distinct run ids coexist side by side in a partition directory.
///
/// Operational constraint: callers must not reuse a run id across
/// concurrent executions — the last writer wins per partition.
pub struct PartitionedWriter<'a, S: PartitionStore> {
    store: &'a S,
    root: PathBuf,
}

impl<'a, S: PartitionStore> PartitionedWriter<'a, S> {
    pub fn new(store: &'a S, root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            root: root.into(),
        }
    }

    pub fn write<R: PartitionRecord>(
        &self,
        layer: Layer,
        dataset: &str,
        rows: &[R],
        contract_version: &str,
        run_id: &str,
    ) -> Result<LayerWrite, WriteError> {
        if rows.is_empty() {
            return Ok(LayerWrite::default());
        }

        let mut by_partition: BTreeMap<String, Vec<&R>> = BTreeMap::new();
        for row in rows {
            by_partition
                .entry(partition_segment(row.partition_ts()))
                .or_default()
                .push(row);
        }

        let mut paths = Vec::with_capacity(by_partition.len());
        for partition_rows in by_partition.values() {
            let path = partition_file(
                &self.root,
                layer,
                dataset,
                contract_version,
                partition_rows[0].partition_ts(),
                run_id,
            );
            let mut df = R::to_frame(partition_rows)?;
            self.store.write_partition(&path, &mut df)?;
            debug!(
                %layer,
                dataset,
                run_id,
                rows = partition_rows.len(),
                path = %path.display(),
                "partition written"
            );
            paths.push(path);
        }

        Ok(LayerWrite {
            rows: rows.len(),
            paths,
        })
    }
}
