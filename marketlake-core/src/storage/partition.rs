//! Partition path grammar.
//!
//! `<layer>/<dataset>/contract_version=<v>/year=<Y>/month=<M>/day=<D>/hour=<H>/run_id=<id>.parquet`
//!
//! Segment order and zero padding are load-bearing: downstream query engines
//! resolve these paths with Hive-style partition discovery.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// The three storage layers of the lake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Bronze,
    Silver,
    Gold,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
            Layer::Gold => "gold",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hour-grained partition segment: `year=Y/month=MM/day=DD/hour=HH`.
pub fn partition_segment(ts: DateTime<Utc>) -> String {
    format!(
        "year={}/month={:02}/day={:02}/hour={:02}",
        ts.year(),
        ts.month(),
        ts.day(),
        ts.hour()
    )
}

/// Full path of one partition file for a run.
pub fn partition_file(
    root: &Path,
    layer: Layer,
    dataset: &str,
    contract_version: &str,
    ts: DateTime<Utc>,
    run_id: &str,
) -> PathBuf {
    root.join(layer.as_str())
        .join(dataset)
        .join(format!("contract_version={contract_version}"))
        .join(partition_segment(ts))
        .join(format!("run_id={run_id}.parquet"))
}
