//! Run and backfill manifests — persisted state for resumability.
//!
//! One JSON record per run under `_runs/`, one per backfill under
//! `_backfills/`. Losing manifest state breaks backfill resumability, so
//! persistence failures are always surfaced, never swallowed.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::backfill::BackfillManifest;
use crate::pipeline::RunRecord;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to serialize manifest: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("failed to access manifest {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn run_manifest_path(root: &Path, run_id: &str) -> PathBuf {
    root.join("_runs").join(format!("{run_id}.json"))
}

pub fn backfill_manifest_path(root: &Path, start: NaiveDate, end: NaiveDate) -> PathBuf {
    root.join("_backfills")
        .join(format!("backfill-{start}-{end}.json"))
}

/// Persist a run record. Returns the path written.
pub fn persist_run_record(root: &Path, record: &RunRecord) -> Result<PathBuf, ManifestError> {
    write_json(run_manifest_path(root, &record.run_id), record)
}

pub fn load_run_record(root: &Path, run_id: &str) -> Result<RunRecord, ManifestError> {
    read_json(run_manifest_path(root, run_id))
}

/// Persist a backfill manifest. Called after every completed day.
pub fn persist_backfill_manifest(
    root: &Path,
    manifest: &BackfillManifest,
) -> Result<PathBuf, ManifestError> {
    write_json(
        backfill_manifest_path(root, manifest.start_date, manifest.end_date),
        manifest,
    )
}

pub fn load_backfill_manifest(
    root: &Path,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BackfillManifest, ManifestError> {
    read_json(backfill_manifest_path(root, start, end))
}

fn write_json<T: Serialize>(path: PathBuf, value: &T) -> Result<PathBuf, ManifestError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&path, json).map_err(|source| ManifestError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn read_json<T: DeserializeOwned>(path: PathBuf) -> Result<T, ManifestError> {
    let text = fs::read_to_string(&path).map_err(|source| ManifestError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}
