//! Single-run orchestration — the pipeline state machine.
//!
//! One run walks `Started → Validated → Normalized → Aggregated →
//! DqEvaluated → Gated → Written → Completed`, strictly sequentially: every
//! stage consumes the complete output of the previous one, because dedup,
//! aggregation, and DQ rates all need full-batch visibility. A run that
//! cannot finish lands in `Errored` with its record still persisted.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use marketlake_core::aggregate::{aggregate, RiskSummaryRow};
use marketlake_core::contract::{ContractError, ContractRegistry};
use marketlake_core::domain::{RawEvent, SilverEvent};
use marketlake_core::dq::{count_late, evaluate, DqCounts, DqMetricsRow};
use marketlake_core::normalize::normalize;
use marketlake_core::storage::{
    Layer, LayerWrite, PartitionRecord, PartitionStore, PartitionedWriter, WriteError,
};
use marketlake_core::validate::{validate, RawPayload};

use crate::config::{ConfigError, PipelineConfig};
use crate::manifest::{persist_run_record, ManifestError};

const BRONZE_DATASET: &str = "market_events";
const SILVER_DATASET: &str = "market_events";
const GOLD_RISK_DATASET: &str = "risk_summary";
const GOLD_DQ_DATASET: &str = "data_quality_metrics";

/// Stages of a single run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Started,
    Validated,
    Normalized,
    Aggregated,
    DqEvaluated,
    Gated,
    Written,
    Completed,
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    DqSoftBreach,
    DqHardFailed,
    Error,
}

impl RunStatus {
    /// True for runs whose requested output landed (soft breaches included).
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::DqSoftBreach)
    }
}

/// Partition files written per layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerPaths {
    pub bronze: Vec<PathBuf>,
    pub silver: Vec<PathBuf>,
    pub gold: Vec<PathBuf>,
}

/// Persisted record of one run: status, written layers, DQ snapshot.
///
/// Retrievable for every terminal status, hard failures and errors included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub status: RunStatus,
    pub contract_version: String,
    pub last_stage: RunStage,
    pub layers_written: LayerPaths,
    pub dq: Option<DqMetricsRow>,
    pub violation_count: usize,
    /// Content hash of the silver set, for cross-run reproducibility checks.
    pub silver_hash: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub error: Option<String>,
}

/// Errors that abort a run before it can produce a record.
///
/// DQ failures and exhausted write retries do NOT surface here — they yield
/// an `Ok` record with the corresponding status so callers can always read
/// the outcome.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Gating decision after DQ evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Passed,
    SoftBreach,
    HardFailed,
}

fn advance(run_id: &str, stage: RunStage) {
    debug!(run_id, ?stage, "stage transition");
}

/// Execute one pipeline run under `run_id`.
///
/// Reusing a run id intentionally overwrites that run's prior output; this
/// is the idempotence contract. Callers must not reuse a run id across
/// concurrent executions.
pub fn run_pipeline<S: PartitionStore>(
    cfg: &PipelineConfig,
    registry: &ContractRegistry,
    store: &S,
    run_id: &str,
    payloads: &[RawPayload],
    allow_dq_breach: bool,
) -> Result<RunRecord, RunError> {
    let started_at = Utc::now();
    let contract = registry.load(&cfg.contract.version)?;
    let window = cfg.window_spec()?;
    let writer = PartitionedWriter::new(store, &cfg.storage.root);

    advance(run_id, RunStage::Started);
    info!(
        run_id,
        contract_version = %contract.version,
        records = payloads.len(),
        "run started"
    );

    let outcome = validate(payloads, contract);
    advance(run_id, RunStage::Validated);
    info!(
        run_id,
        passed = outcome.events.len(),
        violations = outcome.violations.len(),
        "validation finished"
    );

    let silver = normalize(&outcome.events, &contract.version, window);
    advance(run_id, RunStage::Normalized);

    let gold = aggregate(&silver, &contract.version, run_id);
    advance(run_id, RunStage::Aggregated);

    let as_of = batch_as_of(&outcome.events);
    let dq = evaluate(
        DqCounts {
            raw_count: outcome.events.len(),
            silver_count: silver.len(),
            late_count: count_late(&outcome.events, cfg.late_after()),
        },
        cfg.thresholds(),
        as_of,
        run_id,
        &contract.version,
    );
    advance(run_id, RunStage::DqEvaluated);

    let gate = if !dq.is_breach() {
        Gate::Passed
    } else if allow_dq_breach {
        warn!(
            run_id,
            late_rate = dq.late_rate,
            duplicate_rate = dq.duplicate_rate,
            "DQ breach overridden; gold write proceeds"
        );
        Gate::SoftBreach
    } else {
        warn!(
            run_id,
            late_rate = dq.late_rate,
            duplicate_rate = dq.duplicate_rate,
            "DQ breach; gold write gated"
        );
        Gate::HardFailed
    };
    advance(run_id, RunStage::Gated);

    let silver_hash = serde_json::to_vec(&silver)
        .ok()
        .map(|bytes| blake3::hash(&bytes).to_hex().to_string());

    let (layers, write_failure) = write_layers(
        cfg,
        &writer,
        run_id,
        &contract.version,
        &outcome.events,
        &silver,
        &gold,
        &dq,
        gate,
    );
    if write_failure.is_none() {
        advance(run_id, RunStage::Written);
        advance(run_id, RunStage::Completed);
    }
    let last_stage = if write_failure.is_none() {
        RunStage::Completed
    } else {
        RunStage::Gated
    };

    let (status, error) = match (&write_failure, gate) {
        (Some(failure), _) => (RunStatus::Error, Some(failure.to_string())),
        (None, Gate::HardFailed) => (RunStatus::DqHardFailed, None),
        (None, Gate::SoftBreach) => (RunStatus::DqSoftBreach, None),
        (None, Gate::Passed) => (RunStatus::Success, None),
    };

    let record = RunRecord {
        run_id: run_id.to_string(),
        status,
        contract_version: contract.version.clone(),
        last_stage,
        layers_written: layers,
        dq: Some(dq),
        violation_count: outcome.violations.len(),
        silver_hash,
        started_at,
        finished_at: Utc::now(),
        error,
    };
    persist_run_record(&cfg.storage.root, &record)?;
    info!(run_id, status = ?record.status, "run finished");
    Ok(record)
}

/// Latest event timestamp in the batch; epoch for an empty batch.
///
/// Partition-bound rows must not carry wall-clock time, or reruns would
/// stop being byte-identical.
fn batch_as_of(events: &[RawEvent]) -> DateTime<Utc> {
    events
        .iter()
        .map(|e| e.ts_event)
        .max()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[allow(clippy::too_many_arguments)]
fn write_layers<S: PartitionStore>(
    cfg: &PipelineConfig,
    writer: &PartitionedWriter<'_, S>,
    run_id: &str,
    contract_version: &str,
    bronze: &[RawEvent],
    silver: &[SilverEvent],
    gold: &[RiskSummaryRow],
    dq: &DqMetricsRow,
    gate: Gate,
) -> (LayerPaths, Option<WriteError>) {
    let mut layers = LayerPaths::default();
    let write_gold = gate != Gate::HardFailed;

    if write_gold || cfg.storage.persist_on_hard_fail {
        match write_with_retry(writer, Layer::Bronze, BRONZE_DATASET, bronze, contract_version, run_id, cfg.storage.write_retries) {
            Ok(write) => layers.bronze = write.paths,
            Err(failure) => return (layers, Some(failure)),
        }
        match write_with_retry(writer, Layer::Silver, SILVER_DATASET, silver, contract_version, run_id, cfg.storage.write_retries) {
            Ok(write) => layers.silver = write.paths,
            Err(failure) => return (layers, Some(failure)),
        }
    }

    if write_gold {
        match write_with_retry(writer, Layer::Gold, GOLD_RISK_DATASET, gold, contract_version, run_id, cfg.storage.write_retries) {
            Ok(write) => layers.gold.extend(write.paths),
            Err(failure) => return (layers, Some(failure)),
        }
        let dq_rows = std::slice::from_ref(dq);
        match write_with_retry(writer, Layer::Gold, GOLD_DQ_DATASET, dq_rows, contract_version, run_id, cfg.storage.write_retries) {
            Ok(write) => layers.gold.extend(write.paths),
            Err(failure) => return (layers, Some(failure)),
        }
    }

    (layers, None)
}

fn write_with_retry<S: PartitionStore, R: PartitionRecord>(
    writer: &PartitionedWriter<'_, S>,
    layer: Layer,
    dataset: &str,
    rows: &[R],
    contract_version: &str,
    run_id: &str,
    retries: u32,
) -> Result<LayerWrite, WriteError> {
    let mut attempt = 0;
    loop {
        match writer.write(layer, dataset, rows, contract_version, run_id) {
            Ok(write) => return Ok(write),
            Err(failure) if attempt < retries => {
                attempt += 1;
                warn!(
                    run_id,
                    %layer,
                    dataset,
                    attempt,
                    error = %failure,
                    "partition write failed; retrying"
                );
            }
            Err(failure) => return Err(failure),
        }
    }
}
