//! End-to-end DQ gating behavior of a single run.

use std::path::Path;

use serde_json::json;
use tempfile::TempDir;

use marketlake_core::contract::ContractRegistry;
use marketlake_core::dq::DqStatus;
use marketlake_core::storage::{LocalParquetStore, PartitionStore};
use marketlake_core::validate::RawPayload;
use marketlake_runner::{load_run_record, run_pipeline, PipelineConfig, RunStage, RunStatus};

const CONTRACTS: &str = r#"
    [contracts.v1]
    compatibility = "backward"
    required_fields = ["event_id", "symbol", "price", "volume", "ts_event", "ts_ingest"]

    [contracts.v1.field_types]
    event_id = "str"
    symbol = "str"
    price = "float"
    volume = "int"
    ts_event = "timestamp"
    ts_ingest = "timestamp"
    source = "str"
"#;

fn registry() -> ContractRegistry {
    ContractRegistry::from_toml(CONTRACTS).unwrap()
}

fn config(root: &Path) -> PipelineConfig {
    let mut cfg = PipelineConfig::new("v1", "unused-contracts.toml", root);
    cfg.dq.late_seconds = 300;
    cfg.dq.max_late_rate = 0.1;
    cfg.dq.max_duplicate_rate = 0.5;
    cfg
}

fn event(event_id: &str, minute: u32, ingest_minute: u32) -> RawPayload {
    json!({
        "event_id": event_id,
        "symbol": "aapl",
        "price": 100.0 + minute as f64,
        "volume": 10,
        "ts_event": format!("2025-01-20T10:{minute:02}:00Z"),
        "ts_ingest": format!("2025-01-20T10:{ingest_minute:02}:00Z"),
        "source": "stooq",
    })
    .as_object()
    .unwrap()
    .clone()
}

/// Five events, one of them late by ten minutes: late rate 0.2 > 0.1.
fn breaching_batch() -> Vec<RawPayload> {
    vec![
        event("evt-1", 1, 1),
        event("evt-2", 2, 2),
        event("evt-3", 3, 13),
        event("evt-4", 4, 4),
        event("evt-5", 5, 5),
    ]
}

#[test]
fn breach_without_override_hard_fails_and_gates_gold() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let store = LocalParquetStore;

    let record = run_pipeline(
        &cfg,
        &registry(),
        &store,
        "dq-hard-001",
        &breaching_batch(),
        false,
    )
    .unwrap();

    assert_eq!(record.status, RunStatus::DqHardFailed);
    assert!(record.layers_written.gold.is_empty());
    assert!(!dir.path().join("gold").exists());

    // bronze/silver persisted for forensics by default
    assert!(!record.layers_written.bronze.is_empty());
    assert!(!record.layers_written.silver.is_empty());
    assert!(dir.path().join("bronze/market_events").exists());

    let dq = record.dq.unwrap();
    assert_eq!(dq.late_status, DqStatus::Breach);
    assert!((dq.late_rate - 0.2).abs() < 1e-12);
}

#[test]
fn breach_with_override_soft_breaches_and_writes_gold() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let store = LocalParquetStore;

    let record = run_pipeline(
        &cfg,
        &registry(),
        &store,
        "dq-soft-001",
        &breaching_batch(),
        true,
    )
    .unwrap();

    assert_eq!(record.status, RunStatus::DqSoftBreach);
    assert_eq!(record.last_stage, RunStage::Completed);
    assert!(!record.layers_written.gold.is_empty());
    assert!(dir.path().join("gold/risk_summary").exists());
    assert!(dir.path().join("gold/data_quality_metrics").exists());

    // the persisted DQ row records the breach
    let dq_path = record
        .layers_written
        .gold
        .iter()
        .find(|p| p.to_string_lossy().contains("data_quality_metrics"))
        .unwrap();
    let df = store.read_partition(dq_path).unwrap();
    assert_eq!(df.height(), 1);
    let status = df.column("late_status").unwrap();
    assert_eq!(status.str().unwrap().get(0), Some("breach"));
}

#[test]
fn clean_batch_succeeds_and_writes_all_layers() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let store = LocalParquetStore;

    let batch = vec![event("evt-1", 1, 1), event("evt-2", 2, 2)];
    let record = run_pipeline(&cfg, &registry(), &store, "clean-001", &batch, false).unwrap();

    assert_eq!(record.status, RunStatus::Success);
    assert_eq!(record.violation_count, 0);
    assert!(record.silver_hash.is_some());
    assert!(!record.layers_written.bronze.is_empty());
    assert!(!record.layers_written.silver.is_empty());
    assert!(!record.layers_written.gold.is_empty());
}

#[test]
fn run_record_is_retrievable_after_hard_fail() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let store = LocalParquetStore;

    run_pipeline(
        &cfg,
        &registry(),
        &store,
        "dq-hard-002",
        &breaching_batch(),
        false,
    )
    .unwrap();

    let record = load_run_record(dir.path(), "dq-hard-002").unwrap();
    assert_eq!(record.status, RunStatus::DqHardFailed);
    let dq = record.dq.unwrap();
    assert_eq!(dq.late_status, DqStatus::Breach);
    assert_eq!(dq.duplicate_status, DqStatus::Ok);
}

#[test]
fn empty_batch_succeeds_with_zero_rates() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let store = LocalParquetStore;

    let record = run_pipeline(&cfg, &registry(), &store, "empty-001", &[], false).unwrap();

    assert_eq!(record.status, RunStatus::Success);
    let dq = record.dq.unwrap();
    assert_eq!(dq.late_rate, 0.0);
    assert_eq!(dq.duplicate_rate, 0.0);
    assert!(record.layers_written.bronze.is_empty());
}

#[test]
fn unknown_contract_version_aborts_before_any_write() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path());
    cfg.contract.version = "v9".into();
    let store = LocalParquetStore;

    let result = run_pipeline(
        &cfg,
        &registry(),
        &store,
        "bad-contract-001",
        &breaching_batch(),
        false,
    );

    assert!(result.is_err());
    assert!(!dir.path().join("bronze").exists());
    assert!(!dir.path().join("_runs").exists());
}

#[test]
fn validation_drops_are_recorded_not_fatal() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let store = LocalParquetStore;

    let mut bad = event("evt-null", 2, 2);
    bad.insert("price".into(), serde_json::Value::Null);
    let batch = vec![event("evt-1", 1, 1), bad];

    let record = run_pipeline(&cfg, &registry(), &store, "viol-001", &batch, false).unwrap();
    assert_eq!(record.status, RunStatus::Success);
    assert_eq!(record.violation_count, 1);

    // silver holds only the surviving event
    let df = store
        .read_partition(&record.layers_written.silver[0])
        .unwrap();
    assert_eq!(df.height(), 1);
}
