//! MarketLake Runner — pipeline orchestration on top of `marketlake-core`.
//!
//! This crate provides:
//! - Pipeline configuration loaded from TOML
//! - The single-run state machine with DQ gating and bounded write retries
//! - Run manifest persistence (one JSON record per run)
//! - Day-by-day backfills with a manifest persisted after every day
//! - The event-source seam the orchestrator pulls raw batches from

pub mod backfill;
pub mod config;
pub mod manifest;
pub mod pipeline;
pub mod source;

pub use backfill::{run_backfill, BackfillDay, BackfillError, BackfillManifest};
pub use config::{ConfigError, PipelineConfig};
pub use manifest::{
    backfill_manifest_path, load_backfill_manifest, load_run_record, persist_backfill_manifest,
    persist_run_record, run_manifest_path, ManifestError,
};
pub use pipeline::{run_pipeline, LayerPaths, RunError, RunRecord, RunStage, RunStatus};
pub use source::{EventSource, JsonFileSource, SourceError, StaticSource};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }

    #[test]
    fn run_record_is_send_sync() {
        assert_send::<RunRecord>();
        assert_sync::<RunRecord>();
    }

    #[test]
    fn backfill_manifest_is_send_sync() {
        assert_send::<BackfillManifest>();
        assert_sync::<BackfillManifest>();
    }
}
