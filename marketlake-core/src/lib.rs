//! MarketLake Core — contract-driven validation, dedup/normalization,
//! windowed aggregation, DQ metrics, and idempotent partitioned storage.
//!
//! This crate contains the heart of the batch pipeline:
//! - Domain types (raw and silver market events)
//! - Versioned contract registry and per-record validator
//! - Deduplicator/normalizer with deterministic survivor selection
//! - Window alignment and per-window risk aggregation
//! - Pure data-quality evaluator (late/duplicate rates vs. thresholds)
//! - Partition path grammar, store trait, and overwrite-by-run-id writer

pub mod aggregate;
pub mod contract;
pub mod domain;
pub mod dq;
pub mod normalize;
pub mod storage;
pub mod validate;
pub mod window;
