//! MarketLake CLI — run the pipeline once or drive a day-by-day backfill.
//!
//! Commands:
//! - `run` — execute a single pipeline run over a JSON batch of raw events
//! - `backfill` — replay the pipeline per calendar day across a date range
//!
//! Without `--input` a built-in demo batch is used (five events, one
//! duplicate id, one late arrival), which exercises every pipeline stage.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketlake_core::contract::ContractRegistry;
use marketlake_core::storage::LocalParquetStore;
use marketlake_core::validate::RawPayload;
use marketlake_runner::{
    run_backfill, run_pipeline, JsonFileSource, PipelineConfig, RunRecord, RunStatus, StaticSource,
};

#[derive(Parser)]
#[command(
    name = "marketlake",
    about = "MarketLake CLI — contract-driven batch market-event pipeline"
)]
struct Cli {
    /// Path to the pipeline TOML config.
    #[arg(long, default_value = "marketlake.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a single pipeline run over a JSON batch of events.
    Run {
        /// Stable run id. Reusing a run id overwrites that run's prior output.
        #[arg(long)]
        run_id: String,

        /// Path to a JSON array of raw event objects. Demo batch if omitted.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Proceed with gold writes even when DQ thresholds are breached.
        #[arg(long, default_value_t = false)]
        allow_dq_breach: bool,
    },
    /// Replay the pipeline for every date in an inclusive range.
    Backfill {
        /// Inclusive start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// Inclusive end date (YYYY-MM-DD).
        #[arg(long)]
        end: String,

        /// Path to a JSON array of raw event objects. Demo batch if omitted.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Proceed with gold writes even when DQ thresholds are breached.
        #[arg(long, default_value_t = false)]
        allow_dq_breach: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let cfg = PipelineConfig::from_path(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    let registry = ContractRegistry::from_path(&cfg.contract.contracts_path)
        .with_context(|| format!("loading contracts from {}", cfg.contract.contracts_path.display()))?;
    let store = LocalParquetStore;

    match cli.command {
        Commands::Run {
            run_id,
            input,
            allow_dq_breach,
        } => {
            let payloads = load_payloads(input)?;
            let record = run_pipeline(&cfg, &registry, &store, &run_id, &payloads, allow_dq_breach)
                .context("pipeline run failed")?;
            print_run_summary(&record);
            match record.status {
                RunStatus::Success | RunStatus::DqSoftBreach => Ok(()),
                RunStatus::DqHardFailed => bail!(
                    "run '{}' hard-failed on DQ gates; rerun with --allow-dq-breach to override",
                    record.run_id
                ),
                RunStatus::Error => bail!(
                    "run '{}' errored: {}",
                    record.run_id,
                    record.error.as_deref().unwrap_or("unknown")
                ),
            }
        }
        Commands::Backfill {
            start,
            end,
            input,
            allow_dq_breach,
        } => {
            let start = parse_date(&start)?;
            let end = parse_date(&end)?;
            let payloads = load_payloads(input)?;
            let source = StaticSource::new(payloads);
            let manifest =
                run_backfill(&cfg, &registry, &store, &source, start, end, allow_dq_breach)
                    .context("backfill failed")?;

            println!("Backfill summary");
            println!("Date range: {} -> {}", manifest.start_date, manifest.end_date);
            println!("Runs requested: {}", manifest.runs_requested);
            println!("Runs completed: {}", manifest.runs_completed);
            println!("Runs failed: {}", manifest.runs_failed);
            Ok(())
        }
    }
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    text.parse()
        .with_context(|| format!("invalid date '{text}', expected YYYY-MM-DD"))
}

fn load_payloads(input: Option<PathBuf>) -> Result<Vec<RawPayload>> {
    match input {
        Some(path) => {
            let source = JsonFileSource::new(&path);
            source
                .load()
                .with_context(|| format!("loading events from {}", path.display()))
        }
        None => Ok(sample_events()),
    }
}

fn print_run_summary(record: &RunRecord) {
    println!("Pipeline run summary");
    println!("Run ID: {}", record.run_id);
    println!("Status: {:?}", record.status);
    println!("Contract version: {}", record.contract_version);
    println!("Validation violations: {}", record.violation_count);
    if let Some(dq) = &record.dq {
        println!(
            "Late rate: {:.2}% (status: {})",
            dq.late_rate * 100.0,
            dq.late_status.as_str()
        );
        println!(
            "Duplicate rate: {:.2}% (status: {})",
            dq.duplicate_rate * 100.0,
            dq.duplicate_status.as_str()
        );
    }
    println!(
        "Partitions written: bronze={} silver={} gold={}",
        record.layers_written.bronze.len(),
        record.layers_written.silver.len(),
        record.layers_written.gold.len()
    );
}

/// Built-in demo batch: five events, one duplicate id, one late arrival.
fn sample_events() -> Vec<RawPayload> {
    let events = [
        json!({
            "event_id": "evt-1",
            "symbol": "aapl",
            "price": 100.0,
            "volume": 10,
            "ts_event": "2025-01-20T10:01:00Z",
            "ts_ingest": "2025-01-20T10:01:03Z",
            "source": "stooq",
        }),
        json!({
            "event_id": "evt-2",
            "symbol": "aapl",
            "price": 101.2,
            "volume": 12,
            "ts_event": "2025-01-20T10:02:00Z",
            "ts_ingest": "2025-01-20T10:02:02Z",
            "source": "stooq",
        }),
        json!({
            "event_id": "evt-2",
            "symbol": "AAPL",
            "price": 101.2,
            "volume": 12,
            "ts_event": "2025-01-20T10:02:00Z",
            "ts_ingest": "2025-01-20T10:02:02Z",
            "source": "stooq",
        }),
        json!({
            "event_id": "evt-3",
            "symbol": "msft",
            "price": 240.5,
            "volume": 9,
            "ts_event": "2025-01-20T10:03:00Z",
            "ts_ingest": "2025-01-20T10:10:00Z",
            "source": "stooq",
        }),
        json!({
            "event_id": "evt-4",
            "symbol": "msft",
            "price": 241.0,
            "volume": 11,
            "ts_event": "2025-01-20T10:04:00Z",
            "ts_ingest": "2025-01-20T10:04:01Z",
            "source": "stooq",
        }),
    ];
    events
        .iter()
        .filter_map(|event| event.as_object().cloned())
        .collect()
}
