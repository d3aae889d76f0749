//! Ingestion seam — event sources the orchestrator pulls raw batches from.
//!
//! Concrete connectors (market-data fetchers, reference-data feeds) live
//! outside this workspace; the orchestrator only needs one finite batch of
//! loosely-typed payloads per requested date.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use marketlake_core::validate::RawPayload;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read input {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse input {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("input must be a JSON array of event objects")]
    NotAnArray,

    #[error("input element {index} is not an object")]
    NotAnObject { index: usize },
}

/// External ingestion collaborator: supplies one finite batch per date.
pub trait EventSource {
    fn fetch(&self, date: NaiveDate) -> Result<Vec<RawPayload>, SourceError>;
}

/// Reads a JSON array of event objects from a file.
///
/// The same batch is served for every date — slicing a feed into day-sized
/// batches is the connector's concern, not this seam's.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Vec<RawPayload>, SourceError> {
        let text = fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|source| SourceError::Parse {
            path: self.path.clone(),
            source,
        })?;
        let items = match value {
            Value::Array(items) => items,
            _ => return Err(SourceError::NotAnArray),
        };
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(payload) => Ok(payload),
                _ => Err(SourceError::NotAnObject { index }),
            })
            .collect()
    }
}

impl EventSource for JsonFileSource {
    fn fetch(&self, _date: NaiveDate) -> Result<Vec<RawPayload>, SourceError> {
        self.load()
    }
}

/// Serves a fixed in-memory batch for every date.
pub struct StaticSource {
    payloads: Vec<RawPayload>,
}

impl StaticSource {
    pub fn new(payloads: Vec<RawPayload>) -> Self {
        Self { payloads }
    }
}

impl EventSource for StaticSource {
    fn fetch(&self, _date: NaiveDate) -> Result<Vec<RawPayload>, SourceError> {
        Ok(self.payloads.clone())
    }
}
