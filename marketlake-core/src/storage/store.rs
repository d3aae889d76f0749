//! Physical partition I/O behind a narrow trait.
//!
//! The writer builds paths; a [`PartitionStore`] only moves bytes. Swapping
//! the local filesystem for an object store means implementing this trait,
//! nothing else.

use std::fs;
use std::path::Path;

use polars::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parquet error at {path}: {source}")]
    Parquet {
        path: String,
        source: PolarsError,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn parquet(path: &Path, source: PolarsError) -> Self {
        StoreError::Parquet {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Storage collaborator: writes and reads one partition file.
pub trait PartitionStore {
    fn write_partition(&self, path: &Path, df: &mut DataFrame) -> Result<(), StoreError>;
    fn read_partition(&self, path: &Path) -> Result<DataFrame, StoreError>;
}

/// Local-filesystem Parquet store.
///
/// A write lands atomically: bytes go to a `.tmp` sibling first, then a
/// rename moves them into place. Rerunning a write for the same path
/// replaces the previous file wholesale — there is no partial-file state
/// a reader can observe.
pub struct LocalParquetStore;

impl PartitionStore for LocalParquetStore {
    fn write_partition(&self, path: &Path, df: &mut DataFrame) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(path, e))?;
        }

        let tmp_path = path.with_extension("parquet.tmp");
        let file = fs::File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        ParquetWriter::new(file)
            .finish(df)
            .map_err(|e| StoreError::parquet(&tmp_path, e))?;

        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::io(path, e)
        })?;
        Ok(())
    }

    fn read_partition(&self, path: &Path) -> Result<DataFrame, StoreError> {
        let file = fs::File::open(path).map_err(|e| StoreError::io(path, e))?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| StoreError::parquet(path, e))
    }
}
