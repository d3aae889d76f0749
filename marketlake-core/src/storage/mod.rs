//! Idempotent partitioned storage — path grammar, store trait, layer writer.

mod frame;
mod partition;
mod store;
mod writer;

pub use partition::{partition_file, partition_segment, Layer};
pub use store::{LocalParquetStore, PartitionStore, StoreError};
pub use writer::{LayerWrite, PartitionRecord, PartitionedWriter, WriteError};
