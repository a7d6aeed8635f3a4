//! Parquet-backed storage for partitioned datasets.
//!
//! A stored dataset is a directory:
//!
//! ```text
//! <dataset>/metadata.json
//! <dataset>/parts/part-00000.rows.parquet
//! <dataset>/parts/part-00000.entries.parquet
//! ```
//!
//! `metadata.json` records the schema, the column identifiers and a
//! partition table with row counts, key bounds and a sha256 digest of every
//! file. Digests are verified whenever a partition is read.

mod codec;
pub mod disk;
pub mod error;
pub mod metadata;
pub mod write;

pub use disk::{DiskDataset, read_dataset};
pub use error::{Result, StoreError};
pub use metadata::{DatasetMetadata, FORMAT_VERSION, PartitionEntry, sha256_hex};
pub use write::{ProgressFn, WriteOptions, checkpoint, write_dataset};
