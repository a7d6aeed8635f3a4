//! Reading stored datasets.

use std::path::{Path, PathBuf};

use gmx_model::{
    Dataset, KeyBounds, ModelError, Partition, Result as ModelResult, Schema,
    partition_out_of_range,
};
use tracing::{debug, info};

use crate::codec::{decode_partition, read_parquet};
use crate::error::{Result, StoreError};
use crate::metadata::{DatasetMetadata, PartitionEntry, read_verified};

/// A dataset stored on disk; partitions are read and verified on demand.
#[derive(Debug, Clone)]
pub struct DiskDataset {
    root: PathBuf,
    metadata: DatasetMetadata,
}

/// Open the dataset stored at `path`.
pub fn read_dataset(path: impl AsRef<Path>) -> Result<DiskDataset> {
    let root = path.as_ref().to_path_buf();
    let metadata = DatasetMetadata::load(&root)?;
    info!(
        path = %root.display(),
        label = %metadata.label,
        columns = metadata.columns.len(),
        partitions = metadata.partitions.len(),
        rows = metadata.total_rows(),
        "opened dataset"
    );
    Ok(DiskDataset { root, metadata })
}

impl DiskDataset {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    /// Use a different label for this dataset without touching the files.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.metadata.label = label.into();
        self
    }

    fn load_partition(&self, entry: &PartitionEntry) -> Result<Partition> {
        let rows_path = entry.rows_path(&self.root);
        let rows = read_parquet(read_verified(&rows_path, &entry.rows_sha256)?, &rows_path)?;
        let entries = match &entry.entries_sha256 {
            Some(sha) => {
                let path = entry.entries_path(&self.root);
                Some(read_parquet(read_verified(&path, sha)?, &path)?)
            }
            None => None,
        };
        let schema = &self.metadata.schema;
        let partition = decode_partition(
            schema,
            self.metadata.columns.len(),
            &rows,
            entries.as_ref(),
            &rows_path,
        )?;
        if partition.len() != entry.rows {
            return Err(StoreError::RowCount {
                path: rows_path,
                expected: entry.rows,
                found: partition.len(),
            });
        }
        debug!(path = %rows_path.display(), rows = entry.rows, "read partition");
        Ok(partition)
    }
}

impl Dataset for DiskDataset {
    fn label(&self) -> &str {
        &self.metadata.label
    }

    fn schema(&self) -> &Schema {
        &self.metadata.schema
    }

    fn columns(&self) -> &[String] {
        &self.metadata.columns
    }

    fn num_partitions(&self) -> usize {
        self.metadata.partitions.len()
    }

    fn partition_bounds(&self, index: usize) -> Option<KeyBounds> {
        let entry = self.metadata.partitions.get(index)?;
        Some(KeyBounds::new(
            entry.first_key.clone()?,
            entry.last_key.clone()?,
        ))
    }

    fn partition_len(&self, index: usize) -> Option<usize> {
        self.metadata.partitions.get(index).map(|entry| entry.rows)
    }

    fn read_partition(&self, index: usize) -> ModelResult<Partition> {
        let entry = self
            .metadata
            .partitions
            .get(index)
            .ok_or_else(|| partition_out_of_range(self, index))?;
        let partition = self
            .load_partition(entry)
            .map_err(|error| ModelError::from_source(self.label(), index, error))?;
        partition.check_order(self.label())?;
        Ok(partition)
    }
}
