//! Writing datasets to disk.
//!
//! Partitions are written in parallel into a staging directory under the
//! execution context's scratch dir. The staged dataset replaces the
//! destination only once every partition and the metadata are complete.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use gmx_core::ExecutionContext;
use gmx_model::Dataset;
use tracing::{debug, info, info_span, warn};

use crate::codec::{entries_frame, rows_frame, write_parquet};
use crate::disk::{DiskDataset, read_dataset};
use crate::error::{Result, StoreError};
use crate::metadata::{
    DatasetMetadata, FORMAT_VERSION, PARTS_DIR, PartitionEntry, sha256_hex,
};

static STAGING_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Called after each partition is written with `(written, total)`.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

#[derive(Clone)]
pub struct WriteOptions {
    /// Replace an existing dataset at the destination.
    pub overwrite: bool,
    pub progress: Option<ProgressFn>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            progress: None,
        }
    }
}

impl fmt::Debug for WriteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOptions")
            .field("overwrite", &self.overwrite)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl WriteOptions {
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_progress(mut self, progress: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }
}

/// Write every partition of `dataset` to `path`.
pub fn write_dataset(
    dataset: &dyn Dataset,
    path: impl AsRef<Path>,
    options: &WriteOptions,
    ctx: &ExecutionContext,
) -> Result<DatasetMetadata> {
    let destination = path.as_ref();
    let span = info_span!("write", label = %dataset.label(), path = %destination.display());
    let _guard = span.enter();
    dataset.schema().validate()?;
    if destination.exists() && !options.overwrite {
        return Err(StoreError::Exists {
            path: destination.to_path_buf(),
        });
    }

    let staging = ctx.scratch_dir().join(format!(
        "write-{}",
        STAGING_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let parts = staging.join(PARTS_DIR);
    fs::create_dir_all(&parts).map_err(|source| StoreError::io(&parts, source))?;

    let result = stage(dataset, &staging, options, ctx).and_then(|metadata| {
        replace(&staging, destination)?;
        Ok(metadata)
    });
    if result.is_err() {
        if let Err(error) = fs::remove_dir_all(&staging) {
            if error.kind() != ErrorKind::NotFound {
                warn!(%error, path = %staging.display(), "failed to remove staging directory");
            }
        }
    }
    let metadata = result?;
    info!(
        partitions = metadata.partitions.len(),
        rows = metadata.total_rows(),
        columns = metadata.columns.len(),
        "wrote dataset"
    );
    Ok(metadata)
}

/// Write `dataset` to `path` and reopen it from disk.
pub fn checkpoint(
    dataset: &dyn Dataset,
    path: impl AsRef<Path>,
    overwrite: bool,
    ctx: &ExecutionContext,
) -> Result<DiskDataset> {
    let options = WriteOptions::default().with_overwrite(overwrite);
    write_dataset(dataset, path.as_ref(), &options, ctx)?;
    read_dataset(path)
}

fn stage(
    dataset: &dyn Dataset,
    staging: &Path,
    options: &WriteOptions,
    ctx: &ExecutionContext,
) -> Result<DatasetMetadata> {
    let total = dataset.num_partitions();
    let written = AtomicUsize::new(0);
    let partitions = ctx.map_partitions(total, |index| {
        let entry = write_partition(dataset, index, staging)?;
        let done = written.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(progress) = &options.progress {
            progress(done, total);
        }
        Ok::<_, StoreError>(entry)
    })?;
    ctx.check_cancelled()?;

    let metadata = DatasetMetadata {
        format_version: FORMAT_VERSION,
        label: dataset.label().to_string(),
        created_at: Utc::now(),
        schema: dataset.schema().clone(),
        columns: dataset.columns().to_vec(),
        partitions,
    };
    metadata.save(staging)?;
    Ok(metadata)
}

fn write_partition(dataset: &dyn Dataset, index: usize, staging: &Path) -> Result<PartitionEntry> {
    let partition = dataset.read_partition(index)?;
    partition.check_order(dataset.label())?;
    let schema = dataset.schema();
    let bounds = partition.bounds();
    let mut entry = PartitionEntry {
        stem: PartitionEntry::stem_for(index),
        rows: partition.len(),
        first_key: bounds.as_ref().map(|b| b.first.clone()),
        last_key: bounds.map(|b| b.last),
        rows_sha256: String::new(),
        entries_sha256: None,
    };

    let rows_path = entry.rows_path(staging);
    let mut rows = rows_frame(schema, &partition, &rows_path)?;
    entry.rows_sha256 = write_file(&mut rows, &rows_path)?;

    if !schema.entry_fields.is_empty() && dataset.num_columns() > 0 {
        let entries_path = entry.entries_path(staging);
        let mut entries = entries_frame(schema, &partition, &entries_path)?;
        entry.entries_sha256 = Some(write_file(&mut entries, &entries_path)?);
    }
    debug!(index, rows = entry.rows, "staged partition");
    Ok(entry)
}

fn write_file(frame: &mut polars::prelude::DataFrame, path: &Path) -> Result<String> {
    let bytes = write_parquet(frame, path)?;
    let sha = sha256_hex(&bytes);
    fs::write(path, &bytes).map_err(|source| StoreError::io(path, source))?;
    Ok(sha)
}

/// Move the staged dataset to `destination`, replacing what is there.
fn replace(staging: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::io(parent, source))?;
    }
    if destination.is_dir() {
        fs::remove_dir_all(destination).map_err(|source| StoreError::io(destination, source))?;
    } else if destination.exists() {
        fs::remove_file(destination).map_err(|source| StoreError::io(destination, source))?;
    }
    match fs::rename(staging, destination) {
        Ok(()) => Ok(()),
        Err(error) => {
            debug!(%error, "rename failed, copying staged dataset instead");
            copy_dir(staging, destination)?;
            fs::remove_dir_all(staging).map_err(|source| StoreError::io(staging, source))
        }
    }
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to).map_err(|source| StoreError::io(to, source))?;
    let listing = fs::read_dir(from).map_err(|source| StoreError::io(from, source))?;
    for entry in listing {
        let entry = entry.map_err(|source| StoreError::io(from, source))?;
        let target = to.join(entry.file_name());
        let kind = entry
            .file_type()
            .map_err(|source| StoreError::io(entry.path(), source))?;
        if kind.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|source| StoreError::io(&target, source))?;
        }
    }
    Ok(())
}
