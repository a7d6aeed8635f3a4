//! Explicit execution context for partition-parallel work.
//!
//! The context owns the worker pool, a per-session scratch directory and a
//! cancellation token. Partition work is evaluated in waves of at most
//! `threads` partitions, so peak memory stays bounded by the partitions in
//! flight, and cancellation is observed at every wave boundary.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use gmx_model::{Dataset, MemoryDataset};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::error::{MergeError, Result};

/// Default number of output partitions for merges.
pub const DEFAULT_PARTITIONS: usize = 256;

static SESSION_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Cooperative cancellation flag shared between a caller and running work.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(MergeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Configuration for [`ExecutionContext`].
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Worker threads; defaults to the available parallelism.
    pub threads: Option<usize>,
    /// Parent of the session scratch directory; defaults to the system temp dir.
    pub tmp_dir: Option<PathBuf>,
    /// Output partition count used when an operation does not specify one.
    pub default_partitions: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            threads: None,
            tmp_dir: None,
            default_partitions: DEFAULT_PARTITIONS,
        }
    }
}

impl ExecutionConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_tmp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = Some(dir.into());
        self
    }

    pub fn with_default_partitions(mut self, partitions: usize) -> Self {
        self.default_partitions = partitions;
        self
    }
}

pub struct ExecutionContext {
    pool: ThreadPool,
    threads: usize,
    scratch_dir: PathBuf,
    default_partitions: usize,
    cancel: CancellationToken,
    closed: bool,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("threads", &self.threads)
            .field("scratch_dir", &self.scratch_dir)
            .field("default_partitions", &self.default_partitions)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ExecutionContext {
    pub fn new(config: ExecutionConfig) -> Result<Self> {
        if config.default_partitions == 0 {
            return Err(MergeError::InvalidPartitionCount);
        }
        let threads = config
            .threads
            .filter(|threads| *threads > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(std::num::NonZeroUsize::get)
                    .unwrap_or(1)
            });
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("gmx-worker-{index}"))
            .build()?;
        let parent = config.tmp_dir.unwrap_or_else(std::env::temp_dir);
        let scratch_dir = parent.join(session_dir_name());
        fs::create_dir_all(&scratch_dir).map_err(|source| MergeError::Scratch {
            path: scratch_dir.clone(),
            source,
        })?;
        info!(
            threads,
            scratch_dir = %scratch_dir.display(),
            default_partitions = config.default_partitions,
            "execution context ready"
        );
        Ok(Self {
            pool,
            threads,
            scratch_dir,
            default_partitions: config.default_partitions,
            cancel: CancellationToken::new(),
            closed: false,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn default_partitions(&self) -> usize {
        self.default_partitions
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }

    /// Evaluate `f` for every partition index, in parallel waves of at most
    /// `threads` partitions. Results are returned in index order.
    pub fn map_partitions<T, E, F>(&self, count: usize, f: F) -> std::result::Result<Vec<T>, E>
    where
        T: Send,
        E: From<MergeError> + Send,
        F: Fn(usize) -> std::result::Result<T, E> + Sync + Send,
    {
        let wave = self.threads.max(1);
        let mut out = Vec::with_capacity(count);
        let mut start = 0;
        while start < count {
            self.check_cancelled()?;
            let end = (start + wave).min(count);
            debug!(start, end, count, "evaluating partition wave");
            let results = self.pool.install(|| {
                (start..end)
                    .into_par_iter()
                    .map(&f)
                    .collect::<std::result::Result<Vec<T>, E>>()
            })?;
            out.extend(results);
            start = end;
        }
        Ok(out)
    }

    /// Read every partition of `dataset` into memory.
    pub fn materialize(&self, dataset: &dyn Dataset) -> Result<MemoryDataset> {
        let partitions = self.map_partitions(dataset.num_partitions(), |index| {
            dataset.read_partition(index).map_err(MergeError::from)
        })?;
        let collected = MemoryDataset::from_partitions(
            dataset.label(),
            dataset.schema().clone(),
            dataset.columns().to_vec(),
            partitions,
        )?;
        Ok(collected)
    }

    /// Remove the session scratch directory.
    pub fn shutdown(mut self) -> Result<()> {
        self.remove_scratch()
    }

    fn remove_scratch(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match fs::remove_dir_all(&self.scratch_dir) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MergeError::Scratch {
                path: self.scratch_dir.clone(),
                source,
            }),
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if let Err(error) = self.remove_scratch() {
            warn!(%error, "failed to clean up scratch directory");
        }
    }
}

fn session_dir_name() -> String {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let session = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("gmx-{}-{stamp}-{session}", std::process::id())
}
