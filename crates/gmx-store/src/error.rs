use std::path::{Path, PathBuf};

use gmx_core::MergeError;
use gmx_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error on {path}: {source}")]
    Parquet {
        path: PathBuf,
        #[source]
        source: polars::prelude::PolarsError,
    },

    #[error("invalid dataset metadata {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} is not a dataset directory (missing metadata.json)")]
    NotADataset { path: PathBuf },

    #[error("unsupported dataset format version {found} in {path} (expected {expected})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("sha256 mismatch for {path} (expected {expected}, got {actual})")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("output {path} already exists; enable overwrite to replace it")]
    Exists { path: PathBuf },

    #[error("column '{column}' in {path}: {message}")]
    Decode {
        path: PathBuf,
        column: String,
        message: String,
    },

    #[error("{path}: expected {expected} rows, found {found}")]
    RowCount {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parquet(path: &Path, source: polars::prelude::PolarsError) -> Self {
        Self::Parquet {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn decode(path: &Path, column: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            column: column.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
