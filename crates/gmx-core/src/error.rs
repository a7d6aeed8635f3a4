use std::path::PathBuf;

use gmx_model::{FieldGroup, FieldType, ModelError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no input datasets supplied")]
    EmptyInput,

    #[error("dataset label '{label}' is used more than once")]
    DuplicateLabel { label: String },

    #[error(
        "schema conflict on field '{field}': '{first_label}' declares {first_group} {first_type}, \
         '{label}' declares {group} {field_type}"
    )]
    SchemaConflict {
        field: String,
        first_group: FieldGroup,
        first_label: String,
        first_type: FieldType,
        group: FieldGroup,
        label: String,
        field_type: FieldType,
    },

    #[error("row key of '{label}' is ({found}) but '{first_label}' uses ({expected})")]
    RowKeyMismatch {
        first_label: String,
        expected: String,
        label: String,
        found: String,
    },

    #[error("dataset '{label}' is not aligned with '{first_label}': {group} fields differ")]
    SchemaMismatch {
        first_label: String,
        label: String,
        group: FieldGroup,
    },

    #[error("column '{column}' of '{label}' is already provided by '{first_label}'")]
    KeyCollision {
        column: String,
        first_label: String,
        label: String,
    },

    #[error("partition count must be at least 1")]
    InvalidPartitionCount,

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to prepare scratch directory {path}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, MergeError>;
