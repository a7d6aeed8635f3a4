use thiserror::Error;

use crate::schema::FieldGroup;

/// Boxed error raised by a dataset backend while producing a partition.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("schema must declare at least one row key field")]
    EmptyRowKey,

    #[error("field '{name}' is declared more than once")]
    DuplicateField { name: String },

    #[error("field name must not be empty ({group} fields)")]
    EmptyFieldName { group: FieldGroup },

    #[error("column '{column}' appears more than once in dataset '{label}'")]
    DuplicateColumn { label: String, column: String },

    #[error("row {key} in dataset '{label}': expected {expected} {group} values, found {found}")]
    RowShape {
        label: String,
        key: String,
        group: FieldGroup,
        expected: usize,
        found: usize,
    },

    #[error("row {key} in dataset '{label}': field '{field}' expects {expected}, got {value}")]
    TypeMismatch {
        label: String,
        key: String,
        field: String,
        expected: String,
        value: String,
    },

    #[error("dataset '{label}' contains row key {key} more than once")]
    DuplicateRowKey { label: String, key: String },

    #[error("dataset '{label}' is not ordered by row key: {previous} precedes {next}")]
    UnorderedRows {
        label: String,
        previous: String,
        next: String,
    },

    #[error("dataset '{label}' has {count} partitions, partition {index} requested")]
    PartitionOutOfRange {
        label: String,
        index: usize,
        count: usize,
    },

    #[error("invalid {field_type} value '{text}'")]
    Parse { field_type: String, text: String },

    #[error("failed to read partition {index} of dataset '{label}': {source}")]
    Source {
        label: String,
        index: usize,
        #[source]
        source: SourceError,
    },
}

impl ModelError {
    pub fn from_source(
        label: impl Into<String>,
        index: usize,
        source: impl Into<SourceError>,
    ) -> Self {
        Self::Source {
            label: label.into(),
            index,
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
