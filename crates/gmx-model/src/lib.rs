//! Schema model and dataset abstraction for genomic matrix datasets.
//!
//! A dataset has a row axis keyed by a typed tuple (usually locus and
//! alleles), a column axis of sample identifiers, per-row fields and
//! per-(row, column) entry fields.

pub mod dataset;
pub mod error;
pub mod key;
pub mod memory;
pub mod partition;
pub mod schema;
pub mod types;

pub use dataset::{Dataset, DatasetRef, partition_out_of_range};
pub use error::{ModelError, Result, SourceError};
pub use key::{KeyBounds, KeyRange, RowKey};
pub use memory::MemoryDataset;
pub use partition::{Partition, Row};
pub use schema::{Field, FieldGroup, Schema, SchemaBuilder};
pub use types::{Call, FieldType, Locus, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_rejects_duplicate_names_across_groups() {
        let result = Schema::builder()
            .key("locus", FieldType::Locus)
            .row("DP", FieldType::Int32)
            .entry("DP", FieldType::Int32)
            .build();
        assert!(matches!(result, Err(ModelError::DuplicateField { name }) if name == "DP"));
    }

    #[test]
    fn schema_serializes() {
        let schema = Schema::builder()
            .key("locus", FieldType::Locus)
            .key("alleles", FieldType::array(FieldType::Str))
            .entry("GT", FieldType::Call)
            .build()
            .expect("schema");
        let json = serde_json::to_string(&schema).expect("serialize schema");
        let round: Schema = serde_json::from_str(&json).expect("deserialize schema");
        assert_eq!(round, schema);
    }
}
