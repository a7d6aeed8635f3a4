//! Lazy column selection and field projection over a source dataset.
//!
//! Deduplication and alignment never copy data up front: each produces a new
//! [`ProjectedDataset`] that records which columns survive and where every
//! target field comes from. Values are only touched when a partition is read.

use std::collections::BTreeSet;

use gmx_model::{
    Dataset, DatasetRef, Field, FieldGroup, FieldType, KeyBounds, KeyRange, Partition, Result, Row,
    Schema, Value,
};

/// Where a target field's values come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// Read the field at this index of the dataset's current field list.
    Select(usize),
    /// Materialize a typed missing value.
    Fill(FieldType),
}

#[derive(Debug, Clone)]
pub struct ProjectedDataset {
    source: DatasetRef,
    label: String,
    schema: Schema,
    columns: Vec<String>,
    column_indices: Vec<usize>,
    row_plan: Vec<FieldSource>,
    entry_plan: Vec<FieldSource>,
}

impl ProjectedDataset {
    /// A pass-through view of `source` under a new label.
    pub fn identity(label: impl Into<String>, source: DatasetRef) -> Self {
        let schema = source.schema().clone();
        let columns = source.columns().to_vec();
        let column_indices = (0..columns.len()).collect();
        let row_plan = (0..schema.row_fields.len()).map(FieldSource::Select).collect();
        let entry_plan = (0..schema.entry_fields.len())
            .map(FieldSource::Select)
            .collect();
        Self {
            source,
            label: label.into(),
            schema,
            columns,
            column_indices,
            row_plan,
            entry_plan,
        }
    }

    /// Keep only the columns for which `keep` returns true, preserving order.
    pub fn retain_columns(&self, keep: impl Fn(&str) -> bool) -> Self {
        let mut columns = Vec::new();
        let mut column_indices = Vec::new();
        for (column, index) in self.columns.iter().zip(&self.column_indices) {
            if keep(column) {
                columns.push(column.clone());
                column_indices.push(*index);
            }
        }
        Self {
            columns,
            column_indices,
            ..self.clone()
        }
    }

    /// Drop every column named in `dropped`.
    pub fn without_columns(&self, dropped: &BTreeSet<String>) -> Self {
        self.retain_columns(|column| !dropped.contains(column))
    }

    /// Replace the row fields with `targets`.
    ///
    /// `sources[i]` describes target `i` relative to this view's current row
    /// fields. The plan is composed with the existing one, so reads still go
    /// straight to the underlying source.
    pub fn project_row_fields(&self, targets: Vec<Field>, sources: &[FieldSource]) -> Self {
        Self {
            schema: self.schema.with_row_fields(targets),
            row_plan: compose(&self.row_plan, sources),
            ..self.clone()
        }
    }

    /// Replace the entry fields with `targets`; see [`Self::project_row_fields`].
    pub fn project_entry_fields(&self, targets: Vec<Field>, sources: &[FieldSource]) -> Self {
        Self {
            schema: self.schema.with_entry_fields(targets),
            entry_plan: compose(&self.entry_plan, sources),
            ..self.clone()
        }
    }

    /// Replace the fields of a non-key `group`.
    ///
    /// The row key is shared by every aligned dataset and never reprojected,
    /// so a `RowKey` request returns the view unchanged.
    pub fn project_fields(
        &self,
        group: FieldGroup,
        targets: Vec<Field>,
        sources: &[FieldSource],
    ) -> Self {
        match group {
            FieldGroup::Row => self.project_row_fields(targets, sources),
            FieldGroup::Entry => self.project_entry_fields(targets, sources),
            FieldGroup::RowKey => self.clone(),
        }
    }

    pub fn source(&self) -> &DatasetRef {
        &self.source
    }

    fn project_row(&self, row: Row) -> Row {
        let fields = apply_plan(&self.row_plan, &row.fields);
        let entries = self
            .column_indices
            .iter()
            .map(|column| apply_plan(&self.entry_plan, &row.entries[*column]))
            .collect();
        Row {
            key: row.key,
            fields,
            entries,
        }
    }
}

fn compose(current: &[FieldSource], sources: &[FieldSource]) -> Vec<FieldSource> {
    sources
        .iter()
        .map(|source| match source {
            FieldSource::Select(index) => current[*index].clone(),
            FieldSource::Fill(field_type) => FieldSource::Fill(field_type.clone()),
        })
        .collect()
}

fn apply_plan(plan: &[FieldSource], values: &[Value]) -> Vec<Value> {
    plan.iter()
        .map(|source| match source {
            FieldSource::Select(index) => values[*index].clone(),
            FieldSource::Fill(_) => Value::Missing,
        })
        .collect()
}

impl Dataset for ProjectedDataset {
    fn label(&self) -> &str {
        &self.label
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn num_partitions(&self) -> usize {
        self.source.num_partitions()
    }

    fn partition_bounds(&self, index: usize) -> Option<KeyBounds> {
        self.source.partition_bounds(index)
    }

    fn partition_range(&self, index: usize) -> Option<KeyRange> {
        self.source.partition_range(index)
    }

    fn partition_len(&self, index: usize) -> Option<usize> {
        self.source.partition_len(index)
    }

    fn read_partition(&self, index: usize) -> Result<Partition> {
        let partition = self.source.read_partition(index)?;
        Ok(partition
            .rows
            .into_iter()
            .map(|row| self.project_row(row))
            .collect())
    }
}
