//! In-memory reference implementation of [`Dataset`].

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::dataset::{Dataset, DatasetRef, partition_out_of_range};
use crate::error::{ModelError, Result};
use crate::key::KeyBounds;
use crate::partition::{Partition, Row};
use crate::schema::Schema;

#[derive(Debug, Clone)]
pub struct MemoryDataset {
    label: String,
    schema: Schema,
    columns: Vec<String>,
    partitions: Vec<Partition>,
}

impl MemoryDataset {
    /// Build a single-partition dataset; rows are validated and sorted by key.
    pub fn new(
        label: impl Into<String>,
        schema: Schema,
        columns: Vec<String>,
        rows: Vec<Row>,
    ) -> Result<Self> {
        Self::with_partitions(label, schema, columns, rows, 1)
    }

    /// Build a dataset whose sorted rows are split into `partitions`
    /// contiguous chunks of near-equal size.
    pub fn with_partitions(
        label: impl Into<String>,
        schema: Schema,
        columns: Vec<String>,
        mut rows: Vec<Row>,
        partitions: usize,
    ) -> Result<Self> {
        let label = label.into();
        schema.validate()?;
        check_columns(&label, &columns)?;
        for row in &rows {
            row.validate(&label, &schema, columns.len())?;
        }
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        let sorted = Partition::new(rows);
        sorted.check_order(&label)?;
        let partitions = split_even(sorted.rows, partitions.max(1));
        Ok(Self {
            label,
            schema,
            columns,
            partitions,
        })
    }

    /// Build a dataset from ready-made partitions, checking that they are
    /// individually and collectively ordered by row key.
    pub fn from_partitions(
        label: impl Into<String>,
        schema: Schema,
        columns: Vec<String>,
        partitions: Vec<Partition>,
    ) -> Result<Self> {
        let label = label.into();
        schema.validate()?;
        check_columns(&label, &columns)?;
        let mut previous: Option<KeyBounds> = None;
        for partition in &partitions {
            for row in &partition.rows {
                row.validate(&label, &schema, columns.len())?;
            }
            partition.check_order(&label)?;
            let Some(bounds) = partition.bounds() else {
                continue;
            };
            if let Some(prev) = &previous {
                if prev.last >= bounds.first {
                    return Err(ModelError::UnorderedRows {
                        label,
                        previous: prev.last.to_string(),
                        next: bounds.first.to_string(),
                    });
                }
            }
            previous = Some(bounds);
        }
        Ok(Self {
            label,
            schema,
            columns,
            partitions,
        })
    }

    /// Materialize any dataset in memory, keeping its partition layout.
    pub fn collect(dataset: &dyn Dataset) -> Result<Self> {
        let partitions = (0..dataset.num_partitions())
            .map(|index| dataset.read_partition(index))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            label: dataset.label().to_string(),
            schema: dataset.schema().clone(),
            columns: dataset.columns().to_vec(),
            partitions,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn into_shared(self) -> DatasetRef {
        Arc::new(self)
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// All rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.partitions.iter().flat_map(|partition| partition.rows.iter())
    }
}

fn check_columns(label: &str, columns: &[String]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for column in columns {
        if !seen.insert(column.as_str()) {
            return Err(ModelError::DuplicateColumn {
                label: label.to_string(),
                column: column.clone(),
            });
        }
    }
    Ok(())
}

fn split_even(rows: Vec<Row>, partitions: usize) -> Vec<Partition> {
    let total = rows.len();
    let mut out = Vec::with_capacity(partitions);
    let mut iter = rows.into_iter();
    for index in 0..partitions {
        let start = index * total / partitions;
        let end = (index + 1) * total / partitions;
        out.push(iter.by_ref().take(end - start).collect());
    }
    out
}

impl Dataset for MemoryDataset {
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
        self.partitions.len()
    }

    fn partition_bounds(&self, index: usize) -> Option<KeyBounds> {
        self.partitions.get(index)?.bounds()
    }

    fn partition_len(&self, index: usize) -> Option<usize> {
        self.partitions.get(index).map(Partition::len)
    }

    fn read_partition(&self, index: usize) -> Result<Partition> {
        self.partitions
            .get(index)
            .cloned()
            .ok_or_else(|| partition_out_of_range(self, index))
    }
}
