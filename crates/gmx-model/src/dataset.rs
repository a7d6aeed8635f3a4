//! The partitioned dataset abstraction.
//!
//! A [`Dataset`] exposes its schema, its column identifiers and a sequence of
//! key-ordered partitions that can be read one at a time. Partitions of one
//! dataset never overlap and appear in row-key order, so iterating the
//! partitions in index order yields every row in key order.
//!
//! Implementations are immutable values shared behind [`DatasetRef`];
//! transformations wrap their inputs instead of mutating them.

use std::fmt;
use std::sync::Arc;

use crate::error::{ModelError, Result};
use crate::key::{KeyBounds, KeyRange};
use crate::partition::{Partition, Row};
use crate::schema::Schema;

pub type DatasetRef = Arc<dyn Dataset>;

pub trait Dataset: Send + Sync + fmt::Debug {
    fn label(&self) -> &str;

    fn schema(&self) -> &Schema;

    /// Column (sample) identifiers in entry order.
    fn columns(&self) -> &[String];

    fn num_partitions(&self) -> usize;

    /// Key bounds of a partition when known without reading it.
    ///
    /// `None` means the bounds are unknown, or the partition is empty.
    fn partition_bounds(&self, index: usize) -> Option<KeyBounds>;

    /// A key range every row of the partition is known to fall in.
    ///
    /// Views that cut partitions by key range rather than by observed rows
    /// report the range here when they cannot report exact bounds.
    fn partition_range(&self, index: usize) -> Option<KeyRange> {
        let _ = index;
        None
    }

    /// Row count of a partition when known without reading it.
    fn partition_len(&self, index: usize) -> Option<usize> {
        let _ = index;
        None
    }

    fn read_partition(&self, index: usize) -> Result<Partition>;

    fn num_columns(&self) -> usize {
        self.columns().len()
    }

    fn count_rows(&self) -> Result<usize> {
        let mut total = 0;
        for index in 0..self.num_partitions() {
            total += match self.partition_len(index) {
                Some(len) => len,
                None => self.read_partition(index)?.len(),
            };
        }
        Ok(total)
    }

    /// Collect the rows whose key lies in `range`.
    ///
    /// Partitions whose known bounds or range fall outside `range` are
    /// skipped without being read.
    fn rows_in_range(&self, range: &KeyRange) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for index in 0..self.num_partitions() {
            let overlaps = match self.partition_bounds(index) {
                Some(bounds) => range.overlaps(&bounds),
                None => match self.partition_range(index) {
                    Some(known) => range.intersects(&known),
                    None => self.partition_len(index) != Some(0),
                },
            };
            if !overlaps {
                continue;
            }
            let partition = self.read_partition(index)?;
            rows.extend(
                partition
                    .rows
                    .into_iter()
                    .filter(|row| range.contains(&row.key)),
            );
        }
        Ok(rows)
    }
}

/// Error for a partition index past the end of `dataset`.
pub fn partition_out_of_range(dataset: &dyn Dataset, index: usize) -> ModelError {
    ModelError::PartitionOutOfRange {
        label: dataset.label().to_string(),
        index,
        count: dataset.num_partitions(),
    }
}
