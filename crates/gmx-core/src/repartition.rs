//! Redistribution of a dataset's rows into a new number of partitions.
//!
//! Repartitioning never changes rows, values or their order; only partition
//! boundaries move. The result is a lazy view that reads the source
//! partitions each output partition is made of.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use gmx_model::{
    Dataset, DatasetRef, KeyBounds, KeyRange, Partition, Result as ModelResult, RowKey, Schema,
    partition_out_of_range,
};
use tracing::{debug, info, info_span};

use crate::context::ExecutionContext;
use crate::error::{MergeError, Result};

/// A piece of a source partition; `rows == None` takes the whole partition.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    partition: usize,
    rows: Option<Range<usize>>,
}

#[derive(Debug, Clone)]
pub struct RepartitionedDataset {
    source: DatasetRef,
    layout: Vec<Vec<Segment>>,
    lens: Vec<Option<usize>>,
    bounds: Vec<Option<KeyBounds>>,
}

impl RepartitionedDataset {
    pub fn source(&self) -> &DatasetRef {
        &self.source
    }
}

impl Dataset for RepartitionedDataset {
    fn label(&self) -> &str {
        self.source.label()
    }

    fn schema(&self) -> &Schema {
        self.source.schema()
    }

    fn columns(&self) -> &[String] {
        self.source.columns()
    }

    fn num_partitions(&self) -> usize {
        self.layout.len()
    }

    fn partition_bounds(&self, index: usize) -> Option<KeyBounds> {
        self.bounds.get(index)?.clone()
    }

    fn partition_range(&self, index: usize) -> Option<KeyRange> {
        let segments = self.layout.get(index)?;
        if segments.iter().any(|segment| segment.rows.is_some()) {
            return None;
        }
        let first = self.source.partition_range(segments.first()?.partition)?;
        let last = self.source.partition_range(segments.last()?.partition)?;
        Some(KeyRange::new(first.start, last.end))
    }

    fn partition_len(&self, index: usize) -> Option<usize> {
        *self.lens.get(index)?
    }

    fn read_partition(&self, index: usize) -> ModelResult<Partition> {
        let segments = self
            .layout
            .get(index)
            .ok_or_else(|| partition_out_of_range(self, index))?;
        let mut rows = Vec::new();
        for segment in segments {
            let partition = self.source.read_partition(segment.partition)?;
            match &segment.rows {
                None => rows.extend(partition.rows),
                Some(range) => rows.extend(
                    partition
                        .rows
                        .into_iter()
                        .skip(range.start)
                        .take(range.len()),
                ),
            }
        }
        Ok(Partition::new(rows))
    }
}

/// Redistribute `dataset` into `partitions` output partitions.
///
/// With `shuffle` the rows are balanced exactly: output partition `j` holds
/// global rows `[j*T/n, (j+1)*T/n)`, so sizes differ by at most one. Without
/// it adjacent source partitions are coalesced into at most `partitions`
/// groups; the partition count never grows and no row moves between
/// partitions other than by grouping.
pub fn repartition(
    dataset: DatasetRef,
    partitions: usize,
    shuffle: bool,
    ctx: &ExecutionContext,
) -> Result<RepartitionedDataset> {
    if partitions == 0 {
        return Err(MergeError::InvalidPartitionCount);
    }
    let span = info_span!("repartition", label = %dataset.label(), partitions, shuffle);
    let _guard = span.enter();
    ctx.check_cancelled()?;

    let source_count = dataset.num_partitions();
    let (layout, lens) = if shuffle {
        let source_lens = ctx.map_partitions(source_count, |index| {
            match dataset.partition_len(index) {
                Some(len) => Ok(len),
                None => dataset
                    .read_partition(index)
                    .map(|partition| partition.len())
                    .map_err(MergeError::from),
            }
        })?;
        balanced_layout(&source_lens, partitions)
    } else {
        coalesced_layout(dataset.as_ref(), partitions)
    };
    let bounds = if shuffle {
        balanced_bounds(dataset.as_ref(), &layout, ctx)?
    } else {
        layout
            .iter()
            .map(|segments| whole_segment_bounds(dataset.as_ref(), segments))
            .collect()
    };
    info!(
        from = source_count,
        to = layout.len(),
        "repartitioned dataset"
    );
    Ok(RepartitionedDataset {
        source: dataset,
        layout,
        lens,
        bounds,
    })
}

/// Bounds of a group of whole source partitions, from the source's own bounds.
fn whole_segment_bounds(dataset: &dyn Dataset, segments: &[Segment]) -> Option<KeyBounds> {
    let mut first = None;
    let mut last = None;
    for segment in segments {
        if segment.rows.is_some() {
            return None;
        }
        match dataset.partition_bounds(segment.partition) {
            Some(bounds) => {
                first.get_or_insert(bounds.first);
                last = Some(bounds.last);
            }
            None if dataset.partition_len(segment.partition) == Some(0) => {}
            None => return None,
        }
    }
    Some(KeyBounds::new(first?, last?))
}

/// First and last key of every balanced output partition.
///
/// Each cut point is looked up once: from the source bounds when it sits at
/// the edge of a source partition with known bounds, otherwise by reading
/// that source partition.
fn balanced_bounds(
    dataset: &dyn Dataset,
    layout: &[Vec<Segment>],
    ctx: &ExecutionContext,
) -> Result<Vec<Option<KeyBounds>>> {
    let mut wanted = vec![BTreeSet::new(); dataset.num_partitions()];
    for segments in layout {
        let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
            continue;
        };
        if let (Some(head), Some(tail)) = (&first.rows, &last.rows) {
            wanted[first.partition].insert(head.start);
            wanted[last.partition].insert(tail.end - 1);
        }
    }

    let keys = ctx.map_partitions(wanted.len(), |index| -> Result<BTreeMap<usize, RowKey>> {
        let offsets = &wanted[index];
        if offsets.is_empty() {
            return Ok(BTreeMap::new());
        }
        if let (Some(bounds), Some(len)) =
            (dataset.partition_bounds(index), dataset.partition_len(index))
            && offsets.iter().all(|&offset| offset == 0 || offset + 1 == len)
        {
            return Ok(offsets
                .iter()
                .map(|&offset| {
                    let key = if offset == 0 { &bounds.first } else { &bounds.last };
                    (offset, key.clone())
                })
                .collect());
        }
        let partition = dataset.read_partition(index)?;
        Ok(offsets
            .iter()
            .filter_map(|&offset| {
                partition
                    .rows
                    .get(offset)
                    .map(|row| (offset, row.key.clone()))
            })
            .collect())
    })?;

    Ok(layout
        .iter()
        .map(|segments| {
            let first = segments.first()?;
            let last = segments.last()?;
            let head = first.rows.as_ref()?.start;
            let tail = last.rows.as_ref()?.end - 1;
            Some(KeyBounds::new(
                keys[first.partition].get(&head)?.clone(),
                keys[last.partition].get(&tail)?.clone(),
            ))
        })
        .collect())
}

fn balanced_layout(
    source_lens: &[usize],
    partitions: usize,
) -> (Vec<Vec<Segment>>, Vec<Option<usize>>) {
    let total: usize = source_lens.iter().sum();
    let mut offsets = Vec::with_capacity(source_lens.len());
    let mut offset = 0;
    for len in source_lens {
        offsets.push(offset);
        offset += len;
    }

    let mut layout = Vec::with_capacity(partitions);
    let mut lens = Vec::with_capacity(partitions);
    for j in 0..partitions {
        let start = j * total / partitions;
        let end = (j + 1) * total / partitions;
        let mut segments = Vec::new();
        for (partition, (&len, &base)) in source_lens.iter().zip(&offsets).enumerate() {
            let lo = start.max(base);
            let hi = end.min(base + len);
            if lo < hi {
                segments.push(Segment {
                    partition,
                    rows: Some(lo - base..hi - base),
                });
            }
        }
        debug!(partition = j, rows = end - start, segments = segments.len(), "balanced partition");
        layout.push(segments);
        lens.push(Some(end - start));
    }
    (layout, lens)
}

fn coalesced_layout(
    dataset: &dyn Dataset,
    partitions: usize,
) -> (Vec<Vec<Segment>>, Vec<Option<usize>>) {
    let source_count = dataset.num_partitions();
    let groups = partitions.min(source_count.max(1));
    let mut layout = Vec::with_capacity(groups);
    let mut lens = Vec::with_capacity(groups);
    for g in 0..groups {
        let members = g * source_count / groups..(g + 1) * source_count / groups;
        let len = members
            .clone()
            .map(|partition| dataset.partition_len(partition))
            .sum::<Option<usize>>();
        layout.push(
            members
                .map(|partition| Segment {
                    partition,
                    rows: None,
                })
                .collect(),
        );
        lens.push(len);
    }
    (layout, lens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_layout_splits_across_source_partitions() {
        let (layout, lens) = balanced_layout(&[3, 0, 4], 2);
        assert_eq!(lens, vec![Some(3), Some(4)]);
        assert_eq!(
            layout[0],
            vec![Segment {
                partition: 0,
                rows: Some(0..3)
            }]
        );
        assert_eq!(
            layout[1],
            vec![Segment {
                partition: 2,
                rows: Some(0..4)
            }]
        );

        let (layout, lens) = balanced_layout(&[5], 2);
        assert_eq!(lens, vec![Some(2), Some(3)]);
        assert_eq!(layout[1][0].rows, Some(2..5));
    }
}
