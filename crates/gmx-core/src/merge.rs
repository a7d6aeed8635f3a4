//! Partitioned outer-join union of aligned datasets along the column axis.
//!
//! The key space is cut into half-open ranges ([`KeyRangePlan`]). Output
//! partition `i` is produced by reading only the input rows that fall in
//! range `i` and folding binary outer joins over them, left to right in
//! priority order. Nothing is computed until a partition is read.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use gmx_model::{
    Dataset, DatasetRef, FieldGroup, KeyBounds, KeyRange, Partition, Row, RowKey, Schema, Value,
    partition_out_of_range,
};
use tracing::{debug, info, info_span};

use crate::context::ExecutionContext;
use crate::error::{MergeError, Result};

/// Label given to merge results unless overridden.
pub const DEFAULT_MERGED_LABEL: &str = "combined";

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Target output partition count; the context default when unset.
    pub partitions: Option<usize>,
    pub label: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            partitions: None,
            label: DEFAULT_MERGED_LABEL.to_string(),
        }
    }
}

impl MergeOptions {
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = Some(partitions);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Outer join of two key-sorted row sequences along the column axis.
///
/// Keys present on one side only get missing entries for the other side's
/// columns. For keys present on both sides the left row fields are kept and
/// the entries are the left columns followed by the right columns.
pub fn outer_join_cols(
    left: Vec<Row>,
    left_columns: usize,
    right: Vec<Row>,
    right_columns: usize,
    entry_fields: usize,
) -> Vec<Row> {
    let missing = |columns: usize| vec![vec![Value::Missing; entry_fields]; columns];
    let mut out = Vec::with_capacity(left.len().max(right.len()));
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let order = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => l.key.cmp(&r.key),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => break,
        };
        let row = match order {
            Ordering::Less => left.next().map(|mut row| {
                row.entries.extend(missing(right_columns));
                row
            }),
            Ordering::Greater => right.next().map(|row| {
                let mut entries = missing(left_columns);
                entries.extend(row.entries);
                Row::new(row.key, row.fields, entries)
            }),
            Ordering::Equal => left.next().zip(right.next()).map(|(mut l, r)| {
                l.entries.extend(r.entries);
                l
            }),
        };
        out.extend(row);
    }
    out
}

/// Half-open key ranges covering the whole key space, in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRangePlan {
    ranges: Vec<KeyRange>,
}

impl KeyRangePlan {
    /// Plan at most `target` ranges from the first keys of the inputs'
    /// partitions.
    ///
    /// Boundaries are taken only where some input already starts a
    /// partition, so fewer ranges than `target` may result. A partition
    /// without bounds contributes the start of its reported key range, or
    /// nothing when neither is known.
    pub fn from_inputs(inputs: &[DatasetRef], target: usize) -> Self {
        let mut starts: Vec<RowKey> = Vec::new();
        let mut open_start = false;
        for input in inputs {
            for index in 0..input.num_partitions() {
                if let Some(bounds) = input.partition_bounds(index) {
                    starts.push(bounds.first);
                } else if let Some(range) = input.partition_range(index) {
                    match range.start {
                        Some(start) => starts.push(start),
                        None => open_start = true,
                    }
                }
            }
        }
        starts.sort();
        starts.dedup();
        // The smallest start opens the first range and is not a boundary,
        // unless some partition already reaches below every known start.
        let candidates = if open_start {
            &starts[..]
        } else {
            starts.get(1..).unwrap_or_default()
        };
        let wanted = target.max(1) - 1;
        let boundaries: Vec<RowKey> = if candidates.len() <= wanted {
            candidates.to_vec()
        } else {
            (1..=wanted)
                .map(|j| candidates[j * candidates.len() / (wanted + 1)].clone())
                .collect()
        };
        Self::from_boundaries(boundaries)
    }

    /// Build ranges from strictly increasing boundary keys.
    pub fn from_boundaries(boundaries: Vec<RowKey>) -> Self {
        let mut ranges = Vec::with_capacity(boundaries.len() + 1);
        let mut start = None;
        for boundary in boundaries {
            ranges.push(KeyRange::new(start, Some(boundary.clone())));
            start = Some(boundary);
        }
        ranges.push(KeyRange::new(start, None));
        Self { ranges }
    }

    pub fn ranges(&self) -> &[KeyRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Lazy column-axis union of aligned datasets.
#[derive(Debug, Clone)]
pub struct MergedDataset {
    label: String,
    schema: Schema,
    columns: Vec<String>,
    column_sources: Vec<String>,
    inputs: Vec<DatasetRef>,
    plan: KeyRangePlan,
}

impl MergedDataset {
    /// Input label each output column came from, in column order.
    pub fn column_sources(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .zip(&self.column_sources)
            .map(|(column, label)| (column.as_str(), label.as_str()))
    }

    pub fn column_source(&self, column: &str) -> Option<&str> {
        self.column_sources()
            .find(|(name, _)| *name == column)
            .map(|(_, label)| label)
    }

    pub fn plan(&self) -> &KeyRangePlan {
        &self.plan
    }

    pub fn inputs(&self) -> &[DatasetRef] {
        &self.inputs
    }
}

impl Dataset for MergedDataset {
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
        self.plan.len()
    }

    fn partition_bounds(&self, _index: usize) -> Option<KeyBounds> {
        None
    }

    fn partition_range(&self, index: usize) -> Option<KeyRange> {
        self.plan.ranges().get(index).cloned()
    }

    fn read_partition(&self, index: usize) -> gmx_model::Result<Partition> {
        let range = self
            .plan
            .ranges()
            .get(index)
            .ok_or_else(|| partition_out_of_range(self, index))?;
        let entry_fields = self.schema.entry_fields.len();
        let mut acc: Vec<Row> = Vec::new();
        let mut acc_columns = 0;
        for (position, input) in self.inputs.iter().enumerate() {
            let rows = Partition::new(input.rows_in_range(range)?);
            rows.check_order(input.label())?;
            let columns = input.num_columns();
            acc = if position == 0 {
                rows.rows
            } else {
                outer_join_cols(acc, acc_columns, rows.rows, columns, entry_fields)
            };
            acc_columns += columns;
        }
        debug!(label = %self.label, index, range = %range, rows = acc.len(), "merged partition");
        Ok(Partition::new(acc))
    }
}

/// Union `inputs` along the column axis, joining on the shared row key.
///
/// Inputs must already be aligned (identical schemas) and have pairwise
/// disjoint columns; they are in priority order, which decides whose row
/// fields win for shared keys.
pub fn union_cols(
    inputs: Vec<DatasetRef>,
    options: &MergeOptions,
    ctx: &ExecutionContext,
) -> Result<MergedDataset> {
    let Some(first) = inputs.first() else {
        return Err(MergeError::EmptyInput);
    };
    let target = options.partitions.unwrap_or(ctx.default_partitions());
    if target == 0 {
        return Err(MergeError::InvalidPartitionCount);
    }
    let span = info_span!("merge", label = %options.label, inputs = inputs.len());
    let _guard = span.enter();

    let schema = first.schema().clone();
    schema.validate()?;
    for input in &inputs[1..] {
        let other = input.schema();
        let differing = [
            (FieldGroup::RowKey, schema.row_key != other.row_key),
            (FieldGroup::Row, schema.row_fields != other.row_fields),
            (FieldGroup::Entry, schema.entry_fields != other.entry_fields),
        ]
        .into_iter()
        .find_map(|(group, differs)| differs.then_some(group));
        if let Some(group) = differing {
            return Err(MergeError::SchemaMismatch {
                first_label: first.label().to_string(),
                label: input.label().to_string(),
                group,
            });
        }
    }

    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
    let mut columns = Vec::new();
    let mut column_sources = Vec::new();
    for input in &inputs {
        for column in input.columns() {
            if let Some(owner) = owners.insert(column.as_str(), input.label()) {
                return Err(MergeError::KeyCollision {
                    column: column.clone(),
                    first_label: owner.to_string(),
                    label: input.label().to_string(),
                });
            }
            columns.push(column.clone());
            column_sources.push(input.label().to_string());
        }
    }
    ctx.check_cancelled()?;

    let plan = KeyRangePlan::from_inputs(&inputs, target);
    info!(
        columns = columns.len(),
        requested = target,
        partitions = plan.len(),
        "planned merge"
    );
    Ok(MergedDataset {
        label: options.label.clone(),
        schema,
        columns,
        column_sources,
        inputs,
        plan,
    })
}
