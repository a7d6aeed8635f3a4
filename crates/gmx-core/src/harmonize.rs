//! End-to-end harmonization: dedup, align rows, align entries, merge.

use std::sync::Arc;

use gmx_model::{Dataset, DatasetRef, Field};
use tracing::{info, info_span};

use crate::align::{AlignmentMode, align_entry_fields, align_row_fields};
use crate::context::ExecutionContext;
use crate::dedup::{DropReport, drop_duplicate_columns};
use crate::error::{MergeError, Result};
use crate::merge::{MergeOptions, MergedDataset, union_cols};

/// Result of [`harmonize_and_union`].
#[derive(Debug, Clone)]
pub struct HarmonizeOutcome {
    pub combined: MergedDataset,
    pub drop_report: DropReport,
    pub row_fields: Vec<Field>,
    pub entry_fields: Vec<Field>,
}

/// Label inputs `input1..inputN` in the order given.
pub fn label_inputs(datasets: Vec<DatasetRef>) -> Vec<(String, DatasetRef)> {
    datasets
        .into_iter()
        .enumerate()
        .map(|(index, dataset)| (format!("input{}", index + 1), dataset))
        .collect()
}

/// Combine `inputs` (highest priority first) into one dataset.
///
/// Columns already claimed by a higher-priority input are dropped, row and
/// entry fields are aligned under `mode`, and the aligned datasets are
/// unioned along the column axis.
pub fn harmonize_and_union(
    inputs: Vec<(String, DatasetRef)>,
    mode: AlignmentMode,
    options: &MergeOptions,
    ctx: &ExecutionContext,
) -> Result<HarmonizeOutcome> {
    if inputs.is_empty() {
        return Err(MergeError::EmptyInput);
    }
    let span = info_span!("harmonize", inputs = inputs.len(), mode = %mode);
    let _guard = span.enter();

    let (deduplicated, drop_report) = drop_duplicate_columns(inputs)?;
    info!(
        datasets = drop_report.len(),
        samples = drop_report.total_dropped(),
        "removed duplicate samples"
    );
    ctx.check_cancelled()?;

    let (row_aligned, row_fields) = align_row_fields(deduplicated, mode)?;
    let (aligned, entry_fields) = align_entry_fields(row_aligned, mode)?;
    info!(
        row_fields = row_fields.len(),
        entry_fields = entry_fields.len(),
        "aligned schemas"
    );
    ctx.check_cancelled()?;

    let shared: Vec<DatasetRef> = aligned
        .into_iter()
        .map(|dataset| Arc::new(dataset) as DatasetRef)
        .collect();
    let combined = union_cols(shared, options, ctx)?;
    info!(
        columns = combined.num_columns(),
        partitions = combined.num_partitions(),
        "combined datasets"
    );
    Ok(HarmonizeOutcome {
        combined,
        drop_report,
        row_fields,
        entry_fields,
    })
}
