//! Subcommand implementations.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use gmx_core::{
    AlignmentMode, ExecutionContext, MergeError, MergeOptions, harmonize_and_union, label_inputs,
    repartition,
};
use gmx_model::{Dataset, DatasetRef};
use gmx_store::{DiskDataset, WriteOptions, read_dataset, write_dataset};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, info_span};

use crate::cli::{DescribeArgs, MergeArgs, ModeArg, RepartitionArgs};
use crate::report::write_drop_report;
use crate::types::{InputSummary, MergeResult, RepartitionResult};

/// A stored dataset and, when requested, the row count found by reading it.
#[derive(Debug)]
pub struct DescribeResult {
    pub dataset: DiskDataset,
    pub verified_rows: Option<usize>,
}

pub fn run_merge(args: &MergeArgs, ctx: &ExecutionContext) -> Result<MergeResult> {
    let span = info_span!("merge_command", inputs = args.inputs.len());
    let _guard = span.enter();

    let mut opened: Vec<DatasetRef> = Vec::with_capacity(args.inputs.len());
    let mut inputs = Vec::with_capacity(args.inputs.len());
    for (index, path) in args.inputs.iter().enumerate() {
        let dataset = read_dataset(path)
            .with_context(|| format!("open input {}", path.display()))?
            .with_label(format!("input{}", index + 1));
        inputs.push(InputSummary {
            label: dataset.label().to_string(),
            path: path.clone(),
            columns: dataset.num_columns(),
            rows: dataset.metadata().total_rows(),
            dropped: 0,
        });
        opened.push(Arc::new(dataset));
    }

    let mode = alignment_mode(args.mode);
    let options = MergeOptions {
        partitions: args.partitions,
        ..MergeOptions::default()
    };
    let outcome = harmonize_and_union(label_inputs(opened), mode, &options, ctx)?;
    for input in &mut inputs {
        input.dropped = outcome.drop_report.get(&input.label).map_or(0, <[String]>::len);
    }

    let total = outcome.combined.num_partitions();
    let progress = progress_bar(total, "writing merged dataset");
    let write_options = WriteOptions::default()
        .with_overwrite(!args.no_overwrite)
        .with_progress({
            let progress = progress.clone();
            move |done, _| progress.set_position(done as u64)
        });
    let written = write_dataset(&outcome.combined, &args.output, &write_options, ctx);
    progress.finish_and_clear();
    let metadata =
        written.with_context(|| format!("write merged dataset to {}", args.output.display()))?;

    if let Some(path) = &args.drop_report {
        write_drop_report(&outcome.drop_report, path)?;
        info!(path = %path.display(), samples = outcome.drop_report.total_dropped(), "wrote drop report");
    }

    Ok(MergeResult {
        output: args.output.clone(),
        mode,
        inputs,
        drop_report: outcome.drop_report,
        row_fields: outcome.row_fields.into_iter().map(|f| f.name).collect(),
        entry_fields: outcome.entry_fields.into_iter().map(|f| f.name).collect(),
        columns: metadata.columns.len(),
        rows: metadata.total_rows(),
        partitions: metadata.partitions.len(),
        drop_report_path: args.drop_report.clone(),
    })
}

pub fn run_repartition(args: &RepartitionArgs, ctx: &ExecutionContext) -> Result<RepartitionResult> {
    let span = info_span!("repartition_command", partitions = args.partitions);
    let _guard = span.enter();

    let source = read_dataset(&args.input)
        .with_context(|| format!("open input {}", args.input.display()))?;
    let source_partitions = source.num_partitions();
    let shuffle = !args.no_shuffle;
    let view = repartition(Arc::new(source), args.partitions, shuffle, ctx)?;

    let progress = progress_bar(view.num_partitions(), "writing partitions");
    let write_options = WriteOptions::default()
        .with_overwrite(!args.no_overwrite)
        .with_progress({
            let progress = progress.clone();
            move |done, _| progress.set_position(done as u64)
        });
    let written = write_dataset(&view, &args.output, &write_options, ctx);
    progress.finish_and_clear();
    let metadata = written.with_context(|| format!("write {}", args.output.display()))?;

    let sizes = metadata.partitions.iter().map(|p| p.rows);
    Ok(RepartitionResult {
        input: args.input.clone(),
        output: args.output.clone(),
        shuffle,
        source_partitions,
        partitions: metadata.partitions.len(),
        rows: metadata.total_rows(),
        smallest: sizes.clone().min().unwrap_or(0),
        largest: sizes.max().unwrap_or(0),
    })
}

pub fn run_describe(args: &DescribeArgs, ctx: &ExecutionContext) -> Result<DescribeResult> {
    let dataset =
        read_dataset(&args.path).with_context(|| format!("open {}", args.path.display()))?;
    let verified_rows = if args.verify {
        Some(verify(&dataset, ctx)?)
    } else {
        None
    };
    Ok(DescribeResult {
        dataset,
        verified_rows,
    })
}

/// Read every partition, checking digests, decoding and key order.
fn verify(dataset: &DiskDataset, ctx: &ExecutionContext) -> Result<usize> {
    let progress = progress_bar(dataset.num_partitions(), "verifying partitions");
    let lengths = ctx.map_partitions(dataset.num_partitions(), |index| {
        let partition = dataset.read_partition(index).map_err(MergeError::from)?;
        progress.inc(1);
        Ok::<_, MergeError>(partition.len())
    });
    progress.finish_and_clear();
    let rows = lengths
        .with_context(|| format!("verify {}", dataset.root().display()))?
        .into_iter()
        .sum::<usize>();
    info!(path = %dataset.root().display(), rows, "verified dataset");
    Ok(rows)
}

fn alignment_mode(mode: ModeArg) -> AlignmentMode {
    match mode {
        ModeArg::Intersection => AlignmentMode::Intersection,
        ModeArg::Union => AlignmentMode::Union,
    }
}

fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    if !io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.set_message(message);
    bar
}
