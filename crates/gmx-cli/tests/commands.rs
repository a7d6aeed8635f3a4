//! End-to-end tests for the `gmx` subcommands against stored datasets.

use std::fs;
use std::path::{Path, PathBuf};

use gmx_cli::cli::{DescribeArgs, MergeArgs, ModeArg, RepartitionArgs};
use gmx_cli::commands::{run_describe, run_merge, run_repartition};
use gmx_core::{ExecutionConfig, ExecutionContext};
use gmx_model::{Dataset, FieldType, MemoryDataset, Row, RowKey, Schema, Value};
use gmx_store::{WriteOptions, read_dataset, write_dataset};
use tempfile::TempDir;

fn schema(with_quality: bool) -> Schema {
    let mut builder = Schema::builder()
        .key("locus", FieldType::Locus)
        .row("rsid", FieldType::Str);
    if with_quality {
        builder = builder.row("qual", FieldType::Float64);
    }
    builder
        .entry("GT", FieldType::Call)
        .entry("DP", FieldType::Int32)
        .build()
        .unwrap()
}

fn key(position: u32) -> RowKey {
    RowKey::new(vec![Value::locus("chr1", position)])
}

fn store(
    tmp: &TempDir,
    ctx: &ExecutionContext,
    name: &str,
    columns: &[&str],
    positions: &[u32],
    with_quality: bool,
    partitions: usize,
) -> PathBuf {
    let rows = positions
        .iter()
        .map(|&position| {
            let mut fields = vec![Value::str(format!("{name}-{position}"))];
            if with_quality {
                fields.push(Value::Float64(f64::from(position) / 10.0));
            }
            let entries = (0..columns.len())
                .map(|column| vec![Value::call(&[0, 1]), Value::Int32(column as i32)])
                .collect();
            Row::new(key(position), fields, entries)
        })
        .collect();
    let columns = columns.iter().map(ToString::to_string).collect();
    let dataset =
        MemoryDataset::with_partitions(name, schema(with_quality), columns, rows, partitions)
            .unwrap();
    let path = tmp.path().join(format!("{name}.gmx"));
    write_dataset(&dataset, &path, &WriteOptions::default(), ctx).unwrap();
    path
}

fn context(tmp: &TempDir) -> ExecutionContext {
    ExecutionContext::new(
        ExecutionConfig::default()
            .with_threads(2)
            .with_tmp_dir(tmp.path().join("scratch")),
    )
    .unwrap()
}

fn merge_args(inputs: Vec<PathBuf>, output: &Path, mode: ModeArg) -> MergeArgs {
    MergeArgs {
        inputs,
        output: output.to_path_buf(),
        mode,
        partitions: Some(2),
        no_overwrite: false,
        drop_report: None,
    }
}

#[test]
fn merge_drops_duplicates_and_writes_report() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    let first = store(&tmp, &ctx, "a", &["s1", "s2"], &[100, 200], false, 1);
    let second = store(&tmp, &ctx, "b", &["s2", "s3"], &[200, 300], true, 1);
    let output = tmp.path().join("merged.gmx");
    let report = tmp.path().join("reports/dropped.csv");
    let mut args = merge_args(vec![first, second], &output, ModeArg::Union);
    args.drop_report = Some(report.clone());

    let result = run_merge(&args, &ctx).unwrap();
    assert_eq!(result.columns, 3);
    assert_eq!(result.rows, 3);
    assert_eq!(result.row_fields, ["rsid", "qual"]);
    assert_eq!(result.entry_fields, ["GT", "DP"]);
    assert_eq!(result.inputs[0].dropped, 0);
    assert_eq!(result.inputs[1].dropped, 1);
    assert_eq!(
        fs::read_to_string(&report).unwrap(),
        "label,sample\ninput2,s2\n"
    );

    let merged = read_dataset(&output).unwrap();
    assert_eq!(merged.columns(), ["s1", "s2", "s3"]);
    let rows: Vec<Row> = (0..merged.num_partitions())
        .flat_map(|index| merged.read_partition(index).unwrap().rows)
        .collect();
    assert_eq!(rows[0].fields, [Value::str("a-100"), Value::Missing]);
    assert_eq!(rows[1].fields[0], Value::str("a-200"));
    assert_eq!(rows[2].fields[0], Value::str("b-300"));
    assert!(rows[2].entries[0].iter().all(Value::is_missing));
}

#[test]
fn intersection_keeps_shared_fields_only() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    let first = store(&tmp, &ctx, "a", &["s1"], &[100], false, 1);
    let second = store(&tmp, &ctx, "b", &["s2"], &[100], true, 1);
    let output = tmp.path().join("merged.gmx");
    let result = run_merge(
        &merge_args(vec![first, second], &output, ModeArg::Intersection),
        &ctx,
    )
    .unwrap();
    assert_eq!(result.row_fields, ["rsid"]);
    assert_eq!(result.rows, 1);
    assert!(result.drop_report.is_empty());
}

#[test]
fn merge_respects_no_overwrite() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    let input = store(&tmp, &ctx, "a", &["s1"], &[100], false, 1);
    let output = tmp.path().join("merged.gmx");
    fs::create_dir_all(&output).unwrap();
    let mut args = merge_args(vec![input], &output, ModeArg::Intersection);
    args.no_overwrite = true;
    assert!(run_merge(&args, &ctx).is_err());
}

#[test]
fn repartition_balances_or_coalesces() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    let positions: Vec<u32> = (1..=7).map(|i| i * 100).collect();
    let input = store(&tmp, &ctx, "a", &["s1"], &positions, false, 3);

    let balanced = run_repartition(
        &RepartitionArgs {
            input: input.clone(),
            partitions: 2,
            output: tmp.path().join("balanced.gmx"),
            no_shuffle: false,
            no_overwrite: false,
        },
        &ctx,
    )
    .unwrap();
    assert_eq!(balanced.source_partitions, 3);
    assert_eq!(balanced.partitions, 2);
    assert_eq!(balanced.rows, 7);
    assert_eq!((balanced.smallest, balanced.largest), (3, 4));

    let coalesced = run_repartition(
        &RepartitionArgs {
            input,
            partitions: 5,
            output: tmp.path().join("coalesced.gmx"),
            no_shuffle: true,
            no_overwrite: false,
        },
        &ctx,
    )
    .unwrap();
    assert_eq!(coalesced.partitions, 3);
    assert_eq!(coalesced.rows, 7);
}

#[test]
fn describe_verifies_every_partition() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    let input = store(&tmp, &ctx, "a", &["s1", "s2"], &[100, 200, 300], false, 2);
    let described = run_describe(
        &DescribeArgs {
            path: input.clone(),
            verify: true,
        },
        &ctx,
    )
    .unwrap();
    assert_eq!(described.verified_rows, Some(3));
    assert_eq!(described.dataset.metadata().partitions.len(), 2);

    let part = input.join("parts/part-00001.entries.parquet");
    let mut bytes = fs::read(&part).unwrap();
    bytes.push(0);
    fs::write(&part, bytes).unwrap();
    let failed = run_describe(
        &DescribeArgs {
            path: input,
            verify: true,
        },
        &ctx,
    );
    assert!(failed.is_err());
}
