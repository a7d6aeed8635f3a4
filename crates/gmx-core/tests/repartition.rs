//! Tests for repartitioning.

use std::sync::Arc;

use gmx_core::{ExecutionConfig, ExecutionContext, MergeError, repartition};
use gmx_model::{Dataset, DatasetRef, FieldType, MemoryDataset, Row, RowKey, Schema, Value};
use tempfile::TempDir;

fn dataset(rows: u32, partitions: usize) -> DatasetRef {
    let schema = Schema::builder()
        .key("locus", FieldType::Locus)
        .row("AC", FieldType::Int64)
        .entry("DP", FieldType::Int32)
        .build()
        .unwrap();
    let rows = (1..=rows)
        .map(|p| {
            Row::new(
                RowKey::new(vec![Value::locus("chr2", p)]),
                vec![Value::Int64(i64::from(p))],
                vec![vec![Value::Int32(p as i32)]],
            )
        })
        .collect();
    Arc::new(
        MemoryDataset::with_partitions("input1", schema, vec!["s1".into()], rows, partitions)
            .unwrap(),
    )
}

fn context(tmp: &TempDir) -> ExecutionContext {
    ExecutionContext::new(
        ExecutionConfig::default()
            .with_threads(3)
            .with_tmp_dir(tmp.path()),
    )
    .unwrap()
}

fn sizes(dataset: &dyn Dataset) -> Vec<usize> {
    (0..dataset.num_partitions())
        .map(|index| dataset.read_partition(index).unwrap().len())
        .collect()
}

#[test]
fn shuffle_balances_rows_exactly() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    let source = dataset(23, 2);
    let balanced = repartition(Arc::clone(&source), 5, true, &ctx).unwrap();

    assert_eq!(balanced.num_partitions(), 5);
    let sizes = sizes(&balanced);
    assert_eq!(sizes.iter().sum::<usize>(), 23);
    assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    assert_eq!(balanced.partition_len(0), Some(sizes[0]));

    let before = ctx.materialize(source.as_ref()).unwrap();
    let after = ctx.materialize(&balanced).unwrap();
    assert_eq!(
        before.rows().collect::<Vec<_>>(),
        after.rows().collect::<Vec<_>>()
    );
}

#[test]
fn shuffle_can_grow_partition_count() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    let balanced = repartition(dataset(4, 1), 8, true, &ctx).unwrap();
    assert_eq!(balanced.num_partitions(), 8);
    assert_eq!(sizes(&balanced).iter().filter(|len| **len == 0).count(), 4);
    assert_eq!(balanced.count_rows().unwrap(), 4);
}

#[test]
fn coalesce_groups_adjacent_partitions() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    let coalesced = repartition(dataset(12, 6), 4, false, &ctx).unwrap();
    assert_eq!(coalesced.num_partitions(), 4);
    assert_eq!(coalesced.count_rows().unwrap(), 12);
    let bounds = coalesced.partition_bounds(0).unwrap();
    assert_eq!(bounds.first, RowKey::new(vec![Value::locus("chr2", 1)]));
}

#[test]
fn shuffle_reports_bounds_of_every_output_partition() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    let locus = |p: u32| RowKey::new(vec![Value::locus("chr2", p)]);
    let balanced = repartition(dataset(23, 2), 5, true, &ctx).unwrap();

    for index in 0..balanced.num_partitions() {
        let rows = balanced.read_partition(index).unwrap().rows;
        let bounds = balanced.partition_bounds(index).unwrap();
        assert_eq!(bounds.first, rows[0].key);
        assert_eq!(bounds.last, rows[rows.len() - 1].key);
    }
    // Output partition 2 straddles the two source partitions.
    let straddling = balanced.partition_bounds(2).unwrap();
    assert_eq!((straddling.first, straddling.last), (locus(10), locus(13)));

    let sparse = repartition(dataset(2, 1), 4, true, &ctx).unwrap();
    let known: Vec<bool> = (0..4)
        .map(|index| sparse.partition_bounds(index).is_some())
        .collect();
    assert_eq!(known, [false, true, false, true]);
}

#[test]
fn coalesce_never_increases_partitions() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    let coalesced = repartition(dataset(12, 3), 10, false, &ctx).unwrap();
    assert_eq!(coalesced.num_partitions(), 3);
    assert_eq!(sizes(&coalesced), vec![4, 4, 4]);
}

#[test]
fn zero_partitions_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    assert!(matches!(
        repartition(dataset(3, 1), 0, true, &ctx),
        Err(MergeError::InvalidPartitionCount)
    ));
}
