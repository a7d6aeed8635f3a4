//! Tests for priority-ordered sample deduplication.

use std::sync::Arc;

use gmx_core::{DropReport, MergeError, drop_duplicate_columns};
use gmx_model::{Dataset, DatasetRef, FieldType, MemoryDataset, Row, RowKey, Schema, Value};

fn schema() -> Schema {
    Schema::builder()
        .key("locus", FieldType::Locus)
        .entry("DP", FieldType::Int32)
        .build()
        .unwrap()
}

fn dataset(label: &str, columns: &[&str], positions: &[u32]) -> DatasetRef {
    let rows = positions
        .iter()
        .map(|position| {
            Row::new(
                RowKey::new(vec![Value::locus("chr1", *position)]),
                vec![],
                columns
                    .iter()
                    .map(|_| vec![Value::Int32(*position as i32)])
                    .collect(),
            )
        })
        .collect();
    let columns = columns.iter().map(ToString::to_string).collect();
    Arc::new(MemoryDataset::new(label, schema(), columns, rows).unwrap())
}

fn labelled(datasets: Vec<DatasetRef>) -> Vec<(String, DatasetRef)> {
    datasets
        .into_iter()
        .map(|dataset| (dataset.label().to_string(), dataset))
        .collect()
}

#[test]
fn later_datasets_lose_columns_seen_earlier() {
    let inputs = labelled(vec![
        dataset("input1", &["s1", "s2"], &[100]),
        dataset("input2", &["s2", "s3"], &[200]),
        dataset("input3", &["s3", "s1", "s4"], &[300]),
    ]);
    let (deduplicated, report) = drop_duplicate_columns(inputs).unwrap();

    let columns: Vec<&[String]> = deduplicated.iter().map(|d| d.columns()).collect();
    assert_eq!(columns[0], ["s1", "s2"]);
    assert_eq!(columns[1], ["s3"]);
    assert_eq!(columns[2], ["s4"]);
    assert_eq!(report.get("input2"), Some(&["s2".to_string()][..]));
    assert_eq!(
        report.get("input3"),
        Some(&["s1".to_string(), "s3".to_string()][..])
    );
    assert!(report.get("input1").is_none());
    assert_eq!(report.total_dropped(), 3);
}

#[test]
fn surviving_entries_follow_their_columns() {
    let inputs = labelled(vec![
        dataset("input1", &["s1"], &[100]),
        dataset("input2", &["s1", "s2"], &[200]),
    ]);
    let (deduplicated, _) = drop_duplicate_columns(inputs).unwrap();
    let partition = deduplicated[1].read_partition(0).unwrap();
    assert_eq!(partition.rows[0].entries, vec![vec![Value::Int32(200)]]);
}

#[test]
fn fully_duplicated_dataset_stays_in_sequence() {
    let inputs = labelled(vec![
        dataset("input1", &["s1", "s2"], &[100]),
        dataset("input2", &["s2", "s1"], &[100, 200]),
    ]);
    let (deduplicated, report) = drop_duplicate_columns(inputs).unwrap();
    assert_eq!(deduplicated.len(), 2);
    assert!(deduplicated[1].columns().is_empty());
    assert_eq!(deduplicated[1].count_rows().unwrap(), 2);
    assert_eq!(report.total_dropped(), 2);
}

#[test]
fn duplicate_labels_are_rejected() {
    let inputs = labelled(vec![
        dataset("input1", &["s1"], &[100]),
        dataset("input1", &["s2"], &[100]),
    ]);
    let result = drop_duplicate_columns(inputs);
    assert!(matches!(result, Err(MergeError::DuplicateLabel { label }) if label == "input1"));
}

#[test]
fn drop_report_serializes_as_label_map() {
    let inputs = labelled(vec![
        dataset("input1", &["s1", "s2"], &[100]),
        dataset("input2", &["s2", "s3"], &[200]),
    ]);
    let (_, report) = drop_duplicate_columns(inputs).unwrap();
    insta::assert_json_snapshot!(report, @r#"
    {
      "input2": [
        "s2"
      ]
    }
    "#);

    let json = serde_json::to_string(&report).unwrap();
    let parsed: DropReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, report);
}
