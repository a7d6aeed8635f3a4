//! Tests for row-field and entry-field alignment.

use std::sync::Arc;

use gmx_core::{
    AlignmentMode, FieldSource, MergeError, ProjectedDataset, align_entry_fields,
    align_row_fields, plan_alignment,
};
use gmx_model::{
    Dataset, Field, FieldGroup, FieldType, MemoryDataset, Row, RowKey, Schema, SchemaBuilder,
    Value,
};

fn base() -> SchemaBuilder {
    Schema::builder()
        .key("locus", FieldType::Locus)
        .key("alleles", FieldType::array(FieldType::Str))
}

fn key(position: u32) -> RowKey {
    RowKey::new(vec![
        Value::locus("chr1", position),
        Value::array(["A".into(), "G".into()]),
    ])
}

/// A single row at position 100 with a single column.
fn projected(label: &str, schema: Schema, fields: Vec<Value>, entry: Vec<Value>) -> ProjectedDataset {
    let row = Row::new(key(100), fields, vec![entry]);
    let dataset = MemoryDataset::new(label, schema, vec![format!("{label}-s1")], vec![row]).unwrap();
    ProjectedDataset::identity(label, Arc::new(dataset))
}

fn names(fields: &[Field]) -> Vec<&str> {
    fields.iter().map(|field| field.name.as_str()).collect()
}

fn first_and_second() -> Vec<ProjectedDataset> {
    let a = projected(
        "input1",
        base()
            .row("rsid", FieldType::Str)
            .row("AC", FieldType::Int32)
            .entry("GT", FieldType::Call)
            .entry("DP", FieldType::Int32)
            .build()
            .unwrap(),
        vec![Value::str("rs1"), Value::Int32(2)],
        vec![Value::call(&[0, 1]), Value::Int32(12)],
    );
    let b = projected(
        "input2",
        base()
            .row("AF", FieldType::Float64)
            .row("rsid", FieldType::Str)
            .entry("GQ", FieldType::Int32)
            .entry("GT", FieldType::Call)
            .build()
            .unwrap(),
        vec![Value::Float64(0.5), Value::str("rs2")],
        vec![Value::Int32(99), Value::call(&[1, 1])],
    );
    vec![a, b]
}

#[test]
fn intersection_keeps_shared_fields_in_first_dataset_order() {
    let (aligned, row_fields) =
        align_row_fields(first_and_second(), AlignmentMode::Intersection).unwrap();
    assert_eq!(names(&row_fields), ["rsid"]);
    let (aligned, entry_fields) = align_entry_fields(aligned, AlignmentMode::Intersection).unwrap();
    assert_eq!(names(&entry_fields), ["GT"]);

    let second = aligned[1].read_partition(0).unwrap();
    assert_eq!(second.rows[0].fields, vec![Value::str("rs2")]);
    assert_eq!(second.rows[0].entries, vec![vec![Value::call(&[1, 1])]]);
    assert_eq!(aligned[0].schema(), aligned[1].schema());
}

#[test]
fn union_fills_absent_fields_with_missing() {
    let (aligned, row_fields) = align_row_fields(first_and_second(), AlignmentMode::Union).unwrap();
    assert_eq!(names(&row_fields), ["rsid", "AC", "AF"]);
    let (aligned, entry_fields) = align_entry_fields(aligned, AlignmentMode::Union).unwrap();
    assert_eq!(names(&entry_fields), ["GT", "DP", "GQ"]);
    assert_eq!(entry_fields[2].field_type, FieldType::Int32);

    let first = aligned[0].read_partition(0).unwrap();
    assert_eq!(
        first.rows[0].fields,
        vec![Value::str("rs1"), Value::Int32(2), Value::Missing]
    );
    assert_eq!(
        first.rows[0].entries[0],
        vec![Value::call(&[0, 1]), Value::Int32(12), Value::Missing]
    );
    let second = aligned[1].read_partition(0).unwrap();
    assert_eq!(
        second.rows[0].fields,
        vec![Value::str("rs2"), Value::Missing, Value::Float64(0.5)]
    );
    assert_eq!(
        second.rows[0].entries[0],
        vec![Value::call(&[1, 1]), Value::Missing, Value::Int32(99)]
    );
}

#[test]
fn plan_records_selects_and_fills() {
    let plan = plan_alignment(&first_and_second(), FieldGroup::Row, AlignmentMode::Union).unwrap();
    assert_eq!(
        plan.sources[1],
        vec![
            FieldSource::Select(1),
            FieldSource::Fill(FieldType::Int32),
            FieldSource::Select(0)
        ]
    );
    assert_eq!(plan.fill_count(), 2);
}

#[test]
fn conflicting_types_are_reported() {
    let a = projected(
        "input1",
        base().entry("DP", FieldType::Int32).build().unwrap(),
        vec![],
        vec![Value::Int32(1)],
    );
    let b = projected(
        "input2",
        base().entry("DP", FieldType::Float64).build().unwrap(),
        vec![],
        vec![Value::Float64(1.0)],
    );
    for mode in [AlignmentMode::Intersection, AlignmentMode::Union] {
        let result = align_entry_fields(vec![a.clone(), b.clone()], mode);
        assert!(matches!(
            result,
            Err(MergeError::SchemaConflict { ref field, ref first_label, ref label, .. })
                if field == "DP" && first_label == "input1" && label == "input2"
        ));
    }
}

#[test]
fn union_rejects_name_used_as_row_and_entry_field() {
    let a = projected(
        "input1",
        base().row("DP", FieldType::Int32).build().unwrap(),
        vec![Value::Int32(7)],
        vec![],
    );
    let b = projected(
        "input2",
        base().entry("DP", FieldType::Int32).build().unwrap(),
        vec![],
        vec![Value::Int32(3)],
    );

    let result = align_row_fields(vec![a.clone(), b.clone()], AlignmentMode::Union);
    match result {
        Err(MergeError::SchemaConflict {
            ref field,
            first_group,
            ref first_label,
            group,
            ref label,
            ..
        }) => {
            assert_eq!(field, "DP");
            assert_eq!((first_group, first_label.as_str()), (FieldGroup::Row, "input1"));
            assert_eq!((group, label.as_str()), (FieldGroup::Entry, "input2"));
        }
        other => panic!("expected a schema conflict, got {other:?}"),
    }
    let message = align_entry_fields(vec![a.clone(), b.clone()], AlignmentMode::Union)
        .unwrap_err()
        .to_string();
    assert!(message.contains("'input2' declares entry int32"), "{message}");
    assert!(message.contains("'input1' declares row int32"), "{message}");

    let (aligned, row_fields) =
        align_row_fields(vec![a, b], AlignmentMode::Intersection).unwrap();
    assert!(row_fields.is_empty());
    let (_, entry_fields) = align_entry_fields(aligned, AlignmentMode::Intersection).unwrap();
    assert!(entry_fields.is_empty());
}

#[test]
fn differing_row_keys_are_rejected() {
    let a = projected("input1", base().build().unwrap(), vec![], vec![]);
    let other = Schema::builder()
        .key("locus", FieldType::Locus)
        .build()
        .unwrap();
    let row = Row::new(RowKey::new(vec![Value::locus("chr1", 1)]), vec![], vec![vec![]]);
    let b = MemoryDataset::new("input2", other, vec!["x".into()], vec![row]).unwrap();
    let b = ProjectedDataset::identity("input2", Arc::new(b));

    let result = align_row_fields(vec![a, b], AlignmentMode::Union);
    assert!(matches!(result, Err(MergeError::RowKeyMismatch { label, .. }) if label == "input2"));
}

#[test]
fn empty_group_is_rejected() {
    assert!(matches!(
        align_row_fields(Vec::new(), AlignmentMode::Intersection),
        Err(MergeError::EmptyInput)
    ));
}
