//! Conversion between partitions and polars frames.
//!
//! A partition becomes two frames: one row per dataset row holding the row
//! key and row fields, and one row per (row, column) cell holding the entry
//! fields in row-major order. Primitive types use native dtypes and missing
//! values are nulls. Loci and calls are stored as their text form
//! (`chr1:100`, `0|1`); arrays and sets as JSON.

use std::io::Cursor;
use std::path::Path;

use gmx_model::{Call, Field, FieldType, Locus, Partition, Row, RowKey, Schema, Value};
use polars::prelude::{
    Column, DataFrame, NamedFrom, ParquetReader, ParquetWriter, PolarsError, SerReader, Series,
};

use crate::error::{Result, StoreError};

pub(crate) fn rows_frame(schema: &Schema, partition: &Partition, path: &Path) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(schema.row_key.len() + schema.row_fields.len());
    for (index, field) in schema.row_key.iter().enumerate() {
        let values = partition.rows.iter().map(|row| &row.key.values()[index]);
        columns.push(encode_column(field, values, path)?);
    }
    for (index, field) in schema.row_fields.iter().enumerate() {
        let values = partition.rows.iter().map(|row| &row.fields[index]);
        columns.push(encode_column(field, values, path)?);
    }
    DataFrame::new(columns).map_err(|source| StoreError::parquet(path, source))
}

pub(crate) fn entries_frame(
    schema: &Schema,
    partition: &Partition,
    path: &Path,
) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(schema.entry_fields.len());
    for (index, field) in schema.entry_fields.iter().enumerate() {
        let values = partition
            .rows
            .iter()
            .flat_map(|row| row.entries.iter().map(move |entry| &entry[index]));
        columns.push(encode_column(field, values, path)?);
    }
    DataFrame::new(columns).map_err(|source| StoreError::parquet(path, source))
}

/// Rebuild a partition from its frames; `entries` is `None` when the
/// dataset stores no entry values.
pub(crate) fn decode_partition(
    schema: &Schema,
    column_count: usize,
    rows: &DataFrame,
    entries: Option<&DataFrame>,
    path: &Path,
) -> Result<Partition> {
    let height = rows.height();
    let keys = decode_fields(&schema.row_key, rows, path)?;
    let fields = decode_fields(&schema.row_fields, rows, path)?;
    let cells = match entries {
        Some(frame) => {
            let expected = height * column_count;
            if frame.height() != expected {
                return Err(StoreError::RowCount {
                    path: path.to_path_buf(),
                    expected,
                    found: frame.height(),
                });
            }
            decode_fields(&schema.entry_fields, frame, path)?
        }
        None => Vec::new(),
    };

    let mut out = Vec::with_capacity(height);
    for row in 0..height {
        let key = RowKey::new(keys.iter().map(|column| column[row].clone()).collect());
        let values = fields.iter().map(|column| column[row].clone()).collect();
        let entries = (0..column_count)
            .map(|column| {
                let cell = row * column_count + column;
                (0..schema.entry_fields.len())
                    .map(|field| cells[field][cell].clone())
                    .collect()
            })
            .collect();
        out.push(Row::new(key, values, entries));
    }
    Ok(Partition::new(out))
}

fn decode_fields(fields: &[Field], frame: &DataFrame, path: &Path) -> Result<Vec<Vec<Value>>> {
    fields
        .iter()
        .map(|field| {
            let column = frame
                .column(&field.name)
                .map_err(|source| StoreError::parquet(path, source))?;
            decode_column(field, column, path)
        })
        .collect()
}

fn encode_column<'a>(
    field: &Field,
    values: impl Iterator<Item = &'a Value>,
    path: &Path,
) -> Result<Column> {
    let name = field.name.as_str();
    let mismatch = |value: &Value| {
        StoreError::decode(
            path,
            name,
            format!("value {value} does not match declared type {}", field.field_type),
        )
    };
    let series = match &field.field_type {
        FieldType::Bool => Series::new(
            name.into(),
            collect(values, |value| match value {
                Value::Bool(v) => Some(*v),
                _ => None,
            })
            .map_err(mismatch)?,
        ),
        FieldType::Int32 => Series::new(
            name.into(),
            collect(values, |value| match value {
                Value::Int32(v) => Some(*v),
                _ => None,
            })
            .map_err(mismatch)?,
        ),
        FieldType::Int64 => Series::new(
            name.into(),
            collect(values, |value| match value {
                Value::Int64(v) => Some(*v),
                _ => None,
            })
            .map_err(mismatch)?,
        ),
        FieldType::Float64 => Series::new(
            name.into(),
            collect(values, |value| match value {
                Value::Float64(v) => Some(*v),
                _ => None,
            })
            .map_err(mismatch)?,
        ),
        FieldType::Str => Series::new(
            name.into(),
            collect(values, |value| match value {
                Value::Str(v) => Some(v.clone()),
                _ => None,
            })
            .map_err(mismatch)?,
        ),
        FieldType::Locus => Series::new(
            name.into(),
            collect(values, |value| match value {
                Value::Locus(v) => Some(v.to_string()),
                _ => None,
            })
            .map_err(mismatch)?,
        ),
        FieldType::Call => Series::new(
            name.into(),
            collect(values, |value| match value {
                Value::Call(v) => Some(v.to_string()),
                _ => None,
            })
            .map_err(mismatch)?,
        ),
        FieldType::Array(_) | FieldType::Set(_) => {
            let mut out = Vec::new();
            for value in values {
                if value.is_missing() {
                    out.push(None);
                    continue;
                }
                if !value.conforms_to(&field.field_type) {
                    return Err(mismatch(value));
                }
                let json = serde_json::to_string(value)
                    .map_err(|error| StoreError::decode(path, name, error.to_string()))?;
                out.push(Some(json));
            }
            Series::new(name.into(), out)
        }
    };
    Ok(series.into())
}

/// Collect non-missing values through `extract`; the first value it rejects
/// is returned as the error.
fn collect<'a, T>(
    values: impl Iterator<Item = &'a Value>,
    extract: impl Fn(&Value) -> Option<T>,
) -> std::result::Result<Vec<Option<T>>, &'a Value> {
    values
        .map(|value| {
            if value.is_missing() {
                Ok(None)
            } else {
                extract(value).map(Some).ok_or(value)
            }
        })
        .collect()
}

fn decode_column(field: &Field, column: &Column, path: &Path) -> Result<Vec<Value>> {
    let name = field.name.as_str();
    let series = column.as_materialized_series();
    let dtype_error =
        |source: PolarsError| StoreError::decode(path, name, source.to_string());
    let values = match &field.field_type {
        FieldType::Bool => series
            .bool()
            .map_err(dtype_error)?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::Bool))
            .collect(),
        FieldType::Int32 => series
            .i32()
            .map_err(dtype_error)?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::Int32))
            .collect(),
        FieldType::Int64 => series
            .i64()
            .map_err(dtype_error)?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::Int64))
            .collect(),
        FieldType::Float64 => series
            .f64()
            .map_err(dtype_error)?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::Float64))
            .collect(),
        FieldType::Str => series
            .str()
            .map_err(dtype_error)?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::str))
            .collect(),
        field_type => {
            let texts = series.str().map_err(dtype_error)?;
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                let value = match text {
                    None => Value::Missing,
                    Some(text) => parse_text(field_type, text)
                        .map_err(|message| StoreError::decode(path, name, message))?,
                };
                out.push(value);
            }
            out
        }
    };
    Ok(values)
}

fn parse_text(field_type: &FieldType, text: &str) -> std::result::Result<Value, String> {
    let value = match field_type {
        FieldType::Locus => Value::Locus(text.parse::<Locus>().map_err(|e| e.to_string())?),
        FieldType::Call => Value::Call(text.parse::<Call>().map_err(|e| e.to_string())?),
        _ => serde_json::from_str::<Value>(text).map_err(|e| e.to_string())?,
    };
    if value.conforms_to(field_type) {
        Ok(value)
    } else {
        Err(format!("value {value} does not match declared type {field_type}"))
    }
}

pub(crate) fn write_parquet(frame: &mut DataFrame, path: &Path) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    ParquetWriter::new(&mut buffer)
        .finish(frame)
        .map_err(|source| StoreError::parquet(path, source))?;
    Ok(buffer)
}

pub(crate) fn read_parquet(bytes: Vec<u8>, path: &Path) -> Result<DataFrame> {
    ParquetReader::new(Cursor::new(bytes))
        .finish()
        .map_err(|source| StoreError::parquet(path, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::builder()
            .key("locus", FieldType::Locus)
            .key("alleles", FieldType::array(FieldType::Str))
            .row("AF", FieldType::Float64)
            .entry("GT", FieldType::Call)
            .entry("AD", FieldType::array(FieldType::Int32))
            .build()
            .unwrap()
    }

    fn partition() -> Partition {
        let alleles = Value::array([Value::str("A"), Value::str("C")]);
        Partition::new(vec![
            Row::new(
                RowKey::new(vec![Value::locus("chrX", 5), alleles.clone()]),
                vec![Value::Float64(0.25)],
                vec![
                    vec![
                        Value::Call(Call::phased([0u16, 1])),
                        Value::array([Value::Int32(3), Value::Int32(4)]),
                    ],
                    vec![Value::Missing, Value::Missing],
                ],
            ),
            Row::new(
                RowKey::new(vec![Value::locus("chrY", 9), alleles]),
                vec![Value::Missing],
                vec![
                    vec![Value::call(&[1, 1]), Value::Missing],
                    vec![Value::call(&[0, 0]), Value::array([Value::Int32(7)])],
                ],
            ),
        ])
    }

    #[test]
    fn frames_decode_back_to_the_partition() {
        let path = Path::new("memory");
        let schema = schema();
        let partition = partition();
        let rows = rows_frame(&schema, &partition, path).unwrap();
        let entries = entries_frame(&schema, &partition, path).unwrap();
        assert_eq!(rows.height(), 2);
        assert_eq!(entries.height(), 4);

        let decoded = decode_partition(&schema, 2, &rows, Some(&entries), path).unwrap();
        assert_eq!(decoded, partition);
    }

    #[test]
    fn mistyped_values_are_rejected() {
        let field = Field::new("DP", FieldType::Int32);
        let values = [Value::Int32(1), Value::str("two")];
        let result = encode_column(&field, values.iter(), Path::new("memory"));
        assert!(matches!(result, Err(StoreError::Decode { column, .. }) if column == "DP"));
    }
}
