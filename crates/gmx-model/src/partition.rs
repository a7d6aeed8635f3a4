use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::key::{KeyBounds, RowKey};
use crate::schema::{Field, FieldGroup, Schema};
use crate::types::Value;

/// One row: its key, row-field values and per-column entry values.
///
/// `entries[column][entry_field]` follows the dataset's column order and
/// the schema's entry-field order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub key: RowKey,
    pub fields: Vec<Value>,
    pub entries: Vec<Vec<Value>>,
}

impl Row {
    pub fn new(key: impl Into<RowKey>, fields: Vec<Value>, entries: Vec<Vec<Value>>) -> Self {
        Self {
            key: key.into(),
            fields,
            entries,
        }
    }

    /// Check the row against a schema and column count.
    pub fn validate(&self, label: &str, schema: &Schema, column_count: usize) -> Result<()> {
        check_values(label, &self.key, FieldGroup::RowKey, &schema.row_key, self.key.values())?;
        check_values(label, &self.key, FieldGroup::Row, &schema.row_fields, &self.fields)?;
        if self.entries.len() != column_count {
            return Err(ModelError::RowShape {
                label: label.to_string(),
                key: self.key.to_string(),
                group: FieldGroup::Entry,
                expected: column_count,
                found: self.entries.len(),
            });
        }
        for entry in &self.entries {
            check_values(label, &self.key, FieldGroup::Entry, &schema.entry_fields, entry)?;
        }
        Ok(())
    }
}

fn check_values(
    label: &str,
    key: &RowKey,
    group: FieldGroup,
    fields: &[Field],
    values: &[Value],
) -> Result<()> {
    if fields.len() != values.len() {
        return Err(ModelError::RowShape {
            label: label.to_string(),
            key: key.to_string(),
            group,
            expected: fields.len(),
            found: values.len(),
        });
    }
    for (field, value) in fields.iter().zip(values) {
        if !value.conforms_to(&field.field_type) {
            return Err(ModelError::TypeMismatch {
                label: label.to_string(),
                key: key.to_string(),
                field: field.name.clone(),
                expected: field.field_type.to_string(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

/// A contiguous, key-ordered slice of a dataset's rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub rows: Vec<Row>,
}

impl Partition {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn bounds(&self) -> Option<KeyBounds> {
        let first = self.rows.first()?;
        let last = self.rows.last()?;
        Some(KeyBounds::new(first.key.clone(), last.key.clone()))
    }

    /// Verify that keys are strictly increasing.
    pub fn check_order(&self, label: &str) -> Result<()> {
        for pair in self.rows.windows(2) {
            let (previous, next) = (&pair[0].key, &pair[1].key);
            if previous == next {
                return Err(ModelError::DuplicateRowKey {
                    label: label.to_string(),
                    key: next.to_string(),
                });
            }
            if previous > next {
                return Err(ModelError::UnorderedRows {
                    label: label.to_string(),
                    previous: previous.to_string(),
                    next: next.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<Row> for Partition {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
