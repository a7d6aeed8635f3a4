use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::types::FieldType;

/// The three field groups of a dataset schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    RowKey,
    Row,
    Entry,
}

impl FieldGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldGroup::RowKey => "row key",
            FieldGroup::Row => "row",
            FieldGroup::Entry => "entry",
        }
    }
}

impl fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.field_type)
    }
}

/// Schema of a dataset: row key, non-key row fields and entry fields.
///
/// Field names are unique across all three groups. Column (sample)
/// identifiers are not part of the schema; they belong to the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub row_key: Vec<Field>,
    pub row_fields: Vec<Field>,
    pub entry_fields: Vec<Field>,
}

impl Schema {
    pub fn new(row_key: Vec<Field>, row_fields: Vec<Field>, entry_fields: Vec<Field>) -> Result<Self> {
        let schema = Self {
            row_key,
            row_fields,
            entry_fields,
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.row_key.is_empty() {
            return Err(ModelError::EmptyRowKey);
        }
        let mut seen = BTreeSet::new();
        for (group, fields) in self.groups() {
            for field in fields {
                if field.name.trim().is_empty() {
                    return Err(ModelError::EmptyFieldName { group });
                }
                if !seen.insert(field.name.as_str()) {
                    return Err(ModelError::DuplicateField {
                        name: field.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Iterate over the field groups in declaration order.
    pub fn groups(&self) -> [(FieldGroup, &[Field]); 3] {
        [
            (FieldGroup::RowKey, self.row_key.as_slice()),
            (FieldGroup::Row, self.row_fields.as_slice()),
            (FieldGroup::Entry, self.entry_fields.as_slice()),
        ]
    }

    pub fn fields(&self, group: FieldGroup) -> &[Field] {
        match group {
            FieldGroup::RowKey => &self.row_key,
            FieldGroup::Row => &self.row_fields,
            FieldGroup::Entry => &self.entry_fields,
        }
    }

    pub fn field_index(&self, group: FieldGroup, name: &str) -> Option<usize> {
        self.fields(group).iter().position(|field| field.name == name)
    }

    pub fn field(&self, group: FieldGroup, name: &str) -> Option<&Field> {
        self.fields(group).iter().find(|field| field.name == name)
    }

    pub fn is_row_key(&self, name: &str) -> bool {
        self.field_index(FieldGroup::RowKey, name).is_some()
    }

    /// Return a copy of this schema with replaced row fields.
    pub fn with_row_fields(&self, row_fields: Vec<Field>) -> Self {
        Self {
            row_key: self.row_key.clone(),
            row_fields,
            entry_fields: self.entry_fields.clone(),
        }
    }

    /// Return a copy of this schema with replaced entry fields.
    pub fn with_entry_fields(&self, entry_fields: Vec<Field>) -> Self {
        Self {
            row_key: self.row_key.clone(),
            row_fields: self.row_fields.clone(),
            entry_fields,
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (group, fields) in self.groups() {
            writeln!(f, "{group} fields:")?;
            if fields.is_empty() {
                writeln!(f, "  (none)")?;
            }
            for field in fields {
                writeln!(f, "  {field}")?;
            }
        }
        Ok(())
    }
}

/// Incremental schema construction.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    row_key: Vec<Field>,
    row_fields: Vec<Field>,
    entry_fields: Vec<Field>,
}

impl SchemaBuilder {
    pub fn key(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.row_key.push(Field::new(name, field_type));
        self
    }

    pub fn row(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.row_fields.push(Field::new(name, field_type));
        self
    }

    pub fn entry(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.entry_fields.push(Field::new(name, field_type));
        self
    }

    pub fn build(self) -> Result<Schema> {
        Schema::new(self.row_key, self.row_fields, self.entry_fields)
    }
}
