//! Field alignment across a group of datasets.
//!
//! Alignment picks one target field list per field group and projects every
//! dataset onto it: fields a dataset has are passed through, absent ones are
//! filled with a typed missing value.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use gmx_model::{Dataset, Field, FieldGroup, FieldType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MergeError, Result};
use crate::projection::{FieldSource, ProjectedDataset};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    /// Keep fields present in every dataset.
    #[default]
    Intersection,
    /// Keep fields present in any dataset, filling the gaps.
    Union,
}

impl AlignmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlignmentMode::Intersection => "intersection",
            AlignmentMode::Union => "union",
        }
    }
}

impl fmt::Display for AlignmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlignmentMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intersection" | "inner" => Ok(AlignmentMode::Intersection),
            "union" | "outer" => Ok(AlignmentMode::Union),
            other => Err(format!(
                "unknown alignment mode '{other}' (expected 'intersection' or 'union')"
            )),
        }
    }
}

/// Target fields for one group plus, per dataset, where each target comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentPlan {
    pub group: FieldGroup,
    pub targets: Vec<Field>,
    /// `sources[dataset][target]`.
    pub sources: Vec<Vec<FieldSource>>,
}

impl AlignmentPlan {
    /// Number of (dataset, field) pairs that will be filled with missing values.
    pub fn fill_count(&self) -> usize {
        self.sources
            .iter()
            .flatten()
            .filter(|source| matches!(source, FieldSource::Fill(_)))
            .count()
    }
}

/// Compute the alignment of `group` fields for `datasets`.
pub fn plan_alignment<D: Dataset>(
    datasets: &[D],
    group: FieldGroup,
    mode: AlignmentMode,
) -> Result<AlignmentPlan> {
    let Some(first) = datasets.first() else {
        return Err(MergeError::EmptyInput);
    };
    check_row_keys(datasets)?;

    let key_names: BTreeSet<&str> = first
        .schema()
        .row_key
        .iter()
        .map(|field| field.name.as_str())
        .collect();
    let candidates = |dataset: &D| -> Vec<Field> {
        dataset
            .schema()
            .fields(group)
            .iter()
            .filter(|field| !key_names.contains(field.name.as_str()))
            .cloned()
            .collect()
    };

    let names: Vec<String> = match mode {
        AlignmentMode::Intersection => candidates(first)
            .into_iter()
            .map(|field| field.name)
            .filter(|name| {
                datasets[1..]
                    .iter()
                    .all(|dataset| dataset.schema().field(group, name).is_some())
            })
            .collect(),
        AlignmentMode::Union => {
            let mut seen = BTreeSet::new();
            let mut names = Vec::new();
            for dataset in datasets {
                for field in candidates(dataset) {
                    if seen.insert(field.name.clone()) {
                        names.push(field.name);
                    }
                }
            }
            names
        }
    };

    let targets = resolve_types(datasets, group, &names)?;

    let sources = datasets
        .iter()
        .map(|dataset| {
            targets
                .iter()
                .map(|target| match dataset.schema().field_index(group, &target.name) {
                    Some(index) => FieldSource::Select(index),
                    None => {
                        debug!(
                            label = dataset.label(),
                            field = %target.name,
                            group = %group,
                            "field absent, filling with missing values"
                        );
                        FieldSource::Fill(target.field_type.clone())
                    }
                })
                .collect()
        })
        .collect();

    Ok(AlignmentPlan {
        group,
        targets,
        sources,
    })
}

/// Type each target name after the first dataset that declares it, failing
/// if a later dataset declares a different type or declares the name in the
/// other non-key group.
fn resolve_types<D: Dataset>(
    datasets: &[D],
    group: FieldGroup,
    names: &[String],
) -> Result<Vec<Field>> {
    let mut declared: BTreeMap<&str, (&str, &FieldType)> = BTreeMap::new();
    for dataset in datasets {
        for name in names {
            let Some(field) = dataset.schema().field(group, name) else {
                continue;
            };
            match declared.get(name.as_str()) {
                None => {
                    declared.insert(name.as_str(), (dataset.label(), &field.field_type));
                }
                Some((first_label, first_type)) if **first_type != field.field_type => {
                    return Err(MergeError::SchemaConflict {
                        field: name.clone(),
                        first_group: group,
                        first_label: (*first_label).to_string(),
                        first_type: (*first_type).clone(),
                        group,
                        label: dataset.label().to_string(),
                        field_type: field.field_type.clone(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    // A name may live in one group only once the groups are combined.
    if let Some(other) = other_group(group) {
        for dataset in datasets {
            for name in names {
                let Some(field) = dataset.schema().field(other, name) else {
                    continue;
                };
                if let Some((first_label, first_type)) = declared.get(name.as_str()) {
                    return Err(MergeError::SchemaConflict {
                        field: name.clone(),
                        first_group: group,
                        first_label: (*first_label).to_string(),
                        first_type: (*first_type).clone(),
                        group: other,
                        label: dataset.label().to_string(),
                        field_type: field.field_type.clone(),
                    });
                }
            }
        }
    }
    Ok(names
        .iter()
        .filter_map(|name| {
            declared
                .get(name.as_str())
                .map(|(_, field_type)| Field::new(name.clone(), (*field_type).clone()))
        })
        .collect())
}

fn other_group(group: FieldGroup) -> Option<FieldGroup> {
    match group {
        FieldGroup::Row => Some(FieldGroup::Entry),
        FieldGroup::Entry => Some(FieldGroup::Row),
        FieldGroup::RowKey => None,
    }
}

fn check_row_keys<D: Dataset>(datasets: &[D]) -> Result<()> {
    let Some(first) = datasets.first() else {
        return Ok(());
    };
    for dataset in &datasets[1..] {
        if dataset.schema().row_key != first.schema().row_key {
            return Err(MergeError::RowKeyMismatch {
                first_label: first.label().to_string(),
                expected: describe_fields(&first.schema().row_key),
                label: dataset.label().to_string(),
                found: describe_fields(&dataset.schema().row_key),
            });
        }
    }
    Ok(())
}

fn describe_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn apply(
    datasets: Vec<ProjectedDataset>,
    group: FieldGroup,
    mode: AlignmentMode,
) -> Result<(Vec<ProjectedDataset>, Vec<Field>)> {
    let plan = plan_alignment(&datasets, group, mode)?;
    debug!(
        group = %group,
        mode = %mode,
        fields = plan.targets.len(),
        fills = plan.fill_count(),
        "aligned fields"
    );
    let aligned = datasets
        .iter()
        .zip(&plan.sources)
        .map(|(dataset, sources)| dataset.project_fields(group, plan.targets.clone(), sources))
        .collect();
    Ok((aligned, plan.targets))
}

/// Align non-key row fields; returns the projected datasets and the shared
/// row-field list.
pub fn align_row_fields(
    datasets: Vec<ProjectedDataset>,
    mode: AlignmentMode,
) -> Result<(Vec<ProjectedDataset>, Vec<Field>)> {
    apply(datasets, FieldGroup::Row, mode)
}

/// Align entry fields; returns the projected datasets and the shared
/// entry-field list.
pub fn align_entry_fields(
    datasets: Vec<ProjectedDataset>,
    mode: AlignmentMode,
) -> Result<(Vec<ProjectedDataset>, Vec<Field>)> {
    apply(datasets, FieldGroup::Entry, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!(
            "Union".parse::<AlignmentMode>().unwrap(),
            AlignmentMode::Union
        );
        assert_eq!(
            " intersection ".parse::<AlignmentMode>().unwrap(),
            AlignmentMode::Intersection
        );
        assert!("both".parse::<AlignmentMode>().is_err());
        assert_eq!(AlignmentMode::default().to_string(), "intersection");
    }
}
