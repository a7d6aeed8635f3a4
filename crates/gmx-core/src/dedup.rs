//! Priority-ordered removal of duplicate column identifiers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use gmx_model::{Dataset, DatasetRef};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MergeError, Result};
use crate::projection::ProjectedDataset;

/// Dataset label to the sorted column identifiers removed from it.
///
/// Only datasets that lost at least one column appear in the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DropReport(BTreeMap<String, Vec<String>>);

impl DropReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<&[String]> {
        self.0.get(label).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(label, columns)| (label.as_str(), columns.as_slice()))
    }

    /// Number of datasets that dropped something.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_dropped(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    fn record(&mut self, label: &str, dropped: BTreeSet<String>) {
        if !dropped.is_empty() {
            self.0.insert(label.to_string(), dropped.into_iter().collect());
        }
    }
}

/// Remove from each dataset the columns already present in an earlier one.
///
/// Inputs are in descending priority. The result keeps the input order and
/// length; a dataset whose columns were all claimed earlier stays in the
/// sequence with zero columns.
pub fn drop_duplicate_columns(
    inputs: Vec<(String, DatasetRef)>,
) -> Result<(Vec<ProjectedDataset>, DropReport)> {
    let mut labels = BTreeSet::new();
    for (label, _) in &inputs {
        if !labels.insert(label.as_str()) {
            return Err(MergeError::DuplicateLabel {
                label: label.clone(),
            });
        }
    }

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut report = DropReport::new();
    let mut out = Vec::with_capacity(inputs.len());
    for (label, dataset) in inputs {
        let dropped: BTreeSet<String> = dataset
            .columns()
            .iter()
            .filter(|column| seen.contains(*column))
            .cloned()
            .collect();
        let view = ProjectedDataset::identity(label.as_str(), Arc::clone(&dataset));
        let view = if dropped.is_empty() {
            debug!(label = %label, columns = dataset.num_columns(), "no duplicate samples");
            view
        } else {
            info!(
                label = %label,
                dropped = dropped.len(),
                "dropping samples already present in a higher-priority dataset"
            );
            view.without_columns(&dropped)
        };
        seen.extend(dataset.columns().iter().cloned());
        report.record(&label, dropped);
        out.push(view);
    }
    Ok((out, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_skips_datasets_without_drops() {
        let mut report = DropReport::new();
        report.record("input1", BTreeSet::new());
        report.record("input2", ["s2".to_string()].into());
        assert_eq!(report.len(), 1);
        assert!(report.get("input1").is_none());
        assert_eq!(report.total_dropped(), 1);
    }
}
