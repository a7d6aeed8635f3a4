use std::path::PathBuf;

use gmx_core::{AlignmentMode, DropReport};

/// One input of a merge, as it was read.
#[derive(Debug, Clone)]
pub struct InputSummary {
    pub label: String,
    pub path: PathBuf,
    pub columns: usize,
    pub rows: usize,
    /// Samples removed because a higher-priority input already had them.
    pub dropped: usize,
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    pub output: PathBuf,
    pub mode: AlignmentMode,
    pub inputs: Vec<InputSummary>,
    pub drop_report: DropReport,
    pub row_fields: Vec<String>,
    pub entry_fields: Vec<String>,
    pub columns: usize,
    pub rows: usize,
    pub partitions: usize,
    pub drop_report_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RepartitionResult {
    pub input: PathBuf,
    pub output: PathBuf,
    pub shuffle: bool,
    pub source_partitions: usize,
    pub partitions: usize,
    pub rows: usize,
    /// Smallest and largest output partition.
    pub smallest: usize,
    pub largest: usize,
}
