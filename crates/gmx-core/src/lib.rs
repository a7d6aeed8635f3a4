//! Harmonization and merge engine for partitioned genomic matrix datasets.
//!
//! The pipeline is a chain of lazy dataset views: priority-ordered column
//! deduplication ([`dedup`]), field alignment ([`align`]), a partitioned
//! column-axis outer join ([`merge`]) and optional repartitioning
//! ([`repartition`]). Parallel evaluation and cancellation go through an
//! explicit [`ExecutionContext`].

pub mod align;
pub mod context;
pub mod dedup;
pub mod error;
pub mod harmonize;
pub mod merge;
pub mod projection;
pub mod repartition;

pub use align::{
    AlignmentMode, AlignmentPlan, align_entry_fields, align_row_fields, plan_alignment,
};
pub use context::{CancellationToken, DEFAULT_PARTITIONS, ExecutionConfig, ExecutionContext};
pub use dedup::{DropReport, drop_duplicate_columns};
pub use error::{MergeError, Result};
pub use harmonize::{HarmonizeOutcome, harmonize_and_union, label_inputs};
pub use merge::{KeyRangePlan, MergeOptions, MergedDataset, outer_join_cols, union_cols};
pub use projection::{FieldSource, ProjectedDataset};
pub use repartition::{RepartitionedDataset, repartition};
