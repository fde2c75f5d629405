//! Snapshot and plan data structures and their serialization.

pub mod plan;
pub mod snapshot;
pub mod yaml;

pub use plan::{is_conventional_subject, Plan, PlanCommit, PlanError};
pub use snapshot::{
    ExcerptLimits, FileOperation, Hunk, HunkForAI, HunkStats, OpKind, OperationForAI, Snapshot,
    SnapshotForAI, SnapshotIndex,
};
pub use yaml::*;
