//! Merges status, binary and hunk detection into one snapshot.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::debug;

use super::error::SplitError;
use crate::data::snapshot::{FileOperation, Hunk, OpKind, Snapshot};
use crate::git::StatusReport;

/// Builds the final snapshot.
///
/// Operations are deduplicated by id (last write wins, first-seen order
/// kept) and hunks on any operation-owned path are dropped.
pub fn reconcile(
    status: StatusReport,
    binary_ops: Vec<FileOperation>,
    hunks: Vec<Hunk>,
) -> Result<Snapshot, SplitError> {
    if status.has_conflict {
        return Err(SplitError::Conflict);
    }

    let mut unique: IndexMap<String, FileOperation> = IndexMap::new();
    for op in status.operations.into_iter().chain(binary_ops) {
        unique.insert(op.id.clone(), op);
    }
    let operations: Vec<FileOperation> = unique.into_values().collect();

    let mut unsplittable: BTreeSet<String> = status.unsplittable_paths;
    for op in &operations {
        unsplittable.insert(op.path.clone());
        // The source of a move is staged together with its destination.
        if op.kind == OpKind::Rename {
            if let Some(orig) = &op.orig_path {
                unsplittable.insert(orig.clone());
            }
        }
    }

    let before = hunks.len();
    let hunks: Vec<Hunk> = hunks
        .into_iter()
        .filter(|h| !unsplittable.contains(&h.file))
        .collect();

    debug!(
        operations = operations.len(),
        hunks = hunks.len(),
        dropped_hunks = before - hunks.len(),
        "Reconciled snapshot"
    );

    Ok(Snapshot { hunks, operations })
}
