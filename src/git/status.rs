//! Porcelain v2 (`-z`) status parsing into file-level operations.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::data::snapshot::{FileOperation, OpKind};

/// Number of space-separated fields preceding the path in a `1` record.
const ORDINARY_FIELDS: usize = 8;

/// Number of space-separated fields preceding the path in a `2` record.
const RENAME_FIELDS: usize = 9;

/// Result of parsing porcelain status output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// Whole-file operations detected from status records.
    pub operations: Vec<FileOperation>,
    /// Paths owned by an operation; never hunk-split.
    pub unsplittable_paths: BTreeSet<String>,
    /// Whether any unmerged (conflicted) entry was seen.
    pub has_conflict: bool,
}

impl StatusReport {
    fn push(&mut self, op: FileOperation) {
        self.unsplittable_paths.insert(op.path.clone());
        self.operations.push(op);
    }
}

/// Parses NUL-delimited `git status --porcelain=v2 -z` output.
///
/// Unknown record kinds are skipped, never rejected.
pub fn parse_status(raw: &str) -> StatusReport {
    let mut report = StatusReport::default();
    let mut tokens = raw.split('\0').filter(|t| !t.is_empty());

    while let Some(token) = tokens.next() {
        match token.as_bytes()[0] {
            b'#' => {}
            b'?' => {
                if let Some((_, path)) = token.split_once(' ') {
                    report.push(FileOperation::new(OpKind::Add, path, None));
                }
            }
            b'u' => {
                debug!(record = token, "Unmerged entry in status");
                report.has_conflict = true;
            }
            b'1' => {
                let fields: Vec<&str> = token.splitn(ORDINARY_FIELDS + 1, ' ').collect();
                let (Some(xy), Some(path)) = (fields.get(1), fields.get(ORDINARY_FIELDS)) else {
                    debug!(record = token, "Skipping truncated ordinary status record");
                    continue;
                };
                let modes = (fields.get(3).copied(), fields.get(5).copied());
                if let Some(kind) = ordinary_kind(xy, modes) {
                    report.push(FileOperation::new(kind, *path, None));
                }
            }
            b'2' => {
                // The original path follows as its own token.
                let orig = tokens.next();
                let fields: Vec<&str> = token.splitn(RENAME_FIELDS + 1, ' ').collect();
                let (Some(score), Some(path), Some(orig)) =
                    (fields.get(RENAME_FIELDS - 1), fields.get(RENAME_FIELDS), orig)
                else {
                    debug!(record = token, "Skipping truncated rename status record");
                    continue;
                };
                let kind = match score.chars().next() {
                    Some('R') => OpKind::Rename,
                    Some('C') => OpKind::Copy,
                    other => {
                        warn!(
                            path = *path,
                            action = ?other,
                            "Unrecognised rename/copy action; treating as rename"
                        );
                        OpKind::Rename
                    }
                };
                report.push(FileOperation::new(kind, *path, Some(orig.to_string())));
            }
            _ => debug!(record = token, "Ignoring unrecognised status record"),
        }
    }

    report
}

/// Classifies an ordinary record from its XY code and its HEAD and
/// worktree modes; `None` means hunk-splittable.
///
/// A mode flip carries no hunk, so it must become an operation or it
/// would never be committed.
fn ordinary_kind(
    xy: &str,
    (head_mode, worktree_mode): (Option<&str>, Option<&str>),
) -> Option<OpKind> {
    if xy.contains('D') {
        Some(OpKind::Delete)
    } else if xy.contains('T') {
        Some(OpKind::TypeChange)
    } else if head_mode.zip(worktree_mode).is_some_and(|(head, worktree)| head != worktree) {
        Some(OpKind::ModeChange)
    } else {
        None
    }
}
