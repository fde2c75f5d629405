//! Snapshot data structures: hunks, file operations and their identifiers.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the content digest when forming ids.
const ID_HEX_LEN: usize = 12;

/// Kind of a whole-file operation that cannot be split into hunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpKind {
    /// A new (untracked) file.
    Add,
    /// A removed file.
    Delete,
    /// A moved file; `orig_path` holds the source.
    Rename,
    /// A copied file; `orig_path` holds the source.
    Copy,
    /// A binary file whose content changed.
    Binary,
    /// A change of file type (e.g. regular file to symlink).
    TypeChange,
    /// A permission-only change (e.g. the executable bit).
    ModeChange,
}

impl OpKind {
    /// Returns the stable lowercase name used in ids and planner payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::Copy => "copy",
            Self::Binary => "binary",
            Self::TypeChange => "type-change",
            Self::ModeChange => "mode-change",
        }
    }

    /// Whether this kind moves content from an original path.
    pub fn has_source(self) -> bool {
        matches!(self, Self::Rename | Self::Copy)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Added/removed line counts for a hunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkStats {
    /// Lines starting with `+`.
    pub added: usize,
    /// Lines starting with `-`.
    pub removed: usize,
}

impl HunkStats {
    /// Counts additions and removals, skipping `+++`/`---` marker lines.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut stats = Self::default();
        for line in lines {
            let line = line.as_ref();
            if line.starts_with("+++") || line.starts_with("---") {
                continue;
            }
            if line.starts_with('+') {
                stats.added += 1;
            } else if line.starts_with('-') {
                stats.removed += 1;
            }
        }
        stats
    }
}

/// A contiguous, independently stageable block of changes within one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// Content-derived identifier, stable across snapshots.
    pub id: String,
    /// Post-change path of the file the hunk applies to.
    pub file: String,
    /// Preamble lines of the file's diff (`diff --git`, `index`, `---`, `+++`).
    pub file_header: Vec<String>,
    /// The `@@` header followed by every line belonging to this hunk.
    pub hunk_lines: Vec<String>,
    /// Derived line counts.
    pub stats: HunkStats,
}

impl Hunk {
    /// Builds a hunk, deriving its id and stats from the content.
    pub fn new(file: String, file_header: Vec<String>, hunk_lines: Vec<String>) -> Self {
        let id = hunk_id(&file, &hunk_lines);
        let stats = HunkStats::from_lines(&hunk_lines);
        Self {
            id,
            file,
            file_header,
            hunk_lines,
            stats,
        }
    }

    /// Returns the `@@ ... @@` line.
    pub fn header_line(&self) -> &str {
        self.hunk_lines.first().map_or("", String::as_str)
    }

    /// Renders `file_header` + `hunk_lines` as a standalone patch.
    pub fn to_patch(&self) -> String {
        let mut patch = String::new();
        for line in self.file_header.iter().chain(&self.hunk_lines) {
            patch.push_str(line);
            patch.push('\n');
        }
        patch
    }
}

/// An atomic, whole-file change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOperation {
    /// Identifier derived from kind, source path and destination path.
    pub id: String,
    /// Operation kind.
    pub kind: OpKind,
    /// Current (destination) path.
    pub path: String,
    /// Source path; present only for renames and copies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_path: Option<String>,
}

impl FileOperation {
    /// Builds an operation with its deterministic id.
    pub fn new(kind: OpKind, path: impl Into<String>, orig_path: Option<String>) -> Self {
        let path = path.into();
        let id = operation_id(kind, &path, orig_path.as_deref());
        Self {
            id,
            kind,
            path,
            orig_path,
        }
    }
}

/// Every hunk and file operation of the working tree at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Splittable text hunks, in diff order.
    pub hunks: Vec<Hunk>,
    /// Whole-file operations, in detection order.
    pub operations: Vec<FileOperation>,
}

impl Snapshot {
    /// Whether there is nothing to commit.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty() && self.operations.is_empty()
    }

    /// Indexes hunks and operations by id.
    pub fn index(&self) -> SnapshotIndex<'_> {
        SnapshotIndex {
            hunks: self
                .hunks
                .iter()
                .enumerate()
                .map(|(pos, h)| (h.id.as_str(), (pos, h)))
                .collect(),
            operations: self
                .operations
                .iter()
                .map(|op| (op.id.as_str(), op))
                .collect(),
        }
    }

    /// Builds the abbreviated view sent to the planner.
    pub fn for_ai(&self, limits: ExcerptLimits) -> SnapshotForAI {
        SnapshotForAI {
            operations: self
                .operations
                .iter()
                .map(|op| OperationForAI {
                    id: op.id.clone(),
                    kind: op.kind,
                    path: op.path.clone(),
                    orig_path: op.orig_path.clone(),
                })
                .collect(),
            hunks: self
                .hunks
                .iter()
                .map(|h| HunkForAI {
                    id: h.id.clone(),
                    file: h.file.clone(),
                    header: h.header_line().to_string(),
                    added: h.stats.added,
                    removed: h.stats.removed,
                    excerpt: excerpt(&h.hunk_lines[h.hunk_lines.len().min(1)..], limits),
                })
                .collect(),
        }
    }
}

/// Id lookup tables over a [`Snapshot`].
#[derive(Debug)]
pub struct SnapshotIndex<'a> {
    /// Hunk id to (snapshot position, hunk).
    pub hunks: HashMap<&'a str, (usize, &'a Hunk)>,
    /// Operation id to operation.
    pub operations: HashMap<&'a str, &'a FileOperation>,
}

/// Bounds on the hunk body excerpt shown to the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExcerptLimits {
    /// Maximum number of body lines.
    pub max_lines: usize,
    /// Maximum number of characters.
    pub max_chars: usize,
}

impl Default for ExcerptLimits {
    fn default() -> Self {
        Self {
            max_lines: 30,
            max_chars: 2000,
        }
    }
}

/// Planner view of a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotForAI {
    /// Every file operation in full.
    pub operations: Vec<OperationForAI>,
    /// Every hunk, abbreviated.
    pub hunks: Vec<HunkForAI>,
}

/// Planner view of a file operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationForAI {
    /// Operation id.
    pub id: String,
    /// Operation kind.
    pub kind: OpKind,
    /// Destination path.
    pub path: String,
    /// Source path for renames and copies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_path: Option<String>,
}

/// Planner view of a hunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HunkForAI {
    /// Hunk id.
    pub id: String,
    /// File path.
    pub file: String,
    /// The `@@` header line.
    pub header: String,
    /// Added line count.
    pub added: usize,
    /// Removed line count.
    pub removed: usize,
    /// Bounded prefix of the hunk body.
    pub excerpt: String,
}

/// Derives a hunk id from its file and lines.
pub fn hunk_id<S: AsRef<str>>(file: &str, hunk_lines: &[S]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"hunk\0");
    hasher.update(file.as_bytes());
    hasher.update(b"\0");
    for line in hunk_lines {
        hasher.update(line.as_ref().as_bytes());
        hasher.update(b"\n");
    }
    format!("h{}", short_hex(&hasher.finalize()))
}

/// Derives an operation id from its kind and paths.
pub fn operation_id(kind: OpKind, path: &str, orig_path: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"op\0");
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(orig_path.unwrap_or("").as_bytes());
    hasher.update(b"\0");
    hasher.update(path.as_bytes());
    format!("op{}", short_hex(&hasher.finalize()))
}

fn short_hex(digest: &[u8]) -> String {
    digest
        .iter()
        .take(ID_HEX_LEN / 2)
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn excerpt(body: &[String], limits: ExcerptLimits) -> String {
    let mut out = String::new();
    let mut used = 0;
    let mut shown = 0;
    for line in body.iter().take(limits.max_lines) {
        let cost = line.chars().count() + 1;
        if used + cost > limits.max_chars {
            break;
        }
        out.push_str(line);
        out.push('\n');
        used += cost;
        shown += 1;
    }
    if shown < body.len() {
        out.push_str(&format!("... ({} more lines)\n", body.len() - shown));
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn stats_ignore_file_markers() {
        let stats = HunkStats::from_lines(&lines(
            "@@ -1,3 +1,3 @@\n--- a/x\n+++ b/x\n-old\n+new\n+more\n context",
        ));
        assert_eq!(stats, HunkStats { added: 2, removed: 1 });
    }

    #[test]
    fn hunk_id_is_deterministic() {
        let body = lines("@@ -1 +1 @@\n-a\n+b");
        assert_eq!(hunk_id("a.txt", &body), hunk_id("a.txt", &body));
        assert_ne!(hunk_id("a.txt", &body), hunk_id("b.txt", &body));
        assert!(hunk_id("a.txt", &body).starts_with('h'));
        assert_eq!(hunk_id("a.txt", &body).len(), 1 + ID_HEX_LEN);
    }

    #[test]
    fn operation_id_depends_on_every_field() {
        let a = operation_id(OpKind::Rename, "new.rs", Some("old.rs"));
        assert_eq!(a, operation_id(OpKind::Rename, "new.rs", Some("old.rs")));
        assert_ne!(a, operation_id(OpKind::Copy, "new.rs", Some("old.rs")));
        assert_ne!(a, operation_id(OpKind::Rename, "new.rs", Some("other.rs")));
        assert_ne!(a, operation_id(OpKind::Rename, "new.rs", None));
    }

    #[test]
    fn to_patch_joins_header_and_body() {
        let hunk = Hunk::new(
            "a.txt".to_string(),
            lines("diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt"),
            lines("@@ -1 +1 @@\n-a\n+b"),
        );
        assert_eq!(
            hunk.to_patch(),
            "diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1 +1 @@\n-a\n+b\n"
        );
        assert_eq!(hunk.header_line(), "@@ -1 +1 @@");
    }

    #[test]
    fn for_ai_truncates_long_hunks() {
        let mut body = vec!["@@ -1,40 +1,40 @@".to_string()];
        body.extend((0..40).map(|i| format!("+line {i}")));
        let snapshot = Snapshot {
            hunks: vec![Hunk::new("big.txt".to_string(), Vec::new(), body)],
            operations: vec![FileOperation::new(OpKind::Add, "new.txt", None)],
        };

        let view = snapshot.for_ai(ExcerptLimits {
            max_lines: 5,
            max_chars: 10_000,
        });
        assert_eq!(view.operations.len(), 1);
        assert_eq!(view.hunks[0].added, 40);
        assert_eq!(view.hunks[0].excerpt.lines().count(), 6);
        assert!(view.hunks[0].excerpt.ends_with("... (35 more lines)\n"));
    }

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        let body: Vec<String> = (0..10).map(|_| "+été".to_string()).collect();
        let limits = ExcerptLimits {
            max_lines: 100,
            max_chars: 12,
        };
        // Each line costs five characters including its newline.
        assert_eq!(excerpt(&body, limits), "+été\n+été\n... (8 more lines)\n");
    }

    #[test]
    fn op_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&OpKind::TypeChange).unwrap();
        assert_eq!(json, "\"type-change\"");
        let json = serde_json::to_string(&OpKind::ModeChange).unwrap();
        assert_eq!(json, "\"mode-change\"");
    }
}
