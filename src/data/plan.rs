//! Commit plan data structures and validation.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::snapshot::Snapshot;

/// Maximum length of a commit subject, in characters.
pub const MAX_SUBJECT_LEN: usize = 72;

/// Reasons a plan (or the text it was parsed from) is rejected.
#[derive(Error, Debug)]
pub enum PlanError {
    /// The planner response contained no JSON object.
    #[error("planner response does not contain a JSON object")]
    NoJsonObject,

    /// The extracted JSON could not be deserialized into a plan.
    #[error("planner returned invalid plan JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The plan has no commits.
    #[error("plan contains no commits")]
    Empty,

    /// A commit has a blank message.
    #[error("commit {index} has an empty message")]
    EmptyMessage {
        /// 1-based commit position.
        index: usize,
    },

    /// A commit message does not match `type[(scope)]: subject`.
    #[error(
        "commit {index} message {message:?} must match `type[(scope)]: subject` \
         (lowercase type, subject 1-72 characters)"
    )]
    MalformedMessage {
        /// 1-based commit position.
        index: usize,
        /// The offending message.
        message: String,
    },

    /// A commit references neither hunks nor operations.
    #[error("commit {index} ({message:?}) references no hunks and no operations")]
    EmptyCommit {
        /// 1-based commit position.
        index: usize,
        /// The commit message.
        message: String,
    },

    /// A hunk id is not part of the snapshot.
    #[error("commit {index} references unknown hunk id {id}")]
    UnknownHunk {
        /// 1-based commit position.
        index: usize,
        /// The unknown id.
        id: String,
    },

    /// An operation id is not part of the snapshot.
    #[error("commit {index} references unknown operation id {id}")]
    UnknownOp {
        /// 1-based commit position.
        index: usize,
        /// The unknown id.
        id: String,
    },

    /// A hunk id is referenced more than once.
    #[error("hunk id {id} is referenced more than once (again in commit {index})")]
    DuplicateHunk {
        /// 1-based position of the repeated reference.
        index: usize,
        /// The duplicated id.
        id: String,
    },

    /// An operation id is referenced more than once.
    #[error("operation id {id} is referenced more than once (again in commit {index})")]
    DuplicateOp {
        /// 1-based position of the repeated reference.
        index: usize,
        /// The duplicated id.
        id: String,
    },

    /// Some hunks are not covered by any commit.
    #[error("plan does not cover hunk id(s): {}", .0.join(", "))]
    MissingHunks(Vec<String>),

    /// Some operations are not covered by any commit.
    #[error("plan does not cover operation id(s): {}", .0.join(", "))]
    MissingOps(Vec<String>),
}

/// An ordered sequence of planned commits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Commits, in the order they are created.
    pub commits: Vec<PlanCommit>,
}

/// One planned commit, referencing snapshot content by id only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCommit {
    /// Conventional commit subject line.
    pub message: String,
    /// Optional body paragraph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Hunk ids, in plan order.
    #[serde(default)]
    pub hunks: Vec<String>,
    /// Operation ids, in plan order.
    #[serde(default)]
    pub ops: Vec<String>,
}

impl PlanCommit {
    /// Returns the body if it has any non-whitespace content.
    pub fn effective_body(&self) -> Option<&str> {
        self.body
            .as_deref()
            .map(str::trim)
            .filter(|body| !body.is_empty())
    }
}

impl Plan {
    /// Parses a plan from JSON text.
    pub fn from_json(json: &str) -> std::result::Result<Self, PlanError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a plan from a JSON or YAML file (chosen by extension).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file: {}", path.display()))?;

        if is_yaml_path(path) {
            crate::data::from_yaml(&content)
                .with_context(|| format!("Failed to parse YAML plan file: {}", path.display()))
        } else {
            Self::from_json(&content)
                .with_context(|| format!("Failed to parse JSON plan file: {}", path.display()))
        }
    }

    /// Saves the plan as JSON or YAML (chosen by extension).
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_path(path) {
            crate::data::to_yaml(self)?
        } else {
            let mut json =
                serde_json::to_string_pretty(self).context("Failed to serialize plan to JSON")?;
            json.push('\n');
            json
        };

        fs::write(path, content)
            .with_context(|| format!("Failed to write plan file: {}", path.display()))
    }

    /// Checks that the plan is an exact partition of the snapshot's ids.
    ///
    /// Every hunk and operation id of `snapshot` must be referenced by
    /// exactly one commit, no unknown id may appear, and every commit
    /// must carry a conforming message and at least one reference.
    pub fn validate(&self, snapshot: &Snapshot) -> std::result::Result<(), PlanError> {
        if self.commits.is_empty() {
            return Err(PlanError::Empty);
        }

        let hunk_universe: HashSet<&str> = snapshot.hunks.iter().map(|h| h.id.as_str()).collect();
        let op_universe: HashSet<&str> = snapshot
            .operations
            .iter()
            .map(|op| op.id.as_str())
            .collect();

        let mut seen_hunks = HashSet::new();
        let mut seen_ops = HashSet::new();

        for (i, commit) in self.commits.iter().enumerate() {
            let index = i + 1;

            if commit.message.trim().is_empty() {
                return Err(PlanError::EmptyMessage { index });
            }
            if !is_conventional_subject(&commit.message) {
                return Err(PlanError::MalformedMessage {
                    index,
                    message: commit.message.clone(),
                });
            }
            if commit.hunks.is_empty() && commit.ops.is_empty() {
                return Err(PlanError::EmptyCommit {
                    index,
                    message: commit.message.clone(),
                });
            }

            for id in &commit.hunks {
                if !hunk_universe.contains(id.as_str()) {
                    return Err(PlanError::UnknownHunk {
                        index,
                        id: id.clone(),
                    });
                }
                if !seen_hunks.insert(id.as_str()) {
                    return Err(PlanError::DuplicateHunk {
                        index,
                        id: id.clone(),
                    });
                }
            }

            for id in &commit.ops {
                if !op_universe.contains(id.as_str()) {
                    return Err(PlanError::UnknownOp {
                        index,
                        id: id.clone(),
                    });
                }
                if !seen_ops.insert(id.as_str()) {
                    return Err(PlanError::DuplicateOp {
                        index,
                        id: id.clone(),
                    });
                }
            }
        }

        // Report in snapshot order so messages are stable.
        let missing_hunks: Vec<String> = snapshot
            .hunks
            .iter()
            .filter(|h| !seen_hunks.contains(h.id.as_str()))
            .map(|h| h.id.clone())
            .collect();
        if !missing_hunks.is_empty() {
            return Err(PlanError::MissingHunks(missing_hunks));
        }

        let missing_ops: Vec<String> = snapshot
            .operations
            .iter()
            .filter(|op| !seen_ops.contains(op.id.as_str()))
            .map(|op| op.id.clone())
            .collect();
        if !missing_ops.is_empty() {
            return Err(PlanError::MissingOps(missing_ops));
        }

        Ok(())
    }
}

/// Whether `message` matches `type[(scope)]: subject` with a lowercase
/// type and a 1-72 character subject.
pub fn is_conventional_subject(message: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(pattern) = PATTERN
        .get_or_init(|| Regex::new(r"^[a-z]+(?:\([^()\r\n]+\))?: (?P<subject>[^\r\n]+)$").ok())
    else {
        return false;
    };

    pattern
        .captures(message)
        .and_then(|caps| caps.name("subject"))
        .is_some_and(|subject| {
            let len = subject.as_str().chars().count();
            (1..=MAX_SUBJECT_LEN).contains(&len)
        })
}

fn is_yaml_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}
