//! Error taxonomy for a split cycle.

use thiserror::Error;

use crate::data::plan::PlanError;
use crate::data::snapshot::OpKind;
use crate::git::GitCommandError;

/// Failures of the snapshot, validate and apply steps.
#[derive(Error, Debug)]
pub enum SplitError {
    /// The index already holds staged changes from another actor.
    #[error("the index already has staged changes ({}); unstage them before splitting", .0.join(", "))]
    StagedChanges(Vec<String>),

    /// The working tree has unresolved merge conflicts.
    #[error("the repository has unresolved merge conflicts; resolve them before splitting")]
    Conflict,

    /// There are no uncommitted changes.
    #[error("there are no uncommitted changes to split")]
    NothingToSplit,

    /// Another split cycle holds the exclusivity token.
    #[error("another split is already in progress")]
    SessionBusy,

    /// The plan was rejected; nothing was committed.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A git step failed.
    #[error(transparent)]
    Git(#[from] GitCommandError),

    /// Staging produced an empty index.
    #[error("nothing staged; refusing to create an empty commit")]
    NothingStaged,

    /// A commit made only of hunks had its patch rejected, so nothing
    /// could be staged.
    #[error("nothing staged; the commit's hunks did not apply")]
    HunksRejected(#[source] GitCommandError),

    /// A rename or copy lacks its source path.
    #[error("{kind} operation for {path} has no original path")]
    MissingOrigPath {
        /// Operation kind.
        kind: OpKind,
        /// Destination path.
        path: String,
    },

    /// The plan references an id absent from the snapshot.
    #[error("id {0} is not part of the snapshot")]
    UnknownId(String),

    /// A planned commit failed part-way through the sequence.
    #[error(
        "commit {index} of {total} ({message:?}) failed; {created} of {total} commits created"
    )]
    CommitFailed {
        /// 1-based position of the failed commit.
        index: usize,
        /// Number of planned commits.
        total: usize,
        /// Commits created before the failure.
        created: usize,
        /// Message of the failed commit.
        message: String,
        /// Underlying failure.
        source: Box<SplitError>,
    },

    /// Cancellation was requested between commits.
    #[error("split cancelled; {created} of {total} commits created")]
    Cancelled {
        /// Commits created before cancellation.
        created: usize,
        /// Number of planned commits.
        total: usize,
    },
}

impl SplitError {
    /// Commits already created when the error occurred.
    pub fn commits_created(&self) -> usize {
        match self {
            Self::CommitFailed { created, .. } | Self::Cancelled { created, .. } => *created,
            _ => 0,
        }
    }
}
