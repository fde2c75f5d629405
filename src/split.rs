//! Split engine: snapshot, plan, validate and apply.

pub mod apply;
pub mod error;
pub mod reconcile;
pub mod session;

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use apply::{build_composite_patch, ApplyReport, CreatedCommit};
pub use error::SplitError;
pub use reconcile::reconcile;
pub use session::{CancelFlag, SplitLock, SplitToken};

use crate::claude::ClaudeClient;
use crate::data::plan::Plan;
use crate::data::snapshot::{ExcerptLimits, Snapshot};
use crate::git::{extract_binary_ops, merge_hunks_by_file, parse_hunks, parse_status, GitCommands};

/// Unit of decomposition for text changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Every diff hunk is its own unit.
    #[default]
    Hunk,
    /// All hunks of a file form one unit.
    File,
}

impl FromStr for Granularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hunk" => Ok(Self::Hunk),
            "file" => Ok(Self::File),
            other => anyhow::bail!("Unknown granularity '{other}' (expected 'hunk' or 'file')"),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hunk => f.write_str("hunk"),
            Self::File => f.write_str("file"),
        }
    }
}

/// Drives one split cycle against a repository.
pub struct SplitEngine {
    git: GitCommands,
    granularity: Granularity,
    limits: ExcerptLimits,
}

impl SplitEngine {
    /// Creates an engine in hunk-granular mode.
    pub fn new(git: GitCommands) -> Self {
        Self {
            git,
            granularity: Granularity::default(),
            limits: ExcerptLimits::default(),
        }
    }

    /// Sets the decomposition granularity.
    #[must_use]
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Sets the excerpt bounds used for planner payloads.
    #[must_use]
    pub fn with_excerpt_limits(mut self, limits: ExcerptLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Returns the configured granularity.
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Fails unless the index is empty.
    pub fn check_index_empty(&self) -> Result<(), SplitError> {
        let staged = self.git.list_staged_paths()?;
        if staged.is_empty() {
            Ok(())
        } else {
            Err(SplitError::StagedChanges(staged))
        }
    }

    /// Captures every uncommitted change as an addressable snapshot.
    pub fn snapshot(&self) -> Result<Snapshot, SplitError> {
        self.check_index_empty()?;

        let status = parse_status(&self.git.status()?);
        if status.has_conflict {
            return Err(SplitError::Conflict);
        }

        let has_commit = self.git.has_commit()?;
        let diff = self.git.diff(has_commit)?;
        let mut hunks = parse_hunks(&diff);
        if self.granularity == Granularity::File {
            hunks = merge_hunks_by_file(hunks);
        }
        let binary_ops = extract_binary_ops(&diff);

        let snapshot = reconcile(status, binary_ops, hunks)?;
        if snapshot.is_empty() {
            return Err(SplitError::NothingToSplit);
        }

        info!(
            hunks = snapshot.hunks.len(),
            operations = snapshot.operations.len(),
            granularity = %self.granularity,
            has_commit,
            "Captured snapshot"
        );
        Ok(snapshot)
    }

    /// Asks the planner for a plan and validates it against `snapshot`.
    pub async fn plan(&self, planner: &ClaudeClient, snapshot: &Snapshot) -> Result<Plan> {
        let payload = snapshot.for_ai(self.limits);
        let plan = planner
            .generate_split_plan(&payload)
            .await
            .context("Failed to generate split plan")?;
        debug!(commits = plan.commits.len(), "Planner returned plan");

        plan.validate(snapshot)
            .map_err(SplitError::from)
            .context("Planner returned an invalid plan")?;
        Ok(plan)
    }

    /// Replays `plan` as commits.
    ///
    /// The plan is validated again and the index re-checked, so an
    /// unvalidated or stale plan never mutates the repository.
    pub fn apply(
        &self,
        _token: &SplitToken,
        plan: &Plan,
        snapshot: &Snapshot,
        cancel: &CancelFlag,
    ) -> Result<ApplyReport, SplitError> {
        plan.validate(snapshot)?;
        self.check_index_empty()?;

        let report = apply::apply_plan(&self.git, plan, &snapshot.index(), cancel)?;
        info!(created = report.commits.len(), "Plan applied");
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::data::plan::PlanCommit;
    use crate::data::snapshot::OpKind;
    use crate::git::test_utils::ScriptedRunner;
    use crate::git::GitOutput;

    const SHA: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

    fn diff_two_hunks() -> String {
        "diff --git a/a.txt b/a.txt\n\
         index 1111111..2222222 100644\n\
         --- a/a.txt\n\
         +++ b/a.txt\n\
         @@ -1 +1 @@\n\
         -one\n\
         +ONE\n\
         @@ -10 +10 @@\n\
         -ten\n\
         +TEN\n"
            .to_string()
    }

    fn engine(status: String, diff: String, staged: &'static str) -> SplitEngine {
        let runner = ScriptedRunner::new(move |args, _| match args[0].as_str() {
            "status" => GitOutput::ok(status.clone()),
            "diff" if args.iter().any(|a| a == "--cached") => GitOutput::ok(staged),
            "diff" => GitOutput::ok(diff.clone()),
            _ => GitOutput::ok(""),
        });
        SplitEngine::new(GitCommands::new(Box::new(runner)))
    }

    #[test]
    fn granularity_parses() {
        assert_eq!("hunk".parse::<Granularity>().unwrap(), Granularity::Hunk);
        assert_eq!("FILE".parse::<Granularity>().unwrap(), Granularity::File);
        assert!("line".parse::<Granularity>().is_err());
    }

    #[test]
    fn snapshot_combines_status_and_diff() {
        let status = format!("1 .M N... 100644 100644 100644 {SHA} {SHA} a.txt\0?? b.txt\0");
        let snapshot = engine(status, diff_two_hunks(), "").snapshot().unwrap();

        assert_eq!(snapshot.hunks.len(), 2);
        assert!(snapshot.hunks.iter().all(|h| h.file == "a.txt"));
        assert_eq!(snapshot.operations.len(), 1);
        assert_eq!(snapshot.operations[0].kind, OpKind::Add);
        assert_eq!(snapshot.operations[0].path, "b.txt");
    }

    #[test]
    fn file_granularity_merges_hunks() {
        let status = format!("1 .M N... 100644 100644 100644 {SHA} {SHA} a.txt\0");
        let snapshot = engine(status, diff_two_hunks(), "")
            .with_granularity(Granularity::File)
            .snapshot()
            .unwrap();
        assert_eq!(snapshot.hunks.len(), 1);
        assert_eq!(snapshot.hunks[0].stats.added, 2);
    }

    #[test]
    fn staged_changes_block_snapshot() {
        let err = engine(String::new(), String::new(), "x.txt\0")
            .snapshot()
            .unwrap_err();
        assert!(matches!(err, SplitError::StagedChanges(ref p) if p == &["x.txt"]));
    }

    #[test]
    fn conflicts_block_snapshot() {
        let status = format!("u UU N... 100644 100644 100644 100644 {SHA} {SHA} {SHA} c.txt\0");
        let err = engine(status, String::new(), "").snapshot().unwrap_err();
        assert!(matches!(err, SplitError::Conflict));
    }

    #[test]
    fn clean_tree_has_nothing_to_split() {
        let err = engine(String::new(), String::new(), "")
            .snapshot()
            .unwrap_err();
        assert!(matches!(err, SplitError::NothingToSplit));
    }

    #[test]
    fn apply_rejects_invalid_plan_before_touching_git() {
        let status = format!("1 .M N... 100644 100644 100644 {SHA} {SHA} a.txt\0");
        let engine = engine(status, diff_two_hunks(), "");
        let snapshot = engine.snapshot().unwrap();
        let plan = Plan {
            commits: vec![PlanCommit {
                message: "feat: partial".to_string(),
                hunks: vec![snapshot.hunks[0].id.clone()],
                ..PlanCommit::default()
            }],
        };

        let lock = SplitLock::new();
        let token = lock.try_acquire().unwrap();
        let err = engine
            .apply(&token, &plan, &snapshot, &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, SplitError::Plan(_)));
    }
}
