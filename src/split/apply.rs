//! Replays a validated plan as a sequence of commits.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::SplitError;
use super::session::CancelFlag;
use crate::data::plan::{Plan, PlanCommit};
use crate::data::snapshot::{FileOperation, Hunk, OpKind, SnapshotIndex};
use crate::git::GitCommands;

/// One commit created by the applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedCommit {
    /// Abbreviated commit hash.
    pub hash: String,
    /// Commit subject.
    pub message: String,
}

/// Outcome of a fully applied plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Created commits, oldest first.
    pub commits: Vec<CreatedCommit>,
}

/// Builds the patch staging every referenced hunk of one commit.
///
/// Hunks are grouped by file in snapshot order; each file contributes its
/// header once followed by its hunks.
pub fn build_composite_patch(hunks: &[&Hunk]) -> String {
    static BLANK_RUNS: OnceLock<Option<Regex>> = OnceLock::new();

    let mut files: IndexMap<&str, (&[String], Vec<&str>)> = IndexMap::new();
    for hunk in hunks {
        let entry = files
            .entry(hunk.file.as_str())
            .or_insert_with(|| (hunk.file_header.as_slice(), Vec::new()));
        entry.1.extend(hunk.hunk_lines.iter().map(String::as_str));
    }

    let sections: Vec<String> = files
        .values()
        .map(|(header, lines)| {
            let mut section = String::new();
            for line in header.iter().map(String::as_str).chain(lines.iter().copied()) {
                section.push_str(line);
                section.push('\n');
            }
            section
        })
        .collect();

    let patch = sections.join("\n");
    match BLANK_RUNS
        .get_or_init(|| Regex::new(r"\n{3,}").ok())
        .as_ref()
    {
        Some(re) => re.replace_all(&patch, "\n\n").into_owned(),
        None => patch,
    }
}

/// Resolves a commit's hunk ids, ordered by snapshot position.
fn resolve_hunks<'a>(
    index: &SnapshotIndex<'a>,
    commit: &PlanCommit,
) -> Result<Vec<&'a Hunk>, SplitError> {
    let mut found = commit
        .hunks
        .iter()
        .map(|id| {
            index
                .hunks
                .get(id.as_str())
                .copied()
                .ok_or_else(|| SplitError::UnknownId(id.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    found.sort_by_key(|(pos, _)| *pos);
    Ok(found.into_iter().map(|(_, hunk)| hunk).collect())
}

/// Stages one whole-file operation according to its kind.
fn stage_operation(git: &GitCommands, op: &FileOperation) -> Result<(), SplitError> {
    debug!(kind = %op.kind, path = %op.path, "Staging file operation");
    match op.kind {
        OpKind::Add | OpKind::Binary | OpKind::TypeChange | OpKind::ModeChange => {
            git.stage_path(&op.path)?;
        }
        OpKind::Delete => git.stage_removal(&op.path)?,
        OpKind::Rename | OpKind::Copy => {
            let orig = op
                .orig_path
                .as_deref()
                .ok_or_else(|| SplitError::MissingOrigPath {
                    kind: op.kind,
                    path: op.path.clone(),
                })?;
            git.stage_rename_pair(orig, &op.path)?;
        }
    }
    Ok(())
}

/// Stages and commits a single planned commit, then resets the index.
fn apply_commit(
    git: &GitCommands,
    index: &SnapshotIndex<'_>,
    commit: &PlanCommit,
) -> Result<CreatedCommit, SplitError> {
    let hunks = resolve_hunks(index, commit)?;
    let ops = commit
        .ops
        .iter()
        .map(|id| {
            index
                .operations
                .get(id.as_str())
                .copied()
                .ok_or_else(|| SplitError::UnknownId(id.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let patch = build_composite_patch(&hunks);
    if !patch.is_empty() {
        debug!(hunks = hunks.len(), patch_len = patch.len(), "Applying patch to index");
        if let Err(err) = git.apply_to_index(&patch, true) {
            return Err(if ops.is_empty() {
                SplitError::HunksRejected(err)
            } else {
                SplitError::Git(err)
            });
        }
    }

    for op in ops {
        stage_operation(git, op)?;
    }

    let staged = git.list_staged_paths()?;
    if staged.is_empty() {
        return Err(SplitError::NothingStaged);
    }
    debug!(staged = staged.len(), "Index ready for commit");

    git.commit(&commit.message, commit.effective_body())?;
    let hash = git.head_short_hash()?;
    git.reset_index()?;

    Ok(CreatedCommit {
        hash,
        message: commit.message.clone(),
    })
}

/// Applies every planned commit in order.
///
/// The plan must already be validated against the snapshot behind
/// `index`. On failure, commits already created are kept, the index is
/// reset best-effort, and the error states how many were created.
pub fn apply_plan(
    git: &GitCommands,
    plan: &Plan,
    index: &SnapshotIndex<'_>,
    cancel: &CancelFlag,
) -> Result<ApplyReport, SplitError> {
    let total = plan.commits.len();
    let mut report = ApplyReport::default();

    for (i, commit) in plan.commits.iter().enumerate() {
        let created = report.commits.len();
        if cancel.is_cancelled() {
            info!(created, total, "Split cancelled between commits");
            return Err(SplitError::Cancelled { created, total });
        }

        info!(
            index = i + 1,
            total,
            message = %commit.message,
            "Creating commit"
        );
        match apply_commit(git, index, commit) {
            Ok(done) => report.commits.push(done),
            Err(err) => {
                if let Err(reset) = git.reset_index() {
                    warn!("Failed to reset index after apply failure: {reset}");
                }
                return Err(SplitError::CommitFailed {
                    index: i + 1,
                    total,
                    created,
                    message: commit.message.clone(),
                    source: Box::new(err),
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::data::snapshot::Snapshot;
    use crate::git::test_utils::ScriptedRunner;
    use crate::git::GitOutput;

    fn header(file: &str) -> Vec<String> {
        vec![
            format!("diff --git a/{file} b/{file}"),
            "index 1111111..2222222 100644".to_string(),
            format!("--- a/{file}"),
            format!("+++ b/{file}"),
        ]
    }

    fn hunk(file: &str, at: usize, body: &str) -> Hunk {
        Hunk::new(
            file.to_string(),
            header(file),
            vec![format!("@@ -{at} +{at} @@"), body.to_string()],
        )
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            hunks: vec![
                hunk("a.txt", 1, "+one"),
                hunk("a.txt", 9, "+two"),
                hunk("b.txt", 1, "+three"),
            ],
            operations: vec![
                FileOperation::new(OpKind::Add, "new.txt", None),
                FileOperation::new(OpKind::Delete, "old.txt", None),
                FileOperation::new(OpKind::Rename, "to.rs", Some("from.rs".to_string())),
            ],
        }
    }

    fn commit(message: &str, hunks: &[&str], ops: &[&str]) -> PlanCommit {
        PlanCommit {
            message: message.to_string(),
            body: None,
            hunks: hunks.iter().map(|s| (*s).to_string()).collect(),
            ops: ops.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn op_ids(snap: &Snapshot) -> Vec<&str> {
        snap.operations.iter().map(|o| o.id.as_str()).collect()
    }

    /// A runner where every step succeeds and something is always staged.
    fn happy_runner() -> ScriptedRunner {
        ScriptedRunner::new(|args, _| match args[0].as_str() {
            "diff" => GitOutput::ok("a.txt\0"),
            "rev-parse" if args.iter().any(|a| a == "--short") => GitOutput::ok("abc1234\n"),
            "write-tree" => GitOutput::ok("tree\n"),
            _ => GitOutput::ok(""),
        })
    }

    #[test]
    fn composite_patch_groups_by_file() {
        let snap = snapshot();
        let hunks: Vec<&Hunk> = snap.hunks.iter().collect();
        let patch = build_composite_patch(&hunks);
        assert_eq!(
            patch,
            "diff --git a/a.txt b/a.txt\n\
             index 1111111..2222222 100644\n\
             --- a/a.txt\n\
             +++ b/a.txt\n\
             @@ -1 +1 @@\n\
             +one\n\
             @@ -9 +9 @@\n\
             +two\n\
             \n\
             diff --git a/b.txt b/b.txt\n\
             index 1111111..2222222 100644\n\
             --- a/b.txt\n\
             +++ b/b.txt\n\
             @@ -1 +1 @@\n\
             +three\n"
        );
    }

    #[test]
    fn composite_patch_of_nothing_is_empty() {
        assert_eq!(build_composite_patch(&[]), "");
    }

    #[test]
    fn hunks_follow_snapshot_order() {
        let snap = snapshot();
        let index = snap.index();
        let c = commit(
            "feat: x",
            &[snap.hunks[2].id.as_str(), snap.hunks[0].id.as_str()],
            &[],
        );
        let resolved = resolve_hunks(&index, &c).unwrap();
        assert_eq!(resolved[0].id, snap.hunks[0].id);
        assert_eq!(resolved[1].id, snap.hunks[2].id);
    }

    #[test]
    fn operations_stage_by_kind() {
        let snap = snapshot();
        let runner = happy_runner();
        let calls = runner.call_handle();
        let git = GitCommands::new(Box::new(runner));
        let plan = Plan {
            commits: vec![commit("chore: files", &[], &op_ids(&snap))],
        };

        let report = apply_plan(&git, &plan, &snap.index(), &CancelFlag::new()).unwrap();
        assert_eq!(report.commits.len(), 1);
        assert_eq!(report.commits[0].hash, "abc1234");

        assert_eq!(calls.count_starting_with(&["add", "--", "new.txt"]), 1);
        assert_eq!(
            calls.count_starting_with(&[
                "rm",
                "--cached",
                "-r",
                "--quiet",
                "--ignore-unmatch",
                "--",
                "old.txt"
            ]),
            1
        );
        assert_eq!(calls.count_starting_with(&["add", "-A", "--", "from.rs", "to.rs"]), 1);
        assert_eq!(calls.count_starting_with(&["apply"]), 0);
    }

    #[test]
    fn each_commit_is_committed_then_reset() {
        let snap = snapshot();
        let runner = happy_runner();
        let calls = runner.call_handle();
        let git = GitCommands::new(Box::new(runner));
        let ops = op_ids(&snap);
        let plan = Plan {
            commits: vec![
                commit("feat: a", &[snap.hunks[0].id.as_str(), snap.hunks[1].id.as_str()], &[]),
                commit("feat: b", &[snap.hunks[2].id.as_str()], &ops),
            ],
        };

        let report = apply_plan(&git, &plan, &snap.index(), &CancelFlag::new()).unwrap();
        let messages: Vec<_> = report.commits.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["feat: a", "feat: b"]);
        assert_eq!(calls.count_starting_with(&["commit"]), 2);
        assert_eq!(calls.count_starting_with(&["apply", "--cached"]), 2);

        let sequence: Vec<String> = calls
            .all()
            .into_iter()
            .map(|c| c.args[0].clone())
            .filter(|a| matches!(a.as_str(), "apply" | "commit" | "reset"))
            .collect();
        assert_eq!(
            sequence,
            vec!["apply", "commit", "reset", "apply", "commit", "reset"]
        );
    }

    #[test]
    fn empty_index_is_refused() {
        let snap = snapshot();
        // Apply "succeeds" but the index stays empty.
        let runner = ScriptedRunner::new(|args, _| match args[0].as_str() {
            "write-tree" => GitOutput::ok("tree\n"),
            _ => GitOutput::ok(""),
        });
        let calls = runner.call_handle();
        let git = GitCommands::new(Box::new(runner));
        let plan = Plan {
            commits: vec![commit("fix: nothing", &[snap.hunks[0].id.as_str()], &[])],
        };

        let err = apply_plan(&git, &plan, &snap.index(), &CancelFlag::new()).unwrap_err();
        match &err {
            SplitError::CommitFailed { source, created, .. } => {
                assert!(matches!(**source, SplitError::NothingStaged));
                assert_eq!(*created, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("0 of 1 commits created"));
        assert_eq!(calls.count_starting_with(&["commit"]), 0);
    }

    #[test]
    fn apply_failure_stops_sequence_and_keeps_prefix() {
        let snap = snapshot();
        let runner = ScriptedRunner::new(|args, stdin| match args[0].as_str() {
            "apply" if stdin.is_some_and(|p| p.contains("b.txt")) => {
                GitOutput::failed(1, "error: patch failed: b.txt:1")
            }
            "diff" => GitOutput::ok("a.txt\0"),
            "rev-parse" if args.iter().any(|a| a == "--short") => GitOutput::ok("abc1234\n"),
            "write-tree" => GitOutput::ok("tree\n"),
            _ => GitOutput::ok(""),
        });
        let calls = runner.call_handle();
        let git = GitCommands::new(Box::new(runner));
        let plan = Plan {
            commits: vec![
                commit("feat: a", &[snap.hunks[0].id.as_str()], &[]),
                commit("feat: b", &[snap.hunks[2].id.as_str()], &[]),
                commit("feat: c", &[snap.hunks[1].id.as_str()], &[]),
            ],
        };

        let err = apply_plan(&git, &plan, &snap.index(), &CancelFlag::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "commit 2 of 3 (\"feat: b\") failed; 1 of 3 commits created"
        );
        assert_eq!(calls.count_starting_with(&["commit"]), 1);
        // One reset after the first commit, one best-effort reset after the failure.
        assert_eq!(calls.count_starting_with(&["reset"]), 2);
    }

    #[test]
    fn rejected_hunk_only_commit_stages_nothing() {
        let snap = snapshot();
        let runner = ScriptedRunner::new(|args, _| match args[0].as_str() {
            "apply" => GitOutput::failed(1, "error: patch does not apply"),
            "write-tree" => GitOutput::ok("tree\n"),
            _ => GitOutput::ok(""),
        });
        let calls = runner.call_handle();
        let git = GitCommands::new(Box::new(runner));
        let plan = Plan {
            commits: vec![commit("fix: a", &[snap.hunks[0].id.as_str()], &[])],
        };

        let err = apply_plan(&git, &plan, &snap.index(), &CancelFlag::new()).unwrap_err();
        let SplitError::CommitFailed { source, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert!(source.to_string().starts_with("nothing staged"));
        match &**source {
            SplitError::HunksRejected(git_err) => {
                assert!(git_err.stderr.contains("patch does not apply"));
            }
            other => panic!("unexpected source: {other}"),
        }
        assert_eq!(calls.count_starting_with(&["commit"]), 0);
    }

    #[test]
    fn rejected_patch_with_operations_reports_git_failure() {
        let snap = snapshot();
        let runner = ScriptedRunner::new(|args, _| match args[0].as_str() {
            "apply" => GitOutput::failed(1, "error: patch does not apply"),
            "write-tree" => GitOutput::ok("tree\n"),
            _ => GitOutput::ok(""),
        });
        let git = GitCommands::new(Box::new(runner));
        let ops = op_ids(&snap);
        let plan = Plan {
            commits: vec![commit("fix: a", &[snap.hunks[0].id.as_str()], &[ops[0]])],
        };

        let err = apply_plan(&git, &plan, &snap.index(), &CancelFlag::new()).unwrap_err();
        let SplitError::CommitFailed { source, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert!(matches!(**source, SplitError::Git(_)));
    }

    #[test]
    fn cancellation_is_checked_between_commits() {
        let snap = snapshot();
        let git = GitCommands::new(Box::new(happy_runner()));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let plan = Plan {
            commits: vec![commit("feat: a", &[snap.hunks[0].id.as_str()], &[])],
        };

        let err = apply_plan(&git, &plan, &snap.index(), &cancel).unwrap_err();
        assert!(matches!(err, SplitError::Cancelled { created: 0, total: 1 }));
    }

    #[test]
    fn rename_without_source_is_fatal() {
        let op = FileOperation::new(OpKind::Rename, "to.rs", None);
        let git = GitCommands::new(Box::new(happy_runner()));
        assert!(matches!(
            stage_operation(&git, &op),
            Err(SplitError::MissingOrigPath { .. })
        ));
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let snap = snapshot();
        let git = GitCommands::new(Box::new(happy_runner()));
        let plan = Plan {
            commits: vec![commit("feat: a", &["hdeadbeef0000"], &[])],
        };
        let err = apply_plan(&git, &plan, &snap.index(), &CancelFlag::new()).unwrap_err();
        let SplitError::CommitFailed { source, .. } = err else {
            panic!("expected CommitFailed");
        };
        assert!(matches!(*source, SplitError::UnknownId(ref id) if id == "hdeadbeef0000"));
    }
}
