//! Boundary to the git executable: process runner and logical operations.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tracing::{debug, warn};

use crate::git::diff_split::decode_diff;

/// Name of git's index lock marker inside the git directory.
const INDEX_LOCK: &str = "index.lock";

/// A lock younger than this may belong to a live git process.
const STALE_LOCK_AGE: Duration = Duration::from_secs(60);

/// Raw result of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    /// Captured standard output, byte for byte.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: String,
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl GitOutput {
    /// Builds a successful output.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            code: Some(0),
        }
    }

    /// Builds a failed output with the given exit code and diagnostic.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.into(),
            code: Some(code),
        }
    }

    /// Standard output as text, for commands whose output is not file content.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes git with arguments and optional stdin.
///
/// Implementations must not interpret the output; [`GitCommands`] does that.
pub trait GitRunner: Send + Sync {
    /// Runs `git <args>` to completion.
    fn run(&self, args: &[&str], stdin: Option<&str>) -> std::io::Result<GitOutput>;
}

/// Runs the real `git` executable inside a working directory.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    workdir: PathBuf,
}

impl ProcessRunner {
    /// Creates a runner rooted at `workdir`.
    pub fn new<P: AsRef<Path>>(workdir: P) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
        }
    }

    /// Returns the working directory.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

impl GitRunner for ProcessRunner {
    fn run(&self, args: &[&str], stdin: Option<&str>) -> std::io::Result<GitOutput> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.workdir)
            .args(["-c", "core.quotepath=false"])
            .args(args)
            // Stable English diagnostics, so lock contention can be recognised.
            .env("LC_ALL", "C")
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // A terminal Ctrl-C signals the whole foreground group; git runs
        // in its own group so an in-flight step always completes and
        // cancellation lands between commits.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn()?;
        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes())?;
            }
        }
        let output = child.wait_with_output()?;

        let result = GitOutput {
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        };
        debug!(
            args = ?args,
            code = ?result.code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "git finished"
        );
        Ok(result)
    }
}

/// A failed git step, carrying the raw diagnostic text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("git failed to {step} (exit code {}): {}", code_label(*.code), .stderr.trim())]
pub struct GitCommandError {
    /// Logical step that failed, e.g. "apply patch to index".
    pub step: String,
    /// Exit code, if the process ran and exited normally.
    pub code: Option<i32>,
    /// Raw stderr (or the spawn error) from git.
    pub stderr: String,
}

fn code_label(code: Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

impl GitCommandError {
    fn new(step: &str, output: &GitOutput) -> Self {
        Self {
            step: step.to_string(),
            code: output.code,
            stderr: output.stderr.clone(),
        }
    }

    fn spawn(step: &str, err: &std::io::Error) -> Self {
        Self {
            step: step.to_string(),
            code: None,
            stderr: format!("failed to run git: {err}"),
        }
    }

    /// Whether the failure is index lock contention (the only retryable kind).
    pub fn is_lock_contention(&self) -> bool {
        let stderr = self.stderr.to_lowercase();
        stderr.contains(INDEX_LOCK) || stderr.contains("another git process seems to be running")
    }
}

/// Bounded retry budget for transient lock contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(250),
        }
    }
}

/// Whether `lock` exists and was last modified at least `max_age` ago.
fn lock_is_stale(lock: &Path, max_age: Duration) -> bool {
    std::fs::metadata(lock)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age >= max_age)
}

/// The logical git operations the split engine needs.
pub struct GitCommands {
    runner: Box<dyn GitRunner>,
    retry: RetryPolicy,
}

impl GitCommands {
    /// Wraps a runner with the default retry policy.
    pub fn new(runner: Box<dyn GitRunner>) -> Self {
        Self {
            runner,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs once, without interpreting the exit code.
    fn run_raw(
        &self,
        step: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<GitOutput, GitCommandError> {
        self.runner
            .run(args, stdin)
            .map_err(|e| GitCommandError::spawn(step, &e))
    }

    /// Runs and requires success, retrying lock contention.
    fn run(
        &self,
        step: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<GitOutput, GitCommandError> {
        let mut attempt = 0;
        loop {
            let output = self.run_raw(step, args, stdin)?;
            if output.success() {
                return Ok(output);
            }

            let err = GitCommandError::new(step, &output);
            if !err.is_lock_contention() || attempt >= self.retry.retries {
                return Err(err);
            }

            attempt += 1;
            warn!(
                step,
                attempt,
                max_retries = self.retry.retries,
                "git index is locked; retrying"
            );
            self.remove_stale_lock();
            thread::sleep(self.retry.delay);
        }
    }

    /// Best-effort removal of a leftover `index.lock`.
    ///
    /// Only a lock older than [`STALE_LOCK_AGE`] is removed; a fresh one
    /// is left to its owner and simply waited on.
    fn remove_stale_lock(&self) {
        let git_dir = match self.run_raw(
            "locate git directory",
            &["rev-parse", "--absolute-git-dir"],
            None,
        ) {
            Ok(output) if output.success() => PathBuf::from(output.text().trim()),
            _ => return,
        };
        let lock = git_dir.join(INDEX_LOCK);
        if !lock_is_stale(&lock, STALE_LOCK_AGE) {
            debug!(path = %lock.display(), "Index lock is recent; waiting for its owner");
            return;
        }
        match std::fs::remove_file(&lock) {
            Ok(()) => warn!(path = %lock.display(), "Removed stale index lock"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!(path = %lock.display(), "Could not remove index lock: {e}"),
        }
    }

    /// Returns NUL-delimited porcelain v2 status including untracked files.
    pub fn status(&self) -> Result<String, GitCommandError> {
        self.run(
            "read status",
            &["status", "--porcelain=v2", "-z", "--untracked-files=all"],
            None,
        )
        .map(|o| o.text())
    }

    /// Whether `HEAD` resolves to a commit.
    pub fn has_commit(&self) -> Result<bool, GitCommandError> {
        self.run_raw(
            "resolve HEAD",
            &["rev-parse", "--verify", "--quiet", "HEAD"],
            None,
        )
        .map(|o| o.success())
    }

    /// Returns the object id of the empty tree for this repository's hash.
    fn empty_tree(&self) -> Result<String, GitCommandError> {
        self.run(
            "hash the empty tree",
            &["hash-object", "-t", "tree", "--stdin"],
            Some(""),
        )
        .map(|o| o.text().trim().to_string())
    }

    /// Returns the unified diff of the working tree against `HEAD`, or
    /// against the empty tree when no commit exists yet.
    ///
    /// File sections that are not valid UTF-8 come back as binary markers.
    pub fn diff(&self, has_commit: bool) -> Result<String, GitCommandError> {
        let base = if has_commit {
            "HEAD".to_string()
        } else {
            self.empty_tree()?
        };
        self.run(
            "diff the working tree",
            &[
                "diff",
                "--no-color",
                "--no-ext-diff",
                "--src-prefix=a/",
                "--dst-prefix=b/",
                &base,
                "--",
            ],
            None,
        )
        .map(|o| decode_diff(&o.stdout))
    }

    /// Applies a patch to the index only, never the working tree.
    ///
    /// `tolerant` enables three-way fallback and ignores whitespace
    /// problems. On failure the index is restored to its prior state.
    pub fn apply_to_index(&self, patch: &str, tolerant: bool) -> Result<(), GitCommandError> {
        let saved = self.run("record the index", &["write-tree"], None)?;
        let saved_tree = saved.text().trim().to_string();

        let mut args = vec!["apply", "--cached"];
        if tolerant {
            args.extend(["--3way", "--whitespace=nowarn"]);
        }
        args.push("-");

        match self.run("apply patch to index", &args, Some(patch)) {
            Ok(_) => Ok(()),
            Err(err) => {
                if let Err(restore) =
                    self.run("restore the index", &["read-tree", &saved_tree], None)
                {
                    warn!("Failed to restore index after rejected patch: {restore}");
                }
                Err(err)
            }
        }
    }

    /// Stages a path as it is in the working tree.
    pub fn stage_path(&self, path: &str) -> Result<(), GitCommandError> {
        self.run("stage path", &["add", "--", path], None)
            .map(|_| ())
    }

    /// Stages the removal of tracked content at `path`.
    pub fn stage_removal(&self, path: &str) -> Result<(), GitCommandError> {
        self.run(
            "stage removal",
            &["rm", "--cached", "-r", "--quiet", "--ignore-unmatch", "--", path],
            None,
        )
        .map(|_| ())
    }

    /// Stages both sides of a move so git can pair them.
    pub fn stage_rename_pair(&self, orig: &str, dest: &str) -> Result<(), GitCommandError> {
        self.run("stage rename", &["add", "-A", "--", orig, dest], None)
            .map(|_| ())
    }

    /// Lists paths whose index state differs from `HEAD`.
    pub fn list_staged_paths(&self) -> Result<Vec<String>, GitCommandError> {
        let output = self.run(
            "list staged paths",
            &["diff", "--cached", "--name-only", "-z"],
            None,
        )?;
        Ok(output
            .text()
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Commits the index with a subject and optional body paragraph.
    pub fn commit(&self, message: &str, body: Option<&str>) -> Result<(), GitCommandError> {
        let mut args = vec!["commit", "--quiet", "-m", message];
        if let Some(body) = body {
            args.extend(["-m", body]);
        }
        self.run("create commit", &args, None).map(|_| ())
    }

    /// Unstages everything, keeping the working tree untouched.
    pub fn reset_index(&self) -> Result<(), GitCommandError> {
        if self.has_commit()? {
            self.run("reset index", &["reset", "--quiet"], None)
        } else {
            self.run(
                "reset index",
                &["rm", "--cached", "-r", "--quiet", "--ignore-unmatch", "--", "."],
                None,
            )
        }
        .map(|_| ())
    }

    /// Returns the abbreviated hash of `HEAD`.
    pub fn head_short_hash(&self) -> Result<String, GitCommandError> {
        self.run("read HEAD", &["rev-parse", "--short", "HEAD"], None)
            .map(|o| o.text().trim().to_string())
    }
}
