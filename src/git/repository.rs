//! Repository discovery and index inspection via libgit2.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::{Repository, Status, StatusOptions};

/// Git repository wrapper
pub struct GitRepository {
    repo: Repository,
}

/// A path with changes already staged in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    /// Index status letter (A, M, D, R, T).
    pub status: char,
    /// Path relative to the repository root.
    pub path: String,
}

impl GitRepository {
    /// Open the repository containing the current directory.
    pub fn open() -> Result<Self> {
        Self::open_at(".")
    }

    /// Open the repository containing `path`, searching upward.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::discover(path.as_ref()).with_context(|| {
            format!("Not in a git repository: {}", path.as_ref().display())
        })?;

        Ok(Self { repo })
    }

    /// Working tree root; bare repositories are rejected.
    pub fn workdir(&self) -> Result<PathBuf> {
        self.repo
            .workdir()
            .map(Path::to_path_buf)
            .context("Repository has no working tree (bare repository)")
    }

    /// Current branch name, or `None` when detached or unborn.
    pub fn current_branch(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        head.shorthand()
            .filter(|name| *name != "HEAD")
            .map(str::to_string)
    }

    /// Entries whose index state differs from `HEAD`.
    pub fn staged_entries(&self) -> Result<Vec<StagedEntry>> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self
            .repo
            .statuses(Some(&mut options))
            .context("Failed to get repository status")?;

        Ok(statuses
            .iter()
            .filter_map(|entry| {
                let status = index_status_letter(entry.status())?;
                let path = entry.path()?.to_string();
                Some(StagedEntry { status, path })
            })
            .collect())
    }
}

/// Maps libgit2 index flags to a porcelain-style letter.
fn index_status_letter(flags: Status) -> Option<char> {
    if flags.contains(Status::INDEX_NEW) {
        Some('A')
    } else if flags.contains(Status::INDEX_MODIFIED) {
        Some('M')
    } else if flags.contains(Status::INDEX_DELETED) {
        Some('D')
    } else if flags.contains(Status::INDEX_RENAMED) {
        Some('R')
    } else if flags.contains(Status::INDEX_TYPECHANGE) {
        Some('T')
    } else {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn index_letters() {
        assert_eq!(index_status_letter(Status::INDEX_NEW), Some('A'));
        assert_eq!(
            index_status_letter(Status::INDEX_MODIFIED | Status::WT_MODIFIED),
            Some('M')
        );
        assert_eq!(index_status_letter(Status::WT_MODIFIED), None);
        assert_eq!(index_status_letter(Status::WT_NEW), None);
    }

    #[test]
    fn discovers_from_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let repo = GitRepository::open_at(&nested).unwrap();
        let workdir = repo.workdir().unwrap();
        assert_eq!(
            workdir.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
        assert!(repo.staged_entries().unwrap().is_empty());
        assert_eq!(repo.current_branch(), None);
    }

    #[test]
    fn staged_entries_report_index_changes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.txt"), "a\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a.txt")).unwrap();
        index.write().unwrap();

        let wrapped = GitRepository::open_at(dir.path()).unwrap();
        assert_eq!(
            wrapped.staged_entries().unwrap(),
            vec![StagedEntry {
                status: 'A',
                path: "a.txt".to_string()
            }]
        );
    }

    #[test]
    fn outside_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GitRepository::open_at(dir.path()).is_err());
    }
}
