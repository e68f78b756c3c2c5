// 🌿 Git-backed workspace history
//
// The workspace folder is its own git repository. Every processing run
// commits the current files first, so each run has a revision to tag its
// snapshot with and the history can tell which files were renamed.

use crate::config::CommitterConfig;
use crate::error::{ClerkError, Result};
use crate::revision::{CommitModifications, CommitSummary, History, Modification, RevisionId};
use chrono::{DateTime, Utc};
use git2::{Commit, Delta, DiffFindOptions, IndexAddOption, Oid, Repository, Signature, Sort};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Hex digits kept in a `RevisionId`
pub const SHORT_ID_LEN: usize = 7;

pub struct GitHistory {
    repo: Repository,
    committer: CommitterConfig,
}

impl GitHistory {
    /// Open the repository at `root`. Bare repositories are rejected: the
    /// workspace needs a working tree.
    pub fn open(root: &Path, committer: &CommitterConfig) -> Result<Self> {
        let repo = Repository::open(root)?;
        if repo.is_bare() {
            return Err(ClerkError::Config {
                path: root.to_path_buf(),
                message: "workspace repository is bare".to_string(),
            });
        }
        Ok(GitHistory {
            repo,
            committer: committer.clone(),
        })
    }

    /// Open the repository at `root`, or initialise one whose commits are
    /// authored by `committer` and which starts with an empty commit.
    pub fn open_or_init(root: &Path, committer: &CommitterConfig) -> Result<Self> {
        if root.join(".git").is_dir() {
            return Self::open(root, committer);
        }

        info!(root = %root.display(), "initialising workspace repository");
        let repo = Repository::init(root)?;
        {
            let mut config = repo.config()?;
            config.set_str("user.name", &committer.name)?;
            config.set_str("user.email", &committer.email)?;

            let signature = Signature::now(&committer.name, &committer.email)?;
            let tree_id = repo.index()?.write_tree()?;
            let tree = repo.find_tree(tree_id)?;
            repo.commit(Some("HEAD"), &signature, &signature, "Initial commit", &tree, &[])?;
        }

        Ok(GitHistory {
            repo,
            committer: committer.clone(),
        })
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// Add `pattern` to the repository-local ignore list
    /// (`.git/info/exclude`) unless it is already there.
    pub fn exclude(&self, pattern: &str) -> Result<()> {
        let info = self.repo.path().join("info");
        fs::create_dir_all(&info).map_err(|e| ClerkError::io(&info, e))?;

        let path = info.join("exclude");
        let existing = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(ClerkError::io(&path, e)),
        };
        if existing.lines().any(|line| line.trim() == pattern) {
            return Ok(());
        }

        let mut content = existing;
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(pattern);
        content.push('\n');
        fs::write(&path, content).map_err(|e| ClerkError::io(&path, e))
    }

    /// Stage every addition, modification and deletion (ignore rules apply)
    /// and commit them. Returns the new revision, or None when nothing
    /// changed.
    pub fn commit_all(&self, message: &str) -> Result<Option<RevisionId>> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        let tree_id = index.write_tree()?;

        let parent = self.head_commit().ok();
        if let Some(parent) = &parent {
            if parent.tree_id() == tree_id {
                debug!("no uncommitted changes");
                return Ok(None);
            }
        }

        let tree = self.repo.find_tree(tree_id)?;
        let signature = self
            .repo
            .signature()
            .or_else(|_| Signature::now(&self.committer.name, &self.committer.email))?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;

        let revision = Self::short_of(oid);
        info!(revision = %revision, message, "committed workspace changes");
        Ok(Some(revision))
    }

    fn head_commit(&self) -> Result<Commit<'_>> {
        Ok(self.repo.head()?.peel_to_commit()?)
    }

    fn find_commit(&self, revision: &str) -> Result<Commit<'_>> {
        Ok(self.repo.revparse_single(revision)?.peel_to_commit()?)
    }

    /// Fixed-width abbreviation, so a revision keeps the same name in
    /// snapshot directories however large the history grows.
    fn short_of(oid: Oid) -> RevisionId {
        let hex = oid.to_string();
        RevisionId::new(&hex[..SHORT_ID_LEN.min(hex.len())])
    }

    fn authored_at(commit: &Commit<'_>) -> Result<DateTime<Utc>> {
        let seconds = commit.author().when().seconds();
        DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| ClerkError::Git(git2::Error::from_str("commit time out of range")))
    }

    fn modifications_of(&self, commit: &Commit<'_>) -> Result<Vec<Modification>> {
        let tree = commit.tree()?;
        let parent_tree = match commit.parents().next() {
            Some(parent) => Some(parent.tree()?),
            None => None,
        };

        let mut diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
        diff.find_similar(Some(DiffFindOptions::new().renames(true)))?;

        let path_of = |path: Option<&Path>| path.map(|p| p.to_string_lossy().replace('\\', "/"));

        Ok(diff
            .deltas()
            .map(|delta| {
                let old_path = path_of(delta.old_file().path());
                let new_path = path_of(delta.new_file().path());
                match delta.status() {
                    Delta::Added => Modification {
                        old_path: None,
                        new_path,
                    },
                    Delta::Deleted => Modification {
                        old_path,
                        new_path: None,
                    },
                    _ => Modification { old_path, new_path },
                }
            })
            .collect())
    }
}

impl History for GitHistory {
    fn head_revision(&self) -> Result<RevisionId> {
        let head = self.head_commit()?;
        Ok(Self::short_of(head.id()))
    }

    fn short_id(&self, revision: &str) -> Result<RevisionId> {
        let commit = self.find_commit(revision)?;
        Ok(Self::short_of(commit.id()))
    }

    fn commit_timestamp(&self, revision: &RevisionId) -> Result<DateTime<Utc>> {
        let commit = self.find_commit(revision.as_str())?;
        Self::authored_at(&commit)
    }

    fn log(&self) -> Result<Vec<CommitSummary>> {
        let mut walk = self.repo.revwalk()?;
        walk.push_head()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

        let mut commits = Vec::new();
        for oid in walk {
            let commit = self.repo.find_commit(oid?)?;
            commits.push(CommitSummary {
                revision: Self::short_of(commit.id()),
                authored_at: Self::authored_at(&commit)?,
            });
        }
        Ok(commits)
    }

    fn modifications_between(
        &self,
        from: &RevisionId,
        to: &RevisionId,
    ) -> Result<Vec<CommitModifications>> {
        let from = self.find_commit(from.as_str())?.id();
        let to = self.find_commit(to.as_str())?.id();

        let mut walk = self.repo.revwalk()?;
        walk.push(to)?;
        walk.hide(from)?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

        let mut commits = Vec::new();
        for oid in walk {
            let commit = self.repo.find_commit(oid?)?;
            commits.push(CommitModifications {
                revision: Self::short_of(commit.id()),
                modifications: self.modifications_of(&commit)?,
            });
        }
        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_ids_are_fixed_width() {
        let dir = tempfile::tempdir().unwrap();
        let history = GitHistory::open_or_init(dir.path(), &CommitterConfig::default()).unwrap();
        fs::write(dir.path().join("bank.csv"), "date,amount\n").unwrap();
        let committed = history.commit_all("Current files").unwrap().unwrap();

        let head = history.head_revision().unwrap();
        assert_eq!(head, committed);
        assert_eq!(head.as_str().len(), SHORT_ID_LEN);
        assert_eq!(history.short_id("HEAD").unwrap(), head);

        let full = history.repo.head().unwrap().peel_to_commit().unwrap().id().to_string();
        assert!(full.starts_with(head.as_str()));
        assert!(history.log().unwrap().iter().all(|c| c.revision.as_str().len() == SHORT_ID_LEN));
    }

    #[test]
    fn test_same_commit_renames_reported_separately() {
        let dir = tempfile::tempdir().unwrap();
        let history = GitHistory::open_or_init(dir.path(), &CommitterConfig::default()).unwrap();
        fs::write(dir.path().join("a.csv"), "first file\n1,2,3\n").unwrap();
        let from = history.commit_all("Current files").unwrap().unwrap();

        fs::rename(dir.path().join("a.csv"), dir.path().join("b.csv")).unwrap();
        let to = history.commit_all("Current files").unwrap().unwrap();

        let commits = history.modifications_between(&from, &to).unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(
            commits[0].modifications,
            vec![Modification::renamed("a.csv", "b.csv")]
        );
    }
}
