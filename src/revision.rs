// 🧭 Revision Resolver - what moved where between two revisions
//
// The workspace's commit history is the source of truth for file identity.
// This module only talks to it through the `History` trait, so the engine
// never depends on a particular version-control backend.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

// ============================================================================
// REVISION IDENTIFIER
// ============================================================================

/// Short, stable name of one state of the workspace history (abbreviated
/// commit id). Also used as the tag on snapshots and suffixed columns.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn new(id: impl Into<String>) -> Self {
        RevisionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// HISTORY COLLABORATOR
// ============================================================================

/// One commit of the linear history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub revision: RevisionId,
    pub authored_at: DateTime<Utc>,
}

/// A single file modification inside a commit. Additions have no
/// `old_path`, deletions no `new_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
}

impl Modification {
    pub fn renamed(old: &str, new: &str) -> Self {
        Modification {
            old_path: Some(old.to_string()),
            new_path: Some(new.to_string()),
        }
    }

    pub fn added(path: &str) -> Self {
        Modification {
            old_path: None,
            new_path: Some(path.to_string()),
        }
    }

    pub fn deleted(path: &str) -> Self {
        Modification {
            old_path: Some(path.to_string()),
            new_path: None,
        }
    }
}

/// Modifications of one commit, paths relative to the workspace root.
#[derive(Debug, Clone)]
pub struct CommitModifications {
    pub revision: RevisionId,
    pub modifications: Vec<Modification>,
}

/// Version-control operations the engine consumes.
///
/// History is assumed linear. Implementations must report commits in
/// commit order (oldest first).
pub trait History {
    /// Short id of the tip of the history.
    fn head_revision(&self) -> Result<RevisionId>;

    /// Short id for any revision expression (full id, short id, `HEAD~1`).
    fn short_id(&self, revision: &str) -> Result<RevisionId>;

    /// Author time of a revision.
    fn commit_timestamp(&self, revision: &RevisionId) -> Result<DateTime<Utc>>;

    /// Every commit reachable from the tip, oldest first.
    fn log(&self) -> Result<Vec<CommitSummary>>;

    /// Commits after `from` up to and including `to`, oldest first.
    fn modifications_between(
        &self,
        from: &RevisionId,
        to: &RevisionId,
    ) -> Result<Vec<CommitModifications>>;
}

// ============================================================================
// RENAME MAP
// ============================================================================

/// Old path → path at the target revision, composed across every commit in
/// the range. Additions and deletions are kept apart and never feed the
/// rename lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameMap {
    // path now → path the file had at the start of the range; None for a
    // file born inside the range. Untouched paths have no entry.
    origins: BTreeMap<String, Option<String>>,
    renames: BTreeMap<String, String>,
    deleted: BTreeSet<String>,
    added: BTreeSet<String>,
}

impl RenameMap {
    /// Apply the modifications of one commit. Every old path is resolved
    /// against the state before the commit, so renames inside one commit
    /// never chain into each other (`A→B` plus `B→C` stays two moves).
    pub fn apply_commit(&mut self, modifications: &[Modification]) {
        let resolved: Vec<(Option<String>, &Modification)> = modifications
            .iter()
            .filter(|m| m.old_path.is_none() || m.old_path != m.new_path)
            .map(|m| (m.old_path.as_deref().and_then(|old| self.origin_of(old)), m))
            .collect();

        for (origin, modification) in &resolved {
            let Some(old) = &modification.old_path else {
                continue;
            };
            self.origins.remove(old);
            if modification.new_path.is_none() {
                if let Some(origin) = origin {
                    self.deleted.insert(origin.clone());
                }
            }
        }

        for (origin, modification) in &resolved {
            let Some(new) = &modification.new_path else {
                continue;
            };
            match (&modification.old_path, origin) {
                (Some(_), Some(origin)) if origin == new => {
                    // moved back to where it started
                    self.origins.remove(new);
                }
                (Some(_), origin) => {
                    self.origins.insert(new.clone(), origin.clone());
                }
                (None, _) if self.deleted.remove(new) => {
                    // deleted earlier in the range, restored under the same path
                    self.origins.remove(new);
                }
                (None, _) => {
                    self.origins.insert(new.clone(), None);
                }
            }
        }

        self.renames = self
            .origins
            .iter()
            .filter_map(|(now, origin)| Some((origin.clone()?, now.clone())))
            .filter(|(origin, now)| origin != now)
            .collect();
        self.added = self
            .origins
            .iter()
            .filter(|(_, origin)| origin.is_none())
            .map(|(now, _)| now.clone())
            .collect();
    }

    /// Path the file at `path` had at the start of the range; None when it
    /// was born inside the range.
    fn origin_of(&self, path: &str) -> Option<String> {
        match self.origins.get(path) {
            Some(origin) => origin.clone(),
            None => Some(path.to_string()),
        }
    }

    /// Where `old` lives at the target revision, if it moved.
    pub fn target_of(&self, old: &str) -> Option<&str> {
        self.renames.get(old).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.renames.iter().map(|(old, new)| (old.as_str(), new.as_str()))
    }

    /// Start-of-range paths whose file no longer exists at the target.
    pub fn deleted(&self) -> &BTreeSet<String> {
        &self.deleted
    }

    /// Target paths of files that did not exist at the start of the range.
    pub fn added(&self) -> &BTreeSet<String> {
        &self.added
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }
}

// ============================================================================
// RESOLVER OPERATIONS
// ============================================================================

/// Short id of the tip. Call after the caller committed pending changes.
pub fn current_revision(history: &dyn History) -> Result<RevisionId> {
    history.head_revision()
}

/// Short id for a named revision.
pub fn revision_of(history: &dyn History, name: &str) -> Result<RevisionId> {
    history.short_id(name)
}

/// Renames observed on the commits after `from` up to and including `to`.
pub fn rename_map(history: &dyn History, from: &RevisionId, to: &RevisionId) -> Result<RenameMap> {
    let mut map = RenameMap::default();
    if from == to {
        return Ok(map);
    }

    let commits = history.modifications_between(from, to)?;
    for commit in &commits {
        map.apply_commit(&commit.modifications);
    }

    debug!(
        from = %from,
        to = %to,
        commits = commits.len(),
        renames = map.len(),
        "computed rename map"
    );
    Ok(map)
}
