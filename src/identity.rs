// 🪪 Identity Resolver - canonical workspace paths
//
// Every row is keyed by the root-relative path of the file it came from.
// The workspace root is written as the sentinel "@", so the same logical
// file keeps the same key no matter which snapshot exported it, unless the
// history says it was renamed.

use crate::revision::RenameMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Sentinel standing in for the workspace root in `File path` columns
pub const WORKSPACE_ROOT: &str = "@";

const ROOT_PREFIX: &str = "@/";

// ============================================================================
// CANONICAL PATH
// ============================================================================

/// Root-relative join of a row's `File path` and `File name`,
/// e.g. `@/Transactions/2024/export.csv`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    /// Join a folder (`@`, `@/Transactions`, ...) and a file name.
    pub fn from_parts(file_path: &str, file_name: &str) -> Self {
        let folder = file_path.trim_end_matches('/');
        if folder.is_empty() {
            CanonicalPath(file_name.to_string())
        } else {
            CanonicalPath(format!("{}/{}", folder, file_name))
        }
    }

    /// Build from a path as the version-control history reports it
    /// (relative to the workspace root, no sentinel).
    pub fn from_workspace_relative(relative: &str) -> Self {
        CanonicalPath(format!("{}{}", ROOT_PREFIX, relative.trim_start_matches('/')))
    }

    /// The history-relative form, or None when the path does not carry the
    /// root sentinel (rows produced outside the workspace).
    pub fn workspace_relative(&self) -> Option<&str> {
        self.0.strip_prefix(ROOT_PREFIX)
    }

    /// Resolve to an absolute path below `root`.
    pub fn on_disk(&self, root: &Path) -> PathBuf {
        match self.workspace_relative() {
            Some(relative) => root.join(relative),
            None => PathBuf::from(&self.0),
        }
    }

    /// Split back into `(File path, File name)`.
    pub fn parts(&self) -> (&str, &str) {
        self.0.rsplit_once('/').unwrap_or(("", self.0.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Folder part of a workspace-relative directory, in `File path` form.
pub fn folder_label(relative_dir: &Path) -> String {
    let relative = relative_dir.to_string_lossy().replace('\\', "/");
    let relative = relative.trim_matches('/');
    if relative.is_empty() {
        WORKSPACE_ROOT.to_string()
    } else {
        format!("{}{}", ROOT_PREFIX, relative)
    }
}

// ============================================================================
// JOIN KEY
// ============================================================================

/// Locally assigned ordinal pair for transactions parsed out of one file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionOrdinal {
    pub naive_transaction_id: String,
    pub duplicate_num: u32,
}

/// What the merger joins on: the canonical path plus, for transactions,
/// the naive ordinal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JoinKey {
    pub path: CanonicalPath,
    pub ordinal: Option<TransactionOrdinal>,
}

impl JoinKey {
    pub fn new(path: CanonicalPath, ordinal: Option<TransactionOrdinal>) -> Self {
        JoinKey { path, ordinal }
    }

    /// Same key, with the path carried through `renames`.
    pub fn rewritten(&self, renames: &RenameMap) -> JoinKey {
        JoinKey {
            path: rewrite_with_renames(&self.path, renames),
            ordinal: self.ordinal.clone(),
        }
    }
}

/// Map a prior snapshot's path onto what it is called at the head revision.
/// Paths the rename map does not mention are assumed not to have moved.
pub fn rewrite_with_renames(path: &CanonicalPath, renames: &RenameMap) -> CanonicalPath {
    path.workspace_relative()
        .and_then(|relative| renames.target_of(relative))
        .map(CanonicalPath::from_workspace_relative)
        .unwrap_or_else(|| path.clone())
}
