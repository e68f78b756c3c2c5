// 📸 Snapshot Store - immutable, revision-tagged exports under Edits/
//
// Layout: Edits/<YYYY-MM-DD HHMM> (<revision>)/<export name>
//
// A snapshot is written once and never rewritten. New edits always land in
// a new snapshot for the current revision. A directory without its export
// file is a snapshot that was never finished; it is treated as absent.

use crate::error::{ClerkError, Result};
use crate::revision::{History, RevisionId};
use crate::table::{Table, TableStore, SHEET_LABEL};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory name for a snapshot taken at `timestamp` for `revision`.
pub fn snapshot_directory_name(timestamp: DateTime<Utc>, revision: &RevisionId) -> String {
    format!("{} ({})", timestamp.format("%Y-%m-%d %H%M"), revision)
}

/// Revision embedded in a snapshot directory name: the last parenthesized
/// group, e.g. `2024-01-31 0915 (3f2a9c1)` → `3f2a9c1`.
pub fn revision_from_directory_name(name: &str) -> Option<RevisionId> {
    let inner = name.trim_end().strip_suffix(')')?;
    let open = inner.rfind('(')?;
    let revision = inner[open + 1..].trim();
    if revision.is_empty() {
        None
    } else {
        Some(RevisionId::new(revision))
    }
}

// ============================================================================
// SNAPSHOT REF
// ============================================================================

/// A snapshot directory found on disk, tied to its revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRef {
    pub directory: PathBuf,
    pub revision: RevisionId,
    /// Author time of `revision`
    pub revision_time: DateTime<Utc>,
}

impl SnapshotRef {
    pub fn export_path(&self, export_name: &str) -> PathBuf {
        self.directory.join(export_name)
    }

    /// False for partial snapshots and for snapshots of other record types.
    pub fn has_export(&self, export_name: &str) -> bool {
        self.export_path(export_name).is_file()
    }
}

// ============================================================================
// EDITS FOLDER
// ============================================================================

/// The `Edits/` folder of a workspace.
#[derive(Debug, Clone)]
pub struct EditsFolder {
    path: PathBuf,
}

impl EditsFolder {
    /// Open an existing edits folder. A missing folder is a configuration
    /// error: the workspace layout was never set up.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(ClerkError::MissingFolder(path));
        }
        Ok(EditsFolder { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot for (`timestamp`, `revision`), creating it from
    /// `table` when `create_if_absent` is set.
    ///
    /// Returns `Ok(None)` when the snapshot (or its export file) does not
    /// exist and creation was not requested. An existing export file is
    /// authoritative: it is read back and `table` is ignored. A freshly
    /// created export is read back too, so repeated calls return the same
    /// content.
    pub fn load_or_create(
        &self,
        tables: &dyn TableStore,
        table: &Table,
        export_name: &str,
        timestamp: DateTime<Utc>,
        revision: &RevisionId,
        create_if_absent: bool,
    ) -> Result<Option<Table>> {
        let directory_name = snapshot_directory_name(timestamp, revision);
        let directory = self.path.join(&directory_name);

        if !directory.is_dir() {
            if !create_if_absent {
                debug!(snapshot = %directory_name, "snapshot directory absent");
                return Ok(None);
            }
            fs::create_dir(&directory).map_err(|e| ClerkError::io(&directory, e))?;
        }

        let export_path = directory.join(export_name);
        if !export_path.is_file() {
            if !create_if_absent {
                debug!(snapshot = %directory_name, export = export_name, "snapshot export absent");
                return Ok(None);
            }
            info!(snapshot = %directory_name, export = export_name, rows = table.len(), "creating snapshot export");
            tables.write_table(table, &export_path, SHEET_LABEL, true)?;
        }

        tables.read_table(&export_path).map(Some)
    }

    /// Read the export of an already listed snapshot. `Ok(None)` when the
    /// snapshot holds no export under that name.
    pub fn read_snapshot(
        &self,
        tables: &dyn TableStore,
        snapshot: &SnapshotRef,
        export_name: &str,
    ) -> Result<Option<Table>> {
        if !snapshot.has_export(export_name) {
            return Ok(None);
        }
        tables.read_table(&snapshot.export_path(export_name)).map(Some)
    }

    /// All snapshots, oldest revision first.
    ///
    /// The revision in each directory name is cross-referenced against the
    /// full commit log. Directories that name no known revision are skipped.
    /// Snapshots of revisions with the same author time are ordered by
    /// directory name.
    pub fn list_snapshots(&self, history: &dyn History) -> Result<Vec<SnapshotRef>> {
        let commit_times: HashMap<RevisionId, DateTime<Utc>> = history
            .log()?
            .into_iter()
            .map(|commit| (commit.revision, commit.authored_at))
            .collect();

        let mut snapshots = Vec::new();
        let entries = fs::read_dir(&self.path).map_err(|e| ClerkError::io(&self.path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ClerkError::io(&self.path, e))?;
            let directory = entry.path();
            if !directory.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let Some(revision) = revision_from_directory_name(&name) else {
                debug!(directory = %name, "not a snapshot directory");
                continue;
            };

            match commit_times.get(&revision) {
                Some(revision_time) => snapshots.push(SnapshotRef {
                    directory,
                    revision,
                    revision_time: *revision_time,
                }),
                None => warn!(
                    directory = %name,
                    revision = %revision,
                    "snapshot revision not found in history, skipping"
                ),
            }
        }

        snapshots.sort_by(|a, b| {
            a.revision_time
                .cmp(&b.revision_time)
                .then_with(|| a.directory.cmp(&b.directory))
        });
        Ok(snapshots)
    }
}
