// 🗂️ Workspace - the folder a user keeps their finances in
//
// <root>/
//   .git/            version history of everything except Edits/
//   Transactions/    bank and card exports, as downloaded
//   Receipts/        receipt documents
//   Edits/           one snapshot directory per processing run
//   clerk.toml       optional overrides

use crate::config::{load_workspace_config, WorkspaceConfig};
use crate::error::{ClerkError, Result};
use crate::files::list_files;
use crate::git::GitHistory;
use crate::identity::CanonicalPath;
use crate::reconcile::Reconciler;
use crate::records::{TransactionFileRow, FILE_METADATA, FILE_NAME, FILE_PATH, HISTORY_REFERENCE};
use crate::revision::{current_revision, RevisionId};
use crate::snapshot::EditsFolder;
use crate::table::{CsvTables, Table};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Commit message used when acknowledging the files currently on disk.
pub const ACKNOWLEDGE_MESSAGE: &str = "Current files";

const RECEIPT_IGNORE: &str = "Ignore";

pub struct Workspace {
    root: PathBuf,
    config: WorkspaceConfig,
    history: GitHistory,
    tables: CsvTables,
}

impl Workspace {
    /// Open the workspace at `root`, initialising its repository and its
    /// folders on first use.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ClerkError::MissingFolder(root));
        }

        let config = load_workspace_config(&root)?;
        let history = GitHistory::open_or_init(&root, &config.committer)?;

        for folder in [
            &config.folders.transactions,
            &config.folders.receipts,
            &config.folders.edits,
        ] {
            let path = root.join(folder);
            if !path.is_dir() {
                info!(folder = %path.display(), "creating workspace folder");
                fs::create_dir_all(&path).map_err(|e| ClerkError::io(&path, e))?;
            }
        }

        Ok(Workspace {
            root,
            config,
            history,
            tables: CsvTables,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn history(&self) -> &GitHistory {
        &self.history
    }

    pub fn edits_folder(&self) -> Result<EditsFolder> {
        EditsFolder::open(self.root.join(&self.config.folders.edits))
    }

    /// Commit every change to the workspace files so the run that follows
    /// has a revision to tag its snapshot with. Snapshots themselves are
    /// kept out of history. Returns the new revision, or None when there was
    /// nothing to commit.
    pub fn acknowledge_changes(&self) -> Result<Option<RevisionId>> {
        self.history
            .exclude(&format!("/{}/", self.config.folders.edits))?;
        self.history.commit_all(ACKNOWLEDGE_MESSAGE)
    }

    pub fn current_revision(&self) -> Result<RevisionId> {
        current_revision(&self.history)
    }

    /// One row per source file below the transactions folder, stamped with
    /// the current revision.
    pub fn list_transaction_files(&self) -> Result<Vec<TransactionFileRow>> {
        let revision = self.current_revision()?;
        let folder = self.root.join(&self.config.folders.transactions);

        Ok(list_files(&folder, &self.root)?
            .into_iter()
            .map(|entry| {
                let mut row = TransactionFileRow::new(&entry.path, &entry.name);
                row.metadata = Some(entry.metadata);
                row.history_reference = Some(revision.clone());
                row
            })
            .collect())
    }

    /// One row per document below the receipts folder. Receipts carry a
    /// single user column, `Ignore`, which starts out empty.
    pub fn list_receipt_files(&self) -> Result<Table> {
        let revision = self.current_revision()?;
        let folder = self.root.join(&self.config.folders.receipts);

        let mut table = Table::new(
            [FILE_NAME, FILE_PATH, RECEIPT_IGNORE, FILE_METADATA, HISTORY_REFERENCE]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        );
        for entry in list_files(&folder, &self.root)? {
            table.push_row(vec![
                Some(entry.name),
                Some(entry.path),
                None,
                serde_json::to_string(&entry.metadata).ok(),
                Some(revision.to_string()),
            ]);
        }
        Ok(table)
    }

    /// Absolute location of a `@/...` path.
    pub fn file_on_disk(&self, path: &CanonicalPath) -> PathBuf {
        path.on_disk(&self.root)
    }

    pub fn reconciler(&self) -> Result<Reconciler<'_>> {
        Ok(Reconciler::new(
            &self.history,
            &self.tables,
            self.edits_folder()?,
            &self.config.exports,
        ))
    }
}
