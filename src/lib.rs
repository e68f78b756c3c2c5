// Clerk Edits - Core Library
// Versioned reconciliation of user edits across processing runs.
// Exposes all modules for use in the CLI and in tests.

pub mod config;
pub mod error;
pub mod files;
pub mod git;
pub mod identity;
pub mod merge;     // Two-snapshot rename-aware outer join
pub mod propagate; // Carry edits forward across every snapshot
pub mod reconcile;
pub mod records;
pub mod revision;
pub mod snapshot;
pub mod table;
pub mod workspace;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{load_workspace_config, WorkspaceConfig};
pub use error::{ClerkError, Result};
pub use git::GitHistory;
pub use identity::{CanonicalPath, JoinKey, TransactionOrdinal};
pub use merge::{merge, MergedRow, PriorSnapshot};
pub use propagate::propagate;
pub use reconcile::{ReconciledView, Reconciler};
pub use records::{
    EditableColumn, Edits, Record, RecordType, TransactionColumn, TransactionFileColumn,
    TransactionFileRow, TransactionRow,
};
pub use revision::{current_revision, rename_map, revision_of, History, RenameMap, RevisionId};
pub use snapshot::{EditsFolder, SnapshotRef};
pub use table::{CsvTables, Table, TableStore};
pub use workspace::Workspace;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
