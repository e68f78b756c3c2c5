use crate::error::{ClerkError, Result};
use crate::records::RecordType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Optional per-workspace config file, read from the workspace root
pub const CONFIG_FILE: &str = "clerk.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub folders: FolderConfig,
    #[serde(default)]
    pub exports: ExportConfig,
    #[serde(default)]
    pub committer: CommitterConfig,
}

/// Names of the workspace sub-folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderConfig {
    #[serde(default = "default_transactions_folder")]
    pub transactions: String,
    #[serde(default = "default_receipts_folder")]
    pub receipts: String,
    #[serde(default = "default_edits_folder")]
    pub edits: String,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            transactions: default_transactions_folder(),
            receipts: default_receipts_folder(),
            edits: default_edits_folder(),
        }
    }
}

/// File names of the per-record-type exports inside a snapshot directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_transaction_files_export")]
    pub transaction_files: String,
    #[serde(default = "default_transactions_export")]
    pub transactions: String,
}

impl ExportConfig {
    pub fn for_record_type(&self, record_type: RecordType) -> &str {
        match record_type {
            RecordType::TransactionFiles => &self.transaction_files,
            RecordType::Transactions => &self.transactions,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            transaction_files: default_transaction_files_export(),
            transactions: default_transactions_export(),
        }
    }
}

/// Identity used for automated commits in a freshly initialised workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitterConfig {
    #[serde(default = "default_committer_name")]
    pub name: String,
    #[serde(default = "default_committer_email")]
    pub email: String,
}

impl Default for CommitterConfig {
    fn default() -> Self {
        Self {
            name: default_committer_name(),
            email: default_committer_email(),
        }
    }
}

fn default_transactions_folder() -> String {
    "Transactions".to_string()
}

fn default_receipts_folder() -> String {
    "Receipts".to_string()
}

fn default_edits_folder() -> String {
    "Edits".to_string()
}

fn default_transaction_files_export() -> String {
    "Transaction files.csv".to_string()
}

fn default_transactions_export() -> String {
    "Transactions.csv".to_string()
}

fn default_committer_name() -> String {
    "Clerk.ai".to_string()
}

fn default_committer_email() -> String {
    "automation@clerk.ai".to_string()
}

/// Load `clerk.toml` from the workspace root; defaults when absent.
pub fn load_workspace_config(workspace_root: &Path) -> Result<WorkspaceConfig> {
    let path = workspace_root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(WorkspaceConfig::default());
    }

    let content = fs::read_to_string(&path).map_err(|e| ClerkError::io(&path, e))?;
    toml::from_str(&content).map_err(|e| ClerkError::Config {
        path,
        message: e.to_string(),
    })
}
