// 📂 File enumeration - deterministic walk + content fingerprints

use crate::error::{ClerkError, Result};
use crate::identity::folder_label;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

/// Size and content hashes of a file, exported as JSON in `File metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub size: u64,
    pub sha1sum: String,
    pub sha256sum: String,
}

/// One file found below a workspace folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    /// Root-relative folder in `File path` form (`@/Transactions/...`)
    pub path: String,
    pub metadata: FileMetadata,
}

/// Editor lock files and Finder droppings never count as source documents
pub fn is_ignored_file(file_name: &str) -> bool {
    file_name.contains(".DS_Store") || file_name.contains(".~lock")
}

/// Hash `path` in one pass with both digests.
pub fn file_metadata(path: &Path, size: u64) -> Result<FileMetadata> {
    let mut file = File::open(path).map_err(|e| ClerkError::io(path, e))?;
    let mut sha1 = Sha1::new();
    let mut sha256 = Sha256::new();
    let mut buffer = vec![0u8; 128 * 1024];
    loop {
        let n = file.read(&mut buffer).map_err(|e| ClerkError::io(path, e))?;
        if n == 0 {
            break;
        }
        sha1.update(&buffer[..n]);
        sha256.update(&buffer[..n]);
    }
    Ok(FileMetadata {
        size,
        sha1sum: format!("{:x}", sha1.finalize()),
        sha256sum: format!("{:x}", sha256.finalize()),
    })
}

/// Every non-ignored file below `folder` in depth-first walk order (entries
/// sorted by name), with `File path` relative to `workspace_root`. `.git`
/// directories are skipped.
pub fn list_files(folder: &Path, workspace_root: &Path) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();

    let walker = WalkDir::new(folder)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(folder).to_path_buf();
            ClerkError::io(path, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if is_ignored_file(&name) {
            continue;
        }

        let path = entry.path();
        let parent = path.parent().unwrap_or(folder);
        let relative = parent.strip_prefix(workspace_root).unwrap_or(parent);
        let size = entry
            .metadata()
            .map_err(|e| ClerkError::io(path, std::io::Error::other(e.to_string())))?
            .len();

        entries.push(FileEntry {
            name,
            path: folder_label(relative),
            metadata: file_metadata(path, size)?,
        });
    }

    Ok(entries)
}
