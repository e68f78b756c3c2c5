// ⚠️ Error taxonomy for the edit-reconciliation engine
//
// Configuration errors are fatal and never retried. "Not found" is NOT an
// error here: snapshot lookups return Ok(None) and the caller decides.

use std::path::PathBuf;

/// Errors raised by the library.
#[derive(Debug, thiserror::Error)]
pub enum ClerkError {
    /// Caller asked for a record type the engine does not know.
    #[error("record type '{0}' not recognized")]
    UnknownRecordType(String),

    /// A folder the workspace layout requires is missing.
    #[error("required folder missing: {}", .0.display())]
    MissingFolder(PathBuf),

    #[error("workspace config error at {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// A snapshot table could not be mapped onto typed rows.
    #[error("malformed table {}: {message}", .path.display())]
    Table { path: PathBuf, message: String },

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClerkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ClerkError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn table(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ClerkError::Table {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Configuration errors are caller mistakes, not runtime conditions.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ClerkError::UnknownRecordType(_) | ClerkError::MissingFolder(_) | ClerkError::Config { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ClerkError>;
