use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::domain::entities::row::RowSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    NotFound(PathBuf),
    Io { path: PathBuf, message: String },
    Format { path: PathBuf, message: String },
}

impl SourceError {
    pub fn io(path: &Path, err: impl std::fmt::Display) -> Self {
        SourceError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn format(path: &Path, err: impl std::fmt::Display) -> Self {
        SourceError::Format {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::NotFound(path) => write!(f, "file not found: {}", path.display()),
            SourceError::Io { path, message } => {
                write!(f, "cannot access {}: {message}", path.display())
            }
            SourceError::Format { path, message } => {
                write!(f, "invalid spreadsheet {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for SourceError {}

/// A file-backed table whose first row is the header.
pub trait TabularSource: Send + Sync {
    fn path(&self) -> &Path;

    fn read(&self) -> Result<RowSet, SourceError>;
    /// Replaces the whole file, header included.
    fn write(&self, rows: &RowSet) -> Result<(), SourceError>;

    fn exists(&self) -> bool {
        self.path().is_file()
    }

    fn modified(&self) -> Result<SystemTime, SourceError> {
        std::fs::metadata(self.path())
            .and_then(|meta| meta.modified())
            .map_err(|err| SourceError::io(self.path(), err))
    }

    fn content(&self) -> Result<Vec<u8>, SourceError> {
        std::fs::read(self.path()).map_err(|err| SourceError::io(self.path(), err))
    }
}
