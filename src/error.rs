use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Nothing is stored at the requested path or prefix.
    #[error("not found: {0}")]
    NotFound(String),

    /// The path cannot be mapped onto the backend (absolute, escapes the root, ...).
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    /// I/O error from the underlying backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Failures of a patch, listing or restore call.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("File not found at {0}")]
    FileNotFound(String),

    #[error("Invalid diff format: {0}")]
    InvalidDiffFormat(String),

    #[error("Could not find a confident match for the SEARCH block")]
    NoConfidentMatch,

    #[error("Version {version} not found for {path}")]
    VersionNotFound { path: String, version: u32 },

    /// The backup history holds a number that cannot be read or extended.
    #[error("Version history of {path} is out of range: {detail}")]
    VersionOutOfRange { path: String, detail: String },

    /// The live file is not valid UTF-8 and cannot be patched as text.
    #[error("File at {0} is not valid UTF-8 text")]
    InvalidEncoding(String),

    /// A JSON memory document could not be decoded or re-encoded.
    #[error("Error processing JSON document {path}: {reason}")]
    InvalidDocument { path: String, reason: String },

    /// Restored bytes read back from storage differ from the backup.
    #[error("Integrity check failed after restoring {path}: expected {expected}, found {found}")]
    IntegrityMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type EditResult<T> = Result<T, EditError>;

/// Stable machine-readable code for an [`EditError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FileNotFound,
    InvalidDiffFormat,
    NoConfidentMatch,
    VersionNotFound,
    VersionOutOfRange,
    InvalidEncoding,
    InvalidDocument,
    IntegrityMismatch,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::FileNotFound => "file_not_found",
            ErrorKind::InvalidDiffFormat => "invalid_diff_format",
            ErrorKind::NoConfidentMatch => "no_confident_match",
            ErrorKind::VersionNotFound => "version_not_found",
            ErrorKind::VersionOutOfRange => "version_out_of_range",
            ErrorKind::InvalidEncoding => "invalid_encoding",
            ErrorKind::InvalidDocument => "invalid_document",
            ErrorKind::IntegrityMismatch => "integrity_mismatch",
            ErrorKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EditError::FileNotFound(_) => ErrorKind::FileNotFound,
            EditError::InvalidDiffFormat(_) => ErrorKind::InvalidDiffFormat,
            EditError::NoConfidentMatch => ErrorKind::NoConfidentMatch,
            EditError::VersionNotFound { .. } => ErrorKind::VersionNotFound,
            EditError::VersionOutOfRange { .. } => ErrorKind::VersionOutOfRange,
            EditError::InvalidEncoding(_) => ErrorKind::InvalidEncoding,
            EditError::InvalidDocument { .. } => ErrorKind::InvalidDocument,
            EditError::IntegrityMismatch { .. } => ErrorKind::IntegrityMismatch,
            EditError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Map a backend `NotFound` for `path` onto [`EditError::FileNotFound`].
    pub(crate) fn from_read(path: &str, err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => EditError::FileNotFound(path.to_string()),
            other => EditError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_are_snake_case() {
        assert_eq!(EditError::NoConfidentMatch.kind().as_str(), "no_confident_match");
        let err = EditError::VersionNotFound {
            path: "a.txt".into(),
            version: 3,
        };
        assert_eq!(err.kind(), ErrorKind::VersionNotFound);
        assert_eq!(err.to_string(), "Version 3 not found for a.txt");
        assert_eq!(
            serde_json::to_string(&ErrorKind::InvalidDiffFormat).unwrap(),
            "\"invalid_diff_format\""
        );
    }

    #[test]
    fn test_read_not_found_maps_to_file_not_found() {
        let err = EditError::from_read("notes.md", StorageError::NotFound("notes.md".into()));
        assert!(matches!(err, EditError::FileNotFound(ref p) if p == "notes.md"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = EditError::from_read("notes.md", StorageError::Io(io));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
