//! Byte-oriented storage collaborator.
//!
//! The engine never touches the filesystem directly; it reads and writes keys
//! through [`Storage`]. Keys are `/`-separated relative paths.

mod local;
mod memory;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// A stored file as reported by [`Storage::list_files`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Key relative to the listed prefix.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

/// Key/value file storage.
///
/// Implementations must satisfy:
/// - `save_file` creates or overwrites, creating any structure the key implies.
/// - `get_file` returns the exact bytes last saved, or `NotFound`.
/// - `list_files` returns `NotFound` when nothing exists under the prefix;
///   callers treat that the same as an empty listing.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_file(&self, path: &str) -> StorageResult<Vec<u8>>;

    async fn save_file(&self, data: &[u8], path: &str) -> StorageResult<()>;

    /// List every file stored below `prefix`, recursively.
    async fn list_files(&self, prefix: &str) -> StorageResult<Vec<FileEntry>>;

    /// Whether a file is stored at `path`.
    ///
    /// The default implementation reads the whole file; backends should
    /// override it when they can answer more cheaply.
    async fn exists(&self, path: &str) -> StorageResult<bool> {
        match self.get_file(path).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// `list_files` with `NotFound` folded into an empty listing.
pub(crate) async fn list_or_empty(storage: &dyn Storage, prefix: &str) -> StorageResult<Vec<FileEntry>> {
    match storage.list_files(prefix).await {
        Ok(entries) => Ok(entries),
        Err(StorageError::NotFound(_)) => Ok(Vec::new()),
        Err(err) => Err(err),
    }
}
