use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{FileEntry, Storage};
use crate::error::{StorageError, StorageResult};

/// In-memory storage keyed by path.
///
/// Intended for tests and embedding. Contents are cloned on read and write.
#[derive(Default)]
pub struct MemoryStorage {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `files`.
    pub fn with_files<I, K, V>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let map = files
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            files: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.files.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().expect("lock poisoned").is_empty()
    }

    /// All stored keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.files.read().expect("lock poisoned").keys().cloned().collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_file(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.files
            .read()
            .expect("lock poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn save_file(&self, data: &[u8], path: &str) -> StorageResult<()> {
        if path.is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        self.files
            .write()
            .expect("lock poisoned")
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn list_files(&self, prefix: &str) -> StorageResult<Vec<FileEntry>> {
        let dir = prefix.trim_end_matches('/');
        let files = self.files.read().expect("lock poisoned");
        let entries: Vec<FileEntry> = files
            .iter()
            .filter_map(|(key, data)| {
                let name = if dir.is_empty() {
                    key.as_str()
                } else {
                    key.strip_prefix(dir)?.strip_prefix('/')?
                };
                Some(FileEntry {
                    name: name.to_string(),
                    size: data.len() as u64,
                })
            })
            .collect();

        if entries.is_empty() {
            return Err(StorageError::NotFound(prefix.to_string()));
        }
        Ok(entries)
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(self.files.read().expect("lock poisoned").contains_key(path))
    }
}
