use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{FileEntry, Storage};
use crate::error::{StorageError, StorageResult};
use crate::util;

/// Storage rooted at a local directory.
///
/// Keys are resolved below the root; absolute keys and `..` components are
/// rejected so a key can never address a file outside it.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage isolated to `root/<session_id>`.
    pub fn with_session(root: impl Into<PathBuf>, session_id: &str) -> StorageResult<Self> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidPath(format!("session id '{}'", session_id)));
        }
        Ok(Self::new(root.into().join(session_id)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        let mut full = self.root.clone();
        for component in Path::new(key).components() {
            match component {
                Component::Normal(part) => full.push(part),
                Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(key.to_string())),
            }
        }
        Ok(full)
    }
}

fn not_found_as(key: &str, err: io::Error) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn get_file(&self, path: &str) -> StorageResult<Vec<u8>> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StorageError::NotFound(path.to_string())),
            Err(err) => return Err(not_found_as(path, err)),
        }
        let data = tokio::task::spawn_blocking(move || util::read_mapped(&full))
            .await
            .map_err(io::Error::other)?
            .map_err(|err| not_found_as(path, err))?;
        Ok(data)
    }

    async fn save_file(&self, data: &[u8], path: &str) -> StorageResult<()> {
        let full = self.resolve(path)?;
        if full == self.root {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, data).await?;
        debug!(path, bytes = data.len(), "saved file");
        Ok(())
    }

    async fn list_files(&self, prefix: &str) -> StorageResult<Vec<FileEntry>> {
        let dir = self.resolve(prefix)?;
        if !tokio::fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(StorageError::NotFound(prefix.to_string()));
        }
        let entries = tokio::task::spawn_blocking(move || util::walk_files(&dir))
            .await
            .map_err(io::Error::other)??;
        if entries.is_empty() {
            return Err(StorageError::NotFound(prefix.to_string()));
        }
        Ok(entries)
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.save_file(b"deep", "a/b/c.txt").await.unwrap();
        assert_eq!(storage.get_file("a/b/c.txt").await.unwrap(), b"deep");
        assert!(dir.path().join("a/b/c.txt").is_file());
    }

    #[tokio::test]
    async fn test_missing_file_and_directory_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        std::fs::create_dir_all(dir.path().join("folder")).unwrap();
        assert!(matches!(
            storage.get_file("missing.txt").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.get_file("folder").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!storage.exists("folder").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(matches!(
            storage.save_file(b"x", "../outside.txt").await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            storage.get_file("/etc/passwd").await,
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_list_files_names_are_relative_to_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.save_file(b"1", ".a.txt_versions/v1_100.backup").await.unwrap();
        storage.save_file(b"2", ".a.txt_versions/v2_101.tag.backup").await.unwrap();

        let entries = storage.list_files(".a.txt_versions").await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["v1_100.backup", "v2_101.tag.backup"]);

        assert!(matches!(
            storage.list_files(".b.txt_versions").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let alice = LocalStorage::with_session(dir.path(), "alice").unwrap();
        let bob = LocalStorage::with_session(dir.path(), "bob").unwrap();
        alice.save_file(b"a", "notes.txt").await.unwrap();
        assert!(!bob.exists("notes.txt").await.unwrap());
        assert!(LocalStorage::with_session(dir.path(), "../evil").is_err());
    }
}
