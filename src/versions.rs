//! Per-file backup history.
//!
//! Backups of `dir/name` live beside it under `dir/.name_versions/`, one file
//! per version, named `v{N}_{unix_seconds}[.{tag}].backup`. The version number
//! is derived from the names already present, so the history needs no index
//! file and stays gap-free as long as a single writer touches each path.

use std::num::ParseIntError;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DEFAULT_RESTORE_TAG;
use crate::error::{EditError, EditResult, StorageError};
use crate::storage::{self, Storage};
use crate::util;

static BACKUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v(\d+)_(\d+)(?:\.([A-Za-z0-9_-]+))?\.backup$").expect("valid backup name regex")
});

/// An immutable snapshot of a file taken before it was mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// The live path this backup belongs to.
    pub path: String,
    pub version: u32,
    /// Unix seconds at which the backup was written.
    pub timestamp: i64,
    pub tag: Option<String>,
    /// Storage key holding the snapshot bytes.
    pub backup_key: String,
}

impl VersionRecord {
    /// Backup time as `%Y-%m-%d %H:%M:%S` (UTC).
    pub fn date(&self) -> String {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

/// One line of a version listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionEntry {
    /// The live file; not a stored backup.
    Current { path: String },
    Backup(VersionRecord),
}

impl VersionEntry {
    pub fn record(&self) -> Option<&VersionRecord> {
        match self {
            VersionEntry::Current { .. } => None,
            VersionEntry::Backup(record) => Some(record),
        }
    }
}

/// Result of a successful restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreOutcome {
    pub restored_version: u32,
    /// Snapshot of the content that the restore overwrote, if the file existed.
    pub safety_backup: Option<VersionRecord>,
    /// BLAKE3 hex digest of the restored content.
    pub content_blake3: String,
}

/// Directory holding the backups of `path`.
pub fn versions_prefix_for(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((parent, name)) => format!("{}/.{}_versions", parent, name),
        None => format!(".{}_versions", path),
    }
}

/// Storage key of a backup.
pub fn backup_key_for(path: &str, version: u32, timestamp: i64, tag: Option<&str>) -> String {
    let tag_suffix = tag.map(|t| format!(".{}", t)).unwrap_or_default();
    format!(
        "{}/v{}_{}{}.backup",
        versions_prefix_for(path),
        version,
        timestamp,
        tag_suffix
    )
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
/// An empty tag means no tag.
pub fn sanitize_tag(tag: &str) -> Option<String> {
    if tag.is_empty() {
        return None;
    }
    Some(
        tag.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect(),
    )
}

/// Parse a backup file name into `(version, timestamp, tag)`.
///
/// Names outside the grammar (and `v0`) give `Ok(None)`. A name that matches
/// the grammar but whose digits overflow is an error, so it is never mistaken
/// for an unrelated file.
pub fn parse_backup_name(name: &str) -> Result<Option<(u32, i64, Option<String>)>, ParseIntError> {
    let Some(caps) = BACKUP_NAME.captures(name) else {
        return Ok(None);
    };
    let version: u32 = caps[1].parse()?;
    if version == 0 {
        return Ok(None);
    }
    let timestamp: i64 = caps[2].parse()?;
    let tag = caps.get(3).map(|m| m.as_str().to_string());
    Ok(Some((version, timestamp, tag)))
}

/// Backup history over an injected storage backend.
#[derive(Clone)]
pub struct VersionStore {
    storage: Arc<dyn Storage>,
    restore_tag: String,
}

impl VersionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            restore_tag: DEFAULT_RESTORE_TAG.to_string(),
        }
    }

    /// Override the tag given to the safety backup taken by [`restore`](Self::restore).
    pub fn with_restore_tag(mut self, tag: impl Into<String>) -> Self {
        self.restore_tag = tag.into();
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Every stored backup of `path`, in no particular order.
    async fn records(&self, path: &str) -> EditResult<Vec<VersionRecord>> {
        let prefix = versions_prefix_for(path);
        let entries = storage::list_or_empty(self.storage.as_ref(), &prefix).await?;
        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let parsed = parse_backup_name(&entry.name).map_err(|err| EditError::VersionOutOfRange {
                path: path.to_string(),
                detail: format!("{}: {}", entry.name, err),
            })?;
            let Some((version, timestamp, tag)) = parsed else {
                continue;
            };
            records.push(VersionRecord {
                path: path.to_string(),
                version,
                timestamp,
                tag,
                backup_key: format!("{}/{}", prefix, entry.name),
            });
        }
        Ok(records)
    }

    /// One more than the highest existing version of `path`, or 1.
    pub async fn next_version(&self, path: &str) -> EditResult<u32> {
        let highest = self
            .records(path)
            .await?
            .iter()
            .map(|r| r.version)
            .max()
            .unwrap_or(0);
        highest.checked_add(1).ok_or_else(|| EditError::VersionOutOfRange {
            path: path.to_string(),
            detail: format!("v{} is the last representable version", highest),
        })
    }

    /// Snapshot the current content of `path`.
    ///
    /// Returns `Ok(None)` when there is no file to back up.
    pub async fn create_backup(&self, path: &str, tag: Option<&str>) -> EditResult<Option<VersionRecord>> {
        let content = match self.storage.get_file(path).await {
            Ok(content) => content,
            Err(StorageError::NotFound(_)) => {
                debug!(path, "no live file, skipping backup");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let version = self.next_version(path).await?;
        let timestamp = Utc::now().timestamp();
        let tag = tag.and_then(sanitize_tag);
        let backup_key = backup_key_for(path, version, timestamp, tag.as_deref());

        self.storage.save_file(&content, &backup_key).await?;
        info!(path, version, tag = tag.as_deref().unwrap_or(""), "created backup");

        Ok(Some(VersionRecord {
            path: path.to_string(),
            version,
            timestamp,
            tag,
            backup_key,
        }))
    }

    /// Backups of `path` newest first, preceded by the live file if it exists.
    pub async fn list_versions(&self, path: &str) -> EditResult<Vec<VersionEntry>> {
        let mut records = self.records(path).await?;
        records.sort_by(|a, b| b.version.cmp(&a.version));

        let mut entries = Vec::with_capacity(records.len() + 1);
        if self.storage.exists(path).await? {
            entries.push(VersionEntry::Current {
                path: path.to_string(),
            });
        }
        entries.extend(records.into_iter().map(VersionEntry::Backup));
        Ok(entries)
    }

    /// Content of a stored backup.
    pub async fn read_version(&self, path: &str, version: u32) -> EditResult<Vec<u8>> {
        let record = self.find(path, version).await?;
        self.storage
            .get_file(&record.backup_key)
            .await
            .map_err(|err| EditError::from_read(&record.backup_key, err))
    }

    async fn find(&self, path: &str, version: u32) -> EditResult<VersionRecord> {
        self.records(path)
            .await?
            .into_iter()
            .find(|r| r.version == version)
            .ok_or_else(|| EditError::VersionNotFound {
                path: path.to_string(),
                version,
            })
    }

    /// Overwrite `path` with the content of `version`.
    ///
    /// The content being replaced is backed up first, so a restore can itself
    /// be undone.
    pub async fn restore(&self, path: &str, version: u32) -> EditResult<RestoreOutcome> {
        let record = self.find(path, version).await?;

        let safety_backup = self.create_backup(path, Some(&self.restore_tag)).await?;

        let content = self
            .storage
            .get_file(&record.backup_key)
            .await
            .map_err(|err| EditError::from_read(&record.backup_key, err))?;
        let expected = util::hash_hex(&content);

        self.storage.save_file(&content, path).await?;

        let written = self
            .storage
            .get_file(path)
            .await
            .map_err(|err| EditError::from_read(path, err))?;
        let found = util::hash_hex(&written);
        if found != expected {
            return Err(EditError::IntegrityMismatch {
                path: path.to_string(),
                expected,
                found,
            });
        }

        info!(path, version, "restored version");
        Ok(RestoreOutcome {
            restored_version: version,
            safety_backup,
            content_blake3: expected,
        })
    }
}
