use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EditError, EditResult, ErrorKind};
use crate::matcher;
use crate::patch_format;
use crate::storage::Storage;
use crate::versions::{RestoreOutcome, VersionEntry, VersionRecord, VersionStore};

/// A request to patch one stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRequest {
    pub path: String,
    pub diff_text: String,
    pub tag: Option<String>,
}

impl PatchRequest {
    pub fn new(path: impl Into<String>, diff_text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            diff_text: diff_text.into(),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Result of [`PatchEngine::apply_diff`]. Failures are reported here, never as a panic or `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Backup taken before the edit was attempted. Present on failure too:
    /// backups are never rolled back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<VersionRecord>,
}

impl PatchOutcome {
    fn applied(backup: Option<VersionRecord>) -> Self {
        Self {
            success: true,
            error: None,
            error_kind: None,
            backup,
        }
    }

    fn failed(err: &EditError, backup: Option<VersionRecord>) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            backup,
        }
    }
}

/// What the patch is applied to: the whole file, or the text field of a JSON memory document.
enum Target {
    Raw(String),
    Document { doc: Value, text: String },
}

impl Target {
    fn text(&self) -> &str {
        match self {
            Target::Raw(text) => text.as_str(),
            Target::Document { text, .. } => text.as_str(),
        }
    }
}

/// Applies SEARCH/REPLACE diffs to stored files, backing each file up first.
#[derive(Clone)]
pub struct PatchEngine {
    versions: VersionStore,
    config: EngineConfig,
}

impl PatchEngine {
    pub fn new(storage: Arc<dyn Storage>, config: EngineConfig) -> Self {
        let versions = VersionStore::new(storage).with_restore_tag(config.restore_tag.clone());
        Self { versions, config }
    }

    pub fn with_defaults(storage: Arc<dyn Storage>) -> Self {
        Self::new(storage, EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    /// Apply the diff in `request` to the file it names.
    ///
    /// Steps run strictly in order: LOAD, BACKUP, PARSE, MATCH, SUBSTITUTE,
    /// SAVE. A missing file fails before anything is written. Every later
    /// failure leaves the backup from the BACKUP step in place.
    pub async fn apply_diff(&self, request: &PatchRequest) -> PatchOutcome {
        let mut backup = None;
        match self.run(request, &mut backup).await {
            Ok(()) => PatchOutcome::applied(backup),
            Err(err) => {
                warn!(path = %request.path, kind = %err.kind(), "patch not applied: {}", err);
                PatchOutcome::failed(&err, backup)
            }
        }
    }

    async fn run(&self, request: &PatchRequest, backup: &mut Option<VersionRecord>) -> EditResult<()> {
        let path = request.path.as_str();
        let storage = self.versions.storage();

        // LOAD
        let raw = storage
            .get_file(path)
            .await
            .map_err(|err| EditError::from_read(path, err))?;
        let target = self.load_target(path, raw)?;

        // BACKUP
        *backup = self.versions.create_backup(path, request.tag.as_deref()).await?;

        // PARSE
        let blocks = patch_format::parse_blocks(&request.diff_text, self.config.max_blocks)?;

        // MATCH + SUBSTITUTE
        let mut text = target.text().to_string();
        for block in &blocks {
            let found = matcher::locate(&block.search, &text, self.config.match_threshold)
                .ok_or(EditError::NoConfidentMatch)?;
            debug!(
                path,
                ratio = found.ratio,
                start_line = found.start_line,
                lines = found.line_count,
                "matched SEARCH block"
            );
            // Replaces the first occurrence of the matched text, which is not
            // necessarily the window that scored best if the same text recurs earlier.
            text = text.replacen(&found.text, &block.replace, 1);
        }

        // SAVE
        let bytes = match target {
            Target::Raw(_) => text.into_bytes(),
            Target::Document { mut doc, .. } => {
                doc[self.config.json_data_field.as_str()] = Value::String(text);
                serde_json::to_vec_pretty(&doc).map_err(|err| EditError::InvalidDocument {
                    path: path.to_string(),
                    reason: err.to_string(),
                })?
            }
        };
        storage.save_file(&bytes, path).await?;

        info!(path, blocks = blocks.len(), "patch applied");
        Ok(())
    }

    fn load_target(&self, path: &str, raw: Vec<u8>) -> EditResult<Target> {
        let text = String::from_utf8(raw).map_err(|_| EditError::InvalidEncoding(path.to_string()))?;

        if self.config.json_documents && path.ends_with(".json") {
            if let Ok(doc) = serde_json::from_str::<Value>(&text) {
                let field = doc
                    .get(self.config.json_data_field.as_str())
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if let Some(field) = field {
                    debug!(path, field = %self.config.json_data_field, "patching JSON memory document");
                    return Ok(Target::Document { doc, text: field });
                }
            }
        }

        Ok(Target::Raw(text))
    }

    /// Backups of `path`, newest first, preceded by the live file if it exists.
    pub async fn list_versions(&self, path: &str) -> EditResult<Vec<VersionEntry>> {
        self.versions.list_versions(path).await
    }

    /// Overwrite `path` with a stored version, backing up the current content first.
    pub async fn restore(&self, path: &str, version: u32) -> EditResult<RestoreOutcome> {
        self.versions.restore(path, version).await
    }
}
