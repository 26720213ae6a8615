use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.70;
pub const DEFAULT_RESTORE_TAG: &str = "pre_restore";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for the patch engine.
///
/// Every field has a default, so a config file only needs the keys it changes:
///
/// ```toml
/// match_threshold = 0.8
/// max_blocks = 1
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A window must score strictly above this ratio to count as a match.
    pub match_threshold: f64,
    /// SEARCH/REPLACE blocks honored per diff; extra blocks are ignored.
    pub max_blocks: usize,
    /// Patch the string field of JSON memory documents instead of raw text.
    pub json_documents: bool,
    /// Name of the string field patched inside a JSON memory document.
    pub json_data_field: String,
    /// Tag given to the safety backup taken before every restore.
    pub restore_tag: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            max_blocks: 1,
            json_documents: true,
            json_data_field: "data".to_string(),
            restore_tag: DEFAULT_RESTORE_TAG.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load a TOML config file and validate it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.match_threshold) {
            return Err(ConfigError::Invalid(format!(
                "match_threshold must be in [0, 1), got {}",
                self.match_threshold
            )));
        }
        if self.max_blocks == 0 {
            return Err(ConfigError::Invalid("max_blocks must be at least 1".into()));
        }
        if self.json_data_field.is_empty() {
            return Err(ConfigError::Invalid("json_data_field must not be empty".into()));
        }
        Ok(())
    }
}
