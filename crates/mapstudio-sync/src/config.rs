//! Studio configuration.

use mapstudio_core::{LayoutConfig, SourceType, TargetType};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PROJECT_CODE: &str = "MAPPER_DEMO_PROJECT";
pub const DEFAULT_MAPPING_VERSION: &str = "1.0.0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings of one studio session. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub project_code: String,
    pub mapping_version: String,
    pub source_type: SourceType,
    pub target_type: TargetType,
    /// Audit polling period.
    pub poll_interval_ms: u64,
    pub layout: LayoutConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            project_code: DEFAULT_PROJECT_CODE.to_string(),
            mapping_version: DEFAULT_MAPPING_VERSION.to_string(),
            source_type: SourceType::default(),
            target_type: TargetType::default(),
            poll_interval_ms: 2000,
            layout: LayoutConfig::default(),
        }
    }
}

impl StudioConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Project code for a snapshot; blank falls back to the default.
    pub fn effective_project_code(&self) -> &str {
        non_blank_or(&self.project_code, DEFAULT_PROJECT_CODE)
    }

    pub fn effective_mapping_version(&self) -> &str {
        non_blank_or(&self.mapping_version, DEFAULT_MAPPING_VERSION)
    }
}

fn non_blank_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    match value.trim() {
        "" => fallback,
        trimmed => trimmed,
    }
}
