//! Engine configuration.
//!
//! Follows a builder pattern with validation; can be persisted as YAML.

use crate::error::{Error, Result};
use crate::resilience::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the root that holds engine state (never indexed)
pub const STATE_DIR: &str = ".noteindex";

const DEFAULT_MAX_NOTE_SIZE: u64 = 10 * 1024 * 1024;

/// Configuration for one note engine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Managed root directory
    pub root: PathBuf,
    /// Notes larger than this are rejected on write and skipped on scan
    pub max_note_size: u64,
    /// Durable plugin enabled/disabled flags; defaults to `<root>/.noteindex/plugins.json`
    pub plugin_state_file: Option<PathBuf>,
    /// Write load-hook transformations back to the store
    pub persist_load_transforms: bool,
    /// Spawn a background rebuild when an index update fails
    pub auto_rebuild_on_drift: bool,
    /// Retry policy for folder operations that hit lock contention
    pub folder_lock_retry: RetryConfig,
    pub search_max_matches_per_note: usize,
    pub search_context_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("notes"),
            max_note_size: DEFAULT_MAX_NOTE_SIZE,
            plugin_state_file: None,
            persist_load_transforms: false,
            auto_rebuild_on_drift: true,
            folder_lock_retry: RetryConfig::conservative(),
            search_max_matches_per_note: 3,
            search_context_chars: 200,
        }
    }
}

impl EngineConfig {
    pub fn builder(root: impl Into<PathBuf>) -> EngineConfigBuilder {
        EngineConfigBuilder::new(root)
    }

    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::config_error("Root path cannot be empty"));
        }
        if self.root.exists() && !self.root.is_dir() {
            return Err(Error::config_error(format!(
                "Root path is not a directory: {}",
                self.root.display()
            )));
        }
        if self.max_note_size == 0 {
            return Err(Error::config_error("max_note_size must be positive"));
        }
        if self.folder_lock_retry.max_attempts == 0 {
            return Err(Error::config_error(
                "folder_lock_retry.max_attempts must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn plugin_state_path(&self) -> PathBuf {
        self.plugin_state_file
            .clone()
            .unwrap_or_else(|| self.state_dir().join("plugins.json"))
    }

    pub async fn save_yaml(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| Error::config_error(format!("Failed to serialize config: {e}")))?;
        tokio::fs::write(path, yaml).await?;
        Ok(())
    }

    pub async fn load_yaml(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| Error::config_error(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Builder for [`EngineConfig`]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            config: EngineConfig {
                root: root.into(),
                ..EngineConfig::default()
            },
        }
    }

    pub fn max_note_size(mut self, bytes: u64) -> Self {
        self.config.max_note_size = bytes;
        self
    }

    pub fn plugin_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.plugin_state_file = Some(path.into());
        self
    }

    pub fn persist_load_transforms(mut self, enabled: bool) -> Self {
        self.config.persist_load_transforms = enabled;
        self
    }

    pub fn auto_rebuild_on_drift(mut self, enabled: bool) -> Self {
        self.config.auto_rebuild_on_drift = enabled;
        self
    }

    pub fn folder_lock_retry(mut self, retry: RetryConfig) -> Self {
        self.config.folder_lock_retry = retry;
        self
    }

    pub fn search_limits(mut self, max_matches: usize, context_chars: usize) -> Self {
        self.config.search_max_matches_per_note = max_matches;
        self.config.search_context_chars = context_chars;
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
