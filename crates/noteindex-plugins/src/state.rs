//! Durable plugin enabled/disabled flags.
//!
//! A flat `name -> bool` mapping loaded once at engine open and written back
//! on every toggle.

use async_trait::async_trait;
use noteindex_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

pub type PluginStates = BTreeMap<String, bool>;

#[async_trait]
pub trait PluginStateStore: Send + Sync {
    async fn load(&self) -> Result<PluginStates>;
    async fn save(&self, states: &PluginStates) -> Result<()>;
}

/// JSON file store, written via temp file + rename.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PluginStateStore for JsonFileStateStore {
    async fn load(&self) -> Result<PluginStates> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PluginStates::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(states) => Ok(states),
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable plugin state file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(PluginStates::new())
            }
        }
    }

    async fn save(&self, states: &PluginStates) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(states)
            .map_err(|e| Error::parse_error(format!("plugin states: {e}")))?;
        let temp = self
            .path
            .with_file_name(format!(".plugins-{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&temp, json).await?;
        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        log::debug!("Persisted {} plugin flags to {}", states.len(), self.path.display());
        Ok(())
    }
}

/// In-process store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: Mutex<PluginStates>,
}

impl MemoryStateStore {
    pub fn new(initial: PluginStates) -> Self {
        Self {
            states: Mutex::new(initial),
        }
    }

    pub fn snapshot(&self) -> PluginStates {
        self.states.lock().clone()
    }
}

#[async_trait]
impl PluginStateStore for MemoryStateStore {
    async fn load(&self) -> Result<PluginStates> {
        Ok(self.states.lock().clone())
    }

    async fn save(&self, states: &PluginStates) -> Result<()> {
        *self.states.lock() = states.clone();
        Ok(())
    }
}
