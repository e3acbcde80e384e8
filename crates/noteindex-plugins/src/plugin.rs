//! Plugin capability interface.
//!
//! A plugin declares the hooks it implements in its [`PluginManifest`]; the
//! registry reads that set once at registration and only ever dispatches the
//! declared hooks. Hook methods have no-op defaults so a plugin implements
//! just the ones it declares.

use noteindex_core::{NotePath, SearchHit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error as ThisError;

/// Lifecycle points at which plugins run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookKind {
    Create,
    Save,
    Load,
    Delete,
    Search,
    Startup,
}

impl HookKind {
    /// Create, save and load may rewrite content; the rest only observe.
    pub fn is_transform(self) -> bool {
        matches!(self, HookKind::Create | HookKind::Save | HookKind::Load)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HookKind::Create => "create",
            HookKind::Save => "save",
            HookKind::Load => "load",
            HookKind::Delete => "delete",
            HookKind::Search => "search",
            HookKind::Startup => "startup",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a content hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Replace the current content (an empty string is a valid replacement)
    Replace(String),
    /// Leave the current content as is
    NoChange,
}

/// Failure raised by a single hook
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    #[error("hook failed: {0}")]
    Failed(String),

    #[error("hook panicked: {0}")]
    Panicked(String),

    #[error("plugin already registered: {0}")]
    Duplicate(String),

    #[error("unknown plugin: {0}")]
    Unknown(String),
}

impl PluginError {
    pub fn failed(reason: impl Into<String>) -> Self {
        PluginError::Failed(reason.into())
    }
}

pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Static description of a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique key
    pub name: String,
    pub version: String,
    pub description: String,
    /// Hooks this plugin implements
    pub hooks: BTreeSet<HookKind>,
    /// Enabled state when no persisted flag exists
    pub enabled_by_default: bool,
}

impl PluginManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            hooks: BTreeSet::new(),
            enabled_by_default: true,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn hook(mut self, kind: HookKind) -> Self {
        self.hooks.insert(kind);
        self
    }

    pub fn disabled_by_default(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }
}

/// A content plugin.
///
/// Hooks run synchronously on the request path and must not block.
pub trait Plugin: Send + Sync {
    fn manifest(&self) -> PluginManifest;

    fn on_create(&self, _path: &NotePath, _content: &str) -> PluginResult<HookOutcome> {
        Ok(HookOutcome::NoChange)
    }

    fn on_save(&self, _path: &NotePath, _content: &str) -> PluginResult<HookOutcome> {
        Ok(HookOutcome::NoChange)
    }

    fn on_load(&self, _path: &NotePath, _content: &str) -> PluginResult<HookOutcome> {
        Ok(HookOutcome::NoChange)
    }

    fn on_delete(&self, _path: &NotePath) -> PluginResult<()> {
        Ok(())
    }

    fn on_search(&self, _query: &str, _results: &[SearchHit]) -> PluginResult<()> {
        Ok(())
    }

    fn on_startup(&self) -> PluginResult<()> {
        Ok(())
    }
}
