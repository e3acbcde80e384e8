//! Ordered plugin registry.
//!
//! Registration order is dispatch order. Each entry records the hook kinds
//! the plugin declared at registration time; dispatch consults that record
//! and never probes the plugin itself.

use crate::plugin::{HookKind, Plugin, PluginError, PluginManifest, PluginResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Public view of one registration, as returned by `list_plugins`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub enabled: bool,
    pub hooks: BTreeSet<HookKind>,
}

struct Registration {
    plugin: Arc<dyn Plugin>,
    manifest: PluginManifest,
    enabled: bool,
}

/// A plugin selected for one dispatch
#[derive(Clone)]
pub struct Handler {
    pub name: String,
    pub plugin: Arc<dyn Plugin>,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").field("name", &self.name).finish()
    }
}

/// Registered plugins in dispatch order
#[derive(Default)]
pub struct PluginRegistry {
    entries: Vec<Registration>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin; names are unique.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> PluginResult<()> {
        let manifest = plugin.manifest();
        if self.position(&manifest.name).is_some() {
            return Err(PluginError::Duplicate(manifest.name));
        }
        log::info!(
            "Registered plugin {} v{} (hooks: {})",
            manifest.name,
            manifest.version,
            manifest
                .hooks
                .iter()
                .map(|h| h.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.entries.push(Registration {
            enabled: manifest.enabled_by_default,
            plugin,
            manifest,
        });
        Ok(())
    }

    /// Apply persisted flags; names with no registration are ignored.
    pub fn apply_states(&mut self, states: &BTreeMap<String, bool>) {
        for entry in &mut self.entries {
            if let Some(enabled) = states.get(&entry.manifest.name) {
                entry.enabled = *enabled;
            }
        }
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> PluginResult<()> {
        let index = self
            .position(name)
            .ok_or_else(|| PluginError::Unknown(name.to_string()))?;
        self.entries[index].enabled = enabled;
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.position(name).map(|i| self.entries[i].enabled)
    }

    /// Current enabled flag for every registration
    pub fn states(&self) -> BTreeMap<String, bool> {
        self.entries
            .iter()
            .map(|e| (e.manifest.name.clone(), e.enabled))
            .collect()
    }

    pub fn list(&self) -> Vec<PluginInfo> {
        self.entries
            .iter()
            .map(|e| PluginInfo {
                name: e.manifest.name.clone(),
                version: e.manifest.version.clone(),
                description: e.manifest.description.clone(),
                enabled: e.enabled,
                hooks: e.manifest.hooks.clone(),
            })
            .collect()
    }

    /// Enabled plugins declaring `kind`, in registration order.
    ///
    /// Returns owned handles so callers can release the registry lock before
    /// running any hook.
    pub fn handlers_for(&self, kind: HookKind) -> Vec<Handler> {
        self.entries
            .iter()
            .filter(|e| e.enabled && e.manifest.hooks.contains(&kind))
            .map(|e| Handler {
                name: e.manifest.name.clone(),
                plugin: Arc::clone(&e.plugin),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.manifest.name == name)
    }
}
