//! Plugin definitions available to an engine at open time.

use crate::builtin::{NormalizeLineEndings, NoteStats, TrailingWhitespace};
use crate::plugin::{Plugin, PluginResult};
use crate::registry::PluginRegistry;
use noteindex_core::MetricsRegistry;
use std::sync::Arc;

/// Ordered set of plugin definitions; order becomes dispatch order.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginCatalog {
    /// No plugins: every pipeline is the identity
    pub fn empty() -> Self {
        Self::default()
    }

    /// The plugins shipped with the engine
    pub fn builtin(metrics: &MetricsRegistry) -> Self {
        Self::empty()
            .with(Arc::new(NormalizeLineEndings))
            .with(Arc::new(TrailingWhitespace))
            .with(Arc::new(NoteStats::new(metrics)))
    }

    pub fn with(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Register every definition in order.
    ///
    /// A duplicate name is skipped with a warning so one bad definition does
    /// not keep the engine from opening.
    pub fn discover(&self) -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        for plugin in &self.plugins {
            if let Err(e) = registry.register(Arc::clone(plugin)) {
                log::warn!("Skipping plugin definition: {}", e);
            }
        }
        registry
    }

    /// Like [`discover`](Self::discover) but fails on the first duplicate
    pub fn discover_strict(&self) -> PluginResult<PluginRegistry> {
        let mut registry = PluginRegistry::new();
        for plugin in &self.plugins {
            registry.register(Arc::clone(plugin))?;
        }
        Ok(registry)
    }
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.manifest().name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{HookKind, PluginError};

    #[test]
    fn test_builtin_catalog() {
        let metrics = MetricsRegistry::new();
        let registry = PluginCatalog::builtin(&metrics).discover();
        let names: Vec<String> = registry.list().into_iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec!["normalize-line-endings", "trailing-whitespace", "note-stats"]
        );
        assert_eq!(registry.is_enabled("trailing-whitespace"), Some(false));
        let save: Vec<String> = registry
            .handlers_for(HookKind::Save)
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(save, vec!["normalize-line-endings", "note-stats"]);
    }

    #[test]
    fn test_duplicates() {
        let catalog = PluginCatalog::empty()
            .with(Arc::new(TrailingWhitespace))
            .with(Arc::new(TrailingWhitespace));
        assert_eq!(catalog.discover().len(), 1);
        assert_eq!(
            catalog.discover_strict().err(),
            Some(PluginError::Duplicate("trailing-whitespace".into()))
        );
    }
}
