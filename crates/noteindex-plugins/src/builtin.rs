//! Plugins shipped with the engine.

use crate::plugin::{HookKind, HookOutcome, Plugin, PluginManifest, PluginResult};
use noteindex_core::{Counter, MetricsRegistry, NotePath, SearchHit};

/// Converts CRLF and lone CR line endings to LF on create and save
#[derive(Debug, Default)]
pub struct NormalizeLineEndings;

impl NormalizeLineEndings {
    pub const NAME: &'static str = "normalize-line-endings";

    fn normalize(content: &str) -> HookOutcome {
        if !content.contains('\r') {
            return HookOutcome::NoChange;
        }
        HookOutcome::Replace(content.replace("\r\n", "\n").replace('\r', "\n"))
    }
}

impl Plugin for NormalizeLineEndings {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new(Self::NAME, env!("CARGO_PKG_VERSION"))
            .description("Convert CRLF line endings to LF")
            .hook(HookKind::Create)
            .hook(HookKind::Save)
    }

    fn on_create(&self, _path: &NotePath, content: &str) -> PluginResult<HookOutcome> {
        Ok(Self::normalize(content))
    }

    fn on_save(&self, _path: &NotePath, content: &str) -> PluginResult<HookOutcome> {
        Ok(Self::normalize(content))
    }
}

/// Strips trailing spaces and tabs from every line on save
#[derive(Debug, Default)]
pub struct TrailingWhitespace;

impl TrailingWhitespace {
    pub const NAME: &'static str = "trailing-whitespace";
}

impl Plugin for TrailingWhitespace {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new(Self::NAME, env!("CARGO_PKG_VERSION"))
            .description("Trim trailing whitespace from each line")
            .hook(HookKind::Save)
            .disabled_by_default()
    }

    fn on_save(&self, _path: &NotePath, content: &str) -> PluginResult<HookOutcome> {
        let trimmed = content
            .split('\n')
            .map(|line| line.trim_end_matches([' ', '\t']))
            .collect::<Vec<_>>()
            .join("\n");
        if trimmed == content {
            return Ok(HookOutcome::NoChange);
        }
        Ok(HookOutcome::Replace(trimmed))
    }
}

/// Observe-only activity counters
#[derive(Debug)]
pub struct NoteStats {
    creates: Counter,
    saves: Counter,
    deletes: Counter,
    searches: Counter,
}

impl NoteStats {
    pub const NAME: &'static str = "note-stats";

    pub fn new(metrics: &MetricsRegistry) -> Self {
        Self {
            creates: metrics.counter("plugin.note_stats.creates"),
            saves: metrics.counter("plugin.note_stats.saves"),
            deletes: metrics.counter("plugin.note_stats.deletes"),
            searches: metrics.counter("plugin.note_stats.searches"),
        }
    }

    pub fn creates(&self) -> u64 {
        self.creates.value()
    }

    pub fn saves(&self) -> u64 {
        self.saves.value()
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.value()
    }

    pub fn searches(&self) -> u64 {
        self.searches.value()
    }
}

impl Plugin for NoteStats {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new(Self::NAME, env!("CARGO_PKG_VERSION"))
            .description("Count note creates, saves, deletes and searches")
            .hook(HookKind::Create)
            .hook(HookKind::Save)
            .hook(HookKind::Delete)
            .hook(HookKind::Search)
    }

    fn on_create(&self, _path: &NotePath, _content: &str) -> PluginResult<HookOutcome> {
        self.creates.increment();
        Ok(HookOutcome::NoChange)
    }

    fn on_save(&self, _path: &NotePath, _content: &str) -> PluginResult<HookOutcome> {
        self.saves.increment();
        Ok(HookOutcome::NoChange)
    }

    fn on_delete(&self, _path: &NotePath) -> PluginResult<()> {
        self.deletes.increment();
        Ok(())
    }

    fn on_search(&self, _query: &str, _results: &[SearchHit]) -> PluginResult<()> {
        self.searches.increment();
        Ok(())
    }
}
