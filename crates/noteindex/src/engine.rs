//! Index coordinator.
//!
//! [`NoteEngine`] is the only mutating entry point. Every mutation runs
//! validate -> lock -> plugin pipeline -> persist -> update indexes, and the
//! indexes are touched only after the store write succeeded. An index update
//! that fails after a successful write is logged as drift and repaired by a
//! background rebuild; the caller still gets the committed result.

use crate::indexes::{IndexedNote, Indexes};
use crate::locks::{LockManager, LockScope};
use noteindex_core::prelude::*;
use noteindex_core::{MetricsRegistry, MetricsSnapshot, retry_with_backoff};
use noteindex_graph::{GraphSnapshot, GraphStats};
use noteindex_parser::ParsedNote;
use noteindex_plugins::pipeline::{self, Observation, PluginFailure};
use noteindex_plugins::{
    HookKind, JsonFileStateStore, PluginCatalog, PluginInfo, PluginRegistry, PluginStateStore,
};
use noteindex_search::SnippetOptions;
use noteindex_store::NoteStore;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Outcome of a full rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildStatus {
    Completed,
    /// Cancelled before the swap; the previous indexes are still live
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub status: RebuildStatus,
    /// Notes indexed after the swap
    pub notes: usize,
    /// Notes re-read because they changed while the rebuild ran
    pub resynced: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovedNote {
    pub from: NotePath,
    pub to: NotePath,
}

/// Result of moving or renaming a folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderMove {
    pub from: FolderPath,
    pub to: FolderPath,
    pub notes: Vec<MovedNote>,
}

struct EngineInner {
    config: EngineConfig,
    store: NoteStore,
    locks: LockManager,
    /// Mutations share it; the rebuild swap takes it exclusively
    gate: tokio::sync::RwLock<()>,
    indexes: RwLock<Indexes>,
    plugins: RwLock<PluginRegistry>,
    plugin_state: Arc<dyn PluginStateStore>,
    toggle_lock: tokio::sync::Mutex<()>,
    rebuild_lock: tokio::sync::Mutex<()>,
    /// Paths mutated while a rebuild is scanning; `None` when idle
    journal: Mutex<Option<BTreeSet<NotePath>>>,
    rebuild_pending: AtomicBool,
    drifted: AtomicBool,
    shutdown: CancellationToken,
    metrics: Arc<MetricsRegistry>,
}

/// Builder for [`NoteEngine`]
pub struct EngineBuilder {
    config: EngineConfig,
    catalog: Option<PluginCatalog>,
    plugin_state: Option<Arc<dyn PluginStateStore>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl EngineBuilder {
    /// Plugin definitions to register; defaults to the built-in set
    pub fn plugins(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Durable plugin flags; defaults to a JSON file under the state directory
    pub fn plugin_state(mut self, store: Arc<dyn PluginStateStore>) -> Self {
        self.plugin_state = Some(store);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Open the store, register plugins, build the indexes and run startup hooks.
    #[instrument(skip(self), fields(root = ?self.config.root), name = "engine_open")]
    pub async fn open(self) -> Result<NoteEngine> {
        self.config.validate()?;
        let store = NoteStore::open(&self.config).await?;
        let metrics = self.metrics.unwrap_or_default();
        let catalog = self
            .catalog
            .unwrap_or_else(|| PluginCatalog::builtin(&metrics));
        let plugin_state: Arc<dyn PluginStateStore> = match self.plugin_state {
            Some(store) => store,
            None => Arc::new(JsonFileStateStore::new(self.config.plugin_state_path())),
        };

        let mut registry = catalog.discover();
        registry.apply_states(&plugin_state.load().await?);

        let options = SnippetOptions {
            max_matches: self.config.search_max_matches_per_note,
            context_chars: self.config.search_context_chars,
        };
        let engine = NoteEngine {
            inner: Arc::new(EngineInner {
                config: self.config,
                store,
                locks: LockManager::new(),
                gate: tokio::sync::RwLock::new(()),
                indexes: RwLock::new(Indexes::empty(options)),
                plugins: RwLock::new(registry),
                plugin_state,
                toggle_lock: tokio::sync::Mutex::new(()),
                rebuild_lock: tokio::sync::Mutex::new(()),
                journal: Mutex::new(None),
                rebuild_pending: AtomicBool::new(false),
                drifted: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                metrics,
            }),
        };

        let report = engine.rebuild_with(CancellationToken::new()).await?;
        engine.notify(Observation::Startup);
        log::info!(
            "Note engine ready at {} ({} notes, {} plugins)",
            engine.inner.store.root().display(),
            report.notes,
            engine.inner.plugins.read().len()
        );
        Ok(engine)
    }
}

/// Coordinates the store, the derived indexes and the plugin pipeline.
///
/// Cheap to clone; clones share one engine.
#[derive(Clone)]
pub struct NoteEngine {
    inner: Arc<EngineInner>,
}

impl NoteEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            catalog: None,
            plugin_state: None,
            metrics: None,
        }
    }

    /// Open with the built-in plugins and file-backed plugin flags
    pub async fn open(config: EngineConfig) -> Result<Self> {
        Self::builder(config).open().await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &NoteStore {
        &self.inner.store
    }

    // ==================== Notes ====================

    /// Every stored note, newest first
    pub async fn list_notes(&self) -> Result<Vec<NoteSummary>> {
        self.inner.store.list_notes().await
    }

    /// Read a note through the load pipeline.
    ///
    /// The transformed content is returned; it is written back only when
    /// `persist_load_transforms` is set.
    #[instrument(skip(self), name = "engine_get_note")]
    pub async fn get_note(&self, path: &str) -> Result<Note> {
        let path = PathValidator::note(path)?;
        let stored = self.inner.store.get(&path).await?;

        let handlers = self.inner.plugins.read().handlers_for(HookKind::Load);
        let report = pipeline::run_transform(HookKind::Load, &handlers, &path, stored.clone());
        self.record_failures(&report.failures);

        let persist = report.changed() && self.inner.config.persist_load_transforms;
        if persist {
            self.persist_load_transform(&path, &stored, &report.content)
                .await?;
        }

        let content = report.content;
        // Metadata describes what is on disk, not the transformed view
        let on_disk = if persist { &content } else { &stored };
        let metadata = self.inner.store.metadata(&path, on_disk).await?;
        let parsed = ParsedNote::parse(&content);
        let links = self
            .inner
            .indexes
            .read()
            .catalog
            .resolve_all(&path, &parsed.references);
        Ok(build_note(path, content, parsed, links, metadata))
    }

    /// Create or overwrite a note; returns the note as persisted.
    ///
    /// New notes run the create hooks, then the save hooks.
    #[instrument(skip(self, content), fields(size = content.len()), name = "engine_save_note")]
    pub async fn create_or_update_note(&self, path: &str, content: &str) -> Result<Note> {
        let path = PathValidator::note(path)?;
        let _timer = self.inner.metrics.histogram("engine.save_ms").timer();
        let _gate = self.inner.gate.read().await;
        let _scope = self.inner.locks.lock_notes(&[&path]).await;

        let existed = self.inner.store.exists(&path).await?;
        let content = self.run_content_hooks(&path, content, existed);
        let metadata = self.inner.store.put(&path, &content).await?;

        let note = IndexedNote::parse(path, content);
        let links = self
            .update_indexes(&[&note.path], |ix| {
                let delta = ix.apply_note(&note);
                log::debug!(
                    "Indexed {}: +{} -{} edges",
                    note.path,
                    delta.added.len(),
                    delta.removed.len()
                );
                ix.graph.outgoing_links(&note.path)
            })
            .unwrap_or_default();

        self.inner.metrics.counter("engine.saves").increment();
        log::info!(
            "{} note {}",
            if existed { "Updated" } else { "Created" },
            note.path
        );
        Ok(build_note(note.path, note.content, note.parsed, links, metadata))
    }

    #[instrument(skip(self), name = "engine_delete_note")]
    pub async fn delete_note(&self, path: &str) -> Result<()> {
        let path = PathValidator::note(path)?;
        let _gate = self.inner.gate.read().await;
        let _scope = self.inner.locks.lock_notes(&[&path]).await;

        self.inner.store.delete(&path).await?;
        if let Some(affected) = self.update_indexes(&[&path], |ix| ix.remove_note(&path))
            && !affected.is_empty()
        {
            log::debug!("{} notes now hold unresolved links to {}", affected.len(), path);
        }
        self.notify(Observation::Delete(&path));
        self.inner.metrics.counter("engine.deletes").increment();
        log::info!("Deleted note {}", path);
        Ok(())
    }

    /// Move a note, keeping its incoming and outgoing edges.
    ///
    /// Other notes' content is not rewritten.
    #[instrument(skip(self), name = "engine_move_note")]
    pub async fn move_note(&self, from: &str, to: &str) -> Result<NotePath> {
        let from = PathValidator::note(from)?;
        let to = PathValidator::note(to)?;
        let _gate = self.inner.gate.read().await;
        let _scope = self.inner.locks.lock_notes(&[&from, &to]).await;

        self.inner.store.move_note(&from, &to).await?;
        if from != to {
            self.update_indexes(&[&from, &to], |ix| ix.rename_note(&from, &to));
        }
        self.inner.metrics.counter("engine.moves").increment();
        log::info!("Moved note {} -> {}", from, to);
        Ok(to)
    }

    // ==================== Folders ====================

    pub fn list_folders(&self) -> Result<Vec<FolderPath>> {
        self.inner.store.list_folders()
    }

    #[instrument(skip(self), name = "engine_create_folder")]
    pub async fn create_folder(&self, path: &str) -> Result<FolderPath> {
        let folder = PathValidator::folder(path)?;
        let _gate = self.inner.gate.read().await;
        let _scope = self.lock_folders(&[&folder]).await?;
        self.inner.store.create_folder(&folder).await?;
        log::info!("Created folder {}", folder);
        Ok(folder)
    }

    /// Move a folder and every note under it.
    #[instrument(skip(self), name = "engine_move_folder")]
    pub async fn move_folder(&self, from: &str, to: &str) -> Result<FolderMove> {
        let from = PathValidator::folder(from)?;
        let to = PathValidator::folder(to)?;
        let _gate = self.inner.gate.read().await;
        let _scope = self.lock_folders(&[&from, &to]).await?;
        let moved = self.inner.store.move_folder(&from, &to).await?;
        Ok(self.reindex_folder_move(from, to, moved))
    }

    /// Rename the last segment of a folder path.
    #[instrument(skip(self), name = "engine_rename_folder")]
    pub async fn rename_folder(&self, from: &str, new_name: &str) -> Result<FolderMove> {
        let from = PathValidator::folder(from)?;
        let to = from.with_name(&PathValidator::segment(new_name)?);
        let _gate = self.inner.gate.read().await;
        let _scope = self.lock_folders(&[&from, &to]).await?;
        let moved = self.inner.store.rename_folder(&from, new_name).await?;
        Ok(self.reindex_folder_move(from, to, moved))
    }

    /// Delete a folder recursively; returns the removed notes.
    #[instrument(skip(self), name = "engine_delete_folder")]
    pub async fn delete_folder(&self, path: &str) -> Result<Vec<NotePath>> {
        let folder = PathValidator::folder(path)?;
        let _gate = self.inner.gate.read().await;
        let _scope = self.lock_folders(&[&folder]).await?;

        let removed = self.inner.store.delete_folder(&folder).await?;
        let touched: Vec<&NotePath> = removed.iter().collect();
        self.update_indexes(&touched, |ix| {
            for path in &removed {
                ix.remove_note(path)?;
            }
            Ok(())
        });
        for path in &removed {
            self.notify(Observation::Delete(path));
        }
        log::info!("Deleted folder {} ({} notes)", folder, removed.len());
        Ok(removed)
    }

    fn reindex_folder_move(
        &self,
        from: FolderPath,
        to: FolderPath,
        moved: Vec<(NotePath, NotePath)>,
    ) -> FolderMove {
        let touched: Vec<&NotePath> = moved.iter().flat_map(|(old, new)| [old, new]).collect();
        self.update_indexes(&touched, |ix| {
            for (old, new) in &moved {
                ix.rename_note(old, new)?;
            }
            Ok(())
        });
        log::info!("Moved folder {} -> {} ({} notes)", from, to, moved.len());
        FolderMove {
            from,
            to,
            notes: moved
                .into_iter()
                .map(|(from, to)| MovedNote { from, to })
                .collect(),
        }
    }

    /// Lock folder subtrees, backing off while another operation holds part of them.
    async fn lock_folders(&self, folders: &[&FolderPath]) -> Result<LockScope> {
        let inner = &self.inner;
        retry_with_backoff(&inner.config.folder_lock_retry, Error::is_contention, || {
            std::future::ready(inner.try_lock_folders(folders))
        })
        .await
    }

    // ==================== Queries ====================

    #[instrument(skip(self), name = "engine_search")]
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let _timer = self.inner.metrics.histogram("engine.search_ms").timer();
        let hits = self.inner.indexes.read().search.query(query);
        self.notify(Observation::Search {
            query,
            results: &hits,
        });
        self.inner.metrics.counter("engine.searches").increment();
        Ok(hits)
    }

    pub fn get_graph(&self) -> GraphSnapshot {
        self.inner.indexes.read().graph.snapshot()
    }

    pub fn backlinks(&self, path: &str) -> Result<Vec<NotePath>> {
        let path = PathValidator::note(path)?;
        self.inner.indexes.read().graph.backlinks(&path)
    }

    pub fn outgoing_links(&self, path: &str) -> Result<Vec<Link>> {
        let path = PathValidator::note(path)?;
        self.inner.indexes.read().graph.outgoing_links(&path)
    }

    pub fn graph_stats(&self) -> GraphStats {
        self.inner.indexes.read().graph.stats()
    }

    pub fn orphans(&self) -> Vec<NotePath> {
        self.inner.indexes.read().graph.orphans()
    }

    // ==================== Plugins ====================

    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        self.inner.plugins.read().list()
    }

    /// Enable or disable a plugin and persist the flag.
    ///
    /// If persisting fails the in-memory flag is restored.
    #[instrument(skip(self), name = "engine_toggle_plugin")]
    pub async fn toggle_plugin(&self, name: &str, enabled: bool) -> Result<PluginInfo> {
        let _serial = self.inner.toggle_lock.lock().await;
        let (previous, states) = {
            let mut registry = self.inner.plugins.write();
            let previous = registry
                .is_enabled(name)
                .ok_or_else(|| Error::not_found(format!("plugin '{name}'")))?;
            registry
                .set_enabled(name, enabled)
                .map_err(|_| Error::not_found(format!("plugin '{name}'")))?;
            (previous, registry.states())
        };

        if let Err(e) = self.inner.plugin_state.save(&states).await {
            let _ = self.inner.plugins.write().set_enabled(name, previous);
            return Err(e);
        }

        log::info!(
            "Plugin {} {}",
            name,
            if enabled { "enabled" } else { "disabled" }
        );
        self.inner
            .plugins
            .read()
            .list()
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::not_found(format!("plugin '{name}'")))
    }

    // ==================== Rebuild ====================

    /// Rebuild every index from the store.
    pub async fn rebuild(&self) -> Result<RebuildReport> {
        self.rebuild_with(self.inner.shutdown.child_token()).await
    }

    /// Rebuild, checking `cancel` between notes.
    ///
    /// New indexes are built on the side while reads keep using the old
    /// ones. Notes written during the scan are re-read right before the swap.
    #[instrument(skip_all, name = "engine_rebuild")]
    pub async fn rebuild_with(&self, cancel: CancellationToken) -> Result<RebuildReport> {
        let _running = self.inner.rebuild_lock.lock().await;
        let started = Instant::now();
        let _timer = self.inner.metrics.histogram("engine.rebuild_ms").timer();
        *self.inner.journal.lock() = Some(BTreeSet::new());

        let built = match self.scan_indexes(&cancel).await {
            Ok(Some(built)) => built,
            Ok(None) => {
                *self.inner.journal.lock() = None;
                log::info!("Rebuild cancelled; keeping previous indexes");
                return Ok(RebuildReport {
                    status: RebuildStatus::Cancelled,
                    notes: self.inner.indexes.read().note_count(),
                    resynced: 0,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
            Err(e) => {
                *self.inner.journal.lock() = None;
                return Err(e);
            }
        };

        let _gate = self.inner.gate.write().await;
        let dirty = self.inner.journal.lock().take().unwrap_or_default();
        let mut built = built;
        for path in &dirty {
            match self.inner.store.get(path).await {
                Ok(content) => {
                    built.apply_note(&IndexedNote::parse(path.clone(), content));
                }
                Err(Error::NotFound { .. }) => {
                    let _ = built.remove_note(path);
                }
                Err(e) => return Err(e),
            }
        }

        let notes = built.note_count();
        *self.inner.indexes.write() = built;
        self.inner.drifted.store(false, Ordering::SeqCst);

        let report = RebuildReport {
            status: RebuildStatus::Completed,
            notes,
            resynced: dirty.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        log::info!(
            "Rebuilt indexes: {} notes ({} resynced) in {}ms",
            report.notes,
            report.resynced,
            report.elapsed_ms
        );
        Ok(report)
    }

    /// True after an index update failed and before a rebuild repaired it
    pub fn is_drifted(&self) -> bool {
        self.inner.drifted.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Cancel background work (a running rebuild keeps the old indexes).
    pub fn close(&self) {
        self.inner.shutdown.cancel();
    }

    async fn scan_indexes(&self, cancel: &CancellationToken) -> Result<Option<Indexes>> {
        let paths = self.inner.store.note_paths()?;
        let mut notes = Vec::with_capacity(paths.len());
        for path in paths {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            match self.inner.store.get(&path).await {
                Ok(content) => notes.push(IndexedNote::parse(path, content)),
                Err(Error::NotFound { .. }) => continue,
                Err(Error::StoreIo(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                    log::warn!("Skipping {}: not valid UTF-8", path);
                }
                Err(e) => return Err(e),
            }
            tokio::task::yield_now().await;
        }
        if cancel.is_cancelled() {
            return Ok(None);
        }
        Ok(Some(Indexes::build(&notes, self.inner.snippet_options())))
    }

    // ==================== Internals ====================

    fn run_content_hooks(&self, path: &NotePath, content: &str, existed: bool) -> String {
        let (create, save) = {
            let registry = self.inner.plugins.read();
            let create = if existed {
                Vec::new()
            } else {
                registry.handlers_for(HookKind::Create)
            };
            (create, registry.handlers_for(HookKind::Save))
        };

        let mut content = content.to_string();
        if !create.is_empty() {
            let report = pipeline::run_transform(HookKind::Create, &create, path, content);
            self.record_failures(&report.failures);
            content = report.content;
        }
        let report = pipeline::run_transform(HookKind::Save, &save, path, content);
        self.record_failures(&report.failures);
        report.content
    }

    async fn persist_load_transform(
        &self,
        path: &NotePath,
        stored: &str,
        transformed: &str,
    ) -> Result<()> {
        let _gate = self.inner.gate.read().await;
        let _scope = self.inner.locks.lock_notes(&[path]).await;
        // Skip if the note changed since it was read
        if self.inner.store.get(path).await? != stored {
            return Ok(());
        }
        self.inner.store.put(path, transformed).await?;
        let note = IndexedNote::parse(path.clone(), transformed.to_string());
        self.update_indexes(&[path], |ix| {
            ix.apply_note(&note);
            Ok(())
        });
        log::debug!("Persisted load transform for {}", path);
        Ok(())
    }

    fn notify(&self, event: Observation<'_>) {
        let handlers = self.inner.plugins.read().handlers_for(event.kind());
        if handlers.is_empty() {
            return;
        }
        let report = pipeline::run_observers(&handlers, event);
        self.record_failures(&report.failures);
    }

    fn record_failures(&self, failures: &[PluginFailure]) {
        if !failures.is_empty() {
            self.inner
                .metrics
                .counter("engine.plugin_failures")
                .add(failures.len() as u64);
        }
    }

    /// Apply `f` to the indexes after a committed write.
    ///
    /// A failure is reported as drift, never returned.
    fn update_indexes<T>(
        &self,
        touched: &[&NotePath],
        f: impl FnOnce(&mut Indexes) -> Result<T>,
    ) -> Option<T> {
        let result = f(&mut self.inner.indexes.write());
        if let Some(journal) = self.inner.journal.lock().as_mut() {
            journal.extend(touched.iter().map(|p| (*p).clone()));
        }
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                let anchor = touched.first().map_or("", |p| p.as_str());
                self.report_drift(Error::index_drift(anchor, e.to_string()));
                None
            }
        }
    }

    fn report_drift(&self, error: Error) {
        log::warn!("{}", error);
        self.inner.metrics.counter("engine.index_drift").increment();
        self.inner.drifted.store(true, Ordering::SeqCst);
        if self.inner.config.auto_rebuild_on_drift {
            self.schedule_rebuild();
        }
    }

    fn schedule_rebuild(&self) {
        if self.inner.shutdown.is_cancelled() || self.inner.rebuild_pending.swap(true, Ordering::SeqCst)
        {
            return;
        }
        let engine = self.clone();
        tokio::spawn(async move {
            engine.inner.rebuild_pending.store(false, Ordering::SeqCst);
            let cancel = engine.inner.shutdown.child_token();
            match engine.rebuild_with(cancel).await {
                Ok(report) => log::info!("Background rebuild {:?}", report.status),
                Err(e) => log::warn!("Background rebuild failed: {}", e),
            }
        });
    }
}

impl EngineInner {
    fn snippet_options(&self) -> SnippetOptions {
        SnippetOptions {
            max_matches: self.config.search_max_matches_per_note,
            context_chars: self.config.search_context_chars,
        }
    }

    fn try_lock_folders(&self, folders: &[&FolderPath]) -> Result<LockScope> {
        let mut notes = Vec::new();
        for folder in folders {
            notes.extend(self.store.notes_in(folder)?);
        }
        self.locks.try_lock_folders(folders, &notes)
    }
}

impl std::fmt::Debug for NoteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteEngine")
            .field("root", &self.inner.store.root())
            .field("drifted", &self.is_drifted())
            .finish()
    }
}

fn build_note(
    path: NotePath,
    content: String,
    parsed: ParsedNote,
    links: Vec<Link>,
    metadata: NoteMetadata,
) -> Note {
    let body = parsed.body(&content).to_string();
    Note {
        path,
        body,
        frontmatter: parsed.frontmatter,
        tags: parsed.tags,
        links,
        metadata,
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noteindex_plugins::MemoryStateStore;
    use tempfile::TempDir;

    async fn engine(dir: &TempDir) -> NoteEngine {
        let config = EngineConfig::builder(dir.path()).build().unwrap();
        NoteEngine::builder(config)
            .plugins(PluginCatalog::empty())
            .plugin_state(Arc::new(MemoryStateStore::default()))
            .open()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_indexes_existing_notes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.md"), "target").unwrap();
        std::fs::write(dir.path().join("a.md"), "links to [[b]]").unwrap();
        let engine = engine(&dir).await;
        assert_eq!(engine.backlinks("b").unwrap(), vec![PathValidator::note("a").unwrap()]);
        assert_eq!(engine.graph_stats().note_count, 2);
    }

    #[tokio::test]
    async fn test_save_returns_parsed_note() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir).await;
        let note = engine
            .create_or_update_note("n", "---\ntags: [A]\ntitle: T\n---\nbody #b\n")
            .await
            .unwrap();
        assert_eq!(note.path.as_str(), "n.md");
        assert_eq!(note.body, "body #b\n");
        assert_eq!(note.tags.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(note.metadata.lines, 5);
    }

    #[tokio::test]
    async fn test_validation_rejected_before_any_write() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir).await;
        let err = engine
            .create_or_update_note("../escape", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(engine.list_notes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_note_conflict_leaves_indexes() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir).await;
        engine.create_or_update_note("a", "alpha").await.unwrap();
        engine.create_or_update_note("b", "beta").await.unwrap();
        let err = engine.move_note("a", "b").await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(engine.search("alpha").unwrap()[0].path.as_str(), "a.md");
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir).await;
        engine.create_or_update_note("b", "x").await.unwrap();
        engine.create_or_update_note("a", "[[b]] [[missing]]").await.unwrap();
        let before = engine.get_graph();
        let report = engine.rebuild().await.unwrap();
        assert_eq!(report.status, RebuildStatus::Completed);
        assert_eq!(report.notes, 2);
        assert_eq!(engine.get_graph(), before);
        assert!(!engine.is_drifted());
    }

    #[tokio::test]
    async fn test_cancelled_rebuild_keeps_previous_indexes() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir).await;
        engine.create_or_update_note("a", "hello").await.unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let report = engine.rebuild_with(token).await.unwrap();
        assert_eq!(report.status, RebuildStatus::Cancelled);
        assert_eq!(engine.search("hello").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_index_failure_after_write_is_drift_not_error() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::builder(dir.path())
            .auto_rebuild_on_drift(false)
            .build()
            .unwrap();
        let engine = NoteEngine::builder(config)
            .plugins(PluginCatalog::empty())
            .plugin_state(Arc::new(MemoryStateStore::default()))
            .open()
            .await
            .unwrap();
        engine.create_or_update_note("a", "alpha").await.unwrap();

        let path = PathValidator::note("a").unwrap();
        engine.inner.indexes.write().search.remove(&path);
        engine.delete_note("a").await.unwrap();
        assert!(engine.is_drifted());
        assert!(!dir.path().join("a.md").exists());
        assert_eq!(engine.metrics().counters["engine.index_drift"], 1);

        engine.rebuild().await.unwrap();
        assert!(!engine.is_drifted());
        assert_eq!(engine.graph_stats().note_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_plugin_toggle_is_not_found() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir).await;
        let err = engine.toggle_plugin("nope", true).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_folder_lock_contention_reports_concurrency() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::builder(dir.path())
            .folder_lock_retry(noteindex_core::RetryConfig::no_retry())
            .build()
            .unwrap();
        let engine = NoteEngine::builder(config)
            .plugins(PluginCatalog::empty())
            .plugin_state(Arc::new(MemoryStateStore::default()))
            .open()
            .await
            .unwrap();
        engine.create_or_update_note("f/a", "x").await.unwrap();

        let path = PathValidator::note("f/a").unwrap();
        let held = engine.inner.locks.lock_notes(&[&path]).await;
        let err = engine.move_folder("f", "g").await.unwrap_err();
        assert!(err.is_contention());
        drop(held);
        assert_eq!(engine.move_folder("f", "g").await.unwrap().notes.len(), 1);
    }
}
