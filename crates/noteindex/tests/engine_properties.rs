//! End-to-end behavior of the note engine

use noteindex::{
    EngineConfig, Error, HookKind, HookOutcome, LinkTarget, MemoryStateStore, NoteEngine,
    NotePath, PathValidator, Plugin, PluginCatalog, PluginError, PluginManifest, PluginResult,
    SearchHit,
};
use noteindex_graph::NodeKind;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

// ==================== Helpers ====================

async fn setup(catalog: PluginCatalog) -> (TempDir, NoteEngine) {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig::builder(temp_dir.path()).build().unwrap();
    let engine = NoteEngine::builder(config)
        .plugins(catalog)
        .plugin_state(Arc::new(MemoryStateStore::default()))
        .open()
        .await
        .unwrap();
    (temp_dir, engine)
}

fn note(path: &str) -> NotePath {
    PathValidator::note(path).unwrap()
}

fn hit_paths(hits: &[SearchHit]) -> Vec<&str> {
    hits.iter().map(|h| h.path.as_str()).collect()
}

/// Counts save invocations
struct SaveCounter {
    saves: Arc<AtomicUsize>,
}

impl Plugin for SaveCounter {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new("save-counter", "0.1.0").hook(HookKind::Save)
    }

    fn on_save(&self, _path: &NotePath, _content: &str) -> PluginResult<HookOutcome> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(HookOutcome::NoChange)
    }
}

/// Appends a marker line on save
struct Stamp;

impl Plugin for Stamp {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new("stamp", "0.1.0").hook(HookKind::Save)
    }

    fn on_save(&self, _path: &NotePath, content: &str) -> PluginResult<HookOutcome> {
        Ok(HookOutcome::Replace(format!("{content}\n<!-- stamped -->")))
    }
}

struct Failing;

impl Plugin for Failing {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new("failing", "0.1.0").hook(HookKind::Save)
    }

    fn on_save(&self, _path: &NotePath, _content: &str) -> PluginResult<HookOutcome> {
        Err(PluginError::failed("refusing to save"))
    }
}

struct Panicking;

impl Plugin for Panicking {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new("panicking", "0.1.0").hook(HookKind::Save)
    }

    fn on_save(&self, _path: &NotePath, _content: &str) -> PluginResult<HookOutcome> {
        panic!("plugin bug")
    }
}

/// Adds a heading to brand new notes
struct Heading;

impl Plugin for Heading {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new("heading", "0.1.0").hook(HookKind::Create)
    }

    fn on_create(&self, path: &NotePath, content: &str) -> PluginResult<HookOutcome> {
        Ok(HookOutcome::Replace(format!("# {}\n{content}", path.stem())))
    }
}

/// Upper-cases content on load
struct Shout;

impl Plugin for Shout {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new("shout", "0.1.0").hook(HookKind::Load)
    }

    fn on_load(&self, _path: &NotePath, content: &str) -> PluginResult<HookOutcome> {
        Ok(HookOutcome::Replace(content.to_uppercase()))
    }
}

#[derive(Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Plugin for Recorder {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new("recorder", "0.1.0")
            .hook(HookKind::Delete)
            .hook(HookKind::Search)
            .hook(HookKind::Startup)
    }

    fn on_delete(&self, path: &NotePath) -> PluginResult<()> {
        self.events.lock().push(format!("delete {path}"));
        Ok(())
    }

    fn on_search(&self, query: &str, results: &[SearchHit]) -> PluginResult<()> {
        self.events
            .lock()
            .push(format!("search {query} {}", results.len()));
        Ok(())
    }

    fn on_startup(&self) -> PluginResult<()> {
        self.events.lock().push("startup".to_string());
        Ok(())
    }
}

// ==================== Round trip ====================

#[tokio::test]
async fn test_round_trip_without_plugins_is_byte_identical() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    let contents = [
        "",
        "plain text",
        "---\ntitle: Hi\ntags: [a, b]\n---\n# Body\n\n[[other]]\n",
        "windows\r\nline endings\r\n",
        "unicode: café 東京 🚀\n",
        "trailing spaces   \n",
    ];
    for (i, content) in contents.iter().enumerate() {
        let path = format!("notes/n{i}");
        let saved = engine.create_or_update_note(&path, content).await.unwrap();
        assert_eq!(saved.content, *content);
        let loaded = engine.get_note(&path).await.unwrap();
        assert_eq!(loaded.content, *content, "round trip of {path}");
    }
}

#[tokio::test]
async fn test_round_trip_returns_transformed_content() {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig::builder(temp_dir.path()).build().unwrap();
    let engine = NoteEngine::open(config).await.unwrap();

    let saved = engine
        .create_or_update_note("crlf", "a\r\nb\r\n")
        .await
        .unwrap();
    assert_eq!(saved.content, "a\nb\n");
    assert_eq!(engine.get_note("crlf").await.unwrap().content, "a\nb\n");
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join("crlf.md")).unwrap(),
        "a\nb\n"
    );
}

// ==================== Graph ====================

#[tokio::test]
async fn test_backlinks_after_creating_target_first() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    engine.create_or_update_note("b.md", "no links").await.unwrap();
    engine
        .create_or_update_note("a.md", "points at [[b]]")
        .await
        .unwrap();
    assert_eq!(engine.backlinks("b.md").unwrap(), vec![note("a.md")]);
    assert!(engine.backlinks("a.md").unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_unresolves_incoming_links() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    engine
        .create_or_update_note("b", "unique zebra content")
        .await
        .unwrap();
    engine.create_or_update_note("a", "see [[b]]").await.unwrap();

    engine.delete_note("b").await.unwrap();

    let graph = engine.get_graph();
    assert!(
        !graph
            .nodes
            .iter()
            .any(|n| n.id == "b.md" && n.kind == NodeKind::Note)
    );
    let edges: Vec<_> = graph.edges.iter().filter(|e| e.source == "a.md").collect();
    assert_eq!(edges.len(), 1);
    assert!(!edges[0].resolved);
    assert_eq!(edges[0].target, "b");

    assert!(engine.search("zebra").unwrap().is_empty());
    let links = engine.outgoing_links("a").unwrap();
    assert_eq!(links[0].target, LinkTarget::Unresolved("b".into()));

    let err = engine.get_note("b").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn test_forward_reference_resolves_on_resave() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    engine.create_or_update_note("a", "early [[b]]").await.unwrap();
    assert!(!engine.outgoing_links("a").unwrap()[0].is_resolved());

    engine.create_or_update_note("b", "late").await.unwrap();
    // Unchanged notes keep their unresolved links until re-indexed
    assert!(!engine.outgoing_links("a").unwrap()[0].is_resolved());
    assert!(engine.backlinks("b").unwrap().is_empty());

    engine.create_or_update_note("a", "early [[b]]").await.unwrap();
    assert!(engine.outgoing_links("a").unwrap()[0].is_resolved());
    assert_eq!(engine.backlinks("b").unwrap(), vec![note("a")]);
}

#[tokio::test]
async fn test_forward_reference_resolves_on_rebuild() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    engine.create_or_update_note("a", "early [[b]]").await.unwrap();
    engine.create_or_update_note("b", "late").await.unwrap();
    engine.rebuild().await.unwrap();
    assert_eq!(engine.backlinks("b").unwrap(), vec![note("a")]);
}

#[tokio::test]
async fn test_embed_of_deleted_note_leaves_no_edge() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    engine.create_or_update_note("b", "picture").await.unwrap();
    engine.create_or_update_note("a", "embed ![[b]]").await.unwrap();
    engine.delete_note("b").await.unwrap();
    assert!(!engine.outgoing_links("a").unwrap()[0].is_resolved());

    engine.create_or_update_note("a", "no links now").await.unwrap();
    assert!(engine.outgoing_links("a").unwrap().is_empty());

    let incremental = engine.get_graph();
    assert!(incremental.edges.is_empty());
    engine.rebuild().await.unwrap();
    assert_eq!(incremental, engine.get_graph());
}

#[tokio::test]
async fn test_move_note_keeps_edges_under_new_path() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    engine.create_or_update_note("c", "target").await.unwrap();
    engine
        .create_or_update_note("folder/a", "moving note links [[c]]")
        .await
        .unwrap();
    engine
        .create_or_update_note("d", "refers to [[folder/a]]")
        .await
        .unwrap();

    let moved = engine.move_note("folder/a", "archive/a").await.unwrap();
    assert_eq!(moved, note("archive/a"));

    assert_eq!(engine.backlinks("archive/a").unwrap(), vec![note("d")]);
    assert_eq!(engine.backlinks("c").unwrap(), vec![note("archive/a")]);
    assert!(engine.backlinks("folder/a").is_err());

    let graph = engine.get_graph();
    assert!(graph.nodes.iter().all(|n| n.id != "folder/a.md"));
    assert!(
        graph
            .edges
            .iter()
            .all(|e| e.source != "folder/a.md" && e.target != "folder/a.md")
    );

    assert_eq!(hit_paths(&engine.search("moving").unwrap()), vec!["archive/a.md"]);
    assert_eq!(
        engine.get_note("archive/a").await.unwrap().content,
        "moving note links [[c]]"
    );
}

#[tokio::test]
async fn test_move_folder_relabels_every_note() {
    let (dir, engine) = setup(PluginCatalog::empty()).await;
    engine
        .create_or_update_note("folder/sub/b", "nested walrus")
        .await
        .unwrap();
    engine.create_or_update_note("folder/a", "[[b]]").await.unwrap();
    engine
        .create_or_update_note("outside", "[[folder/sub/b]]")
        .await
        .unwrap();

    let result = engine.move_folder("folder", "archive").await.unwrap();
    assert_eq!(result.notes.len(), 2);
    assert!(!dir.path().join("folder").exists());

    assert_eq!(
        engine.backlinks("archive/sub/b").unwrap(),
        vec![note("archive/a"), note("outside")]
    );
    assert_eq!(
        hit_paths(&engine.search("walrus").unwrap()),
        vec!["archive/sub/b.md"]
    );
    let graph = engine.get_graph();
    assert!(graph.nodes.iter().all(|n| !n.id.starts_with("folder/")));
}

#[tokio::test]
async fn test_rename_and_delete_folder() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    engine.create_or_update_note("p/old/x", "kestrel").await.unwrap();

    let result = engine.rename_folder("p/old", "new").await.unwrap();
    assert_eq!(result.to.as_str(), "p/new");
    assert_eq!(hit_paths(&engine.search("kestrel").unwrap()), vec!["p/new/x.md"]);

    let removed = engine.delete_folder("p").await.unwrap();
    assert_eq!(removed, vec![note("p/new/x")]);
    assert!(engine.search("kestrel").unwrap().is_empty());
    assert_eq!(engine.graph_stats().note_count, 0);
}

#[tokio::test]
async fn test_move_folder_into_itself_is_rejected() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    engine.create_folder("a").await.unwrap();
    let err = engine.move_folder("a", "a/b").await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

// ==================== Search ====================

#[tokio::test]
async fn test_search_ranks_by_frequency() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    engine
        .create_or_update_note("note2", "hello there")
        .await
        .unwrap();
    engine
        .create_or_update_note("note1", "hello world, hello again")
        .await
        .unwrap();
    engine
        .create_or_update_note("note3", "nothing to see")
        .await
        .unwrap();

    let hits = engine.search("hello").unwrap();
    assert_eq!(hit_paths(&hits), vec!["note1.md", "note2.md"]);
    assert!(hits[0].score >= hits[1].score);
    assert_eq!(hits[0].matches[0].line_number, 1);
}

#[tokio::test]
async fn test_search_reflects_updates() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    engine.create_or_update_note("n", "first draft").await.unwrap();
    engine.create_or_update_note("n", "second take").await.unwrap();
    assert!(engine.search("draft").unwrap().is_empty());
    assert_eq!(engine.search("take").unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_finds_very_long_words() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    let word = "pneumonoultramicroscopicsilicovolcanoconiosis";
    engine
        .create_or_update_note("long", &format!("the word {word} appears"))
        .await
        .unwrap();
    assert_eq!(hit_paths(&engine.search(word).unwrap()), vec!["long.md"]);
}

// ==================== Plugins ====================

#[tokio::test]
async fn test_disabled_plugin_is_skipped_until_reenabled() {
    let saves = Arc::new(AtomicUsize::new(0));
    let states = Arc::new(MemoryStateStore::default());
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig::builder(temp_dir.path()).build().unwrap();
    let engine = NoteEngine::builder(config)
        .plugins(PluginCatalog::empty().with(Arc::new(SaveCounter {
            saves: Arc::clone(&saves),
        })))
        .plugin_state(states.clone())
        .open()
        .await
        .unwrap();

    engine.create_or_update_note("n", "1").await.unwrap();
    assert_eq!(saves.load(Ordering::SeqCst), 1);

    let info = engine.toggle_plugin("save-counter", false).await.unwrap();
    assert!(!info.enabled);
    assert_eq!(states.snapshot().get("save-counter"), Some(&false));
    engine.create_or_update_note("n", "2").await.unwrap();
    assert_eq!(saves.load(Ordering::SeqCst), 1);

    engine.toggle_plugin("save-counter", true).await.unwrap();
    engine.create_or_update_note("n", "3").await.unwrap();
    assert_eq!(saves.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failing_plugin_does_not_block_save_or_others() {
    let catalog = PluginCatalog::empty()
        .with(Arc::new(Failing))
        .with(Arc::new(Panicking))
        .with(Arc::new(Stamp));
    let (dir, engine) = setup(catalog).await;

    let saved = engine.create_or_update_note("n", "body").await.unwrap();
    assert_eq!(saved.content, "body\n<!-- stamped -->");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("n.md")).unwrap(),
        "body\n<!-- stamped -->"
    );
    assert_eq!(engine.metrics().counters["engine.plugin_failures"], 2);
}

#[tokio::test]
async fn test_create_hooks_run_only_for_new_notes() {
    let (_dir, engine) = setup(PluginCatalog::empty().with(Arc::new(Heading))).await;
    let created = engine.create_or_update_note("idea", "body").await.unwrap();
    assert_eq!(created.content, "# idea\nbody");
    let updated = engine.create_or_update_note("idea", "rewritten").await.unwrap();
    assert_eq!(updated.content, "rewritten");
}

#[tokio::test]
async fn test_load_transform_is_not_persisted_by_default() {
    let (dir, engine) = setup(PluginCatalog::empty().with(Arc::new(Shout))).await;
    let saved = engine.create_or_update_note("n", "quiet").await.unwrap();
    let loaded = engine.get_note("n").await.unwrap();
    assert_eq!(loaded.content, "QUIET");
    assert_eq!(loaded.metadata.checksum, saved.metadata.checksum);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("n.md")).unwrap(),
        "quiet"
    );
}

#[tokio::test]
async fn test_load_transform_persisted_when_configured() {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig::builder(temp_dir.path())
        .persist_load_transforms(true)
        .build()
        .unwrap();
    let engine = NoteEngine::builder(config)
        .plugins(PluginCatalog::empty().with(Arc::new(Shout)))
        .plugin_state(Arc::new(MemoryStateStore::default()))
        .open()
        .await
        .unwrap();
    engine.create_or_update_note("n", "quiet").await.unwrap();
    engine.get_note("n").await.unwrap();
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join("n.md")).unwrap(),
        "QUIET"
    );
    assert_eq!(hit_paths(&engine.search("quiet").unwrap()), vec!["n.md"]);
}

#[tokio::test]
async fn test_observers_see_startup_delete_and_search() {
    let recorder = Recorder::default();
    let events = Arc::clone(&recorder.events);
    let (_dir, engine) = setup(PluginCatalog::empty().with(Arc::new(recorder))).await;

    engine.create_or_update_note("n", "findme").await.unwrap();
    engine.search("findme").unwrap();
    engine.delete_note("n").await.unwrap();

    assert_eq!(
        *events.lock(),
        vec!["startup", "search findme 1", "delete n.md"]
    );
}

#[tokio::test]
async fn test_plugin_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig::builder(temp_dir.path()).build().unwrap();

    let engine = NoteEngine::open(config.clone()).await.unwrap();
    engine.toggle_plugin("trailing-whitespace", true).await.unwrap();
    engine.close();
    drop(engine);

    let reopened = NoteEngine::open(config).await.unwrap();
    let plugin = reopened
        .list_plugins()
        .into_iter()
        .find(|p| p.name == "trailing-whitespace")
        .unwrap();
    assert!(plugin.enabled);
    let saved = reopened
        .create_or_update_note("n", "line   \n")
        .await
        .unwrap();
    assert_eq!(saved.content, "line\n");
}

#[tokio::test]
async fn test_state_directory_is_not_indexed() {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig::builder(temp_dir.path()).build().unwrap();
    let engine = NoteEngine::open(config).await.unwrap();
    engine.toggle_plugin("note-stats", false).await.unwrap();
    engine.rebuild().await.unwrap();
    assert!(engine.list_notes().await.unwrap().is_empty());
    assert!(engine.list_folders().unwrap().is_empty());
}

// ==================== Errors ====================

#[tokio::test]
async fn test_error_taxonomy() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;

    for bad in ["", "../escape", "/abs/path", "a/../../b", "bad\0name"] {
        let err = engine.create_or_update_note(bad, "x").await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }), "{bad:?}");
    }

    let err = engine.get_note("missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    let err = engine.delete_note("missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    engine.create_or_update_note("a", "a").await.unwrap();
    engine.create_or_update_note("b", "b").await.unwrap();
    let err = engine.move_note("a", "b").await.unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));

    let err = engine.toggle_plugin("ghost", false).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

// ==================== Concurrency ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_to_one_note_stay_consistent() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    let writers = (0..16).map(|i| {
        let engine = engine.clone();
        async move {
            engine
                .create_or_update_note("shared", &format!("version{i}"))
                .await
                .unwrap()
        }
    });
    futures::future::join_all(writers).await;

    let stored = engine.get_note("shared").await.unwrap().content;
    let indexed: Vec<String> = (0..16)
        .map(|i| format!("version{i}"))
        .filter(|word| !engine.search(word).unwrap().is_empty())
        .collect();
    assert_eq!(indexed, vec![stored]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_to_distinct_notes() {
    let (_dir, engine) = setup(PluginCatalog::empty()).await;
    let handles: Vec<_> = (0..20)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let path = format!("dir{}/n{i}", i % 3);
                let content = format!("[[n{}]]", (i + 1) % 20);
                engine.create_or_update_note(&path, &content).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(engine.list_notes().await.unwrap().len(), 20);
    assert_eq!(engine.graph_stats().note_count, 20);

    // Links written before their target existed resolve on rebuild
    engine.rebuild().await.unwrap();
    let graph = engine.get_graph();
    assert_eq!(graph.nodes.len(), 20);
    assert_eq!(graph.edges.len(), 20);
    assert!(graph.edges.iter().all(|e| e.resolved));
}
