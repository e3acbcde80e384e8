//! # noteindex
//!
//! Note index engine: a directory of markdown notes behind a coordinator
//! that keeps a link graph and a full-text index consistent with every write.
//!
//! ## Layers
//!
//! - [`noteindex_core`]: errors, configuration, validated paths, models
//! - [`noteindex_parser`]: frontmatter, tags and references
//! - [`noteindex_graph`] / [`noteindex_search`]: derived indexes
//! - [`noteindex_plugins`]: hook pipeline and plugin state
//! - [`noteindex_store`]: atomic file store
//! - [`NoteEngine`]: locking, ordering and recovery across all of the above
//!
//! ## Quick Start
//!
//! ```no_run
//! use noteindex::prelude::*;
//!
//! # async fn run() -> noteindex::Result<()> {
//! let engine = NoteEngine::open(EngineConfig::builder("./notes").build()?).await?;
//! engine.create_or_update_note("inbox/today", "Call [[Alice]] #todo").await?;
//! for hit in engine.search("alice")? {
//!     println!("{} ({} terms)", hit.path, hit.matched_terms);
//! }
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod indexes;
pub mod locks;

pub use engine::{EngineBuilder, FolderMove, MovedNote, NoteEngine, RebuildReport, RebuildStatus};
pub use noteindex_core::prelude::*;
pub use noteindex_graph::{GraphSnapshot, GraphStats};
pub use noteindex_plugins::{
    HookKind, HookOutcome, MemoryStateStore, Plugin, PluginCatalog, PluginError, PluginInfo,
    PluginManifest, PluginResult, PluginStateStore,
};

pub mod prelude {
    pub use crate::engine::{NoteEngine, RebuildReport, RebuildStatus};
    pub use noteindex_core::prelude::*;
    pub use noteindex_plugins::{Plugin, PluginCatalog, PluginInfo};
}
