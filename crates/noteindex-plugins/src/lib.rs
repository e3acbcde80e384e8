//! # noteindex plugins
//!
//! Ordered, fault-isolated hook pipeline that mediates every content change.
//!
//! - [`Plugin`]: fixed capability interface; the [`PluginManifest`] lists the
//!   [`HookKind`]s a plugin implements, read once at registration
//! - [`HookOutcome`]: explicit `Replace(content)` or `NoChange`
//! - [`PluginRegistry`]: registration order is dispatch order; disabled
//!   plugins are never invoked
//! - [`pipeline`]: transform chains and observer notification, each hook
//!   isolated so an error or panic only discards that plugin's change
//! - [`PluginStateStore`]: durable `name -> enabled` flags
//! - [`PluginCatalog`]: definitions available at engine open, including the
//!   built-in plugins
//!
//! ```
//! use noteindex_plugins::{HookKind, PluginCatalog, pipeline};
//! use noteindex_core::{MetricsRegistry, PathValidator};
//!
//! let metrics = MetricsRegistry::new();
//! let registry = PluginCatalog::builtin(&metrics).discover();
//! let path = PathValidator::note("daily").unwrap();
//! let handlers = registry.handlers_for(HookKind::Save);
//! let report = pipeline::run_transform(HookKind::Save, &handlers, &path, "a\r\nb".into());
//! assert_eq!(report.content, "a\nb");
//! ```

pub mod builtin;
pub mod catalog;
pub mod pipeline;
pub mod plugin;
pub mod registry;
pub mod state;

pub use builtin::{NormalizeLineEndings, NoteStats, TrailingWhitespace};
pub use catalog::PluginCatalog;
pub use pipeline::{ObserveReport, Observation, PluginFailure, TransformReport};
pub use plugin::{HookKind, HookOutcome, Plugin, PluginError, PluginManifest, PluginResult};
pub use registry::{Handler, PluginInfo, PluginRegistry};
pub use state::{JsonFileStateStore, MemoryStateStore, PluginStateStore, PluginStates};
