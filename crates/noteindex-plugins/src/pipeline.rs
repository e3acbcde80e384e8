//! Hook dispatch with per-plugin fault isolation.
//!
//! A transform chain threads one content value through every handler. A
//! handler that returns an error or panics is recorded as a failure and the
//! chain continues with the content as it stood before that handler.

use crate::plugin::{HookKind, HookOutcome, PluginError, PluginResult};
use crate::registry::Handler;
use noteindex_core::{NotePath, SearchHit};
use serde::Serialize;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// One isolated hook failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginFailure {
    pub plugin: String,
    pub hook: HookKind,
    pub error: String,
}

impl PluginFailure {
    pub fn to_error(&self) -> noteindex_core::Error {
        noteindex_core::Error::plugin(&self.plugin, format!("{} hook: {}", self.hook, self.error))
    }
}

/// Result of running a transform chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformReport {
    /// Content after the last handler
    pub content: String,
    /// Plugins whose replacement was kept
    pub applied: Vec<String>,
    pub failures: Vec<PluginFailure>,
}

impl TransformReport {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Result of notifying observers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserveReport {
    pub invoked: usize,
    pub failures: Vec<PluginFailure>,
}

/// Observe-only event payloads
#[derive(Debug, Clone, Copy)]
pub enum Observation<'a> {
    Delete(&'a NotePath),
    Search {
        query: &'a str,
        results: &'a [SearchHit],
    },
    Startup,
}

impl Observation<'_> {
    pub fn kind(&self) -> HookKind {
        match self {
            Observation::Delete(_) => HookKind::Delete,
            Observation::Search { .. } => HookKind::Search,
            Observation::Startup => HookKind::Startup,
        }
    }
}

/// Run `kind`'s transform hook of every handler over `content`.
pub fn run_transform(
    kind: HookKind,
    handlers: &[Handler],
    path: &NotePath,
    content: String,
) -> TransformReport {
    debug_assert!(kind.is_transform());
    let mut report = TransformReport {
        content,
        applied: Vec::new(),
        failures: Vec::new(),
    };

    for handler in handlers {
        let current = report.content.as_str();
        let outcome = isolate(|| match kind {
            HookKind::Create => handler.plugin.on_create(path, current),
            HookKind::Save => handler.plugin.on_save(path, current),
            HookKind::Load => handler.plugin.on_load(path, current),
            _ => Ok(HookOutcome::NoChange),
        });

        match outcome {
            Ok(HookOutcome::Replace(next)) => {
                log::trace!("{} replaced content of {} on {}", handler.name, path, kind);
                report.content = next;
                report.applied.push(handler.name.clone());
            }
            Ok(HookOutcome::NoChange) => {}
            Err(e) => {
                log::warn!("Plugin {} failed on {} hook for {}: {}", handler.name, kind, path, e);
                report.failures.push(PluginFailure {
                    plugin: handler.name.clone(),
                    hook: kind,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

/// Invoke observe-only hooks; return values other than failures are ignored.
pub fn run_observers(handlers: &[Handler], event: Observation<'_>) -> ObserveReport {
    let kind = event.kind();
    let mut report = ObserveReport::default();

    for handler in handlers {
        report.invoked += 1;
        let result = isolate(|| match event {
            Observation::Delete(path) => handler.plugin.on_delete(path),
            Observation::Search { query, results } => handler.plugin.on_search(query, results),
            Observation::Startup => handler.plugin.on_startup(),
        });
        if let Err(e) = result {
            log::warn!("Plugin {} failed on {} hook: {}", handler.name, kind, e);
            report.failures.push(PluginFailure {
                plugin: handler.name.clone(),
                hook: kind,
                error: e.to_string(),
            });
        }
    }
    report
}

fn isolate<T>(f: impl FnOnce() -> PluginResult<T>) -> PluginResult<T> {
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(PluginError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{Plugin, PluginManifest};
    use noteindex_core::PathValidator;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Append(&'static str);

    impl Plugin for Append {
        fn manifest(&self) -> PluginManifest {
            PluginManifest::new(self.0, "1.0.0").hook(HookKind::Save)
        }

        fn on_save(&self, _path: &NotePath, content: &str) -> PluginResult<HookOutcome> {
            Ok(HookOutcome::Replace(format!("{content}{}", self.0)))
        }
    }

    struct Failing;

    impl Plugin for Failing {
        fn manifest(&self) -> PluginManifest {
            PluginManifest::new("failing", "1.0.0").hook(HookKind::Save)
        }

        fn on_save(&self, _path: &NotePath, _content: &str) -> PluginResult<HookOutcome> {
            Err(PluginError::failed("boom"))
        }
    }

    struct Panicking;

    impl Plugin for Panicking {
        fn manifest(&self) -> PluginManifest {
            PluginManifest::new("panicking", "1.0.0")
                .hook(HookKind::Save)
                .hook(HookKind::Startup)
        }

        fn on_save(&self, _path: &NotePath, _content: &str) -> PluginResult<HookOutcome> {
            panic!("plugin bug");
        }

        fn on_startup(&self) -> PluginResult<()> {
            panic!("startup bug");
        }
    }

    struct Clear;

    impl Plugin for Clear {
        fn manifest(&self) -> PluginManifest {
            PluginManifest::new("clear", "1.0.0").hook(HookKind::Save)
        }

        fn on_save(&self, _path: &NotePath, _content: &str) -> PluginResult<HookOutcome> {
            Ok(HookOutcome::Replace(String::new()))
        }
    }

    #[derive(Default)]
    struct Watcher {
        deletes: AtomicUsize,
    }

    impl Plugin for Watcher {
        fn manifest(&self) -> PluginManifest {
            PluginManifest::new("watcher", "1.0.0").hook(HookKind::Delete)
        }

        fn on_delete(&self, _path: &NotePath) -> PluginResult<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn handler(plugin: Arc<dyn Plugin>) -> Handler {
        Handler {
            name: plugin.manifest().name,
            plugin,
        }
    }

    fn path() -> NotePath {
        PathValidator::note("a").unwrap()
    }

    #[test]
    fn test_chain_threads_content_in_order() {
        let handlers = vec![handler(Arc::new(Append("1"))), handler(Arc::new(Append("2")))];
        let report = run_transform(HookKind::Save, &handlers, &path(), "x".into());
        assert_eq!(report.content, "x12");
        assert_eq!(report.applied, vec!["1", "2"]);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_failure_keeps_prior_content_and_continues() {
        let handlers = vec![
            handler(Arc::new(Append("1"))),
            handler(Arc::new(Failing)),
            handler(Arc::new(Append("2"))),
        ];
        let report = run_transform(HookKind::Save, &handlers, &path(), "x".into());
        assert_eq!(report.content, "x12");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].plugin, "failing");
        assert!(report.failures[0].to_error().is_recoverable());
    }

    #[test]
    fn test_panic_is_isolated() {
        let handlers = vec![handler(Arc::new(Panicking)), handler(Arc::new(Append("ok")))];
        let report = run_transform(HookKind::Save, &handlers, &path(), "x".into());
        assert_eq!(report.content, "xok");
        assert!(report.failures[0].error.contains("plugin bug"));
    }

    #[test]
    fn test_empty_replacement_is_not_no_change() {
        let handlers = vec![handler(Arc::new(Clear))];
        let report = run_transform(HookKind::Save, &handlers, &path(), "content".into());
        assert_eq!(report.content, "");
        assert!(report.changed());
    }

    #[test]
    fn test_observers_run_for_side_effects() {
        let watcher = Arc::new(Watcher::default());
        let handlers = vec![handler(watcher.clone())];
        let p = path();
        let report = run_observers(&handlers, Observation::Delete(&p));
        assert_eq!(report.invoked, 1);
        assert_eq!(watcher.deletes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_observer_panic_is_reported() {
        let handlers = vec![handler(Arc::new(Panicking))];
        let report = run_observers(&handlers, Observation::Startup);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].hook, HookKind::Startup);
    }
}
