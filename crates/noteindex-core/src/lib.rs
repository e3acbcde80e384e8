//! # noteindex core
//!
//! Canonical types shared by every crate in the workspace: the error
//! taxonomy, note/folder paths and their validator, the note and link data
//! model, engine configuration, metrics and retry helpers.
//!
//! ## Core Modules
//!
//! - [`error`] - Error taxonomy and `Result` alias
//! - [`path`] - [`NotePath`], [`FolderPath`] and [`PathValidator`]
//! - [`models`] - Links, frontmatter, notes and search hits
//! - [`config`] - [`EngineConfig`] and its builder
//! - [`metrics`] - Counters and histograms
//! - [`resilience`] - Retry with exponential backoff
//!
//! ## Usage
//!
//! ```
//! use noteindex_core::prelude::*;
//!
//! fn normalize() -> Result<()> {
//!     let path = PathValidator::note("projects//alpha")?;
//!     assert_eq!(path.as_str(), "projects/alpha.md");
//!     assert!(PathValidator::note("../escape.md").is_err());
//!     Ok(())
//! }
//! # normalize().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod path;
pub mod resilience;

pub use config::{EngineConfig, EngineConfigBuilder, STATE_DIR};
pub use error::{Error, Result};
pub use metrics::{Counter, Histogram, HistogramStats, HistogramTimer, MetricsRegistry, MetricsSnapshot};
pub use models::*;
pub use path::{FolderPath, NOTE_EXTENSION, NotePath, PathValidator};
pub use resilience::{RetryConfig, retry_with_backoff};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::error::{Error, Result};
    pub use crate::models::{
        Frontmatter, LineMatch, Link, LinkKind, LinkTarget, Note, NoteMetadata, NoteSummary,
        SearchHit,
    };
    pub use crate::path::{FolderPath, NotePath, PathValidator};
}
