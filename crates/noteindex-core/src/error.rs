//! Error types for the note index engine.
//!
//! Every fallible operation in the workspace returns [`Error`]. The variants
//! split into two groups: definitive failures that the caller must see
//! (validation, not found, conflict, store I/O) and recoverable conditions
//! that the coordinator logs and swallows (plugin failures, index drift).

use std::io;
use thiserror::Error as ThisError;

/// The core error type for all note index operations.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Bad path or content shape, rejected before any mutation
    #[error("Validation error: {reason}")]
    Validation { reason: String },

    /// Note or folder does not exist
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// Destination already exists, or a note/folder name collision
    #[error("Conflict: {path} already exists")]
    Conflict { path: String },

    /// A plugin hook failed; the triggering operation continues without its change
    #[error("Plugin '{plugin}' failed: {reason}")]
    Plugin { plugin: String, reason: String },

    /// Derived indexes no longer match the store; a rebuild is required
    #[error("Index drift after committing {path}: {reason}")]
    IndexDrift { path: String, reason: String },

    /// Underlying persistence failed
    #[error("Store I/O error: {0}")]
    StoreIo(#[from] io::Error),

    /// Lock scope for an operation could not be acquired
    #[error("Concurrent access conflict: {reason}")]
    Concurrency { reason: String },

    /// Invalid configuration
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Parse error
    #[error("Parse error: {reason}")]
    Parse { reason: String },
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation {
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound { path: path.into() }
    }

    /// Create a conflict error
    pub fn conflict(path: impl Into<String>) -> Self {
        Error::Conflict { path: path.into() }
    }

    /// Create a plugin error
    pub fn plugin(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Plugin {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    /// Create an index drift error
    pub fn index_drift(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::IndexDrift {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a concurrency error
    pub fn concurrency(reason: impl Into<String>) -> Self {
        Error::Concurrency {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }

    /// Create a parse error
    pub fn parse_error(reason: impl Into<String>) -> Self {
        Error::Parse {
            reason: reason.into(),
        }
    }

    /// Plugin failures and index drift never fail the triggering operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Plugin { .. } | Error::IndexDrift { .. })
    }

    /// Lock contention that may succeed on a later attempt.
    pub fn is_contention(&self) -> bool {
        matches!(self, Error::Concurrency { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::not_found("notes/a.md");
        assert!(err.to_string().contains("notes/a.md"));

        let err = Error::validation("contains .. traversal");
        assert!(err.to_string().contains("Validation error"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::plugin("p", "boom").is_recoverable());
        assert!(Error::index_drift("a.md", "tokenizer panicked").is_recoverable());
        assert!(!Error::conflict("a.md").is_recoverable());
        assert!(!Error::from(io::Error::other("disk")).is_recoverable());
    }
}
