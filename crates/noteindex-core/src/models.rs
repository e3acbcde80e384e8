//! Core data models for notes, links and search results.
//!
//! All types are serializable so the coordinator can hand them to any
//! outer surface (CLI, HTTP layer) without further mapping.

use crate::path::{FolderPath, NotePath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Kind of reference found in a note body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// `[[note]]` or `[text](other.md)`
    Internal,
    /// `[text](https://...)`
    External,
    /// `![alt](img.png)` or `![[embed]]`
    Image,
}

/// Where a link points
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "state", content = "target", rename_all = "lowercase")]
pub enum LinkTarget {
    /// An existing note
    Resolved(NotePath),
    /// A dangling label that may resolve once a matching note exists
    Unresolved(String),
    /// An absolute URL, never resolved against the store
    Url(String),
}

impl LinkTarget {
    pub fn as_note(&self) -> Option<&NotePath> {
        match self {
            LinkTarget::Resolved(path) => Some(path),
            _ => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            LinkTarget::Resolved(path) => path.as_str(),
            LinkTarget::Unresolved(label) | LinkTarget::Url(label) => label,
        }
    }
}

/// A typed reference extracted from one note
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub target: LinkTarget,
    pub kind: LinkKind,
    /// Target as written (alias and anchor stripped); becomes the
    /// unresolved label if the resolved note is deleted
    pub label: String,
}

impl Link {
    pub fn new(label: impl Into<String>, target: LinkTarget, kind: LinkKind) -> Self {
        Self {
            target,
            kind,
            label: label.into(),
        }
    }

    /// The same reference with its target cleared back to the literal label
    pub fn unresolve(&self) -> Self {
        Self {
            target: LinkTarget::Unresolved(self.label.clone()),
            kind: self.kind,
            label: self.label.clone(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.target, LinkTarget::Resolved(_))
    }

    /// Unresolved internal references become placeholder nodes in the graph.
    pub fn is_dangling_reference(&self) -> bool {
        self.kind == LinkKind::Internal && matches!(self.target, LinkTarget::Unresolved(_))
    }
}

/// Parsed frontmatter block.
///
/// `fields` keeps every key except `tags` in document order; `tags` is the
/// reserved key, normalized to a lowercase set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    pub fields: Map<String, Value>,
    pub tags: BTreeSet<String>,
}

impl Frontmatter {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.tags.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String-valued fields flattened for indexing (lists contribute each item)
    pub fn text_values(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for value in self.fields.values() {
            match value {
                Value::String(s) => out.push(s.as_str()),
                Value::Array(items) => out.extend(items.iter().filter_map(Value::as_str)),
                _ => {}
            }
        }
        out
    }
}

/// Filesystem-derived attributes of a note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub created: Option<DateTime<Utc>>,
    pub lines: usize,
    /// Hex SHA-256 of the stored content
    pub checksum: String,
}

/// A note as returned by `get_note`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub path: NotePath,
    pub content: String,
    pub body: String,
    pub frontmatter: Frontmatter,
    /// Frontmatter tags plus inline `#tags`
    pub tags: BTreeSet<String>,
    pub links: Vec<Link>,
    pub metadata: NoteMetadata,
}

/// Listing entry for `list_notes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSummary {
    pub path: NotePath,
    pub name: String,
    pub folder: Option<FolderPath>,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// One matching line plus surrounding context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMatch {
    /// 1-based
    pub line_number: usize,
    pub context: String,
}

/// Ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: NotePath,
    pub score: f64,
    /// Number of distinct query terms present in the note
    pub matched_terms: usize,
    pub matches: Vec<LineMatch>,
}
