//! Pure link-set diffing.
//!
//! [`GraphDelta::between`] compares the links a note had before a save with
//! the links it has after, without touching any graph. The graph then applies
//! the delta edge by edge.

use noteindex_core::{Link, NotePath};
use serde::Serialize;
use std::collections::HashSet;

/// Edge changes caused by one note's new content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphDelta {
    pub source: NotePath,
    pub added: Vec<Link>,
    pub removed: Vec<Link>,
}

impl GraphDelta {
    /// Diff two link lists, preserving the order each link appears in.
    pub fn between(source: &NotePath, old: &[Link], new: &[Link]) -> Self {
        let old_set: HashSet<&Link> = old.iter().collect();
        let new_set: HashSet<&Link> = new.iter().collect();

        Self {
            source: source.clone(),
            added: new
                .iter()
                .filter(|link| !old_set.contains(link))
                .cloned()
                .collect(),
            removed: old
                .iter()
                .filter(|link| !new_set.contains(link))
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
