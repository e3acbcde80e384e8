//! Link resolution against the set of stored notes.
//!
//! Order of attempts for a reference written in note `src`:
//! 1. candidate paths: relative to `src`'s folder, then relative to the root
//!    (a leading `/` means root only)
//! 2. each candidate as given, then with `.md` appended
//! 3. case-insensitive match of each candidate, with and without `.md`
//! 4. for bare names (no `/`), a case-insensitive match on the note stem
//!    anywhere in the tree; ties go to the lexicographically smallest path
//!
//! Anything else stays unresolved with its literal label.

use crate::parsers::links::{RawReference, ReferenceSyntax};
use noteindex_core::{Link, LinkTarget, NOTE_EXTENSION, NotePath};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Lookup tables over the current note paths
#[derive(Debug, Default, Clone)]
pub struct NoteCatalog {
    exact: HashSet<NotePath>,
    /// lowercase path -> matching notes
    folded: HashMap<String, BTreeSet<NotePath>>,
    /// lowercase stem -> matching notes
    stems: HashMap<String, BTreeSet<NotePath>>,
}

impl NoteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a NotePath>) -> Self {
        let mut catalog = Self::new();
        for path in paths {
            catalog.insert(path.clone());
        }
        catalog
    }

    pub fn insert(&mut self, path: NotePath) {
        if !self.exact.insert(path.clone()) {
            return;
        }
        self.folded
            .entry(path.as_str().to_lowercase())
            .or_default()
            .insert(path.clone());
        self.stems
            .entry(path.stem().to_lowercase())
            .or_default()
            .insert(path);
    }

    pub fn remove(&mut self, path: &NotePath) {
        if !self.exact.remove(path) {
            return;
        }
        remove_from(&mut self.folded, &path.as_str().to_lowercase(), path);
        remove_from(&mut self.stems, &path.stem().to_lowercase(), path);
    }

    pub fn contains(&self, path: &NotePath) -> bool {
        self.exact.contains(path)
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    fn lookup_exact(&self, candidate: &str) -> Option<NotePath> {
        self.exact.get(candidate).cloned()
    }

    fn lookup_folded(&self, candidate: &str) -> Option<NotePath> {
        self.folded
            .get(&candidate.to_lowercase())
            .and_then(|set| set.first().cloned())
    }

    fn lookup_stem(&self, name: &str) -> Option<NotePath> {
        let folded = name.to_lowercase();
        let stem = folded
            .strip_suffix(NOTE_EXTENSION)
            .unwrap_or(folded.as_str());
        self.stems.get(stem).and_then(|set| set.first().cloned())
    }

    /// Resolve one reference written in `source`.
    pub fn resolve(&self, source: &NotePath, reference: &RawReference) -> Link {
        if reference.is_url {
            return Link::new(
                reference.target.clone(),
                LinkTarget::Url(reference.target.clone()),
                reference.kind,
            );
        }

        let decoded = match reference.syntax {
            ReferenceSyntax::Markdown => urlencoding::decode(&reference.target)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| reference.target.clone()),
            ReferenceSyntax::Wiki => reference.target.clone(),
        };

        let target = match self.resolve_path(source, &decoded) {
            Some(path) => LinkTarget::Resolved(path),
            None => LinkTarget::Unresolved(decoded.clone()),
        };
        Link::new(decoded, target, reference.kind)
    }

    fn resolve_path(&self, source: &NotePath, target: &str) -> Option<NotePath> {
        let candidates = candidate_paths(source, target);

        for candidate in &candidates {
            let with_ext = format!("{candidate}{NOTE_EXTENSION}");
            if let Some(hit) = self
                .lookup_exact(candidate)
                .or_else(|| self.lookup_exact(&with_ext))
            {
                return Some(hit);
            }
        }
        for candidate in &candidates {
            let with_ext = format!("{candidate}{NOTE_EXTENSION}");
            if let Some(hit) = self
                .lookup_folded(candidate)
                .or_else(|| self.lookup_folded(&with_ext))
            {
                return Some(hit);
            }
        }

        let bare = target.trim_start_matches("./");
        if !bare.contains('/') {
            return self.lookup_stem(bare);
        }
        None
    }

    /// Resolve and deduplicate on (target, kind), keeping first occurrence order.
    pub fn resolve_all(&self, source: &NotePath, references: &[RawReference]) -> Vec<Link> {
        let mut seen = HashSet::new();
        let mut links = Vec::with_capacity(references.len());
        for reference in references {
            let link = self.resolve(source, reference);
            if seen.insert((link.target.clone(), link.kind)) {
                links.push(link);
            }
        }
        links
    }
}

fn remove_from(index: &mut HashMap<String, BTreeSet<NotePath>>, key: &str, path: &NotePath) {
    if let Some(set) = index.get_mut(key) {
        set.remove(path);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

/// Lexically join `target` onto the source folder and onto the root.
fn candidate_paths(source: &NotePath, target: &str) -> Vec<String> {
    if let Some(rooted) = target.strip_prefix('/') {
        return normalize_segments("", rooted).into_iter().collect();
    }

    let folder = source.folder();
    let mut candidates = Vec::with_capacity(2);
    if let Some(folder) = &folder
        && let Some(relative) = normalize_segments(folder.as_str(), target)
    {
        candidates.push(relative);
    }
    if let Some(rooted) = normalize_segments("", target)
        && !candidates.contains(&rooted)
    {
        candidates.push(rooted);
    }
    candidates
}

/// Returns `None` when `..` climbs above the root.
fn normalize_segments(base: &str, target: &str) -> Option<String> {
    let mut stack: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            s => stack.push(s),
        }
    }
    (!stack.is_empty()).then(|| stack.join("/"))
}
