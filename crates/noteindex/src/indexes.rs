//! Derived indexes kept behind one lock.
//!
//! Graph, search index and the resolution catalog change together, so a
//! reader holding the read lock never sees one updated without the others.

use noteindex_core::{Error, Link, NotePath, Result};
use noteindex_graph::{GraphDelta, LinkGraph};
use noteindex_parser::{NoteCatalog, ParsedNote};
use noteindex_search::{SearchDocument, SearchIndex, SnippetOptions};

/// Content of one note with its parse, ready to index
#[derive(Debug, Clone)]
pub struct IndexedNote {
    pub path: NotePath,
    pub content: String,
    pub parsed: ParsedNote,
}

impl IndexedNote {
    pub fn parse(path: NotePath, content: String) -> Self {
        let parsed = ParsedNote::parse(&content);
        Self {
            path,
            content,
            parsed,
        }
    }

    fn document(&self) -> SearchDocument {
        SearchDocument::new(self.path.clone(), &self.content, self.parsed.body_offset)
            .with_tags(self.parsed.tags.iter().cloned())
            .with_fields(self.parsed.frontmatter.text_values())
    }
}

#[derive(Debug, Default)]
pub struct Indexes {
    pub graph: LinkGraph,
    pub search: SearchIndex,
    pub catalog: NoteCatalog,
}

impl Indexes {
    pub fn empty(options: SnippetOptions) -> Self {
        Self {
            graph: LinkGraph::new(),
            search: SearchIndex::new(options),
            catalog: NoteCatalog::new(),
        }
    }

    /// Build everything from a full set of notes.
    ///
    /// The catalog is complete before any link is resolved, so the result
    /// does not depend on note order.
    pub fn build(notes: &[IndexedNote], options: SnippetOptions) -> Self {
        let catalog = NoteCatalog::from_paths(notes.iter().map(|n| &n.path));
        let graph = LinkGraph::from_notes(notes.iter().map(|n| {
            (
                n.path.clone(),
                catalog.resolve_all(&n.path, &n.parsed.references),
            )
        }));
        let search = SearchIndex::from_documents(notes.iter().map(IndexedNote::document), options);
        Self {
            graph,
            search,
            catalog,
        }
    }

    /// Index a saved note; returns the edge changes.
    pub fn apply_note(&mut self, note: &IndexedNote) -> GraphDelta {
        self.catalog.insert(note.path.clone());
        let links = self.resolve(note);
        let delta = self.graph.upsert_note(&note.path, links);
        self.search.index(note.document());
        delta
    }

    /// Drop a deleted note; returns the notes whose links to it became unresolved.
    pub fn remove_note(&mut self, path: &NotePath) -> Result<Vec<NotePath>> {
        self.catalog.remove(path);
        let in_search = self.search.remove(path);
        let affected = self.graph.remove_note(path)?;
        if !in_search {
            return Err(Error::index_drift(path.as_str(), "note missing from search index"));
        }
        Ok(affected)
    }

    /// Relabel a moved note in every index, keeping its edges.
    pub fn rename_note(&mut self, old: &NotePath, new: &NotePath) -> Result<()> {
        self.graph.rename_path(old, new)?;
        self.catalog.remove(old);
        self.catalog.insert(new.clone());
        if !self.search.rename(old, new) {
            return Err(Error::index_drift(old.as_str(), "note missing from search index"));
        }
        Ok(())
    }

    pub fn resolve(&self, note: &IndexedNote) -> Vec<Link> {
        self.catalog.resolve_all(&note.path, &note.parsed.references)
    }

    pub fn note_count(&self) -> usize {
        self.search.len()
    }
}
