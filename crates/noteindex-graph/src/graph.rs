//! Link graph over note identities using petgraph.
//!
//! Nodes are stored notes or placeholders for unresolved internal references.
//! Edges exist for every resolved link and every dangling internal link; URLs
//! and unresolved images live only in the per-note link list.

use crate::delta::GraphDelta;
use noteindex_core::{Error, Link, LinkKind, LinkTarget, NotePath, Result};
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A node in the link graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GraphNode {
    Note(NotePath),
    /// Label of a reference that matched no note
    Unresolved(String),
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            GraphNode::Note(path) => path.as_str(),
            GraphNode::Unresolved(label) => label,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            GraphNode::Note(_) => NodeKind::Note,
            GraphNode::Unresolved(_) => NodeKind::Unresolved,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Note,
    Unresolved,
}

/// Edge weight: what kind of reference, and how it was written
#[derive(Debug, Clone, PartialEq, Eq)]
struct EdgeData {
    kind: LinkKind,
    label: String,
}

impl EdgeData {
    fn of(link: &Link) -> Self {
        Self {
            kind: link.kind,
            label: link.label.clone(),
        }
    }
}

/// Serializable node for `get_graph`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: String,
    pub kind: NodeKind,
}

/// Serializable edge for `get_graph`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub source: String,
    pub target: String,
    pub kind: LinkKind,
    pub resolved: bool,
}

/// Point-in-time copy of the whole graph, sorted for stable output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

/// Graph statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub note_count: usize,
    pub unresolved_count: usize,
    pub edge_count: usize,
    pub orphan_count: usize,
}

/// Incrementally maintained link graph
#[derive(Debug, Default)]
pub struct LinkGraph {
    graph: StableDiGraph<GraphNode, EdgeData>,
    notes: HashMap<NotePath, NodeIndex>,
    placeholders: HashMap<String, NodeIndex>,
    /// Most recently extracted links per note, in document order
    outgoing: HashMap<NotePath, Vec<Link>>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from scratch: every note node first, then all links.
    pub fn from_notes(notes: impl IntoIterator<Item = (NotePath, Vec<Link>)>) -> Self {
        let mut graph = Self::new();
        let notes: Vec<(NotePath, Vec<Link>)> = notes.into_iter().collect();
        for (path, _) in &notes {
            graph.ensure_note(path);
        }
        for (path, links) in notes {
            graph.upsert_note(&path, links);
        }
        graph
    }

    /// Replace all outgoing edges of `path` with `links`.
    pub fn upsert_note(&mut self, path: &NotePath, links: Vec<Link>) -> GraphDelta {
        let old = self.outgoing.get(path).map(Vec::as_slice).unwrap_or(&[]);
        let delta = GraphDelta::between(path, old, &links);
        self.apply(&delta);
        self.outgoing.insert(path.clone(), links);
        delta
    }

    /// Apply a precomputed delta to the edges and the stored link list.
    pub fn apply(&mut self, delta: &GraphDelta) {
        let source = self.ensure_note(&delta.source);
        for link in &delta.removed {
            self.remove_edge_for(source, link);
        }
        for link in &delta.added {
            self.add_edge_for(source, link);
        }

        let entry = self.outgoing.entry(delta.source.clone()).or_default();
        entry.retain(|link| !delta.removed.contains(link));
        entry.extend(delta.added.iter().cloned());
    }

    /// Remove a note. Internal links from other notes that targeted it are
    /// kept as unresolved edges; embeds are unresolved without an edge.
    /// Returns the notes whose links were unresolved.
    pub fn remove_note(&mut self, path: &NotePath) -> Result<Vec<NotePath>> {
        let idx = *self
            .notes
            .get(path)
            .ok_or_else(|| Error::not_found(path.as_str()))?;

        for link in self.outgoing.remove(path).unwrap_or_default() {
            self.remove_edge_for(idx, &link);
        }

        let incoming: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.id(), e.source(), e.weight().clone()))
            .collect();

        let mut affected = BTreeSet::new();
        for (edge, source_idx, data) in incoming {
            self.graph.remove_edge(edge);
            let Some(GraphNode::Note(source)) = self.graph.node_weight(source_idx).cloned() else {
                continue;
            };
            if let Some(links) = self.outgoing.get_mut(&source) {
                for link in links.iter_mut() {
                    if link.target.as_note() == Some(path) && link.kind == data.kind {
                        *link = link.unresolve();
                    }
                }
            }
            // Only internal references keep a placeholder edge
            if data.kind == LinkKind::Internal {
                let placeholder = self.ensure_placeholder(&data.label);
                self.graph.add_edge(source_idx, placeholder, data);
            }
            affected.insert(source);
        }

        self.graph.remove_node(idx);
        self.notes.remove(path);
        log::debug!("graph: removed {path}, {} notes now unresolved", affected.len());
        Ok(affected.into_iter().collect())
    }

    /// Relabel a note and every link that resolved to it. Link text inside
    /// other notes is not touched.
    pub fn rename_path(&mut self, old: &NotePath, new: &NotePath) -> Result<()> {
        if self.notes.contains_key(new) {
            return Err(Error::conflict(new.as_str()));
        }
        let idx = self
            .notes
            .remove(old)
            .ok_or_else(|| Error::not_found(old.as_str()))?;

        if let Some(weight) = self.graph.node_weight_mut(idx) {
            *weight = GraphNode::Note(new.clone());
        }
        self.notes.insert(new.clone(), idx);
        if let Some(links) = self.outgoing.remove(old) {
            self.outgoing.insert(new.clone(), links);
        }

        let sources: BTreeSet<NotePath> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter_map(|e| match self.graph.node_weight(e.source()) {
                Some(GraphNode::Note(path)) => Some(path.clone()),
                _ => None,
            })
            .collect();
        for source in sources {
            if let Some(links) = self.outgoing.get_mut(&source) {
                for link in links.iter_mut() {
                    if link.target.as_note() == Some(old) {
                        link.target = LinkTarget::Resolved(new.clone());
                    }
                }
            }
        }
        Ok(())
    }

    pub fn contains_note(&self, path: &NotePath) -> bool {
        self.notes.contains_key(path)
    }

    /// Links most recently extracted from `path`, in document order
    pub fn outgoing_links(&self, path: &NotePath) -> Result<Vec<Link>> {
        if !self.notes.contains_key(path) {
            return Err(Error::not_found(path.as_str()));
        }
        Ok(self.outgoing.get(path).cloned().unwrap_or_default())
    }

    /// Notes with a resolved link to `path`, sorted
    pub fn backlinks(&self, path: &NotePath) -> Result<Vec<NotePath>> {
        let idx = self
            .notes
            .get(path)
            .ok_or_else(|| Error::not_found(path.as_str()))?;

        let sources: BTreeSet<NotePath> = self
            .graph
            .edges_directed(*idx, Direction::Incoming)
            .filter_map(|e| match self.graph.node_weight(e.source()) {
                Some(GraphNode::Note(source)) => Some(source.clone()),
                _ => None,
            })
            .collect();
        Ok(sources.into_iter().collect())
    }

    /// Every node, sorted
    pub fn all_nodes(&self) -> Vec<GraphNode> {
        let mut nodes: Vec<GraphNode> = self.node_weights().cloned().collect();
        nodes.sort();
        nodes
    }

    /// Stored notes with no edges in either direction
    pub fn orphans(&self) -> Vec<NotePath> {
        let mut orphans: Vec<NotePath> = self
            .notes
            .iter()
            .filter(|&(_, &idx)| self.graph.neighbors_undirected(idx).next().is_none())
            .map(|(path, _)| path.clone())
            .collect();
        orphans.sort();
        orphans
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            note_count: self.notes.len(),
            unresolved_count: self.placeholders.len(),
            edge_count: self.graph.edge_count(),
            orphan_count: self.orphans().len(),
        }
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let mut nodes: Vec<SnapshotNode> = self
            .node_weights()
            .map(|node| SnapshotNode {
                id: node.id().to_string(),
                kind: node.kind(),
            })
            .collect();
        nodes.sort();

        let mut edges: Vec<SnapshotEdge> = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (source, target) = self.graph.edge_endpoints(e)?;
                let source = self.graph.node_weight(source)?;
                let target = self.graph.node_weight(target)?;
                Some(SnapshotEdge {
                    source: source.id().to_string(),
                    target: target.id().to_string(),
                    kind: self.graph.edge_weight(e)?.kind,
                    resolved: matches!(target, GraphNode::Note(_)),
                })
            })
            .collect();
        edges.sort();

        GraphSnapshot { nodes, edges }
    }

    fn node_weights(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx))
    }

    fn ensure_note(&mut self, path: &NotePath) -> NodeIndex {
        if let Some(&idx) = self.notes.get(path) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::Note(path.clone()));
        self.notes.insert(path.clone(), idx);
        idx
    }

    fn ensure_placeholder(&mut self, label: &str) -> NodeIndex {
        if let Some(&idx) = self.placeholders.get(label) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::Unresolved(label.to_string()));
        self.placeholders.insert(label.to_string(), idx);
        idx
    }

    fn target_node(&self, link: &Link) -> Option<NodeIndex> {
        match &link.target {
            LinkTarget::Resolved(path) => self.notes.get(path).copied(),
            LinkTarget::Unresolved(label) if link.is_dangling_reference() => {
                self.placeholders.get(label).copied()
            }
            _ => None,
        }
    }

    fn add_edge_for(&mut self, source: NodeIndex, link: &Link) {
        let target = match &link.target {
            LinkTarget::Resolved(path) => self.ensure_note(path),
            LinkTarget::Unresolved(label) if link.is_dangling_reference() => {
                self.ensure_placeholder(label)
            }
            _ => return,
        };
        self.graph.add_edge(source, target, EdgeData::of(link));
    }

    fn remove_edge_for(&mut self, source: NodeIndex, link: &Link) {
        let Some(target) = self.target_node(link) else {
            return;
        };
        let data = EdgeData::of(link);
        let edge = self
            .graph
            .edges_directed(source, Direction::Outgoing)
            .find(|e| e.target() == target && *e.weight() == data)
            .map(|e| e.id());
        if let Some(edge) = edge {
            self.graph.remove_edge(edge);
        }
        self.drop_placeholder_if_unused(target);
    }

    fn drop_placeholder_if_unused(&mut self, idx: NodeIndex) {
        let Some(GraphNode::Unresolved(label)) = self.graph.node_weight(idx).cloned() else {
            return;
        };
        if self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .next()
            .is_none()
        {
            self.graph.remove_node(idx);
            self.placeholders.remove(&label);
        }
    }
}
