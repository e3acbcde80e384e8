//! In-memory inverted index with term-frequency ranking.

use crate::tokenizer::{query_terms, tokenize};
use noteindex_core::{LineMatch, NotePath, SearchHit};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Input for indexing one note
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDocument {
    pub path: NotePath,
    /// Note body (content without frontmatter)
    pub body: String,
    /// Line number of the body's first line within the full content, 0-based
    pub body_line_offset: usize,
    pub tags: BTreeSet<String>,
    /// Frontmatter string values
    pub fields: Vec<String>,
}

impl SearchDocument {
    pub fn new(path: NotePath, content: &str, body_offset: usize) -> Self {
        let body_offset = body_offset.min(content.len());
        Self {
            path,
            body: content[body_offset..].to_string(),
            body_line_offset: content[..body_offset].matches('\n').count(),
            tags: BTreeSet::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_fields<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        self.fields.extend(fields.into_iter().map(str::to_string));
        self
    }

    /// Term -> positions across every searchable part of the note
    fn analyze(&self) -> HashMap<String, Vec<usize>> {
        let mut terms: HashMap<String, Vec<usize>> = HashMap::new();
        let mut base = 0;
        let parts = std::iter::once(self.body.as_str())
            .chain(self.tags.iter().map(String::as_str))
            .chain(self.fields.iter().map(String::as_str))
            .chain(std::iter::once(self.path.stem()));

        for part in parts {
            let tokens = tokenize(part);
            let next_base = base + tokens.last().map_or(0, |t| t.position + 1);
            for token in tokens {
                terms.entry(token.text).or_default().push(base + token.position);
            }
            // Gap keeps phrases from spanning two parts
            base = next_base + 1;
        }
        terms
    }
}

/// Limits applied when building hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetOptions {
    pub max_matches: usize,
    pub context_chars: usize,
}

impl Default for SnippetOptions {
    fn default() -> Self {
        Self {
            max_matches: 3,
            context_chars: 200,
        }
    }
}

#[derive(Debug, Clone)]
struct IndexedDocument {
    doc: SearchDocument,
    terms: HashMap<String, Vec<usize>>,
}

/// Inverted index over all stored notes
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    documents: HashMap<NotePath, IndexedDocument>,
    postings: HashMap<String, BTreeSet<NotePath>>,
    options: SnippetOptions,
}

impl SearchIndex {
    pub fn new(options: SnippetOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Build a fresh index from every document
    pub fn from_documents(
        documents: impl IntoIterator<Item = SearchDocument>,
        options: SnippetOptions,
    ) -> Self {
        let mut index = Self::new(options);
        for doc in documents {
            index.index(doc);
        }
        index
    }

    /// Add or replace the document for `doc.path`
    pub fn index(&mut self, doc: SearchDocument) {
        self.remove(&doc.path);
        let terms = doc.analyze();
        for term in terms.keys() {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(doc.path.clone());
        }
        self.documents
            .insert(doc.path.clone(), IndexedDocument { doc, terms });
    }

    /// Drop the document for `path`; returns whether one existed
    pub fn remove(&mut self, path: &NotePath) -> bool {
        let Some(old) = self.documents.remove(path) else {
            return false;
        };
        for term in old.terms.keys() {
            if let Some(paths) = self.postings.get_mut(term) {
                paths.remove(path);
                if paths.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        true
    }

    /// Move a document to a new path, re-analyzing its file-name terms.
    pub fn rename(&mut self, old: &NotePath, new: &NotePath) -> bool {
        let Some(entry) = self.documents.get(old) else {
            return false;
        };
        let mut doc = entry.doc.clone();
        doc.path = new.clone();
        self.remove(old);
        self.index(doc);
        true
    }

    pub fn contains(&self, path: &NotePath) -> bool {
        self.documents.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Every indexed path, sorted
    pub fn paths(&self) -> Vec<NotePath> {
        let mut paths: Vec<NotePath> = self.documents.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Ranked query.
    ///
    /// Documents with more distinct query terms rank first, then higher total
    /// term frequency, then path order.
    pub fn query(&self, text: &str) -> Vec<SearchHit> {
        let terms = query_terms(text);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut candidates: BTreeMap<&NotePath, (usize, usize)> = BTreeMap::new();
        for term in &terms {
            let Some(paths) = self.postings.get(term) else {
                continue;
            };
            for path in paths {
                let Some(entry) = self.documents.get(path) else {
                    continue;
                };
                let tf = entry.terms.get(term).map_or(0, Vec::len);
                let slot = candidates.entry(path).or_default();
                slot.0 += 1;
                slot.1 += tf;
            }
        }

        let mut ranked: Vec<(&NotePath, usize, usize)> = candidates
            .into_iter()
            .map(|(path, (matched, tf))| (path, matched, tf))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)).then(a.0.cmp(b.0)));

        ranked
            .into_iter()
            .map(|(path, matched, tf)| SearchHit {
                path: path.clone(),
                score: score(matched, tf),
                matched_terms: matched,
                matches: self
                    .documents
                    .get(path)
                    .map(|entry| line_matches(&entry.doc, &terms, self.options))
                    .unwrap_or_default(),
            })
            .collect()
    }
}

/// Monotone in both keys: the integer part is the distinct-term count.
fn score(matched: usize, tf: usize) -> f64 {
    let tf = tf as f64;
    matched as f64 + tf / (tf + 1.0)
}

fn line_matches(doc: &SearchDocument, terms: &[String], options: SnippetOptions) -> Vec<LineMatch> {
    let lines: Vec<&str> = doc.body.lines().collect();
    let mut matches = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if matches.len() >= options.max_matches {
            break;
        }
        if !tokenize(line).iter().any(|t| terms.contains(&t.text)) {
            continue;
        }
        let start = i.saturating_sub(1);
        let end = (i + 2).min(lines.len());
        matches.push(LineMatch {
            line_number: doc.body_line_offset + i + 1,
            context: truncate_chars(&lines[start..end].join("\n"), options.context_chars),
        });
    }
    matches
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
