//! # noteindex search
//!
//! In-memory full-text index over notes.
//!
//! - One [`SearchDocument`] per note: body, tags, frontmatter string values
//!   and the file name, analyzed with tantivy's tokenizer pipeline
//! - Re-indexing a path replaces its document; nothing is merged
//! - Queries rank by distinct matched terms, then total term frequency, then
//!   path, and return up to a few matching lines with one line of context
//! - Rebuilds construct a new [`SearchIndex`] which the caller swaps in
//!
//! ```
//! use noteindex_search::{SearchDocument, SearchIndex};
//! use noteindex_core::PathValidator;
//!
//! let mut index = SearchIndex::default();
//! let path = PathValidator::note("greeting").unwrap();
//! index.index(SearchDocument::new(path, "hello world\n", 0));
//! let hits = index.query("HELLO");
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].matches[0].line_number, 1);
//! ```

pub mod index;
pub mod tokenizer;

pub use index::{SearchDocument, SearchIndex, SnippetOptions};
pub use tokenizer::{Term, query_terms, tokenize};
