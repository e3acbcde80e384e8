//! # noteindex parser
//!
//! Turns raw note content into what the indexes need: frontmatter, inline
//! tags and typed references, then resolves references against the set of
//! stored notes.
//!
//! ## Architecture
//!
//! ### Phase 1: frontmatter split
//! - A `---` block at the very start is parsed as YAML; malformed metadata
//!   degrades to an empty mapping with the whole content as body
//!
//! ### Phase 2: pulldown-cmark pass over the body
//! - Markdown links, autolinks and images
//! - Builds excluded ranges (code blocks, inline code, HTML)
//!
//! ### Phase 3: regex pass
//! - Wikilinks `[[]]`, embeds `![[]]` and inline `#tags`, skipping excluded ranges
//!
//! ### Resolution
//! - [`NoteCatalog`] maps raw references to [`noteindex_core::Link`]s,
//!   resolved or unresolved, deduplicated per (target, kind)
//!
//! ## Quick Start
//!
//! ```
//! use noteindex_parser::{NoteCatalog, ParsedNote};
//! use noteindex_core::PathValidator;
//!
//! let content = "---\ntags: [Review]\n---\nSee [[Other]] and [site](https://example.com).\n";
//! let parsed = ParsedNote::parse(content);
//! assert!(parsed.tags.contains("review"));
//!
//! let other = PathValidator::note("Other").unwrap();
//! let catalog = NoteCatalog::from_paths([&other]);
//! let source = PathValidator::note("me").unwrap();
//! let links = catalog.resolve_all(&source, &parsed.references);
//! assert_eq!(links.len(), 2);
//! assert!(links[0].is_resolved());
//! ```

pub mod engine;
pub mod parsers;
pub mod resolve;

pub use engine::{ExcludedRanges, ParsedNote};
pub use parsers::frontmatter::{FrontmatterSplit, normalize_tags, parse_frontmatter};
pub use parsers::links::{RawReference, ReferenceSyntax, is_absolute_url};
pub use resolve::NoteCatalog;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::engine::ParsedNote;
    pub use crate::parsers::frontmatter::parse_frontmatter;
    pub use crate::parsers::links::RawReference;
    pub use crate::resolve::NoteCatalog;
}
