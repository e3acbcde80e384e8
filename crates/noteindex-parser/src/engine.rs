//! Single-pass note parsing.
//!
//! - Frontmatter is split off first; the body is everything after it
//! - pulldown-cmark walks the body once, yielding markdown links/images and
//!   the byte ranges of code and raw HTML
//! - Regex passes (wikilinks, inline tags) skip those excluded ranges

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use std::collections::BTreeSet;
use std::ops::Range;

use noteindex_core::Frontmatter;

use crate::parsers::frontmatter::parse_frontmatter;
use crate::parsers::links::{RawReference, extract_wikilinks, markdown_reference};
use crate::parsers::tags::extract_inline_tags;

/// Byte ranges (code blocks, inline code, raw HTML) where link and tag
/// syntax is not interpreted.
#[derive(Debug, Default, Clone)]
pub struct ExcludedRanges {
    ranges: Vec<Range<usize>>,
}

impl ExcludedRanges {
    /// Binary search over sorted, merged ranges.
    #[inline]
    pub fn contains(&self, offset: usize) -> bool {
        let idx = self.ranges.partition_point(|r| r.start <= offset);
        idx > 0 && offset < self.ranges[idx - 1].end
    }

    fn add(&mut self, range: Range<usize>) {
        self.ranges.push(range);
    }

    /// Sort and merge overlapping ranges.
    fn optimize(&mut self) {
        if self.ranges.is_empty() {
            return;
        }
        self.ranges.sort_by_key(|r| r.start);

        let mut merged: Vec<Range<usize>> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(current) if range.start <= current.end => {
                    current.end = current.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }
        self.ranges = merged;
    }
}

/// Everything the indexes need from one note's content
#[derive(Debug, Clone, Default)]
pub struct ParsedNote {
    pub frontmatter: Frontmatter,
    /// Byte offset where the body starts in the content
    pub body_offset: usize,
    /// References in order of appearance, unresolved
    pub references: Vec<RawReference>,
    /// Frontmatter tags merged with inline `#tags`
    pub tags: BTreeSet<String>,
}

impl ParsedNote {
    pub fn parse(content: &str) -> Self {
        let split = parse_frontmatter(content);
        let body = split.body(content);

        let (excluded, mut references) = markdown_pass(body);
        references.extend(extract_wikilinks(body, &excluded));
        references.sort_by_key(|r| r.offset);

        let mut tags = split.frontmatter.tags.clone();
        tags.extend(extract_inline_tags(body, &excluded));

        Self {
            frontmatter: split.frontmatter,
            body_offset: split.body_offset,
            references,
            tags,
        }
    }

    pub fn body<'a>(&self, content: &'a str) -> &'a str {
        &content[self.body_offset..]
    }
}

fn markdown_pass(body: &str) -> (ExcludedRanges, Vec<RawReference>) {
    let mut excluded = ExcludedRanges::default();
    let mut references = Vec::new();

    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);

    let mut code_block_start = None;
    for (event, range) in Parser::new_ext(body, opts).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(_)) => code_block_start = Some(range.start),
            Event::End(TagEnd::CodeBlock) => {
                let start = code_block_start.take().unwrap_or(range.start);
                excluded.add(start..range.end);
            }
            Event::Code(_) | Event::Html(_) | Event::InlineHtml(_) => excluded.add(range),
            Event::Start(Tag::Link { dest_url, .. }) => {
                references.extend(markdown_reference(&dest_url, false, range.start));
            }
            Event::Start(Tag::Image { dest_url, .. }) => {
                references.extend(markdown_reference(&dest_url, true, range.start));
            }
            _ => {}
        }
    }

    excluded.optimize();
    (excluded, references)
}

#[cfg(test)]
mod tests {
    use super::*;
    use noteindex_core::LinkKind;

    #[test]
    fn test_excluded_ranges_merge_and_lookup() {
        let mut ranges = ExcludedRanges::default();
        ranges.add(10..20);
        ranges.add(0..5);
        ranges.add(15..30);
        ranges.optimize();
        assert!(ranges.contains(0));
        assert!(!ranges.contains(5));
        assert!(ranges.contains(25));
        assert!(!ranges.contains(30));
    }

    #[test]
    fn test_parse_collects_all_reference_kinds() {
        let content = "---\ntags: [Alpha]\n---\n\
                       Link to [[beta]] and [gamma](sub/gamma.md).\n\
                       Visit <https://example.com> or ![pic](img/p.png) #Inline\n";
        let parsed = ParsedNote::parse(content);

        let kinds: Vec<(LinkKind, &str)> = parsed
            .references
            .iter()
            .map(|r| (r.kind, r.target.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (LinkKind::Internal, "beta"),
                (LinkKind::Internal, "sub/gamma.md"),
                (LinkKind::External, "https://example.com"),
                (LinkKind::Image, "img/p.png"),
            ]
        );
        assert_eq!(
            parsed.tags.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["alpha", "inline"]
        );
        assert!(parsed.body(content).starts_with("Link to"));
    }

    #[test]
    fn test_code_is_excluded() {
        let content = "Real [[one]]\n\n```\n[[fenced]] #nottag\n```\n\nand `[[inline]]`\n";
        let parsed = ParsedNote::parse(content);
        let targets: Vec<&str> = parsed.references.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["one"]);
        assert!(parsed.tags.is_empty());
    }
}
