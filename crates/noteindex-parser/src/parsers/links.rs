//! Reference extraction: wikilinks, embeds, markdown links and images.
//!
//! Markdown links and images come from the pulldown-cmark event stream;
//! wikilinks are matched with a regex and filtered against code ranges.

use crate::engine::ExcludedRanges;
use noteindex_core::LinkKind;
use regex::Regex;
use std::sync::LazyLock;

/// `[[target]]`, `[[target|alias]]`, `[[target#heading]]`, `![[embed]]`
static WIKILINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[\[([^\[\]\n]+?)\]\]").unwrap());

/// Scheme prefix such as `https:` or `mailto:`
static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

/// How a reference was written, which decides how its target is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSyntax {
    Wiki,
    Markdown,
}

/// A reference as written in the body, before resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference {
    /// Target with alias, anchor and query stripped
    pub target: String,
    pub kind: LinkKind,
    pub syntax: ReferenceSyntax,
    /// Absolute URL, never resolved against the store
    pub is_url: bool,
    /// Byte offset within the body
    pub offset: usize,
}

/// True for targets with a URL scheme (`https:`, `mailto:`, ...).
///
/// A single-letter scheme is treated as a Windows drive, not a URL.
pub fn is_absolute_url(target: &str) -> bool {
    URL_SCHEME
        .find(target)
        .is_some_and(|m| m.len() > 2)
}

/// Split `target|alias` and `target#heading` / `target^block`.
fn strip_wiki_decorations(raw: &str) -> &str {
    let target = raw.split('|').next().unwrap_or(raw);
    let target = target.split('#').next().unwrap_or(target);
    target.split('^').next().unwrap_or(target).trim()
}

/// Strip `#fragment` and `?query` from a markdown destination.
fn strip_markdown_destination(dest: &str) -> &str {
    let end = dest.find(['#', '?']).unwrap_or(dest.len());
    dest[..end].trim()
}

pub(crate) fn extract_wikilinks(body: &str, excluded: &ExcludedRanges) -> Vec<RawReference> {
    let mut refs = Vec::new();
    for caps in WIKILINK.captures_iter(body) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if excluded.contains(whole.start()) {
            continue;
        }

        let target = strip_wiki_decorations(inner.as_str());
        if target.is_empty() {
            continue;
        }
        let is_embed = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        // Note names may legitimately look like `Topic:Sub`; only `scheme://` counts here.
        let is_url = target.contains("://") && is_absolute_url(target);
        let kind = match (is_embed, is_url) {
            (true, _) => LinkKind::Image,
            (false, true) => LinkKind::External,
            (false, false) => LinkKind::Internal,
        };

        refs.push(RawReference {
            target: target.to_string(),
            kind,
            syntax: ReferenceSyntax::Wiki,
            is_url,
            offset: whole.start(),
        });
    }
    refs
}

/// Build a reference from a markdown link or image destination.
///
/// Returns `None` for same-note anchors (`#section`) and empty destinations.
pub(crate) fn markdown_reference(dest: &str, is_image: bool, offset: usize) -> Option<RawReference> {
    let dest = dest.trim();
    if dest.is_empty() || dest.starts_with('#') {
        return None;
    }

    let is_url = is_absolute_url(dest);
    let target = if is_url {
        dest
    } else {
        strip_markdown_destination(dest)
    };
    if target.is_empty() {
        return None;
    }

    let kind = match (is_image, is_url) {
        (true, _) => LinkKind::Image,
        (false, true) => LinkKind::External,
        (false, false) => LinkKind::Internal,
    };
    Some(RawReference {
        target: target.to_string(),
        kind,
        syntax: ReferenceSyntax::Markdown,
        is_url,
        offset,
    })
}
