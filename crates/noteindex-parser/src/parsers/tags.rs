//! Inline tag parser: `#tag`, `#parent/child`

use crate::engine::ExcludedRanges;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// `#tag` at line start or after whitespace/opening punctuation
static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s(\[,])#([\p{L}\p{N}_\-/]+)").unwrap());

/// Collect lowercase inline tags outside code and html.
///
/// Purely numeric tokens (`#123`, issue references) are not tags.
pub(crate) fn extract_inline_tags(body: &str, excluded: &ExcludedRanges) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for caps in TAG_PATTERN.captures_iter(body) {
        let Some(name) = caps.get(1) else { continue };
        if excluded.contains(name.start()) {
            continue;
        }
        let tag = name.as_str().trim_end_matches('/');
        if tag.is_empty() || tag.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        tags.insert(tag.to_lowercase());
    }
    tags
}
