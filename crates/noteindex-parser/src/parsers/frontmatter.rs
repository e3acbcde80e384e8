//! Frontmatter block detection and parsing.
//!
//! A block starts with a `---` line at the very beginning of the content and
//! ends at the next `---` line. The enclosed YAML must be a mapping; anything
//! else degrades to empty metadata with the whole content treated as body.

use noteindex_core::Frontmatter;
use serde_json::Value;
use std::collections::BTreeSet;

const MARKER: &str = "---";
const TAGS_KEY: &str = "tags";

/// Result of splitting a note into metadata and body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontmatterSplit {
    pub frontmatter: Frontmatter,
    /// Byte offset where the body starts in the original content
    pub body_offset: usize,
}

impl FrontmatterSplit {
    pub fn body<'a>(&self, content: &'a str) -> &'a str {
        &content[self.body_offset..]
    }
}

/// Parse the optional frontmatter block at the head of `content`.
pub fn parse_frontmatter(content: &str) -> FrontmatterSplit {
    let Some((yaml, body_offset)) = locate_block(content) else {
        return FrontmatterSplit::default();
    };

    match parse_mapping(yaml) {
        Some(frontmatter) => FrontmatterSplit {
            frontmatter,
            body_offset,
        },
        None => {
            log::debug!("malformed frontmatter, treating whole content as body");
            FrontmatterSplit::default()
        }
    }
}

/// Returns the YAML text between the markers and the offset just past the closing line.
fn locate_block(content: &str) -> Option<(&str, usize)> {
    let content_start = content.strip_prefix('\u{feff}').map_or(0, |_| 3);
    let rest = &content[content_start..];
    let first_end = rest.find('\n')?;
    if rest[..first_end].trim_end() != MARKER {
        return None;
    }

    let yaml_start = content_start + first_end + 1;
    let mut line_start = yaml_start;
    for line in content[yaml_start..].split_inclusive('\n') {
        if line.trim_end() == MARKER {
            let body_offset = line_start + line.len();
            return Some((&content[yaml_start..line_start], body_offset));
        }
        line_start += line.len();
    }
    None
}

fn parse_mapping(yaml: &str) -> Option<Frontmatter> {
    if yaml.trim().is_empty() {
        return Some(Frontmatter::default());
    }

    let value: Value = serde_yaml::from_str(yaml).ok()?;
    let mut fields = match value {
        Value::Object(map) => map,
        Value::Null => return Some(Frontmatter::default()),
        _ => return None,
    };

    let tags = fields
        .shift_remove(TAGS_KEY)
        .map(|value| normalize_tags(&value))
        .unwrap_or_default();
    Some(Frontmatter { fields, tags })
}

/// Inline list, multi-line list and scalar shapes all become a lowercase set.
pub fn normalize_tags(value: &Value) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    match value {
        Value::Array(items) => {
            for item in items {
                if let Some(text) = scalar_text(item) {
                    insert_tag(&mut tags, &text);
                }
            }
        }
        other => {
            if let Some(text) = scalar_text(other) {
                for part in text.split([',', ' ']) {
                    insert_tag(&mut tags, part);
                }
            }
        }
    }
    tags
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn insert_tag(tags: &mut BTreeSet<String>, raw: &str) {
    let tag = raw.trim().trim_start_matches('#').to_lowercase();
    if !tag.is_empty() {
        tags.insert(tag);
    }
}
