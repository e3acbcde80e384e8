//! Individual syntax parsers driven by [`crate::engine::ParsedNote`]

pub mod frontmatter;
pub mod links;
pub(crate) mod tags;
