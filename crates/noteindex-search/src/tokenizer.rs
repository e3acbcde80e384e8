//! Term analysis shared by indexing and querying.
//!
//! Uses tantivy's simple tokenizer (split on non-alphanumeric) and
//! lowercasing. No length cap, stopword removal or stemming, so every word
//! in a note can be queried.

use std::sync::LazyLock;
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer, TokenStream};

static ANALYZER: LazyLock<TextAnalyzer> = LazyLock::new(|| {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .build()
});

/// A term and its position in the analyzed text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub text: String,
    pub position: usize,
}

/// Analyze `text` into lowercase terms with positions.
pub fn tokenize(text: &str) -> Vec<Term> {
    let mut analyzer = ANALYZER.clone();
    let mut stream = analyzer.token_stream(text);
    let mut terms = Vec::new();
    while stream.advance() {
        let token = stream.token();
        terms.push(Term {
            text: token.text.clone(),
            position: token.position,
        });
    }
    terms
}

/// Distinct terms in first-seen order
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for term in tokenize(query) {
        if !seen.contains(&term.text) {
            seen.push(term.text);
        }
    }
    seen
}
