use std::ops::Range;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::model::item::{Item, ItemKind};

/// Which field of an item matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchField {
    Title,
    Url,
    Content,
}

/// A search hit on one field of one item
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub item_id: String,
    pub field: MatchField,
    pub spans: Vec<Range<usize>>,
}

/// Build a case-insensitive matcher. A pattern that isn't a valid regex is
/// matched literally, so typing `c++` still finds things.
pub fn build_matcher(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex::escape(pattern))
                .case_insensitive(true)
                .build()
        })
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Search titles, urls and snippet contents, in collection order.
pub fn search_items(items: &[Item], re: &Regex) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for item in items {
        let mut check = |field: MatchField, text: &str| {
            let spans = find_matches(re, text);
            if !spans.is_empty() {
                hits.push(SearchHit {
                    item_id: item.id.clone(),
                    field,
                    spans,
                });
            }
        };

        check(MatchField::Title, &item.title);
        match &item.kind {
            ItemKind::Link { url } => check(MatchField::Url, url),
            ItemKind::Snippet { content, url } => {
                if let Some(url) = url {
                    check(MatchField::Url, url);
                }
                check(MatchField::Content, content);
            }
            ItemKind::Folder { .. } => {}
        }
    }
    hits
}
