//! Structured search requests and raw index responses.

use serde::{Deserialize, Serialize};

use crate::models::Document;

/// Keyword sub-field holding untokenized tags.
pub const RAW_TAG_FIELD: &str = "tags.raw";

/// Name under which the tag facet is requested.
pub const TAG_AGGREGATION: &str = "tags";

/// A search request in index-neutral form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredQuery {
    /// Zero-based offset of the first hit
    pub from: usize,

    /// Number of hits per page
    pub size: usize,

    /// Query-string style clause; required to match and drives relevance
    pub free_text: Option<String>,

    /// Tags that must all be present on a hit
    pub tag_filter: Option<TagFilter>,

    /// Explicit ordering; `None` means relevance
    pub sort: Option<SortOrder>,

    pub aggregation: TermsAggregation,
}

/// Terms-set filter: at least `minimum_should_match` of `terms` must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    pub field: String,
    pub terms: Vec<String>,
    pub minimum_should_match: usize,
}

impl TagFilter {
    /// Filter requiring every listed tag.
    pub fn all_of(terms: Vec<String>) -> Self {
        Self {
            field: RAW_TAG_FIELD.to_string(),
            minimum_should_match: terms.len(),
            terms,
        }
    }

    pub fn matches(&self, tags: &[String]) -> bool {
        let hits = self.terms.iter().filter(|t| tags.contains(t)).count();
        hits >= self.minimum_should_match
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    DateAddedDesc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsAggregation {
    pub name: String,
    pub field: String,
    pub size: usize,
}

impl TermsAggregation {
    pub fn tags(size: usize) -> Self {
        Self {
            name: TAG_AGGREGATION.to_string(),
            field: RAW_TAG_FIELD.to_string(),
            size,
        }
    }
}

/// One bucket of a terms aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsBucket {
    pub key: String,
    pub doc_count: u64,
}

/// What the index returns for a [`StructuredQuery`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub total: usize,
    pub hits: Vec<Document>,
    pub buckets: Vec<TermsBucket>,
}
