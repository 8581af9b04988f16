//! Search index capability.
//!
//! The pipeline talks to any full-text engine through [`SearchIndex`].
//! [`LocalIndex`] is the in-process implementation used by the CLI and
//! the tests.

mod local;
mod tokenize;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Document, SearchResponse, StructuredQuery};

pub use local::LocalIndex;
pub use tokenize::Tokenizer;

/// Mapping for one indexed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldMapping {
    Date,
    Keyword,
    /// Tokenized text, optionally with an untokenized keyword sub-field
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<String>,
    },
}

/// Field mappings for an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub fields: BTreeMap<String, FieldMapping>,
}

impl IndexSchema {
    /// Schema for bookmark documents.
    ///
    /// `tags` is searchable text and also exposes `tags.raw` for exact
    /// filtering and facet counts.
    pub fn bookmarks() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("date_added".to_string(), FieldMapping::Date);
        fields.insert(
            "tags".to_string(),
            FieldMapping::Text {
                raw: Some("raw".to_string()),
            },
        );
        Self { fields }
    }

    /// Whether `path` (e.g. `tags.raw`) names a keyword field or sub-field.
    pub fn is_keyword(&self, path: &str) -> bool {
        match path.split_once('.') {
            Some((field, sub)) => matches!(
                self.fields.get(field),
                Some(FieldMapping::Text { raw: Some(r) }) if r == sub
            ),
            None => matches!(self.fields.get(path), Some(FieldMapping::Keyword)),
        }
    }
}

impl Default for IndexSchema {
    fn default() -> Self {
        Self::bookmarks()
    }
}

/// Capability interface of a full-text search engine.
///
/// Implementations may be eventually consistent: a search right after an
/// upsert is not required to see it.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Create an index; fails with `AppError::IndexExists` if it is present.
    async fn create_index(&self, name: &str, schema: &IndexSchema) -> Result<()>;

    /// Insert or replace documents by id. Returns the ids that failed.
    async fn bulk_upsert(&self, name: &str, documents: &[Document]) -> Result<Vec<String>>;

    /// Remove documents by id. Unknown ids are ignored.
    async fn bulk_delete(&self, name: &str, ids: &[String]) -> Result<()>;

    /// Up to `limit` ids currently in the index.
    async fn list_ids(&self, name: &str, limit: usize) -> Result<Vec<String>>;

    async fn search(&self, name: &str, query: &StructuredQuery) -> Result<SearchResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bookmark_schema() {
        let schema = IndexSchema::bookmarks();
        assert!(schema.is_keyword("tags.raw"));
        assert!(!schema.is_keyword("tags"));
        assert!(!schema.is_keyword("date_added"));
        assert_eq!(schema.fields.get("date_added"), Some(&FieldMapping::Date));

        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["fields"]["tags"]["type"], "text");
        assert_eq!(json["fields"]["tags"]["raw"], "raw");
    }
}
