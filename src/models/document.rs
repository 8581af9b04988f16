//! Canonical tagged document shared by sync, index, and query layers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// Field names owned by [`Document`] itself; metadata may not shadow them.
pub const RESERVED_FIELDS: &[&str] = &["id", "tags", "date_added"];

/// A tagged document as stored in the search index.
///
/// Free-form fields (title, url, description, starred, ...) live in
/// `metadata` and are flattened next to the fixed fields when serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Stable identifier from the remote source
    pub id: String,

    /// Tags in display order (no duplicates)
    #[serde(default)]
    pub tags: Vec<String>,

    /// When the item was added upstream
    #[serde(default = "Utc::now")]
    pub date_added: DateTime<Utc>,

    /// Extension fields
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

impl Document {
    /// Create a document with no metadata, dated now.
    pub fn new<I, S>(id: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            tags: dedup_tags(tags),
            date_added: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Assemble a document from parts, rejecting metadata that shadows a fixed field.
    pub fn from_parts(
        id: impl Into<String>,
        tags: Vec<String>,
        date_added: Option<DateTime<Utc>>,
        metadata: BTreeMap<String, Value>,
    ) -> Result<Self> {
        if let Some(key) = metadata
            .keys()
            .find(|k| RESERVED_FIELDS.contains(&k.as_str()))
        {
            return Err(AppError::validation(format!(
                "metadata may not redefine '{key}'"
            )));
        }

        Ok(Self {
            id: id.into(),
            tags: dedup_tags(tags),
            date_added: date_added.unwrap_or_else(Utc::now),
            metadata,
        })
    }

    /// Set the added date.
    pub fn with_date_added(mut self, date_added: DateTime<Utc>) -> Self {
        self.date_added = date_added;
        self
    }

    /// Add an extension field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        let key = key.into();
        if RESERVED_FIELDS.contains(&key.as_str()) {
            return Err(AppError::validation(format!(
                "metadata may not redefine '{key}'"
            )));
        }
        self.metadata.insert(key, value.into());
        Ok(self)
    }

    /// Look up a field by name: fixed fields first, then metadata.
    pub fn get(&self, field: &str) -> Result<Value> {
        match field {
            "id" => Ok(Value::String(self.id.clone())),
            "tags" => Ok(Value::from(self.tags.clone())),
            "date_added" => Ok(Value::String(self.date_added.to_rfc3339())),
            _ => self
                .metadata
                .get(field)
                .cloned()
                .ok_or_else(|| AppError::UnknownField(field.to_string())),
        }
    }

    /// String-valued metadata field, if present.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.metadata.get(field).and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.get_str("title")
    }

    pub fn url(&self) -> Option<&str> {
        self.get_str("url")
    }

    pub fn full_text(&self) -> Option<&str> {
        self.get_str("full_text")
    }

    pub fn is_starred(&self) -> bool {
        self.metadata
            .get("starred")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Drop repeated tags, keeping the first occurrence.
pub(crate) fn dedup_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.into();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_fields_resolve_before_metadata() {
        let doc = Document::new("a1", ["rust", "web"])
            .with_field("title", "Hello")
            .unwrap();

        assert_eq!(doc.get("id").unwrap(), json!("a1"));
        assert_eq!(doc.get("tags").unwrap(), json!(["rust", "web"]));
        assert_eq!(doc.get("title").unwrap(), json!("Hello"));
        assert_eq!(doc.title(), Some("Hello"));
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let doc = Document::new("a1", ["rust"]);
        assert!(matches!(
            doc.get("nope"),
            Err(AppError::UnknownField(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_metadata_cannot_shadow_fixed_fields() {
        let mut metadata = BTreeMap::new();
        metadata.insert("tags".to_string(), json!("oops"));
        assert!(Document::from_parts("a1", vec![], None, metadata).is_err());
        assert!(Document::new("a1", ["x"]).with_field("id", "b").is_err());
    }

    #[test]
    fn test_tags_keep_order_without_duplicates() {
        let doc = Document::new("a1", ["b", "a", "b", "", "c"]);
        assert_eq!(doc.tags, vec!["b", "a", "c"]);
        assert!(doc.has_tag("a"));
    }

    #[test]
    fn test_serialized_form_is_flat() {
        let doc = Document::new("a1", ["x"])
            .with_field("starred", true)
            .unwrap();
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["id"], json!("a1"));
        assert_eq!(value["starred"], json!(true));

        let back: Document = serde_json::from_value(value).unwrap();
        assert!(back.is_starred());
        assert!(!back.metadata.contains_key("id"));
    }

    #[test]
    fn test_missing_date_defaults_to_now() {
        let before = Utc::now();
        let doc: Document = serde_json::from_value(json!({"id": "z", "tags": []})).unwrap();
        assert!(doc.date_added >= before);
    }
}
