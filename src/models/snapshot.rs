//! Raw remote records and the cached snapshot built from them.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::Document;
use crate::models::document::{RESERVED_FIELDS, dedup_tags};
use crate::utils::normalize_archive_id;

/// An item record as delivered by the remote source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawItem {
    pub id: String,

    /// Either a list or a single whitespace-separated string upstream
    #[serde(default, deserialize_with = "tag_list")]
    pub tags: Vec<String>,

    #[serde(
        default,
        alias = "time",
        alias = "dateAdded",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_added: Option<DateTime<Utc>>,

    /// Everything else the source sent (title, url, description, toread, ...)
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl RawItem {
    pub fn new(id: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            id: id.into(),
            tags,
            date_added: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagList {
    Joined(String),
    List(Vec<String>),
}

fn tag_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<TagList>::deserialize(deserializer)? {
        Some(TagList::Joined(s)) => s.split_whitespace().map(String::from).collect(),
        Some(TagList::List(v)) => v,
        None => Vec::new(),
    })
}

/// Extracted readable text for one archived page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Normalized archive identifier
    pub id: String,
    pub text: String,
}

/// The last successfully synchronized state of the remote source.
///
/// Replaced wholesale on every successful refresh; never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheSnapshot {
    /// Remote last-update timestamp observed by the refresh that built this
    pub last_fetched: DateTime<Utc>,

    pub items: Vec<RawItem>,

    /// Sorted, deduplicated
    pub starred_ids: Vec<String>,

    /// Remote item id -> opaque archive reference
    pub archive_links: BTreeMap<String, String>,
}

impl CacheSnapshot {
    pub fn new(
        last_fetched: DateTime<Utc>,
        items: Vec<RawItem>,
        starred_ids: impl IntoIterator<Item = String>,
        archive_links: BTreeMap<String, String>,
    ) -> Self {
        let mut starred_ids: Vec<String> = starred_ids.into_iter().collect();
        starred_ids.sort();
        starred_ids.dedup();

        Self {
            last_fetched,
            items,
            starred_ids,
            archive_links,
        }
    }

    /// Whether the remote timestamp is within `tolerance` of `last_fetched`.
    pub fn is_fresh(&self, remote_updated: DateTime<Utc>, tolerance: Duration) -> bool {
        (remote_updated - self.last_fetched).abs() <= tolerance
    }

    pub fn is_starred(&self, id: &str) -> bool {
        self.starred_ids
            .binary_search_by(|s| s.as_str().cmp(id))
            .is_ok()
    }

    /// Normalized archive id for an item, if it has an archive reference.
    pub fn archive_id(&self, item_id: &str) -> Option<String> {
        self.archive_links
            .get(item_id)
            .map(|reference| normalize_archive_id(reference))
    }

    pub fn item_ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.id.as_str()).collect()
    }

    /// Convert every cached item into a [`Document`].
    ///
    /// `archive_texts` maps normalized archive ids to extracted text; items
    /// without an entry simply carry no `full_text`.
    pub fn to_documents(&self, archive_texts: &HashMap<String, String>) -> Vec<Document> {
        self.items
            .iter()
            .map(|item| self.to_document(item, archive_texts))
            .collect()
    }

    fn to_document(&self, item: &RawItem, archive_texts: &HashMap<String, String>) -> Document {
        let mut metadata: BTreeMap<String, Value> = item
            .fields
            .iter()
            .filter(|(k, _)| !RESERVED_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        metadata.insert("starred".to_string(), Value::Bool(self.is_starred(&item.id)));

        if let Some(archive_id) = self.archive_id(&item.id) {
            if let Some(text) = archive_texts.get(&archive_id) {
                metadata.insert("full_text".to_string(), Value::String(text.clone()));
            }
            metadata.insert("archive_id".to_string(), Value::String(archive_id));
        }

        Document {
            id: item.id.clone(),
            tags: dedup_tags(item.tags.iter().cloned()),
            date_added: item.date_added.unwrap_or_else(Utc::now),
            metadata,
        }
    }
}
