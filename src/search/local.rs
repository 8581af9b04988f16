// src/search/local.rs

//! In-process search index.
//!
//! Free text is OR-matched over tag and string-metadata tokens and scored
//! by the number of distinct query tokens a document contains. Tag facets
//! are counted over free-text matches before the tag filter narrows the
//! hits, so the facet distribution survives a filter that matches nothing.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::{Document, SearchResponse, SortOrder, StructuredQuery, TermsBucket};
use crate::search::{IndexSchema, SearchIndex, Tokenizer};
use crate::storage::LocalStorage;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndexState {
    schema: IndexSchema,
    documents: BTreeMap<String, Document>,
}

/// Search index held in memory, optionally persisted as `{dir}/{name}.json`.
#[derive(Debug, Default)]
pub struct LocalIndex {
    indices: RwLock<HashMap<String, IndexState>>,
    storage: Option<LocalStorage>,
    tokenizer: Tokenizer,
}

impl LocalIndex {
    /// Index that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Index persisted under `dir`, one JSON file per named index.
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            storage: Some(LocalStorage::new(dir)),
            ..Self::default()
        }
    }

    fn file_key(name: &str) -> String {
        format!("{name}.json")
    }

    fn missing(name: &str) -> AppError {
        AppError::index(format!("no such index '{name}'"))
    }

    /// Make sure `name` is in memory if it exists on disk.
    async fn load(&self, name: &str) -> Result<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        if self.indices.read().await.contains_key(name) {
            return Ok(());
        }

        let state = storage
            .read_json::<IndexState>(&Self::file_key(name))
            .await
            .map_err(|e| AppError::index(format!("loading '{name}': {e}")))?;

        if let Some(state) = state {
            log::debug!("Loaded index '{}' ({} documents)", name, state.documents.len());
            self.indices
                .write()
                .await
                .entry(name.to_string())
                .or_insert(state);
        }
        Ok(())
    }

    async fn persist(&self, name: &str, state: &IndexState) -> Result<()> {
        match &self.storage {
            Some(storage) => storage
                .write_json(&Self::file_key(name), state)
                .await
                .map_err(|e| AppError::index(format!("saving '{name}': {e}"))),
            None => Ok(()),
        }
    }

    /// Distinct searchable tokens of a document.
    fn document_tokens(&self, doc: &Document) -> BTreeSet<String> {
        let mut tokens = BTreeSet::new();
        for tag in &doc.tags {
            tokens.extend(self.tokenizer.tokenize(tag));
        }
        for value in doc.metadata.values() {
            match value {
                Value::String(s) => tokens.extend(self.tokenizer.tokenize(s)),
                Value::Array(items) => {
                    for s in items.iter().filter_map(Value::as_str) {
                        tokens.extend(self.tokenizer.tokenize(s));
                    }
                }
                _ => {}
            }
        }
        tokens
    }

    fn execute(&self, state: &IndexState, query: &StructuredQuery) -> Result<SearchResponse> {
        let keyword_fields = query
            .tag_filter
            .iter()
            .map(|f| f.field.as_str())
            .chain([query.aggregation.field.as_str()]);
        for field in keyword_fields {
            if !state.schema.is_keyword(field) {
                return Err(AppError::index(format!("'{field}' is not a keyword field")));
            }
        }

        let query_tokens: Option<BTreeSet<String>> = query
            .free_text
            .as_deref()
            .map(|text| self.tokenizer.tokenize(text).into_iter().collect());

        // Free-text matches with their scores.
        let matched: Vec<(usize, &Document)> = state
            .documents
            .values()
            .filter_map(|doc| match &query_tokens {
                None => Some((0, doc)),
                Some(wanted) => {
                    let score = self.document_tokens(doc).intersection(wanted).count();
                    (score > 0).then_some((score, doc))
                }
            })
            .collect();

        let buckets = tag_buckets(matched.iter().map(|(_, doc)| *doc), query.aggregation.size);

        let mut hits: Vec<(usize, &Document)> = match &query.tag_filter {
            Some(filter) => matched
                .into_iter()
                .filter(|(_, doc)| filter.matches(&doc.tags))
                .collect(),
            None => matched,
        };

        match query.sort {
            Some(SortOrder::DateAddedDesc) => {
                hits.sort_by(|(_, a), (_, b)| {
                    b.date_added.cmp(&a.date_added).then_with(|| a.id.cmp(&b.id))
                });
            }
            None => {
                hits.sort_by(|(sa, a), (sb, b)| {
                    (Reverse(sa), Reverse(a.date_added), &a.id).cmp(&(
                        Reverse(sb),
                        Reverse(b.date_added),
                        &b.id,
                    ))
                });
            }
        }

        Ok(SearchResponse {
            total: hits.len(),
            hits: hits
                .into_iter()
                .skip(query.from)
                .take(query.size)
                .map(|(_, doc)| doc.clone())
                .collect(),
            buckets,
        })
    }
}

/// Terms aggregation over raw tags: count desc, then key asc.
fn tag_buckets<'a>(docs: impl Iterator<Item = &'a Document>, size: usize) -> Vec<TermsBucket> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for doc in docs {
        let distinct: BTreeSet<&str> = doc.tags.iter().map(String::as_str).collect();
        for tag in distinct {
            *counts.entry(tag).or_default() += 1;
        }
    }

    let mut buckets: Vec<TermsBucket> = counts
        .into_iter()
        .map(|(key, doc_count)| TermsBucket {
            key: key.to_string(),
            doc_count,
        })
        .collect();
    buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then_with(|| a.key.cmp(&b.key)));
    buckets.truncate(size);
    buckets
}

#[async_trait]
impl SearchIndex for LocalIndex {
    async fn create_index(&self, name: &str, schema: &IndexSchema) -> Result<()> {
        self.load(name).await?;

        let mut indices = self.indices.write().await;
        if indices.contains_key(name) {
            return Err(AppError::IndexExists(name.to_string()));
        }
        if name.is_empty() || name.contains(['/', '\\', '.']) {
            return Err(AppError::index(format!("invalid index name '{name}'")));
        }

        let state = IndexState {
            schema: schema.clone(),
            documents: BTreeMap::new(),
        };
        self.persist(name, &state).await?;
        indices.insert(name.to_string(), state);
        log::info!("Created index '{}'", name);
        Ok(())
    }

    async fn bulk_upsert(&self, name: &str, documents: &[Document]) -> Result<Vec<String>> {
        self.load(name).await?;

        let mut indices = self.indices.write().await;
        let state = indices.get_mut(name).ok_or_else(|| Self::missing(name))?;

        let mut failed = Vec::new();
        for doc in documents {
            if doc.id.trim().is_empty() {
                failed.push(doc.id.clone());
                continue;
            }
            state.documents.insert(doc.id.clone(), doc.clone());
        }

        self.persist(name, state).await?;
        Ok(failed)
    }

    async fn bulk_delete(&self, name: &str, ids: &[String]) -> Result<()> {
        self.load(name).await?;

        let mut indices = self.indices.write().await;
        let state = indices.get_mut(name).ok_or_else(|| Self::missing(name))?;
        for id in ids {
            state.documents.remove(id);
        }
        self.persist(name, state).await
    }

    async fn list_ids(&self, name: &str, limit: usize) -> Result<Vec<String>> {
        self.load(name).await?;

        let indices = self.indices.read().await;
        let state = indices.get(name).ok_or_else(|| Self::missing(name))?;
        Ok(state.documents.keys().take(limit).cloned().collect())
    }

    async fn search(&self, name: &str, query: &StructuredQuery) -> Result<SearchResponse> {
        self.load(name).await?;

        let indices = self.indices.read().await;
        let state = indices.get(name).ok_or_else(|| Self::missing(name))?;
        self.execute(state, query)
    }
}
