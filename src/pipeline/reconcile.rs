// src/pipeline/reconcile.rs

//! Index reconciliation.
//!
//! Pushes the current documents into a named index and then removes
//! indexed ids that are no longer present. Deletes never start before the
//! upsert phase has finished.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{Document, IndexConfig};
use crate::pipeline::diff::orphan_ids;
use crate::search::{IndexSchema, SearchIndex};

/// Outcome of one reconcile call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub index: String,
    pub upserted: usize,
    /// Ids still failing after the last attempt
    pub failed_ids: Vec<String>,
    /// Orphans removed from the index
    pub deleted: Vec<String>,
}

impl ReconcileReport {
    /// `PartialIndexFailure` if any upserts never succeeded.
    pub fn partial_failure(&self) -> Option<AppError> {
        (!self.failed_ids.is_empty()).then(|| AppError::PartialIndexFailure {
            index: self.index.clone(),
            failed_ids: self.failed_ids.clone(),
        })
    }
}

/// Converges a search index onto a document set.
pub struct IndexReconciler {
    index: Arc<dyn SearchIndex>,
    schema: IndexSchema,
    max_attempts: usize,
    id_scan_limit: usize,
}

impl IndexReconciler {
    pub fn new(index: Arc<dyn SearchIndex>, config: &IndexConfig) -> Self {
        Self {
            index,
            schema: IndexSchema::bookmarks(),
            max_attempts: config.max_attempts.max(1),
            id_scan_limit: config.id_scan_limit,
        }
    }

    /// Make `index_name` hold exactly `documents`.
    ///
    /// Upsert failures that outlive the retries are reported in
    /// [`ReconcileReport::failed_ids`] and do not stop orphan cleanup.
    /// Index creation, listing and deletion errors are returned.
    pub async fn reconcile(
        &self,
        index_name: &str,
        documents: &[Document],
    ) -> Result<ReconcileReport> {
        self.ensure_index(index_name).await?;

        let failed_ids = self.upsert_with_retries(index_name, documents).await;
        if !failed_ids.is_empty() {
            log::warn!(
                "{} document(s) not indexed into '{}' after {} attempt(s): {}",
                failed_ids.len(),
                index_name,
                self.max_attempts,
                failed_ids.join(", ")
            );
        }

        let deleted = self.delete_orphans(index_name, documents).await?;

        Ok(ReconcileReport {
            index: index_name.to_string(),
            upserted: documents.len().saturating_sub(failed_ids.len()),
            failed_ids,
            deleted,
        })
    }

    async fn ensure_index(&self, index_name: &str) -> Result<()> {
        match self.index.create_index(index_name, &self.schema).await {
            Ok(()) => Ok(()),
            Err(AppError::IndexExists(_)) => {
                log::debug!("Index '{}' already exists", index_name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Returns the ids still failing after the last attempt.
    async fn upsert_with_retries(&self, index_name: &str, documents: &[Document]) -> Vec<String> {
        let mut batch: Vec<Document> = documents.to_vec();
        let mut failed: Vec<String> = Vec::new();

        for attempt in 1..=self.max_attempts {
            if batch.is_empty() {
                break;
            }

            failed = match self.index.bulk_upsert(index_name, &batch).await {
                Ok(failed) => failed,
                Err(e) => {
                    log::warn!("Bulk upsert attempt {} failed: {}", attempt, e);
                    batch.iter().map(|d| d.id.clone()).collect()
                }
            };

            if failed.is_empty() {
                log::info!(
                    "Indexed {} document(s) into '{}' (attempt {})",
                    batch.len(),
                    index_name,
                    attempt
                );
                break;
            }

            log::warn!(
                "Attempt {}/{}: {} of {} document(s) failed",
                attempt,
                self.max_attempts,
                failed.len(),
                batch.len()
            );
            let retry: HashSet<&str> = failed.iter().map(String::as_str).collect();
            batch.retain(|d| retry.contains(d.id.as_str()));
        }

        failed
    }

    async fn delete_orphans(&self, index_name: &str, documents: &[Document]) -> Result<Vec<String>> {
        let indexed = self.index.list_ids(index_name, self.id_scan_limit).await?;
        if indexed.len() >= self.id_scan_limit {
            log::warn!(
                "Index '{}' holds at least {} ids; orphans beyond the scan limit are not removed",
                index_name,
                self.id_scan_limit
            );
        }

        let orphans = orphan_ids(&indexed, documents);
        if !orphans.is_empty() {
            self.index.bulk_delete(index_name, &orphans).await?;
            log::info!(
                "Removed {} orphan(s) from '{}': {}",
                orphans.len(),
                index_name,
                orphans.join(", ")
            );
        }
        Ok(orphans)
    }
}
