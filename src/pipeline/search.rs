//! Query path: translate, search, collect facets.

use crate::error::Result;
use crate::models::ResultSet;
use crate::query::translate_with_facets;
use crate::search::SearchIndex;

/// Run `query_string` against `index_name` and return one page of results.
pub async fn search_documents(
    index: &dyn SearchIndex,
    index_name: &str,
    query_string: &str,
    page: usize,
    page_size: usize,
    facet_size: usize,
) -> Result<ResultSet> {
    let query = translate_with_facets(query_string, page, page_size, facet_size);
    log::debug!("Translated {:?} into {:?}", query_string, query);

    let response = index.search(index_name, &query).await?;

    Ok(ResultSet {
        total_size: response.total,
        page: page.max(1),
        page_size: page_size.max(1),
        documents: response.hits,
        tag_facets: response
            .buckets
            .into_iter()
            .map(|bucket| (bucket.key, bucket.doc_count))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::models::{IndexConfig, SourceConfig, SyncConfig};
    use crate::pipeline::{IndexReconciler, SyncEngine, run_pipeline};
    use crate::search::LocalIndex;
    use crate::storage::LocalStorage;
    use crate::testing::FakeSource;

    #[tokio::test]
    async fn test_sync_reconcile_search_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::two_pages());
        let engine = SyncEngine::new(
            source.clone(),
            Arc::new(LocalStorage::new(tmp.path())),
            SyncConfig::default(),
            &SourceConfig::default(),
        );
        let index = Arc::new(LocalIndex::in_memory());
        let reconciler = IndexReconciler::new(index.clone(), &IndexConfig::default());

        let report = run_pipeline(&engine, &reconciler, "bookmarks").await.unwrap();
        assert_eq!(report.snapshot.items.len(), 3);
        assert_eq!(report.reconcile.upserted, 3);

        let results = search_documents(index.as_ref(), "bookmarks", "tags:x", 1, 10, 200)
            .await
            .unwrap();
        assert_eq!(results.total_size, 0);
        assert!(results.is_empty());
        assert_eq!(
            results.tag_facets,
            BTreeMap::from([
                ("async".to_string(), 1),
                ("python".to_string(), 1),
                ("rust".to_string(), 2),
                ("wc:<1k".to_string(), 1),
            ])
        );

        // A second run inside the tolerance window is a cache hit and deletes nothing.
        let again = run_pipeline(&engine, &reconciler, "bookmarks").await.unwrap();
        assert!(again.reconcile.deleted.is_empty());
        assert_eq!(source.page_fetches(), 2);
    }

    #[tokio::test]
    async fn test_search_pages_and_enrichment() {
        let tmp = TempDir::new().unwrap();
        let engine = SyncEngine::new(
            Arc::new(FakeSource::two_pages()),
            Arc::new(LocalStorage::new(tmp.path())),
            SyncConfig::default(),
            &SourceConfig::default(),
        );
        let index = Arc::new(LocalIndex::in_memory());
        let reconciler = IndexReconciler::new(index.clone(), &IndexConfig::default());
        run_pipeline(&engine, &reconciler, "bookmarks").await.unwrap();

        let page = search_documents(index.as_ref(), "bookmarks", "", 2, 2, 200)
            .await
            .unwrap();
        assert_eq!(page.total_size, 3);
        assert_eq!(page.total_pages(), 2);
        assert_eq!(page.start_index(), 3);
        assert_eq!(page.end_index(), 3);
        // Newest first: C, B on page 1; A on page 2.
        assert_eq!(page.documents[0].id, "A");
        assert!(page.documents[0].is_starred());

        let hits = search_documents(index.as_ref(), "bookmarks", "archived tags:rust", 1, 10, 200)
            .await
            .unwrap();
        assert_eq!(hits.total_size, 1);
        assert_eq!(hits.documents[0].id, "A");
    }
}
