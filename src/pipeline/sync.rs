// src/pipeline/sync.rs

//! Incremental synchronization of the remote source into the cache.
//!
//! A sync probes the source's last-update signal first. Within the
//! staleness tolerance the cached snapshot is returned as-is; otherwise
//! every page is fetched, the new snapshot replaces the old one, and
//! missing archive entries are downloaded.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{ArchiveEntry, CacheSnapshot, Document, SourceConfig, SyncConfig};
use crate::pipeline::diff::calculate_diff;
use crate::services::{RemoteSource, extract_readable};
use crate::storage::SyncCache;
use crate::utils::http::with_timeout;
use crate::utils::normalize_archive_id;

/// Counts from one archive download batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Keeps the local cache in step with a remote source.
pub struct SyncEngine {
    source: Arc<dyn RemoteSource>,
    cache: Arc<dyn SyncCache>,
    config: SyncConfig,
    timeout: Duration,
    max_concurrent: usize,
    cancel: CancellationToken,
    // One sync cycle at a time per engine.
    lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        cache: Arc<dyn SyncCache>,
        config: SyncConfig,
        source_config: &SourceConfig,
    ) -> Self {
        Self {
            source,
            cache,
            config,
            timeout: Duration::from_secs(source_config.timeout_secs),
            max_concurrent: source_config.max_concurrent.max(1),
            cancel: CancellationToken::new(),
            lock: Mutex::new(()),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts an in-flight refresh when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Bring the cache up to date and return the current snapshot.
    ///
    /// Fails with `RemoteUnavailable` (timeouts included) or `Parse` if the
    /// source cannot be read; the previous snapshot then stays in place.
    pub async fn sync(&self) -> Result<CacheSnapshot> {
        self.run(false).await
    }

    /// Refresh regardless of the staleness check.
    pub async fn refresh(&self) -> Result<CacheSnapshot> {
        self.run(true).await
    }

    async fn run(&self, force: bool) -> Result<CacheSnapshot> {
        let _guard = self.lock.lock().await;

        let remote_updated = self
            .guarded("probing last update", self.source.last_update())
            .await?;
        let previous = self.load_previous().await;

        if let Some(previous) = &previous {
            let tolerance = chrono::Duration::seconds(self.config.staleness_tolerance_secs);
            if !force && previous.is_fresh(remote_updated, tolerance) {
                log::info!(
                    "Cache is fresh (fetched {}, remote updated {}); skipping refresh",
                    previous.last_fetched,
                    remote_updated
                );
                return Ok(previous.clone());
            }
        }

        log::info!(
            "Refreshing from source (remote updated {}{})",
            remote_updated,
            if force { ", forced" } else { "" }
        );
        let snapshot = self
            .fetch_snapshot(remote_updated)
            .await
            .inspect_err(|e| {
                if let Some(previous) = previous.as_ref().filter(|_| e.is_remote_failure()) {
                    log::warn!(
                        "Keeping snapshot from {} ({} items)",
                        previous.last_fetched,
                        previous.items.len()
                    );
                }
            })?;

        match &previous {
            Some(previous) => {
                let diff = calculate_diff(&previous.items, &snapshot.items);
                if diff.has_changes() {
                    log::info!(
                        "Snapshot changes: {} ({} added, {} updated, {} removed)",
                        diff.change_count(),
                        diff.added.len(),
                        diff.updated.len(),
                        diff.removed.len()
                    );
                    log::debug!("Removed ids: {:?}", diff.removed);
                } else {
                    log::info!("Snapshot unchanged");
                }
            }
            None => log::info!("First snapshot: {} items", snapshot.items.len()),
        }

        self.cache.save_snapshot(&snapshot).await?;

        match self.download_batch(&snapshot).await {
            Ok(report) => log::info!(
                "Archives: {} downloaded, {} cached, {} failed",
                report.downloaded,
                report.skipped,
                report.failed
            ),
            Err(e) => log::warn!("Archive downloads stopped: {}", e),
        }

        Ok(snapshot)
    }

    /// Download archive entries missing for the persisted snapshot.
    pub async fn download_archives(&self) -> Result<ArchiveReport> {
        let _guard = self.lock.lock().await;
        let snapshot = self
            .cache
            .load_snapshot()
            .await?
            .ok_or_else(|| AppError::validation("no snapshot yet; run a sync first"))?;
        self.download_batch(&snapshot).await
    }

    /// Documents for every item in `snapshot`, enriched from the archive cache.
    pub async fn documents(&self, snapshot: &CacheSnapshot) -> Result<Vec<Document>> {
        let mut texts = HashMap::new();
        for archive_id in snapshot.archive_links.values().map(|r| normalize_archive_id(r)) {
            if texts.contains_key(&archive_id) {
                continue;
            }
            match self.cache.read_archive(&archive_id).await {
                Ok(Some(text)) => {
                    texts.insert(archive_id, text);
                }
                Ok(None) => {}
                Err(e) => log::warn!("Unreadable archive entry {}: {}", archive_id, e),
            }
        }
        Ok(snapshot.to_documents(&texts))
    }

    /// Load the current snapshot without contacting the source.
    pub async fn cached(&self) -> Result<Option<CacheSnapshot>> {
        self.cache.load_snapshot().await
    }

    async fn load_previous(&self) -> Option<CacheSnapshot> {
        match self.cache.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Ignoring unreadable snapshot: {}", e);
                None
            }
        }
    }

    /// Page through the source and assemble a complete snapshot.
    async fn fetch_snapshot(&self, remote_updated: DateTime<Utc>) -> Result<CacheSnapshot> {
        let mut items = Vec::new();
        let mut seen_items = HashSet::new();
        let mut starred_ids = Vec::new();
        let mut archive_links = BTreeMap::new();

        let mut cursor: Option<String> = None;
        let mut visited = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page = self
                .guarded("fetching page", self.source.fetch_page(cursor.clone()))
                .await
                .inspect_err(|e| log::error!("Refresh aborted at page {}: {}", pages + 1, e))?;
            pages += 1;

            for item in page.items {
                if seen_items.insert(item.id.clone()) {
                    items.push(item);
                } else {
                    log::debug!("Duplicate item {} on page {}", item.id, pages);
                }
            }
            starred_ids.extend(page.starred_ids);
            archive_links.extend(page.archive_refs);

            match page.next_cursor {
                Some(next) if visited.insert(next.clone()) => cursor = Some(next),
                Some(next) => {
                    return Err(AppError::parse(
                        next,
                        "pagination returned to an already visited page",
                    ));
                }
                None => break,
            }
        }

        log::info!("Fetched {} items over {} page(s)", items.len(), pages);
        Ok(CacheSnapshot::new(
            remote_updated,
            items,
            starred_ids,
            archive_links,
        ))
    }

    async fn download_batch(&self, snapshot: &CacheSnapshot) -> Result<ArchiveReport> {
        // Several items may point at the same archive.
        let mut jobs: BTreeMap<String, &str> = BTreeMap::new();
        for reference in snapshot.archive_links.values() {
            jobs.entry(normalize_archive_id(reference))
                .or_insert(reference.as_str());
        }

        let mut report = ArchiveReport {
            total: jobs.len(),
            ..ArchiveReport::default()
        };

        let mut downloads = stream::iter(jobs)
            .map(|(archive_id, reference)| async move {
                let result = self.download_one(&archive_id, reference).await;
                (archive_id, reference, result)
            })
            .buffer_unordered(self.max_concurrent);

        while let Some((archive_id, reference, result)) = downloads.next().await {
            match result {
                Ok(true) => report.downloaded += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    if !matches!(e, AppError::Cancelled) {
                        log::warn!("Archive {} ({}) failed: {}", archive_id, reference, e);
                    }
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(report)
    }

    /// Returns `false` when the entry was already cached.
    async fn download_one(&self, archive_id: &str, reference: &str) -> Result<bool> {
        if self.cache.has_archive(archive_id).await? {
            return Ok(false);
        }

        let html = self
            .guarded("fetching archive", self.source.fetch_archive(reference))
            .await?;
        let text = extract_readable(&html, self.config.archive_max_chars);

        self.cache
            .write_archive(&ArchiveEntry {
                id: archive_id.to_string(),
                text,
            })
            .await
    }

    /// Bound a remote call by the timeout and the cancellation token.
    ///
    /// An expired call is reported as `RemoteUnavailable`.
    async fn guarded<T, F>(&self, action: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            result = with_timeout(action, self.timeout, fut) => match result {
                Err(timeout @ AppError::Timeout { .. }) => Err(AppError::remote(timeout)),
                other => other,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use crate::testing::FakeSource;
    use tempfile::TempDir;

    fn engine(source: Arc<FakeSource>, dir: &TempDir) -> SyncEngine {
        SyncEngine::new(
            source,
            Arc::new(LocalStorage::new(dir.path())),
            SyncConfig::default(),
            &SourceConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_first_sync_fetches_all_pages() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::two_pages());
        let engine = engine(source.clone(), &tmp);

        let snapshot = engine.sync().await.unwrap();
        assert_eq!(snapshot.item_ids(), vec!["A", "B", "C"]);
        assert_eq!(snapshot.starred_ids, vec!["A"]);
        assert_eq!(snapshot.last_fetched, source.updated_at());
        assert_eq!(source.page_fetches(), 2);

        let persisted = engine.cached().await.unwrap().unwrap();
        assert_eq!(persisted, snapshot);
    }

    #[tokio::test]
    async fn test_second_sync_within_tolerance_is_cache_hit() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::two_pages());
        let engine = engine(source.clone(), &tmp);

        engine.sync().await.unwrap();
        source.touch(chrono::Duration::seconds(30));
        engine.sync().await.unwrap();
        assert_eq!(source.page_fetches(), 2);
        assert_eq!(source.archive_fetches(), 1);

        source.touch(chrono::Duration::seconds(120));
        engine.sync().await.unwrap();
        assert_eq!(source.page_fetches(), 4);
    }

    #[tokio::test]
    async fn test_forced_refresh_ignores_staleness() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::two_pages());
        let engine = engine(source.clone(), &tmp);

        engine.sync().await.unwrap();
        engine.refresh().await.unwrap();
        assert_eq!(source.page_fetches(), 4);
    }

    #[tokio::test]
    async fn test_parse_failure_keeps_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::two_pages());
        let engine = engine(source.clone(), &tmp);

        let first = engine.sync().await.unwrap();

        source.fail_page(1);
        source.touch(chrono::Duration::seconds(600));
        let err = engine.sync().await.unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));

        assert_eq!(engine.cached().await.unwrap().unwrap(), first);
    }

    #[tokio::test]
    async fn test_unreachable_source_is_remote_failure() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::two_pages());
        source.go_offline();
        let engine = engine(source.clone(), &tmp);

        let err = engine.sync().await.unwrap_err();
        assert!(matches!(err, AppError::RemoteUnavailable(_)));
        assert!(engine.cached().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stalled_source_times_out_as_remote_failure() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::two_pages());
        source.stall();
        let engine = SyncEngine::new(
            source.clone(),
            Arc::new(LocalStorage::new(tmp.path())),
            SyncConfig::default(),
            &SourceConfig {
                timeout_secs: 1,
                ..SourceConfig::default()
            },
        );

        let err = engine.sync().await.unwrap_err();
        assert!(matches!(err, AppError::RemoteUnavailable(_)));
        assert!(err.is_remote_failure());
        assert!(engine.cached().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_refresh_persists_nothing() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::two_pages());
        let engine = engine(source.clone(), &tmp);

        engine.cancellation_token().cancel();
        let err = engine.sync().await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert!(engine.cached().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_archives_are_downloaded_once_and_enrich_documents() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::two_pages());
        let engine = engine(source.clone(), &tmp);

        let snapshot = engine.sync().await.unwrap();
        assert_eq!(source.archive_fetches(), 1);

        let report = engine.download_archives().await.unwrap();
        assert_eq!(
            report,
            ArchiveReport {
                total: 1,
                downloaded: 0,
                skipped: 1,
                failed: 0
            }
        );
        assert_eq!(source.archive_fetches(), 1);

        let documents = engine.documents(&snapshot).await.unwrap();
        let a = documents.iter().find(|d| d.id == "A").unwrap();
        assert!(a.is_starred());
        assert_eq!(a.full_text(), Some("Archived body of A"));
        let b = documents.iter().find(|d| d.id == "B").unwrap();
        assert!(!b.is_starred());
        assert_eq!(b.full_text(), None);
    }

    #[tokio::test]
    async fn test_failed_archive_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::two_pages());
        source.fail_archives();
        let engine = engine(source.clone(), &tmp);

        let snapshot = engine.sync().await.unwrap();
        assert_eq!(snapshot.items.len(), 3);

        let report = engine.download_archives().await.unwrap();
        assert_eq!(report.failed, 1);

        let documents = engine.documents(&snapshot).await.unwrap();
        assert!(documents.iter().all(|d| d.full_text().is_none()));
    }
}
