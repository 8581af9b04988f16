//! Test doubles for the remote source and the search index.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::{AppError, Result};
use crate::models::{Document, RawItem, SearchResponse, StructuredQuery};
use crate::search::{IndexSchema, LocalIndex, SearchIndex};
use crate::services::{RemoteSource, SourcePage};

pub const ARCHIVE_A: &str = "https://archive.example/cached/arcA/";

fn item(id: &str, tags: &[&str], title: &str, day: u32) -> RawItem {
    let mut item = RawItem::new(id, tags.iter().map(|t| t.to_string()).collect())
        .with_field("title", title)
        .with_field("url", format!("https://example.org/{id}"));
    item.date_added = Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).single();
    item
}

/// Paginated in-memory source that counts its calls.
pub struct FakeSource {
    pages: Vec<SourcePage>,
    archives: HashMap<String, String>,
    updated_at: Mutex<DateTime<Utc>>,
    page_fetches: AtomicUsize,
    archive_fetches: AtomicUsize,
    failing_page: Mutex<Option<usize>>,
    offline: AtomicBool,
    stalled: AtomicBool,
    archives_fail: AtomicBool,
}

impl FakeSource {
    /// Page 1: A and B with A starred; page 2: C, last page.
    pub fn two_pages() -> Self {
        let first = SourcePage {
            items: vec![
                item("A", &["rust", "async"], "Tokio internals", 1),
                item("B", &["rust"], "Borrow checker tricks", 2),
            ],
            starred_ids: vec!["A".to_string()],
            archive_refs: BTreeMap::from([("A".to_string(), ARCHIVE_A.to_string())]),
            next_cursor: Some("page-2".to_string()),
        };
        let second = SourcePage {
            items: vec![item("C", &["python", "wc:<1k"], "Async python", 3)],
            ..SourcePage::default()
        };

        Self {
            pages: vec![first, second],
            archives: HashMap::from([(
                ARCHIVE_A.to_string(),
                "<html><body><script>track()</script><p>Archived body of A</p></body></html>"
                    .to_string(),
            )]),
            updated_at: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap()),
            page_fetches: AtomicUsize::new(0),
            archive_fetches: AtomicUsize::new(0),
            failing_page: Mutex::new(None),
            offline: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
            archives_fail: AtomicBool::new(false),
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        *self.updated_at.lock().unwrap()
    }

    /// Move the remote update signal forward.
    pub fn touch(&self, by: Duration) {
        *self.updated_at.lock().unwrap() += by;
    }

    pub fn page_fetches(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }

    pub fn archive_fetches(&self) -> usize {
        self.archive_fetches.load(Ordering::SeqCst)
    }

    /// Make the zero-based page `index` return malformed content.
    pub fn fail_page(&self, index: usize) {
        *self.failing_page.lock().unwrap() = Some(index);
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    /// Make the update probe hang well past any test timeout.
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn fail_archives(&self) {
        self.archives_fail.store(true, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::remote("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSource for FakeSource {
    async fn last_update(&self) -> Result<DateTime<Utc>> {
        self.check_online()?;
        if self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        }
        Ok(self.updated_at())
    }

    async fn fetch_page(&self, cursor: Option<String>) -> Result<SourcePage> {
        self.check_online()?;
        self.page_fetches.fetch_add(1, Ordering::SeqCst);

        let index = match cursor.as_deref() {
            None => 0,
            Some(c) => c
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .map(|n| n - 1)
                .ok_or_else(|| AppError::parse(c, "unknown cursor"))?,
        };

        if *self.failing_page.lock().unwrap() == Some(index) {
            return Err(AppError::parse(format!("page {}", index + 1), "bad json"));
        }

        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| AppError::remote(format!("no page {}", index + 1)))
    }

    async fn fetch_archive(&self, reference: &str) -> Result<String> {
        self.check_online()?;
        self.archive_fetches.fetch_add(1, Ordering::SeqCst);

        if self.archives_fail.load(Ordering::SeqCst) {
            return Err(AppError::remote("503 Service Unavailable"));
        }
        self.archives
            .get(reference)
            .cloned()
            .ok_or_else(|| AppError::remote(format!("404 for {reference}")))
    }
}

/// Local index whose upserts fail for chosen ids a fixed number of times.
#[derive(Default)]
pub struct FlakyIndex {
    inner: LocalIndex,
    failures: Mutex<HashMap<String, usize>>,
    /// Remaining bulk upsert calls that fail outright
    upsert_errors: AtomicUsize,
    create_fails: AtomicBool,
    pub upsert_batches: Mutex<Vec<Vec<String>>>,
    pub delete_batches: Mutex<Vec<Vec<String>>>,
}

impl FlakyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail upserts of `id` for the next `times` attempts.
    pub fn fail(self, id: &str, times: usize) -> Self {
        self.failures.lock().unwrap().insert(id.to_string(), times);
        self
    }

    /// Make the next `calls` bulk upserts return a transport error.
    pub fn fail_bulk_calls(&self, calls: usize) {
        self.upsert_errors.store(calls, Ordering::SeqCst);
    }

    /// Make index creation fail with something other than "exists".
    pub fn fail_create(self) -> Self {
        self.create_fails.store(true, Ordering::SeqCst);
        self
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_batches.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchIndex for FlakyIndex {
    async fn create_index(&self, name: &str, schema: &IndexSchema) -> Result<()> {
        if self.create_fails.load(Ordering::SeqCst) {
            return Err(AppError::index("cluster unreachable"));
        }
        self.inner.create_index(name, schema).await
    }

    async fn bulk_upsert(&self, name: &str, documents: &[Document]) -> Result<Vec<String>> {
        self.upsert_batches
            .lock()
            .unwrap()
            .push(documents.iter().map(|d| d.id.clone()).collect());

        let erroring = self
            .upsert_errors
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if erroring {
            return Err(AppError::remote("connection reset"));
        }

        let (passing, mut failed) = {
            let mut failures = self.failures.lock().unwrap();
            let mut passing = Vec::new();
            let mut failed = Vec::new();
            for doc in documents {
                match failures.get_mut(&doc.id) {
                    Some(remaining) if *remaining > 0 => {
                        *remaining -= 1;
                        failed.push(doc.id.clone());
                    }
                    _ => passing.push(doc.clone()),
                }
            }
            (passing, failed)
        };

        failed.extend(self.inner.bulk_upsert(name, &passing).await?);
        Ok(failed)
    }

    async fn bulk_delete(&self, name: &str, ids: &[String]) -> Result<()> {
        self.delete_batches.lock().unwrap().push(ids.to_vec());
        self.inner.bulk_delete(name, ids).await
    }

    async fn list_ids(&self, name: &str, limit: usize) -> Result<Vec<String>> {
        self.inner.list_ids(name, limit).await
    }

    async fn search(&self, name: &str, query: &StructuredQuery) -> Result<SearchResponse> {
        self.inner.search(name, query).await
    }
}
