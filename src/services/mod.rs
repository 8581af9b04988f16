//! Remote sources of bookmark records.
//!
//! - `HttpSource`: scrapes paginated HTML listings with configured selectors
//! - `FileSource`: reads a local JSON metadata file
//! - `extract`: readable-text extraction for archived pages

mod extract;
mod file;
mod http;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{RawItem, SourceConfig, SourceKind};

pub use extract::extract_readable;
pub use file::{FileSource, NewItem, StoredImage};
pub use http::HttpSource;

/// One page of a remote listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePage {
    pub items: Vec<RawItem>,
    pub starred_ids: Vec<String>,
    /// Item id -> opaque archive reference
    pub archive_refs: BTreeMap<String, String>,
    /// Cursor for the following page; `None` on the last page
    pub next_cursor: Option<String>,
}

/// Capability interface to the remote system holding the records.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Lightweight "last updated" signal used for staleness checks.
    async fn last_update(&self) -> Result<DateTime<Utc>>;

    /// Fetch one page; `None` requests the first page.
    async fn fetch_page(&self, cursor: Option<String>) -> Result<SourcePage>;

    /// Fetch the raw HTML of an archived page.
    async fn fetch_archive(&self, reference: &str) -> Result<String>;
}

/// Build the source selected by `config.kind`.
///
/// File sources resolve `metadata_file` relative to `storage_dir`.
pub fn build_source(
    config: &SourceConfig,
    storage_dir: &std::path::Path,
) -> Result<Arc<dyn RemoteSource>> {
    Ok(match config.kind {
        SourceKind::Http => Arc::new(HttpSource::new(config)?),
        SourceKind::File => Arc::new(FileSource::new(storage_dir, &config.metadata_file)),
    })
}
