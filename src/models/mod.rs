// src/models/mod.rs

//! Domain models shared by the sync, index, and query layers.

mod config;
pub(crate) mod document;
mod query;
mod results;
mod snapshot;

// Re-export all public types
pub use config::{
    Config, IndexConfig, PageSelectors, SourceConfig, SourceKind, SyncConfig, TagCloudConfig,
};
pub use document::Document;
pub use query::{
    RAW_TAG_FIELD, SearchResponse, SortOrder, StructuredQuery, TAG_AGGREGATION, TagFilter,
    TermsAggregation, TermsBucket,
};
pub use results::ResultSet;
pub use snapshot::{ArchiveEntry, CacheSnapshot, RawItem};
