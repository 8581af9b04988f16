//! Post-processing of search results for display.
//!
//! - `Pagination`: start/end indices and page counts
//! - `build_tag_cloud`: size/colour weighting of facet counts
//! - `custom_tag_sort`: tag ordering aware of word-count buckets

mod pagination;
mod tagcloud;
mod tagsort;

pub use pagination::Pagination;
pub use tagcloud::{HexColour, TagCloudEntry, TagCloudOptions, build_tag_cloud};
pub use tagsort::{TagKey, WordCount, compare_tags, custom_tag_sort};
