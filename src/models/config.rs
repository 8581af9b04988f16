//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::present::HexColour;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Where bookmarks come from and how to reach them
    #[serde(default)]
    pub source: SourceConfig,

    /// Staleness and archive settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Search index settings
    #[serde(default)]
    pub index: IndexConfig,

    /// Tag cloud rendering endpoints
    #[serde(default)]
    pub tag_cloud: TagCloudConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.source.max_concurrent == 0 {
            return Err(AppError::validation("source.max_concurrent must be > 0"));
        }
        if self.source.kind == SourceKind::Http && self.source.base_url.trim().is_empty() {
            return Err(AppError::validation("source.base_url is required for http sources"));
        }
        if self.source.kind == SourceKind::File && self.source.metadata_file.trim().is_empty() {
            return Err(AppError::validation(
                "source.metadata_file is required for file sources",
            ));
        }
        if self.index.name.trim().is_empty() {
            return Err(AppError::validation("index.name is empty"));
        }
        if self.index.max_attempts == 0 {
            return Err(AppError::validation("index.max_attempts must be > 0"));
        }
        if self.index.page_size == 0 {
            return Err(AppError::validation("index.page_size must be > 0"));
        }
        if self.index.facet_size == 0 {
            return Err(AppError::validation("index.facet_size must be > 0"));
        }
        HexColour::parse(&self.tag_cloud.colour_start)?;
        HexColour::parse(&self.tag_cloud.colour_end)?;
        Ok(())
    }
}

/// Kind of remote source to sync from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Scrape paginated HTML pages over HTTP
    #[default]
    Http,
    /// Read a local JSON metadata file
    File,
}

/// Remote source and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// Base URL of the remote site
    #[serde(default)]
    pub base_url: String,

    /// Path of the JSON "last updated" endpoint
    #[serde(default = "defaults::update_path")]
    pub update_path: String,

    /// Path of the first listing page
    #[serde(default = "defaults::start_path")]
    pub start_path: String,

    /// Metadata file for `kind = "file"`, relative to the storage directory
    #[serde(default = "defaults::metadata_file")]
    pub metadata_file: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent archive downloads
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay between page requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    #[serde(default)]
    pub selectors: PageSelectors,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            base_url: String::new(),
            update_path: defaults::update_path(),
            start_path: defaults::start_path(),
            metadata_file: defaults::metadata_file(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: defaults::request_delay(),
            selectors: PageSelectors::default(),
        }
    }
}

/// CSS selectors locating data inside a listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSelectors {
    /// Element whose text is a JSON array of item records
    #[serde(default = "defaults::items_selector")]
    pub items: String,

    /// Elements marking starred items
    #[serde(default = "defaults::starred_selector")]
    pub starred: String,

    /// Links to archived copies
    #[serde(default = "defaults::archive_link_selector")]
    pub archive_link: String,

    /// Link to the next page; absent on the last page
    #[serde(default = "defaults::next_page_selector")]
    pub next_page: String,

    /// Attribute carrying the item id on starred/archive elements
    #[serde(default = "defaults::id_attr")]
    pub id_attr: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            items: defaults::items_selector(),
            starred: defaults::starred_selector(),
            archive_link: defaults::archive_link_selector(),
            next_page: defaults::next_page_selector(),
            id_attr: defaults::id_attr(),
        }
    }
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote timestamps within this many seconds of the cache count as unchanged
    #[serde(default = "defaults::staleness_tolerance")]
    pub staleness_tolerance_secs: i64,

    /// Longest archive text kept per item, in characters
    #[serde(default = "defaults::archive_max_chars")]
    pub archive_max_chars: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            staleness_tolerance_secs: defaults::staleness_tolerance(),
            archive_max_chars: defaults::archive_max_chars(),
        }
    }
}

/// Search index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index name
    #[serde(default = "defaults::index_name")]
    pub name: String,

    /// Bulk upsert attempts before giving up on failed ids
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: usize,

    /// Upper bound on ids fetched for orphan cleanup
    #[serde(default = "defaults::id_scan_limit")]
    pub id_scan_limit: usize,

    /// Tag facet bucket count
    #[serde(default = "defaults::facet_size")]
    pub facet_size: usize,

    /// Default page size for searches
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: defaults::index_name(),
            max_attempts: defaults::max_attempts(),
            id_scan_limit: defaults::id_scan_limit(),
            facet_size: defaults::facet_size(),
            page_size: defaults::page_size(),
        }
    }
}

/// Endpoints for tag cloud size and colour interpolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagCloudConfig {
    #[serde(default = "defaults::size_start")]
    pub size_start: f64,
    #[serde(default = "defaults::size_end")]
    pub size_end: f64,
    #[serde(default = "defaults::colour_start")]
    pub colour_start: String,
    #[serde(default = "defaults::colour_end")]
    pub colour_end: String,
}

impl Default for TagCloudConfig {
    fn default() -> Self {
        Self {
            size_start: defaults::size_start(),
            size_end: defaults::size_end(),
            colour_start: defaults::colour_start(),
            colour_end: defaults::colour_end(),
        }
    }
}

mod defaults {
    // Source defaults
    pub fn update_path() -> String {
        "/api/update".into()
    }
    pub fn start_path() -> String {
        "/".into()
    }
    pub fn metadata_file() -> String {
        "metadata.json".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; taggle/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn request_delay() -> u64 {
        100
    }

    // Selector defaults
    pub fn items_selector() -> String {
        "script#bookmarks".into()
    }
    pub fn starred_selector() -> String {
        "[data-starred=\"true\"]".into()
    }
    pub fn archive_link_selector() -> String {
        "a.cached".into()
    }
    pub fn next_page_selector() -> String {
        "a.next_page".into()
    }
    pub fn id_attr() -> String {
        "data-id".into()
    }

    // Sync defaults
    pub fn staleness_tolerance() -> i64 {
        60
    }
    pub fn archive_max_chars() -> usize {
        20_000
    }

    // Index defaults
    pub fn index_name() -> String {
        "bookmarks".into()
    }
    pub fn max_attempts() -> usize {
        3
    }
    pub fn id_scan_limit() -> usize {
        10_000
    }
    pub fn facet_size() -> usize {
        200
    }
    pub fn page_size() -> usize {
        96
    }

    // Tag cloud defaults
    pub fn size_start() -> f64 {
        9.0
    }
    pub fn size_end() -> f64 {
        24.0
    }
    pub fn colour_start() -> String {
        "#999999".into()
    }
    pub fn colour_end() -> String {
        "#bd450b".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_config() -> Config {
        let mut config = Config::default();
        config.source.base_url = "https://bookmarks.example".to_string();
        config
    }

    #[test]
    fn validate_default_http_config_needs_base_url() {
        assert!(Config::default().validate().is_err());
        assert!(http_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = http_config();
        config.index.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_colour() {
        let mut config = http_config();
        config.tag_cloud.colour_end = "orange".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [source]
            kind = "file"

            [index]
            name = "images"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.kind, SourceKind::File);
        assert_eq!(config.source.metadata_file, "metadata.json");
        assert_eq!(config.index.name, "images");
        assert_eq!(config.index.max_attempts, 3);
        assert_eq!(config.sync.staleness_tolerance_secs, 60);
        assert!(config.validate().is_ok());
    }
}
