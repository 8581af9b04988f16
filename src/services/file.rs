//! Local JSON metadata file as a remote source.
//!
//! The file holds a JSON array of items. It has no pagination, no starred
//! markers and no archives; its modification time is the update signal.
//!
//! Records added locally may carry an image, stored next to the metadata
//! file under `images/{shard}/{name}`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::RawItem;
use crate::services::{RemoteSource, SourcePage};
use crate::storage::LocalStorage;
use crate::utils::http::{fetch_bytes, with_timeout};

const IMAGE_DIR: &str = "images";

/// Fields for a record added through [`FileSource::append`].
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    /// Space- or comma-separated
    pub tags: String,
    pub url: Option<String>,
    pub title: Option<String>,
    /// Image already stored with [`FileSource::store_image`]
    pub image: Option<StoredImage>,
}

/// Where an added image landed under the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// File name taken from the image URL
    pub file: String,
    /// `{shard}/{file}`, relative to the images directory
    pub image_id: String,
}

impl StoredImage {
    /// Derive the stored name and shard from an image URL.
    ///
    /// The shard is the first two characters of the name, ignoring a
    /// leading `tumblr_`.
    pub fn from_url(img_url: &str) -> Result<Self> {
        let url = url::Url::parse(img_url)?;
        let file = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .ok_or_else(|| AppError::validation(format!("no file name in image URL {img_url}")))?
            .to_string();

        let shard: String = file
            .strip_prefix("tumblr_")
            .unwrap_or(&file)
            .chars()
            .take(2)
            .collect();

        Ok(Self {
            image_id: format!("{shard}/{file}"),
            file,
        })
    }

    fn key(&self) -> String {
        format!("{IMAGE_DIR}/{}", self.image_id)
    }
}

/// Remote source over a local metadata file.
pub struct FileSource {
    storage: LocalStorage,
    file_name: String,
    write_lock: Mutex<()>,
}

impl FileSource {
    pub fn new(root_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            storage: LocalStorage::new(root_dir),
            file_name: file_name.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.storage.path(&self.file_name)
    }

    /// Download `img_url` into the image directory.
    ///
    /// Fails without downloading if an image with the same name is already
    /// stored.
    pub async fn download_image(
        &self,
        client: &reqwest::Client,
        img_url: &str,
        timeout: Duration,
    ) -> Result<StoredImage> {
        let image = StoredImage::from_url(img_url)?;
        self.ensure_image_absent(&image).await?;

        let bytes = with_timeout("downloading image", timeout, fetch_bytes(client, img_url)).await?;
        self.store_image(img_url, &bytes).await
    }

    /// Store image bytes under the name derived from `img_url`. Never overwrites.
    pub async fn store_image(&self, img_url: &str, bytes: &[u8]) -> Result<StoredImage> {
        let image = StoredImage::from_url(img_url)?;
        self.ensure_image_absent(&image).await?;

        self.storage.write_bytes(&image.key(), bytes).await?;
        log::info!("Stored image {} ({} bytes)", image.image_id, bytes.len());
        Ok(image)
    }

    async fn ensure_image_absent(&self, image: &StoredImage) -> Result<()> {
        if self.storage.exists(&image.key()).await? {
            return Err(AppError::validation(format!(
                "image {} already exists",
                self.storage.path(&image.key()).display()
            )));
        }
        Ok(())
    }

    async fn read_items(&self) -> Result<Option<Vec<RawItem>>> {
        let Some(bytes) = self.storage.read_bytes(&self.file_name).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| AppError::parse(self.file_name.clone(), e))
    }

    /// Add a record with a fresh id and write the file back atomically.
    pub async fn append(&self, new_item: NewItem) -> Result<RawItem> {
        let _guard = self.write_lock.lock().await;

        let mut items = self.read_items().await?.unwrap_or_default();

        let tags = split_tags(&new_item.tags);
        let mut item = RawItem::new(uuid::Uuid::new_v4().to_string(), tags);
        item.date_added = Some(Utc::now());
        if let Some(url) = new_item.url.filter(|u| !u.trim().is_empty()) {
            item = item.with_field("url", url);
        }
        if let Some(title) = new_item.title.filter(|t| !t.trim().is_empty()) {
            item = item.with_field("title", title);
        }
        if let Some(image) = new_item.image {
            item = item
                .with_field("file", image.file)
                .with_field("image_id", image.image_id);
        }

        items.push(item.clone());
        self.storage.write_json(&self.file_name, &items).await?;

        log::info!("Added {} to {} ({} items)", item.id, self.file_name, items.len());
        Ok(item)
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split([' ', ',']).map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

#[async_trait]
impl RemoteSource for FileSource {
    async fn last_update(&self) -> Result<DateTime<Utc>> {
        let path = self.path();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| AppError::remote(format!("{}: {e}", path.display())))?;
        Ok(DateTime::<Utc>::from(metadata.modified()?))
    }

    async fn fetch_page(&self, _cursor: Option<String>) -> Result<SourcePage> {
        let items = self
            .read_items()
            .await?
            .ok_or_else(|| AppError::remote(format!("{} not found", self.path().display())))?;

        Ok(SourcePage {
            items,
            ..SourcePage::default()
        })
    }

    async fn fetch_archive(&self, reference: &str) -> Result<String> {
        Err(AppError::remote(format!(
            "file source has no archive for {reference}"
        )))
    }
}
