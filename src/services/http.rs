// src/services/http.rs

//! HTML-scraping remote source.
//!
//! Listing pages embed their items as a JSON array inside the element
//! matched by `selectors.items`. Starred markers and archive links are
//! separate elements carrying the owning item id in `selectors.id_attr`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{RawItem, SourceConfig};
use crate::services::{RemoteSource, SourcePage};
use crate::utils::http::{create_async_client, fetch_text, with_timeout};
use crate::utils::resolve_url;

#[derive(Debug, Deserialize)]
struct UpdateProbe {
    update_time: DateTime<Utc>,
}

/// Selectors compiled once per source.
#[derive(Debug)]
struct CompiledSelectors {
    items: Selector,
    starred: Selector,
    archive_link: Selector,
    next_page: Selector,
    id_attr: String,
}

/// Remote source backed by an HTTP site.
pub struct HttpSource {
    client: Client,
    base_url: Url,
    update_path: String,
    start_path: String,
    timeout: Duration,
    request_delay: Duration,
    selectors: CompiledSelectors,
}

impl HttpSource {
    /// Create a new source with the given configuration.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let selectors = CompiledSelectors {
            items: Self::parse_selector(&config.selectors.items)?,
            starred: Self::parse_selector(&config.selectors.starred)?,
            archive_link: Self::parse_selector(&config.selectors.archive_link)?,
            next_page: Self::parse_selector(&config.selectors.next_page)?,
            id_attr: config.selectors.id_attr.clone(),
        };

        Ok(Self {
            client: create_async_client(config)?,
            base_url: Url::parse(&config.base_url)?,
            update_path: config.update_path.clone(),
            start_path: config.start_path.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            request_delay: Duration::from_millis(config.request_delay_ms),
            selectors,
        })
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }

    fn parse_update_probe(body: &str) -> Result<DateTime<Utc>> {
        serde_json::from_str::<UpdateProbe>(body)
            .map(|probe| probe.update_time)
            .map_err(|e| AppError::parse("update probe", e))
    }

    /// Parse one listing page. `page_url` resolves relative links.
    fn parse_page(&self, page_url: &Url, body: &str) -> Result<SourcePage> {
        let document = Html::parse_document(body);

        let items_elem = document
            .select(&self.selectors.items)
            .next()
            .ok_or_else(|| AppError::parse(page_url.as_str(), "no embedded item list"))?;
        let payload: String = items_elem.text().collect();
        let items: Vec<RawItem> = serde_json::from_str(payload.trim())
            .map_err(|e| AppError::parse(page_url.as_str(), e))?;

        let starred_ids = document
            .select(&self.selectors.starred)
            .filter_map(|el| self.owning_id(el))
            .map(String::from)
            .collect();

        let archive_refs: BTreeMap<String, String> = document
            .select(&self.selectors.archive_link)
            .filter_map(|el| {
                let id = self.owning_id(el)?;
                let href = el.value().attr("href")?;
                Some((id.to_string(), resolve_url(page_url, href)))
            })
            .collect();

        let next_cursor = document
            .select(&self.selectors.next_page)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|href| resolve_url(page_url, href))
            .filter(|next| next.as_str() != page_url.as_str());

        Ok(SourcePage {
            items,
            starred_ids,
            archive_refs,
            next_cursor,
        })
    }

    /// Item id on the element itself or its closest ancestor.
    fn owning_id<'a>(&self, element: ElementRef<'a>) -> Option<&'a str> {
        let attr = self.selectors.id_attr.as_str();
        element.value().attr(attr).or_else(|| {
            element
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find_map(|ancestor| ancestor.value().attr(attr))
        })
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn last_update(&self) -> Result<DateTime<Utc>> {
        let url = resolve_url(&self.base_url, &self.update_path);
        let body = with_timeout(
            "probing last update",
            self.timeout,
            fetch_text(&self.client, &url),
        )
        .await?;
        Self::parse_update_probe(&body)
    }

    async fn fetch_page(&self, cursor: Option<String>) -> Result<SourcePage> {
        let url = cursor.unwrap_or_else(|| resolve_url(&self.base_url, &self.start_path));
        let page_url = Url::parse(&url)?;

        let body = with_timeout("fetching page", self.timeout, fetch_text(&self.client, &url))
            .await?;

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let page = self.parse_page(&page_url, &body)?;
        log::debug!(
            "Fetched {}: {} items, next={:?}",
            url,
            page.items.len(),
            page.next_cursor
        );
        Ok(page)
    }

    async fn fetch_archive(&self, reference: &str) -> Result<String> {
        let url = resolve_url(&self.base_url, reference);
        with_timeout(
            "fetching archive",
            self.timeout,
            fetch_text(&self.client, &url),
        )
        .await
    }
}
