//! A page of search results ready for presentation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::Document;
use crate::present::Pagination;

/// One page of hits plus the tag facet counts for the whole query.
#[derive(Debug, Clone, Serialize)]
pub struct ResultSet {
    pub total_size: usize,

    /// 1-based
    pub page: usize,

    pub page_size: usize,

    /// In the order the index returned them
    pub documents: Vec<Document>,

    /// Tag -> number of matching documents carrying it
    pub tag_facets: BTreeMap<String, u64>,
}

impl ResultSet {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.total_size, self.page, self.page_size)
    }

    pub fn start_index(&self) -> usize {
        self.pagination().start_index()
    }

    pub fn end_index(&self) -> usize {
        self.pagination().end_index()
    }

    pub fn total_pages(&self) -> usize {
        self.pagination().total_pages()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
