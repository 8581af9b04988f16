//! Page arithmetic for result listings.

use serde::Serialize;

/// Position of one page within a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total_size: usize,
    pub page: usize,
    pub page_size: usize,
}

impl Pagination {
    /// `page` and `page_size` are raised to 1 if given as 0.
    pub fn new(total_size: usize, page: usize, page_size: usize) -> Self {
        Self {
            total_size,
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// 1-based index of the first result on this page.
    ///
    /// Past the last page this is `end_index() + 1`, so an empty page
    /// always reads as "N+1 to N of N".
    pub fn start_index(&self) -> usize {
        let nominal = self
            .page_size
            .saturating_mul(self.page - 1)
            .saturating_add(1);
        nominal.min(self.end_index().saturating_add(1))
    }

    /// 1-based index of the last result on this page.
    pub fn end_index(&self) -> usize {
        self.total_size.min(self.page_size.saturating_mul(self.page))
    }

    pub fn total_pages(&self) -> usize {
        self.total_size.div_ceil(self.page_size)
    }

    pub fn next_page(&self) -> Option<usize> {
        (self.page < self.total_pages()).then_some(self.page + 1)
    }

    pub fn prev_page(&self) -> Option<usize> {
        (self.page > 1).then_some(self.page - 1)
    }
}
