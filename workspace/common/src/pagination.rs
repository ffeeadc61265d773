use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;
/// Keeps `(page - 1) * page_size` inside a signed 64-bit SQL offset.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PAGE_SIZE;

/// A 1-based page request, clamped to `1..=MAX_PAGE` and `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// Missing or zero values fall back to page 1 and `default_size`.
    pub fn new(page: Option<u64>, page_size: Option<u64>, default_size: u64) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1).min(MAX_PAGE);
        let page_size = page_size
            .filter(|s| *s > 0)
            .unwrap_or(default_size)
            .clamp(1, MAX_PAGE_SIZE);
        Self { page, page_size }
    }

    /// Zero-based page index.
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None, DEFAULT_PAGE_SIZE)
    }
}

/// Page metadata returned next to every listed slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub items_per_page: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(request.page_size);
        Self {
            current_page: request.page,
            total_pages,
            total_items,
            items_per_page: request.page_size,
            has_next_page: request.page < total_pages,
            has_previous_page: request.page > 1,
        }
    }
}
