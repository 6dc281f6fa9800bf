use mongodb::{bson::Document, options::FindOptions};
use serde::Serialize;

/// Requested page, taken from `?page_num=..&page_size=..` query parameters.
/// Both have sane defaults and the page size is capped.
#[derive(Debug, Clone, Copy, FromForm)]
pub struct PaginationRequest {
    #[field(default = 1, validate = range(1..))]
    page_num: u32,
    #[field(default = 20, validate = range(1..=100))]
    page_size: u32,
}

impl PaginationRequest {
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of documents before this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page_num - 1) * u64::from(self.page_size)
    }

    /// Find options selecting this page in the given order.
    pub fn find_options(&self, sort: Document) -> FindOptions {
        FindOptions::builder()
            .sort(sort)
            .skip(self.skip())
            .limit(i64::from(self.page_size))
            .build()
    }

    pub fn to_paginated<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            items,
            page_num: self.page_num,
            page_size: self.page_size,
            total,
        }
    }
}

impl Default for PaginationRequest {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: 20,
        }
    }
}

/// One page of results plus enough information to render a pager.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page_num: u32,
    pub page_size: u32,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_skips_nothing() {
        let pagination = PaginationRequest::default();
        assert_eq!(pagination.skip(), 0);
    }

    #[test]
    fn later_pages_skip_whole_pages() {
        let pagination = PaginationRequest {
            page_num: 3,
            page_size: 25,
        };
        assert_eq!(pagination.skip(), 50);
    }

    #[test]
    fn envelope_carries_request_and_total() {
        let pagination = PaginationRequest {
            page_num: 2,
            page_size: 10,
        };
        let page = pagination.to_paginated(42, vec!["a", "b"]);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.page_num, 2);
        assert_eq!(page.page_size, 10);
        assert_eq!(page.total, 42);
    }
}
