use serde::{Deserialize, Serialize};

use crate::constants::{MAX_PAGE_SIZE, PAGE_SIZE};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page: &PageQuery) -> Self {
        if rows.is_empty() && total_rows <= 0 {
            return Self::no_rows();
        }
        let current = page.page();
        let page_count = (total_rows + page.limit() - 1) / page.limit();

        Self {
            count: total_rows,
            next: (current < page_count).then_some(current + 1),
            previous: (current > 1).then_some(current - 1),
            results: rows,
        }
    }

    pub fn no_rows() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: vec![],
        }
    }
}

/// Highest page number whose offset still fits in an `i64` at the largest page size.
const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE + 1;

/// Page-number pagination as it arrives in the query string.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let query = PageQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), PAGE_SIZE);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let query = PageQuery::new(-3, 10_000);
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow_the_offset() {
        let query = PageQuery::new(i64::MAX, i64::MAX);
        assert_eq!(query.page(), MAX_PAGE);
        assert!(query.offset() >= 0);
        assert_eq!(query.offset(), (MAX_PAGE - 1) * MAX_PAGE_SIZE);
    }

    #[test]
    fn page_past_the_end_keeps_the_total() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 8, &PageQuery::new(5, 3));
        assert_eq!(page.count, 8);
        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(4));
        assert!(page.results.is_empty());
    }

    #[test]
    fn links_neighbouring_pages() {
        let page = PageContext::from_rows(vec![4, 5, 6], 8, &PageQuery::new(2, 3));
        assert_eq!(page.count, 8);
        assert_eq!(page.previous, Some(1));
        assert_eq!(page.next, Some(3));

        let last = PageContext::from_rows(vec![7, 8], 8, &PageQuery::new(3, 3));
        assert_eq!(last.next, None);
    }

    #[test]
    fn empty_result_has_no_links() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, &PageQuery::new(1, 3));
        assert_eq!(page, PageContext::no_rows());
    }
}
