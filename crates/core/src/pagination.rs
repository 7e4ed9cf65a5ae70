//! Page-number pagination.
//!
//! Callers speak in pages (1-based) and page sizes; storage speaks in
//! offset/limit. Defaults are a plain value handed to the constructor.

use serde::{Deserialize, Serialize};

/// Fallback page and page size applied when a request leaves them unset or
/// non-positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDefaults {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// Raw pagination request as received from a caller.
///
/// Values are signed on purpose: zero and negative values are legal input and
/// fall back to [`PageDefaults`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }
}

/// Resolved pagination: page ≥ 1, limit ≥ 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    /// Resolve a request against the configured defaults.
    pub fn resolve(request: PageRequest, defaults: PageDefaults) -> Self {
        let pick = |value: Option<i64>, fallback: u32| match value {
            Some(v) if v > 0 => u32::try_from(v).unwrap_or(u32::MAX),
            _ => fallback.max(1),
        };

        Self {
            page: pick(request.page, defaults.page),
            limit: pick(request.limit, defaults.limit),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Rows to skip: `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Number of pages needed for `total` rows.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }

    /// Next page number, saturating at the last page.
    pub fn next_page(&self, total: u64) -> u64 {
        let last = self.total_pages(total);
        let page = u64::from(self.page);
        if page >= last { page } else { page + 1 }
    }

    /// Previous page number, saturating at 1.
    pub fn prev_page(&self) -> u32 {
        if self.page > 1 { self.page - 1 } else { self.page }
    }

    /// Apply this page to an already materialized, ordered id list.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        items
            .iter()
            .skip(start)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

/// One page of ids plus the number of ids matching the unpaginated predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPage<I> {
    pub ids: Vec<I>,
    pub total: u64,
}

impl<I> IdPage<I> {
    pub fn new(ids: Vec<I>, total: u64) -> Self {
        Self { ids, total }
    }
}

/// One page of entities plus the unpaginated total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unset_values_fall_back_to_defaults() {
        let p = Pagination::resolve(PageRequest::default(), PageDefaults::default());
        assert_eq!((p.page(), p.limit(), p.offset()), (1, 20, 0));
    }

    #[test]
    fn non_positive_values_fall_back_to_defaults() {
        let p = Pagination::resolve(PageRequest::new(0, -5), PageDefaults { page: 1, limit: 50 });
        assert_eq!((p.page(), p.limit()), (1, 50));
    }

    #[test]
    fn second_page_of_ten_skips_ten() {
        let p = Pagination::resolve(PageRequest::new(2, 10), PageDefaults::default());
        let ids: Vec<u64> = (1..=25).collect();
        assert_eq!(p.offset(), 10);
        assert_eq!(p.slice(&ids), (11..=20).collect::<Vec<_>>());
    }

    #[test]
    fn page_navigation_saturates() {
        let p = Pagination::resolve(PageRequest::new(3, 10), PageDefaults::default());
        assert_eq!(p.total_pages(25), 3);
        assert_eq!(p.next_page(25), 3);
        assert_eq!(p.prev_page(), 2);

        let first = Pagination::resolve(PageRequest::new(1, 10), PageDefaults::default());
        assert_eq!(first.prev_page(), 1);
        assert_eq!(first.next_page(25), 2);
    }

    proptest! {
        #[test]
        fn pages_partition_the_id_list(total in 0usize..200, limit in 1i64..30) {
            let ids: Vec<usize> = (0..total).collect();
            let first = Pagination::resolve(PageRequest::new(1, limit), PageDefaults::default());
            let pages = first.total_pages(total as u64);

            let mut seen = Vec::new();
            for page in 1..=pages.max(1) {
                let p = Pagination::resolve(PageRequest::new(page as i64, limit), PageDefaults::default());
                seen.extend(p.slice(&ids));
            }
            prop_assert_eq!(seen, ids);
        }
    }
}
