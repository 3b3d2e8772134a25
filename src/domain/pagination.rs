use serde::Serialize;

/// Offset/limit window over an ordered result set.
///
/// Pages are 1-based; page 0 is treated as page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    per_page: u64,
}

impl Pagination {
    #[must_use]
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    #[must_use]
    pub const fn page(&self) -> u64 {
        self.page
    }

    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.per_page
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page - 1) * self.per_page
    }

    /// Number of pages needed to show `total` rows, at least one.
    #[must_use]
    pub const fn total_pages(&self, total: u64) -> u64 {
        if total == 0 {
            1
        } else {
            total.div_ceil(self.per_page)
        }
    }

    /// Wraps one page of rows together with the paging metadata.
    pub fn wrap<T>(&self, items: Vec<T>, total: u64) -> Page<T> {
        Page {
            items,
            page: self.page,
            per_page: self.per_page,
            total,
            total_pages: self.total_pages(total),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_zero_based() {
        let p = Pagination::new(1, 20);
        assert_eq!(p.offset(), 0);
        assert_eq!(p.limit(), 20);

        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn page_zero_is_first_page() {
        assert_eq!(Pagination::new(0, 10).page(), 1);
        assert_eq!(Pagination::new(0, 10).offset(), 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = Pagination::new(1, 10);
        assert_eq!(p.total_pages(0), 1);
        assert_eq!(p.total_pages(10), 1);
        assert_eq!(p.total_pages(11), 2);
        assert_eq!(p.total_pages(95), 10);
    }

    #[test]
    fn wrap_reports_neighbours() {
        let page = Pagination::new(2, 2).wrap(vec![3, 4], 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());
        assert!(page.has_previous());

        let last = Pagination::new(3, 2).wrap(vec![5], 5);
        assert!(!last.has_next());
    }
}
