use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PER_PAGE, MAX_PER_PAGE};

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Page {
    /// Out-of-range values are clamped rather than rejected.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }

    pub fn offset(&self) -> u32 {
        (self.page.max(1) - 1).saturating_mul(self.per_page)
    }
}

/// One page of results plus the size of the whole result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total_entries: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: Page, total_entries: u64) -> Self {
        Self {
            items,
            page: page.page,
            per_page: page.per_page,
            total_entries,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total_entries.div_ceil(u64::from(self.per_page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_one_based() {
        assert_eq!(Page::new(1, 40).offset(), 0);
        assert_eq!(Page::new(3, 10).offset(), 20);
        assert_eq!(Page::new(0, 10).offset(), 0);
        assert_eq!(Page::new(1, 0).per_page, 1);
        assert_eq!(Page::new(1, 10_000).per_page, MAX_PER_PAGE);
    }

    #[test]
    fn total_pages_rounds_up() {
        let p: Paginated<u8> = Paginated::new(vec![], Page::new(1, 40), 81);
        assert_eq!(p.total_pages(), 3);
    }
}
