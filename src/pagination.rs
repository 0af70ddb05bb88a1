//! List pagination

use serde::{Deserialize, Serialize};

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Page {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl Page {
    pub fn number(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number() - 1) * self.limit()
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let page = Page::default();
        assert_eq!(page.number(), 1);
        assert_eq!(page.limit(), 20);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn clamps() {
        let page = Page { page: Some(0), per_page: Some(1000) };
        assert_eq!(page.number(), 1);
        assert_eq!(page.limit(), 100);
        let page = Page { page: Some(3), per_page: Some(0) };
        assert_eq!(page.limit(), 1);
        assert_eq!(page.offset(), 2);
    }

    #[test]
    fn offsets() {
        let page = Page { page: Some(4), per_page: Some(25) };
        assert_eq!(page.offset(), 75);
    }
}
