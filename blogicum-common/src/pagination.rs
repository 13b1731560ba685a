//! Page selection for post and comment listings.
//!
//! Page numbers are forgiving: a missing or unparseable `page` falls back to
//! the first page, and anything out of range lands on the last one.

use serde::{Deserialize, Serialize};

pub const PAGE_SIZE: u64 = 10;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<String>,
}

impl PageQuery {
    #[must_use]
    pub fn new(page: impl Into<String>) -> Self {
        Self {
            page: Some(page.into()),
        }
    }
}

/// The slice of a listing that one page covers.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub page_size: u64,
}

impl PageWindow {
    #[must_use]
    pub fn resolve(query: &PageQuery, count: u64, page_size: u64) -> Self {
        // An empty listing still has one (empty) page.
        let num_pages = count.div_ceil(page_size).max(1);

        let requested = query
            .page
            .as_deref()
            .and_then(|page| page.trim().parse::<i128>().ok());
        let number = match requested {
            None => 1,
            Some(number) if number < 1 => num_pages,
            Some(number) => u64::try_from(number).map_or(num_pages, |n| n.min(num_pages)),
        };

        Self {
            number,
            num_pages,
            count,
            page_size,
        }
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.page_size
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        self.page_size
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(window: PageWindow, items: Vec<T>) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
            has_next: window.has_next(),
            has_previous: window.has_previous(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PAGE_SIZE, PageQuery, PageWindow};

    fn number(page: Option<&str>, count: u64) -> u64 {
        let query = PageQuery {
            page: page.map(str::to_owned),
        };
        PageWindow::resolve(&query, count, PAGE_SIZE).number
    }

    #[test]
    fn page_count() {
        assert_eq!(PageWindow::resolve(&PageQuery::default(), 0, 10).num_pages, 1);
        assert_eq!(PageWindow::resolve(&PageQuery::default(), 10, 10).num_pages, 1);
        assert_eq!(PageWindow::resolve(&PageQuery::default(), 11, 10).num_pages, 2);
    }

    #[test]
    fn requested_pages() {
        assert_eq!(number(None, 35), 1);
        assert_eq!(number(Some("3"), 35), 3);
        assert_eq!(number(Some(" 2 "), 35), 2);
    }

    #[test]
    fn garbage_falls_back_to_first_page() {
        assert_eq!(number(Some("abc"), 35), 1);
        assert_eq!(number(Some("2.0"), 35), 1);
        assert_eq!(number(Some(""), 35), 1);
    }

    #[test]
    fn out_of_range_lands_on_last_page() {
        assert_eq!(number(Some("5"), 35), 4);
        assert_eq!(number(Some("0"), 35), 4);
        assert_eq!(number(Some("-3"), 35), 4);
        assert_eq!(number(Some("99999999999999999999999"), 35), 4);
        assert_eq!(number(Some("7"), 0), 1);
    }

    #[test]
    fn window_bounds() {
        let window = PageWindow::resolve(&PageQuery::new("2"), 25, 10);
        assert_eq!(window.offset(), 10);
        assert_eq!(window.limit(), 10);
        assert!(window.has_next());
        assert!(window.has_previous());

        let last = PageWindow::resolve(&PageQuery::new("3"), 25, 10);
        assert!(!last.has_next());
    }
}
