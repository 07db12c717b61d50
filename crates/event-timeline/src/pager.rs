//! Fixed-size paging over an ordered sequence.

use std::sync::Arc;

/// Lazily sliced view of a shared sequence.
///
/// Creating a pager only captures the sequence handle, so one can be made
/// per query. Out-of-range pages are empty rather than errors.
#[derive(Debug)]
pub struct Pager<T> {
    items: Arc<[T]>,
    page_size: usize,
}

impl<T> Clone for Pager<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            page_size: self.page_size,
        }
    }
}

impl<T> Pager<T> {
    /// Creates a pager. A zero page size is treated as one.
    #[must_use]
    pub fn new(items: impl Into<Arc<[T]>>, page_size: usize) -> Self {
        Self {
            items: items.into(),
            page_size: page_size.max(1),
        }
    }

    /// Total number of items across all pages.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.items.len()
    }

    /// Items per page.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of non-empty pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.items.len().div_ceil(self.page_size)
    }

    /// Returns true if there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items `[n * page_size, min((n + 1) * page_size, total_count))`.
    #[must_use]
    pub fn load_page(&self, n: usize) -> &[T] {
        let Some(start) = n.checked_mul(self.page_size) else {
            return &[];
        };
        if start >= self.items.len() {
            return &[];
        }
        let end = start.saturating_add(self.page_size).min(self.items.len());
        &self.items[start..end]
    }

    /// Returns true if page `n + 1` has items.
    #[must_use]
    pub fn has_next(&self, n: usize) -> bool {
        n.checked_add(1).is_some_and(|next| next < self.page_count())
    }

    /// Returns true if page `n - 1` exists and has items.
    #[must_use]
    pub fn has_prev(&self, n: usize) -> bool {
        n > 0 && n - 1 < self.page_count()
    }

    /// The whole underlying sequence.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn pager(total: u32, page_size: usize) -> Pager<u32> {
        Pager::new((0..total).collect::<Vec<_>>(), page_size)
    }

    #[test_case(0, &[0, 1, 2] ; "first page")]
    #[test_case(2, &[6, 7, 8] ; "middle page")]
    #[test_case(3, &[9] ; "partial last page")]
    #[test_case(4, &[] ; "past the end")]
    #[test_case(usize::MAX, &[] ; "overflowing page number")]
    fn load_page_slices(n: usize, expected: &[u32]) {
        assert_eq!(pager(10, 3).load_page(n), expected);
    }

    #[test]
    fn counts() {
        let p = pager(10, 3);
        assert_eq!(p.total_count(), 10);
        assert_eq!(p.page_size(), 3);
        assert_eq!(p.page_count(), 4);
        assert!(!p.is_empty());
    }

    #[test]
    fn navigation_flags() {
        let p = pager(10, 3);
        assert!(p.has_next(0));
        assert!(p.has_next(2));
        assert!(!p.has_next(3));
        assert!(!p.has_prev(0));
        assert!(p.has_prev(1));
        assert!(p.has_prev(3));
        assert!(!p.has_prev(9));
        assert!(!p.has_next(usize::MAX));
    }

    #[test]
    fn empty_sequence() {
        let p = pager(0, 5);
        assert!(p.is_empty());
        assert_eq!(p.page_count(), 0);
        assert!(p.load_page(0).is_empty());
        assert!(!p.has_next(0));
        assert!(!p.has_prev(0));
    }

    #[test]
    fn zero_page_size_is_one() {
        let p = pager(3, 0);
        assert_eq!(p.page_size(), 1);
        assert_eq!(p.load_page(2), &[2]);
    }

    #[test]
    fn clones_share_items() {
        let p = pager(4, 2);
        let q = p.clone();
        assert!(std::ptr::eq(p.items(), q.items()));
    }
}
