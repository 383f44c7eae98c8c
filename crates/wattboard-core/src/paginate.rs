//! Client-side pagination of a committed result set.

use serde::Serialize;

/// Number of pages needed for `len` items at `page_size` items per page.
///
/// Always at least 1 so that an empty table still renders "page 1 of 1".
/// A `page_size` of 0 is treated as 1.
pub fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1)).max(1)
}

/// Clamp a 1-based page index into `[1, total]`.
pub fn clamp_page(index: usize, total: usize) -> usize {
    index.clamp(1, total.max(1))
}

/// Position within a paged result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageView {
    /// Current page, 1-based and already clamped.
    pub page_index: usize,
    /// Rows per page (never 0).
    pub page_size: usize,
    /// Total pages (never 0).
    pub total_pages: usize,
    /// Total rows across all pages.
    pub total_items: usize,
}

impl PageView {
    /// Compute the view for `total_items` rows.
    pub fn new(total_items: usize, page_index: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total_pages(total_items, page_size);
        Self {
            page_index: clamp_page(page_index, total_pages),
            page_size,
            total_pages,
            total_items,
        }
    }

    /// Whether a following page exists.
    pub fn has_next(&self) -> bool {
        self.page_index < self.total_pages
    }

    /// Whether a preceding page exists.
    pub fn has_previous(&self) -> bool {
        self.page_index > 1
    }

    /// Index range of this page's rows within the full set.
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = (self.page_index - 1)
            .saturating_mul(self.page_size)
            .min(self.total_items);
        let end = start.saturating_add(self.page_size).min(self.total_items);
        start..end
    }
}

/// One page of rows plus its position.
#[derive(Debug, PartialEq)]
pub struct Page<'a, T> {
    /// Rows on this page, in result-set order.
    pub items: &'a [T],
    /// Where this page sits in the result set.
    pub view: PageView,
}

/// Slice page `page_index` (1-based) out of `items`.
///
/// Out-of-range indices are clamped rather than rejected.
///
/// # Examples
///
/// ```
/// use wattboard_core::paginate;
///
/// let rows: Vec<u32> = (1..=47).collect();
/// let page = paginate(&rows, 3, 20);
/// assert_eq!(page.items, &[41, 42, 43, 44, 45, 46, 47]);
/// assert_eq!(page.view.total_pages, 3);
///
/// let page = paginate(&rows, 9, 20);
/// assert_eq!(page.view.page_index, 3);
/// ```
pub fn paginate<T>(items: &[T], page_index: usize, page_size: usize) -> Page<'_, T> {
    let view = PageView::new(items.len(), page_index, page_size);
    Page {
        items: &items[view.range()],
        view,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(47, 20), 3);
    }

    #[test]
    fn test_zero_page_size_treated_as_one() {
        assert_eq!(total_pages(5, 0), 5);
        let rows = [1, 2, 3];
        let page = paginate(&rows, 2, 0);
        assert_eq!(page.items, &[2]);
        assert_eq!(page.view.page_size, 1);
    }

    #[test]
    fn test_forty_seven_rows() {
        let rows: Vec<usize> = (0..47).collect();

        let first = paginate(&rows, 1, 20);
        assert_eq!(first.items.len(), 20);
        assert_eq!(first.items[0], 0);
        assert!(!first.view.has_previous());
        assert!(first.view.has_next());

        let last = paginate(&rows, 3, 20);
        assert_eq!(last.items.len(), 7);
        assert_eq!(last.items[0], 40);
        assert!(!last.view.has_next());
    }

    #[test]
    fn test_index_clamped_both_ways() {
        let rows: Vec<usize> = (0..47).collect();
        assert_eq!(paginate(&rows, 0, 20).view.page_index, 1);
        assert_eq!(paginate(&rows, 5, 20).view.page_index, 3);
        assert_eq!(paginate(&rows, 5, 20).items.len(), 7);
    }

    #[test]
    fn test_empty_set_has_one_empty_page() {
        let rows: Vec<u8> = Vec::new();
        let page = paginate(&rows, 4, 20);
        assert!(page.items.is_empty());
        assert_eq!(page.view.page_index, 1);
        assert_eq!(page.view.total_pages, 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn page_index_always_in_bounds(len in 0usize..500, index in 0usize..100, size in 0usize..60) {
                let view = PageView::new(len, index, size);
                prop_assert!(view.page_index >= 1);
                prop_assert!(view.page_index <= view.total_pages);
                prop_assert!(view.total_pages >= 1);
            }

            #[test]
            fn pages_cover_every_item_once(len in 0usize..300, size in 1usize..40) {
                let rows: Vec<usize> = (0..len).collect();
                let total = total_pages(len, size);
                let mut seen = Vec::with_capacity(len);
                for index in 1..=total {
                    let page = paginate(&rows, index, size);
                    prop_assert!(page.items.len() <= size);
                    seen.extend_from_slice(page.items);
                }
                prop_assert_eq!(seen, rows);
            }
        }
    }
}
