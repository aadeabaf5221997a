//! Fixed-size pages over a slice.

/// Page size for a user's own history.
pub const USER_PAGE_SIZE: usize = 5;
/// Page size for the admin history view.
pub const ADMIN_PAGE_SIZE: usize = 10;

/// One page of items.
#[derive(Debug, Clone, PartialEq, derive_getters::Getters)]
pub struct Page<T> {
    /// Items on this page
    items: Vec<T>,
    /// Zero-based page index after clamping
    index: usize,
    /// Number of pages, at least one
    total_pages: usize,
    /// Number of items across all pages
    total_items: usize,
}

impl<T> Page<T> {
    /// Whether a previous page exists.
    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    /// Whether a next page exists.
    pub fn has_next(&self) -> bool {
        self.index + 1 < self.total_pages
    }

    /// Consume the page and return its items.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Slice `items` into page `index` of `size`.
///
/// The index is clamped to `[0, ceil(n / size) - 1]`; an empty list yields a
/// single empty page.
///
/// # Examples
///
/// ```
/// use vigil_storage::paginate;
///
/// let items: Vec<u32> = (0..12).collect();
/// let page = paginate(&items, 9, 5);
/// assert_eq!(*page.index(), 2);
/// assert_eq!(page.items(), &vec![10, 11]);
/// ```
pub fn paginate<T: Clone>(items: &[T], index: usize, size: usize) -> Page<T> {
    let size = size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(size).max(1);
    let index = index.min(total_pages - 1);
    let start = index * size;
    let end = (start + size).min(total_items);
    Page {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        index,
        total_pages,
        total_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_has_one_page() {
        let page = paginate::<u8>(&[], 3, USER_PAGE_SIZE);
        assert_eq!(*page.index(), 0);
        assert_eq!(*page.total_pages(), 1);
        assert!(page.items().is_empty());
        assert!(!page.has_next());
    }

    #[test]
    fn test_exact_multiple() {
        let items: Vec<u32> = (0..20).collect();
        let page = paginate(&items, 1, ADMIN_PAGE_SIZE);
        assert_eq!(*page.total_pages(), 2);
        assert_eq!(page.items().len(), 10);
        assert!(page.has_previous());
        assert!(!page.has_next());
    }
}
