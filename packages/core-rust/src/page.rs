//! Page arithmetic: which fixed-size block of positions a row lives in.

use std::ops::Range;

/// Default number of rows fetched together.
pub const PAGE_SIZE: usize = 1000;

/// Index of a page: `position / page_size`.
pub type FetchKey = usize;

/// Monotonically increasing cache epoch, bumped on every reset.
pub type Generation = u64;

/// Lifecycle of one page within a generation.
///
/// `Fetched` is terminal for the generation, whether the fetch succeeded or
/// not; only a reset (new generation) starts every page over at `Unrequested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    Unrequested,
    Pending,
    Fetched,
}

/// Returns the fetch key of the page containing `position`.
///
/// `page_size` of 0 is treated as 1.
#[must_use]
pub fn fetch_key(position: usize, page_size: usize) -> FetchKey {
    position / page_size.max(1)
}

/// First row position of page `key`.
#[must_use]
pub fn page_offset(key: FetchKey, page_size: usize) -> usize {
    key.saturating_mul(page_size.max(1))
}

/// Positions covered by page `key`.
#[must_use]
pub fn page_range(key: FetchKey, page_size: usize) -> Range<usize> {
    let start = page_offset(key, page_size);
    start..start.saturating_add(page_size.max(1))
}

/// Fetch keys of every page overlapping `positions`, ascending.
#[must_use]
pub fn pages_overlapping(positions: Range<usize>, page_size: usize) -> Range<FetchKey> {
    if positions.is_empty() {
        return 0..0;
    }
    fetch_key(positions.start, page_size)..fetch_key(positions.end - 1, page_size) + 1
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn default_page_boundaries() {
        assert_eq!(fetch_key(0, PAGE_SIZE), 0);
        assert_eq!(fetch_key(999, PAGE_SIZE), 0);
        assert_eq!(fetch_key(1000, PAGE_SIZE), 1);
        assert_eq!(fetch_key(2500, PAGE_SIZE), 2);
        assert_eq!(page_range(2, PAGE_SIZE), 2000..3000);
    }

    #[test]
    fn zero_page_size_is_clamped() {
        assert_eq!(fetch_key(5, 0), 5);
        assert_eq!(page_range(5, 0), 5..6);
    }

    #[test]
    fn overlapping_pages_for_viewport() {
        assert_eq!(pages_overlapping(950..1050, 1000), 0..2);
        assert_eq!(pages_overlapping(1000..1001, 1000), 1..2);
        assert_eq!(pages_overlapping(10..10, 1000), 0..0);
    }

    proptest! {
        #[test]
        fn fetch_key_is_integer_division(position in 0usize..10_000_000, page_size in 1usize..5000) {
            let key = fetch_key(position, page_size);
            prop_assert_eq!(key, position / page_size);
            prop_assert!(page_range(key, page_size).contains(&position));
        }
    }
}
