//! Catalog filter state mirrored to the URL query string.

use storefront_sync_core::ProductFilter;
use tracing::debug;

/// The active product filter.
///
/// The URL is read once on first load; after that every change is written
/// back as a query string.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    filter: ProductFilter,
    hydrated: bool,
}

impl FilterState {
    /// Create an empty, not yet hydrated filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the filter from URL query parameters.
    ///
    /// Only the first call has an effect. Returns whether it was applied.
    pub fn hydrate_from_query(&mut self, query: &str) -> bool {
        if self.hydrated {
            debug!("Filter already hydrated, ignoring query string");
            return false;
        }
        self.filter = ProductFilter::from_query_string(query);
        self.hydrated = true;
        true
    }

    /// Apply a change, reset to the first page and return the new query
    /// string.
    pub fn update(&mut self, change: impl FnOnce(&mut ProductFilter)) -> String {
        change(&mut self.filter);
        self.filter.page_number = Some(1);
        self.hydrated = true;
        self.filter.to_query_string()
    }

    /// Move to another page without touching the rest of the filter.
    pub fn set_page(&mut self, page_number: u32) -> String {
        self.filter.page_number = Some(page_number.max(1));
        self.filter.to_query_string()
    }

    /// Current query string.
    #[must_use]
    pub fn query_string(&self) -> String {
        self.filter.to_query_string()
    }

    /// Current filter.
    #[must_use]
    pub const fn filter(&self) -> &ProductFilter {
        &self.filter
    }

    /// Whether the URL has been read.
    #[must_use]
    pub const fn is_hydrated(&self) -> bool {
        self.hydrated
    }
}

#[cfg(test)]
mod tests {
    use storefront_sync_core::SortKey;

    use super::*;

    #[test]
    fn test_hydrates_only_once() {
        let mut state = FilterState::new();
        assert!(state.hydrate_from_query("?category=men&pageNumber=2"));
        assert!(!state.hydrate_from_query("?category=women"));
        assert_eq!(state.filter().category.as_deref(), Some("men"));
        assert_eq!(state.filter().page_number, Some(2));
    }

    #[test]
    fn test_update_resets_page() {
        let mut state = FilterState::new();
        state.hydrate_from_query("pageNumber=5");
        let query = state.update(|f| f.sort_by = Some(SortKey::PriceAsc));
        assert_eq!(state.filter().page_number, Some(1));
        assert!(query.contains("sortBy=price_asc"));
        assert!(query.contains("pageNumber=1"));
    }

    #[test]
    fn test_update_before_hydration_blocks_later_url() {
        let mut state = FilterState::new();
        state.update(|f| f.brand = Some("Acme".to_string()));
        assert!(!state.hydrate_from_query("brand=Other"));
        assert_eq!(state.filter().brand.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_set_page_keeps_selection() {
        let mut state = FilterState::new();
        state.update(|f| f.color = Some("red".to_string()));
        let before = state.filter().selection_key();
        state.set_page(3);
        assert_eq!(state.filter().page(), 3);
        assert_eq!(state.filter().selection_key(), before);
    }
}
