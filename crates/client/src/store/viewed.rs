//! Recently viewed products.

use std::collections::VecDeque;

use storefront_sync_core::ProductId;

/// Number of recently viewed products kept.
pub const RECENTLY_VIEWED_LIMIT: usize = 20;

/// Product IDs in view order, most recent first, without duplicates.
#[derive(Debug, Clone, Default)]
pub struct RecentlyViewed {
    ids: VecDeque<ProductId>,
}

impl RecentlyViewed {
    /// Record a view, moving the product to the front.
    pub fn record(&mut self, id: ProductId) {
        self.ids.retain(|existing| existing != &id);
        self.ids.push_front(id);
        self.ids.truncate(RECENTLY_VIEWED_LIMIT);
    }

    /// IDs, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &ProductId> {
        self.ids.iter()
    }

    /// Number of recorded products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing has been viewed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Forget every view.
    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
