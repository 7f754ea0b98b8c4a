//! Normalized product entities with pagination metadata.

use std::collections::HashMap;

use storefront_sync_core::{Product, ProductFilter, ProductId, ProductPage};
use tracing::debug;

/// Products keyed by ID, merged across catalog pages.
#[derive(Debug, Clone, Default)]
pub struct ProductStore {
    entities: HashMap<ProductId, Product>,
    total_count: u32,
    page_number: u32,
    page_size: u32,
    /// Selection key of the filter behind the loaded pages.
    selection: Option<String>,
}

impl ProductStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a page of products loaded with `filter`.
    ///
    /// Page 1, or a filter that selects a different product set than the
    /// previous call, replaces the entities. Any other page appends,
    /// de-duplicating by ID with the later record winning.
    pub fn set_products(
        &mut self,
        products: Vec<Product>,
        total_count: u32,
        page_number: u32,
        page_size: u32,
        filter: &ProductFilter,
    ) {
        let selection = filter.selection_key();
        let replace = page_number <= 1 || self.selection.as_deref() != Some(selection.as_str());
        if replace {
            self.entities.clear();
        }
        debug!(
            count = products.len(),
            page_number,
            replace,
            "Merging product page"
        );

        for mut product in products {
            product.normalize_images();
            self.entities.insert(product.id.clone(), product);
        }

        self.total_count = total_count;
        self.page_number = page_number;
        self.page_size = page_size;
        self.selection = Some(selection);
    }

    /// Merge a [`ProductPage`] loaded with `filter`.
    pub fn set_page(&mut self, page: ProductPage, filter: &ProductFilter) {
        self.set_products(
            page.items,
            page.total_count,
            page.page_number,
            page.page_size,
            filter,
        );
    }

    /// Insert or replace a single product.
    pub fn update_product(&mut self, mut product: Product) {
        product.normalize_images();
        self.entities.insert(product.id.clone(), product);
    }

    /// Remove a product. Returns whether it was present.
    pub fn remove_product(&mut self, id: &ProductId) -> bool {
        let removed = self.entities.remove(id).is_some();
        if removed {
            self.total_count = self.total_count.saturating_sub(1);
        }
        removed
    }

    /// Product by ID.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.entities.get(id)
    }

    /// Product by slug.
    #[must_use]
    pub fn find_by_slug(&self, slug: &str) -> Option<&Product> {
        self.entities.values().find(|p| p.slug == slug)
    }

    /// Products ordered by slug, then ID.
    #[must_use]
    pub fn products(&self) -> Vec<&Product> {
        let mut products: Vec<&Product> = self.entities.values().collect();
        products.sort_by(|a, b| a.slug.cmp(&b.slug).then_with(|| a.id.cmp(&b.id)));
        products
    }

    /// Whether another page exists after the last loaded one.
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        u64::from(self.page_number) * u64::from(self.page_size) < u64::from(self.total_count)
    }

    /// Total matching products on the server.
    #[must_use]
    pub const fn total_count(&self) -> u32 {
        self.total_count
    }

    /// Last loaded page number.
    #[must_use]
    pub const fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Number of loaded products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no products are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drop all products and pagination metadata.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use rust_decimal::Decimal;
    use storefront_sync_core::{CategoryPath, ProductImage};

    use super::*;

    pub(crate) fn product(id: &str, slug: &str) -> Product {
        Product {
            id: ProductId::from(id),
            slug: slug.to_string(),
            name: slug.to_string(),
            brand: "Acme".to_string(),
            description: String::new(),
            price: Decimal::new(1000, 2),
            sale_price: None,
            category_path: CategoryPath::default(),
            colors: vec![],
            images: vec![ProductImage {
                url: format!("{slug}.jpg"),
                is_main: false,
                alt_text: None,
            }],
            rating: None,
            reviews: vec![],
            attributes: vec![],
            is_new: false,
            is_trending: false,
            created_at: None,
        }
    }

    fn ids(store: &ProductStore) -> Vec<&str> {
        store.products().iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_page_one_replaces() {
        let filter = ProductFilter::default();
        let mut store = ProductStore::new();
        store.set_products(vec![product("1", "a"), product("2", "b")], 4, 1, 2, &filter);
        store.set_products(vec![product("3", "c")], 4, 1, 2, &filter);
        assert_eq!(ids(&store), vec!["3"]);
    }

    #[test]
    fn test_next_page_appends_and_dedups() {
        let filter = ProductFilter::default();
        let mut store = ProductStore::new();
        store.set_products(vec![product("1", "a"), product("2", "b")], 4, 1, 2, &filter);
        assert!(store.has_next_page());

        let mut updated = product("2", "b");
        updated.name = "updated".to_string();
        store.set_products(vec![updated, product("3", "c")], 4, 2, 2, &filter);
        assert_eq!(ids(&store), vec!["1", "2", "3"]);
        assert_eq!(store.get(&ProductId::from("2")).unwrap().name, "updated");
        assert!(!store.has_next_page());
    }

    #[test]
    fn test_filter_change_replaces_even_past_page_one() {
        let mut store = ProductStore::new();
        let red = ProductFilter {
            color: Some("red".to_string()),
            ..ProductFilter::default()
        };
        store.set_products(vec![product("1", "a")], 10, 1, 1, &ProductFilter::default());
        store.set_products(vec![product("2", "b")], 10, 2, 1, &red);
        assert_eq!(ids(&store), vec!["2"]);

        // Only the page changed: append.
        let red_page_3 = ProductFilter {
            page_number: Some(3),
            ..red.clone()
        };
        store.set_products(vec![product("3", "c")], 10, 3, 1, &red_page_3);
        assert_eq!(ids(&store), vec!["2", "3"]);
    }

    #[test]
    fn test_ingested_images_are_normalized() {
        let mut store = ProductStore::new();
        store.set_products(vec![product("1", "a")], 1, 1, 12, &ProductFilter::default());
        let stored = store.get(&ProductId::from("1")).unwrap();
        assert!(stored.images.first().unwrap().is_main);
    }

    #[test]
    fn test_stable_order_by_slug_then_id() {
        let mut store = ProductStore::new();
        store.set_products(
            vec![product("9", "b"), product("2", "a"), product("1", "b")],
            3,
            1,
            12,
            &ProductFilter::default(),
        );
        assert_eq!(ids(&store), vec!["2", "1", "9"]);
    }

    #[test]
    fn test_remove_and_find() {
        let mut store = ProductStore::new();
        store.update_product(product("1", "linen-shirt"));
        assert_eq!(store.find_by_slug("linen-shirt").unwrap().id.as_str(), "1");
        assert!(store.remove_product(&ProductId::from("1")));
        assert!(store.is_empty());
    }
}
