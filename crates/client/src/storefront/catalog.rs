//! Catalog browsing: product pages, filters and product detail.

use storefront_sync_core::{Category, Product, ProductFilter};
use tracing::{debug, instrument};

use super::Storefront;
use crate::error::ApiError;

impl Storefront {
    /// Load the page selected by the current filter into the product store.
    ///
    /// # Errors
    ///
    /// Returns the API error; the store keeps its previous contents.
    #[instrument(skip(self))]
    pub async fn load_products(&self) -> Result<(), ApiError> {
        let filter = self.inner.store.read(|s| s.filter.filter().clone()).await;
        let page = self.inner.api.list_products(&filter).await?;
        debug!(
            items = page.items.len(),
            total = page.total_count,
            "Loaded product page"
        );
        self.inner
            .store
            .update(|s| s.products.set_page(page, &filter))
            .await;
        Ok(())
    }

    /// Append the next page, if there is one. Returns whether a page was
    /// loaded.
    ///
    /// # Errors
    ///
    /// Returns the API error; the filter stays on the previous page.
    pub async fn load_next_page(&self) -> Result<bool, ApiError> {
        let next = self
            .inner
            .store
            .read(|s| {
                s.products
                    .has_next_page()
                    .then(|| s.products.page_number().saturating_add(1))
            })
            .await;
        let Some(next) = next else {
            return Ok(false);
        };

        let previous = self.inner.store.read(|s| s.filter.filter().page()).await;
        self.inner.store.update(|s| s.filter.set_page(next)).await;
        if let Err(e) = self.load_products().await {
            self.inner
                .store
                .update(|s| s.filter.set_page(previous))
                .await;
            return Err(e);
        }
        Ok(true)
    }

    /// Change the filter, reset to the first page and reload. Returns the
    /// query string to write back to the URL.
    ///
    /// # Errors
    ///
    /// Returns the API error from reloading; the filter change is kept.
    pub async fn apply_filter(
        &self,
        change: impl FnOnce(&mut ProductFilter) + Send,
    ) -> Result<String, ApiError> {
        let query = self.inner.store.update(|s| s.filter.update(change)).await;
        self.load_products().await?;
        Ok(query)
    }

    /// Initialize the filter from the URL. Only the first call has an
    /// effect.
    pub async fn hydrate_filter_from_query(&self, query: &str) -> bool {
        self.inner
            .store
            .update(|s| s.filter.hydrate_from_query(query))
            .await
    }

    /// Fetch a product by slug and record it as recently viewed.
    ///
    /// # Errors
    ///
    /// Returns the API error (e.g., `NotFound`).
    #[instrument(skip(self))]
    pub async fn view_product(&self, slug: &str) -> Result<Product, ApiError> {
        let mut product = self.inner.api.get_product(slug).await?;
        product.normalize_images();
        let id = product.id.clone();
        self.inner.store.update(|s| s.viewed.record(id)).await;
        Ok(product)
    }

    /// Fetch the category tree into the store.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn load_categories(&self) -> Result<Vec<Category>, ApiError> {
        let categories = self.inner.api.categories().await?;
        let stored = categories.clone();
        self.inner
            .store
            .update(|s| s.categories = stored)
            .await;
        Ok(categories)
    }
}
