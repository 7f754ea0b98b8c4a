//! Catalog management for administrators.

use storefront_sync_core::{Product, ProductDraft, ProductId};
use tracing::{info, instrument};

use super::Storefront;
use crate::error::ApiError;

impl Storefront {
    /// Create a product and add it to the loaded list.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` unless an administrator is signed in,
    /// otherwise the API error.
    #[instrument(skip(self, draft), fields(slug = %draft.slug))]
    pub async fn create_product(&self, draft: &ProductDraft) -> Result<Product, ApiError> {
        self.require_admin().await?;
        let product = self.inner.api.create_product(draft).await?;
        let stored = product.clone();
        self.inner
            .store
            .update(|s| s.products.update_product(stored))
            .await;
        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Replace a product and refresh it in the loaded list.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` unless an administrator is signed in,
    /// otherwise the API error.
    #[instrument(skip(self, draft), fields(slug = %draft.slug))]
    pub async fn update_product(
        &self,
        id: &ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, ApiError> {
        self.require_admin().await?;
        let product = self.inner.api.update_product(id, draft).await?;
        let stored = product.clone();
        self.inner
            .store
            .update(|s| s.products.update_product(stored))
            .await;
        Ok(product)
    }

    /// Delete a product and drop it from the loaded list.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` unless an administrator is signed in,
    /// otherwise the API error.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), ApiError> {
        self.require_admin().await?;
        self.inner.api.delete_product(id).await?;
        self.inner
            .store
            .update(|s| s.products.remove_product(id))
            .await;
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    async fn require_admin(&self) -> Result<(), ApiError> {
        let role = self
            .inner
            .store
            .read(|s| s.session.user().map(storefront_sync_core::User::is_admin))
            .await;
        match role {
            None => Err(ApiError::Unauthorized),
            Some(false) => Err(ApiError::Forbidden("admin role required".to_string())),
            Some(true) => Ok(()),
        }
    }
}
