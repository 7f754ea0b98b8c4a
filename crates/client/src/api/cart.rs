//! Cart endpoints.
//!
//! Every mutation returns the updated cart and invalidates cached cart
//! queries.

use storefront_sync_core::{AddCartItem, Cart, CartItemId, UpdateCartItem};
use tracing::instrument;

use super::{ApiClient, RequestSpec, Tag};
use crate::error::ApiError;

impl ApiClient {
    /// The signed-in user's cart.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn cart(&self) -> Result<Cart, ApiError> {
        self.query(Tag::Cart, "cart", &(), RequestSpec::get("cart"))
            .await
    }

    /// Add a product variant to the cart.
    ///
    /// # Errors
    ///
    /// Returns the API error (e.g., insufficient stock).
    #[instrument(skip(self, item), fields(product_id = %item.product_id))]
    pub async fn add_cart_item(&self, item: &AddCartItem) -> Result<Cart, ApiError> {
        let spec = RequestSpec::post("cart/items").json(item)?;
        self.cart_mutation(&spec).await
    }

    /// Change a line item's quantity.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn update_cart_item(
        &self,
        id: &CartItemId,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        let spec = RequestSpec::put("cart/items")
            .segment(id.as_str())
            .json(&UpdateCartItem { quantity })?;
        self.cart_mutation(&spec).await
    }

    /// Remove a line item.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn remove_cart_item(&self, id: &CartItemId) -> Result<Cart, ApiError> {
        self.cart_mutation(&RequestSpec::delete("cart/items").segment(id.as_str()))
            .await
    }

    /// Remove every line item.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<(), ApiError> {
        self.execute(&RequestSpec::delete("cart")).await?;
        self.cache().invalidate(Tag::Cart);
        Ok(())
    }

    async fn cart_mutation(&self, spec: &RequestSpec) -> Result<Cart, ApiError> {
        let cart = self.request(spec).await?;
        self.cache().invalidate(Tag::Cart);
        Ok(cart)
    }
}
