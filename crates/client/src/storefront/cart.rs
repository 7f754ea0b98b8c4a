//! Cart and order operations. The store only ever holds what the server
//! returned.

use storefront_sync_core::{AddCartItem, Cart, CartItemId, CheckoutRequest, Order, OrderId};
use tracing::{debug, instrument};

use super::Storefront;
use crate::api::Tag;
use crate::error::ApiError;

impl Storefront {
    /// Reload the cart, bypassing cached responses.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn refresh_cart(&self) -> Result<Cart, ApiError> {
        self.inner.api.cache().invalidate(Tag::Cart);
        let cart = self.inner.api.cart().await?;
        self.store_cart(cart.clone()).await;
        Ok(cart)
    }

    /// Add a variant to the cart.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self, item), fields(product_id = %item.product_id))]
    pub async fn add_to_cart(&self, item: &AddCartItem) -> Result<Cart, ApiError> {
        let cart = self.inner.api.add_cart_item(item).await?;
        self.store_cart(cart.clone()).await;
        Ok(cart)
    }

    /// Change a line item's quantity.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn update_cart_item(&self, id: &CartItemId, quantity: u32) -> Result<Cart, ApiError> {
        let cart = self.inner.api.update_cart_item(id, quantity).await?;
        self.store_cart(cart.clone()).await;
        Ok(cart)
    }

    /// Remove a line item.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn remove_cart_item(&self, id: &CartItemId) -> Result<Cart, ApiError> {
        let cart = self.inner.api.remove_cart_item(id).await?;
        self.store_cart(cart.clone()).await;
        Ok(cart)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn clear_cart(&self) -> Result<(), ApiError> {
        self.inner.api.clear_cart().await?;
        self.inner
            .store
            .update(|s| {
                if let Some(cart) = &mut s.cart {
                    cart.items.clear();
                }
            })
            .await;
        self.persist().await;
        Ok(())
    }

    /// Reload the order history, bypassing cached responses.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn refresh_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.inner.api.cache().invalidate(Tag::Orders);
        let orders = self.inner.api.orders().await?;
        let stored = orders.clone();
        self.inner.store.update(|s| s.orders = stored).await;
        Ok(orders)
    }

    /// Fetch one order and refresh it in the history.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn load_order(&self, id: &OrderId) -> Result<Order, ApiError> {
        let order = self.inner.api.order(id).await?;
        self.upsert_order(order.clone()).await;
        Ok(order)
    }

    /// Place an order from the current cart.
    ///
    /// The new order is prepended to the history and the cart emptied.
    /// With the hub enabled, status updates for the order are subscribed
    /// best-effort.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self, request))]
    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<Order, ApiError> {
        let order = self.inner.api.checkout(request).await?;
        let placed = order.clone();
        self.inner
            .store
            .update(|s| {
                s.orders.retain(|o| o.id != placed.id);
                s.orders.insert(0, placed);
                if let Some(cart) = &mut s.cart {
                    cart.items.clear();
                }
            })
            .await;
        self.persist().await;

        if let Some(hub) = &self.inner.hub
            && let Err(e) = hub.subscribe_order(order.id.as_str()).await
        {
            debug!(error = %e, order_id = %order.id, "Order updates not subscribed");
        }
        Ok(order)
    }

    /// Cancel an order.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, id: &OrderId) -> Result<Order, ApiError> {
        let order = self.inner.api.cancel_order(id).await?;
        self.upsert_order(order.clone()).await;
        Ok(order)
    }

    async fn upsert_order(&self, order: Order) {
        self.inner
            .store
            .update(|s| match s.orders.iter_mut().find(|o| o.id == order.id) {
                Some(existing) => *existing = order,
                None => s.orders.insert(0, order),
            })
            .await;
    }

    async fn store_cart(&self, cart: Cart) {
        self.inner.store.update(|s| s.cart = Some(cart)).await;
        self.persist().await;
    }
}
