//! Order endpoints.

use storefront_sync_core::{CheckoutRequest, Order, OrderId};
use tracing::instrument;

use super::{ApiClient, RequestSpec, Tag};
use crate::error::ApiError;

impl ApiClient {
    /// The signed-in user's order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn orders(&self) -> Result<Vec<Order>, ApiError> {
        self.query(Tag::Orders, "orders", &(), RequestSpec::get("orders"))
            .await
    }

    /// A single order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for unknown orders.
    #[instrument(skip(self))]
    pub async fn order(&self, id: &OrderId) -> Result<Order, ApiError> {
        let spec = RequestSpec::get("orders").segment(id.as_str());
        self.query(Tag::Orders, "order", id, spec).await
    }

    /// Turn the current cart into an order.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self, request))]
    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<Order, ApiError> {
        let spec = RequestSpec::post("orders").json(request)?;
        let order = self.request(&spec).await?;
        self.cache().invalidate_many(&[Tag::Orders, Tag::Cart]);
        Ok(order)
    }

    /// Cancel an order that has not shipped yet.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, id: &OrderId) -> Result<Order, ApiError> {
        let spec = RequestSpec::post("orders")
            .segment(id.as_str())
            .segment("cancel");
        let order = self.request(&spec).await?;
        self.cache().invalidate(Tag::Orders);
        Ok(order)
    }
}
