//! Profile, liked-product and stock-subscription endpoints.

use serde::Serialize;
use storefront_sync_core::{ImageUpload, ProductId, ProfileUpdate, StockSubscriptionKey, User};
use tracing::instrument;

use super::{ApiClient, FormPart, RequestSpec, Tag};
use crate::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LikedProductsRequest<'a> {
    product_ids: &'a [ProductId],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StockSubscriptionRequest<'a> {
    product_id: &'a ProductId,
    color: &'a str,
    size: &'a str,
}

impl ApiClient {
    /// The signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.query(Tag::User, "me", &(), RequestSpec::get("users/me"))
            .await
    }

    /// Update name and phone.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for invalid input or the API error.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        update.validate()?;
        let spec = RequestSpec::put("users/me").json(update)?;
        self.user_mutation(&spec).await
    }

    /// Upload a new avatar image.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self, image), fields(file_name = %image.file_name))]
    pub async fn upload_avatar(&self, image: &ImageUpload) -> Result<User, ApiError> {
        let spec = RequestSpec::post("users/me/avatar").multipart(vec![FormPart::File {
            name: "avatar".to_string(),
            file_name: image.file_name.clone(),
            content_type: image.content_type.clone(),
            bytes: image.bytes.clone(),
        }]);
        self.user_mutation(&spec).await
    }

    /// Toggle one product in the liked set on the server.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn toggle_liked_product(&self, id: &ProductId) -> Result<(), ApiError> {
        self.execute(&RequestSpec::post("users/me/liked-products").segment(id.as_str()))
            .await?;
        self.cache().invalidate(Tag::User);
        Ok(())
    }

    /// Replace the server's liked set.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn replace_liked_products(&self, ids: &[ProductId]) -> Result<(), ApiError> {
        let spec = RequestSpec::put("users/me/liked-products")
            .json(&LikedProductsRequest { product_ids: ids })?;
        self.execute(&spec).await?;
        self.cache().invalidate(Tag::User);
        Ok(())
    }

    /// Toggle a back-in-stock subscription for one variant.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn toggle_stock_subscription(
        &self,
        key: &StockSubscriptionKey,
    ) -> Result<(), ApiError> {
        let spec = RequestSpec::post("users/me/stock-subscriptions").json(
            &StockSubscriptionRequest {
                product_id: &key.product_id,
                color: &key.color,
                size: &key.size,
            },
        )?;
        self.execute(&spec).await?;
        self.cache().invalidate(Tag::User);
        Ok(())
    }

    async fn user_mutation(&self, spec: &RequestSpec) -> Result<User, ApiError> {
        let user = self.request(spec).await?;
        self.cache().invalidate(Tag::User);
        Ok(user)
    }
}
