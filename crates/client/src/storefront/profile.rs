//! Profile edits for the signed-in user.

use storefront_sync_core::{ImageUpload, ProfileUpdate, User};
use tracing::instrument;

use super::Storefront;
use crate::error::ApiError;

impl Storefront {
    /// Update name and phone number.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for invalid input or the API error.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let user = self.inner.api.update_profile(update).await?;
        self.store_profile(user.clone()).await;
        Ok(user)
    }

    /// Replace the avatar image.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self, image), fields(file_name = %image.file_name))]
    pub async fn upload_avatar(&self, image: &ImageUpload) -> Result<User, ApiError> {
        let user = self.inner.api.upload_avatar(image).await?;
        self.store_profile(user.clone()).await;
        Ok(user)
    }

    async fn store_profile(&self, user: User) {
        self.inner
            .store
            .update(|s| s.session.refresh_profile(user))
            .await;
        self.persist().await;
    }
}
