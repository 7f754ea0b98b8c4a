//! Liked products and back-in-stock subscriptions.
//!
//! Both are optimistic: membership flips in the store before the request is
//! sent and is restored if the server rejects it. The settled set is
//! persisted either way.

use storefront_sync_core::{ProductId, StockSubscriptionKey};
use tracing::{debug, instrument, warn};

use super::Storefront;
use crate::error::ApiError;

enum LikeScope {
    Guest,
    User,
}

impl Storefront {
    /// Toggle a product in the liked set. Returns the resulting membership.
    ///
    /// Signed out, only the local guest set changes. Signed in, the toggle
    /// is applied immediately and rolled back if the server rejects it.
    ///
    /// # Errors
    ///
    /// Returns the API error after rolling back.
    #[instrument(skip(self))]
    pub async fn toggle_liked_product(&self, id: &ProductId) -> Result<bool, ApiError> {
        let (scope, liked) = self
            .inner
            .store
            .update(|s| {
                if s.session.is_authenticated() {
                    (LikeScope::User, s.session.liked_mut().toggle(id.clone()))
                } else if s.guest_liked.remove(id) {
                    (LikeScope::Guest, false)
                } else {
                    s.guest_liked.insert(id.clone());
                    (LikeScope::Guest, true)
                }
            })
            .await;

        if matches!(scope, LikeScope::Guest) {
            self.persist().await;
            return Ok(liked);
        }

        let result = self.inner.api.toggle_liked_product(id).await;
        let succeeded = result.is_ok();
        let now = self
            .inner
            .store
            .update(|s| {
                let liked = s.session.liked_mut();
                liked.settle(id, succeeded);
                liked.contains(id)
            })
            .await;
        self.persist().await;

        match result {
            Ok(()) => Ok(now),
            Err(e) => {
                warn!(error = %e, "Like toggle rejected, rolled back");
                Err(e)
            }
        }
    }

    /// Toggle a back-in-stock subscription. Returns the resulting
    /// membership. Requires a signed-in user.
    ///
    /// When the hub is enabled the matching hub subscription is updated
    /// too, best-effort.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` when signed out, otherwise the API
    /// error after rolling back.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn toggle_stock_subscription(
        &self,
        key: &StockSubscriptionKey,
    ) -> Result<bool, ApiError> {
        let subscribed = self
            .inner
            .store
            .update(|s| {
                s.session
                    .is_authenticated()
                    .then(|| s.session.subscriptions_mut().toggle(key.clone()))
            })
            .await;
        let Some(subscribed) = subscribed else {
            return Err(ApiError::Unauthorized);
        };

        let result = self.inner.api.toggle_stock_subscription(key).await;
        let succeeded = result.is_ok();
        let now = self
            .inner
            .store
            .update(|s| {
                let subscriptions = s.session.subscriptions_mut();
                subscriptions.settle(key, succeeded);
                subscriptions.contains(key)
            })
            .await;
        self.persist().await;

        if let Err(e) = result {
            warn!(error = %e, "Stock subscription toggle rejected, rolled back");
            return Err(e);
        }

        if let Some(hub) = &self.inner.hub {
            let product = key.product_id.as_str();
            let outcome = if subscribed {
                hub.subscribe_product_stock(product, &key.color, &key.size)
                    .await
            } else {
                hub.unsubscribe_product_stock(product, &key.color, &key.size)
                    .await
            };
            if let Err(e) = outcome {
                debug!(error = %e, "Hub stock subscription not updated");
            }
        }
        Ok(now)
    }
}
