//! Signed-in user with optimistic liked-product and stock-subscription sets.

use storefront_sync_core::{ProductId, StockSubscriptionKey, User};

use crate::optimistic::OptimisticSet;

/// The authenticated user's slice of state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    user: Option<User>,
    liked: OptimisticSet<ProductId>,
    subscriptions: OptimisticSet<StockSubscriptionKey>,
}

impl SessionState {
    /// Sign a user in, taking liked products and stock subscriptions from
    /// the profile.
    pub fn sign_in(&mut self, user: User) {
        self.liked.replace(user.liked_product_ids.iter().cloned());
        self.subscriptions
            .replace(user.stock_subscriptions.iter().cloned());
        self.user = Some(user);
    }

    /// Replace the stored profile after an edit. Liked products and stock
    /// subscriptions keep their local state. Ignored when signed out.
    pub fn refresh_profile(&mut self, user: User) {
        if self.user.is_some() {
            self.user = Some(user);
        }
    }

    /// Forget the user and both sets.
    pub fn sign_out(&mut self) {
        self.user = None;
        self.liked.clear();
        self.subscriptions.clear();
    }

    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// The signed-in user.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Liked products.
    #[must_use]
    pub const fn liked(&self) -> &OptimisticSet<ProductId> {
        &self.liked
    }

    /// Liked products, mutable.
    pub fn liked_mut(&mut self) -> &mut OptimisticSet<ProductId> {
        &mut self.liked
    }

    /// Stock subscriptions.
    #[must_use]
    pub const fn subscriptions(&self) -> &OptimisticSet<StockSubscriptionKey> {
        &self.subscriptions
    }

    /// Stock subscriptions, mutable.
    pub fn subscriptions_mut(&mut self) -> &mut OptimisticSet<StockSubscriptionKey> {
        &mut self.subscriptions
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn user(liked: &[&str]) -> User {
        serde_json::from_value(serde_json::json!({
            "id": "u1",
            "email": "ada@example.com",
            "likedProductIds": liked,
            "stockSubscriptions": ["p1_red_M"],
        }))
        .unwrap()
    }

    #[test]
    fn test_sign_in_loads_sets() {
        let mut session = SessionState::default();
        session.sign_in(user(&["p1", "p2"]));
        assert!(session.is_authenticated());
        assert_eq!(session.liked().len(), 2);
        assert!(
            session
                .subscriptions()
                .contains(&"p1_red_M".parse().unwrap())
        );
    }

    #[test]
    fn test_refresh_profile_keeps_pending_likes() {
        let mut session = SessionState::default();
        session.sign_in(user(&["p1"]));
        session.liked_mut().toggle(ProductId::from("p2"));

        let mut edited = user(&["p1"]);
        edited.first_name = "Ada".to_string();
        session.refresh_profile(edited);

        assert_eq!(session.user().unwrap().first_name, "Ada");
        assert!(session.liked().contains(&ProductId::from("p2")));
        assert!(session.liked().is_pending(&ProductId::from("p2")));
    }

    #[test]
    fn test_refresh_profile_ignored_when_signed_out() {
        let mut session = SessionState::default();
        session.refresh_profile(user(&[]));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_sign_out_clears() {
        let mut session = SessionState::default();
        session.sign_in(user(&["p1"]));
        session.liked_mut().toggle(ProductId::from("p9"));
        session.sign_out();
        assert!(!session.is_authenticated());
        assert!(session.liked().is_empty());
        assert!(!session.liked().is_pending(&ProductId::from("p9")));
    }
}
