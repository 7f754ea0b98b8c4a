//! Central application state.
//!
//! [`AppState`] is split into slices, each owning its own invariants.
//! [`Store`] shares it between the facade, background tasks and the UI
//! layer, and bumps a version counter after every update so observers can
//! re-render.

pub mod filter;
pub mod notifications;
pub mod products;
pub mod session;
pub mod viewed;

use std::collections::BTreeSet;
use std::sync::Arc;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use storefront_sync_core::{Cart, Category, Order, ProductId, RegisterForm, User};
use tokio::sync::{RwLock, watch};

use crate::persist::{PersistedSession, PersistedState};

pub use filter::FilterState;
pub use notifications::{DEFAULT_NOTIFICATION_LIMIT, NotificationFeed};
pub use products::ProductStore;
pub use session::SessionState;
pub use viewed::{RECENTLY_VIEWED_LIMIT, RecentlyViewed};

// =============================================================================
// Form Drafts
// =============================================================================

/// Registration fields kept between visits. Passwords are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDraft {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&RegisterForm> for RegisterDraft {
    fn from(form: &RegisterForm) -> Self {
        Self {
            email: form.email.trim().to_string(),
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
        }
    }
}

/// Partially filled auth forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDrafts {
    #[serde(default)]
    pub login_email: Option<String>,
    #[serde(default)]
    pub register: Option<RegisterDraft>,
}

// =============================================================================
// AppState
// =============================================================================

/// Every slice of client state.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub products: ProductStore,
    pub categories: Vec<Category>,
    pub filter: FilterState,
    pub session: SessionState,
    /// Products liked while signed out.
    pub guest_liked: BTreeSet<ProductId>,
    pub viewed: RecentlyViewed,
    pub notifications: NotificationFeed,
    pub cart: Option<Cart>,
    pub orders: Vec<Order>,
    pub drafts: FormDrafts,
}

impl AppState {
    /// Empty state with a notification limit.
    #[must_use]
    pub fn with_notification_limit(limit: usize) -> Self {
        Self {
            notifications: NotificationFeed::with_limit(limit),
            ..Self::default()
        }
    }

    /// Whether a product is liked in the current scope (user or guest).
    #[must_use]
    pub fn is_liked(&self, id: &ProductId) -> bool {
        if self.session.is_authenticated() {
            self.session.liked().contains(id)
        } else {
            self.guest_liked.contains(id)
        }
    }

    /// Liked products in the current scope.
    #[must_use]
    pub fn liked_products(&self) -> Vec<ProductId> {
        if self.session.is_authenticated() {
            self.session.liked().to_vec()
        } else {
            self.guest_liked.iter().cloned().collect()
        }
    }

    /// Move guest likes into the signed-in user's set.
    ///
    /// Returns the merged user set when there was anything to merge. The
    /// guest set is empty afterwards, so a second call is a no-op.
    pub fn merge_guest_likes(&mut self) -> Option<Vec<ProductId>> {
        if !self.session.is_authenticated() || self.guest_liked.is_empty() {
            return None;
        }
        let guest = std::mem::take(&mut self.guest_liked);
        self.session.liked_mut().union(guest);
        Some(self.session.liked().to_vec())
    }

    /// Drop everything tied to the signed-in user.
    pub fn clear_session(&mut self) {
        self.session.sign_out();
        self.notifications.clear();
        self.cart = None;
        self.orders.clear();
    }

    /// The slices that survive a restart.
    ///
    /// The session is only included when both the user and a token are known.
    /// The stored profile carries the current liked and subscription sets.
    #[must_use]
    pub fn snapshot_persisted(&self, token: Option<SecretString>) -> PersistedState {
        let session = match (self.session.user(), token) {
            (Some(user), Some(access_token)) => Some(PersistedSession {
                user: User {
                    liked_product_ids: self.session.liked().to_vec(),
                    stock_subscriptions: self.session.subscriptions().to_vec(),
                    ..user.clone()
                },
                access_token,
            }),
            _ => None,
        };

        PersistedState {
            guest_liked: self.guest_liked.iter().cloned().collect(),
            cart: self.cart.clone(),
            drafts: self.drafts.clone(),
            session,
            notifications: self.notifications.to_vec(),
            notification_limit: Some(self.notifications.limit()),
        }
    }

    /// Restore persisted slices. Returns the stored access token, if any.
    pub fn apply_persisted(&mut self, state: PersistedState) -> Option<SecretString> {
        let limit = state
            .notification_limit
            .unwrap_or_else(|| self.notifications.limit());

        self.guest_liked = state.guest_liked.into_iter().collect();
        self.cart = state.cart;
        self.drafts = state.drafts;
        self.notifications = NotificationFeed::from_items(state.notifications, limit);

        let session = state.session?;
        self.session.sign_in(session.user);
        Some(session.access_token)
    }
}

// =============================================================================
// Store
// =============================================================================

/// Shared handle to [`AppState`].
///
/// Cheap to clone. Closures passed to [`read`](Self::read) and
/// [`update`](Self::update) must not await.
#[derive(Clone)]
pub struct Store {
    state: Arc<RwLock<AppState>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("version", &*self.version.borrow())
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Wrap an initial state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(state)),
            version: Arc::new(version),
        }
    }

    /// Read the state.
    pub async fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Mutate the state and notify subscribers.
    pub async fn update<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let result = {
            let mut state = self.state.write().await;
            f(&mut state)
        };
        self.version.send_modify(|v| *v = v.wrapping_add(1));
        result
    }

    /// Watch the version counter, bumped after every update.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Clone of the whole state.
    pub async fn snapshot(&self) -> AppState {
        self.read(AppState::clone).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::session::tests::user;
    use super::*;

    #[test]
    fn test_guest_merge_runs_once() {
        let mut state = AppState::default();
        state.guest_liked.insert(ProductId::from("p1"));
        state.guest_liked.insert(ProductId::from("p3"));

        // Signed out: nothing to merge into.
        assert_eq!(state.merge_guest_likes(), None);

        state.session.sign_in(user(&["p2"]));
        let merged = state.merge_guest_likes().unwrap();
        let merged: Vec<&str> = merged.iter().map(ProductId::as_str).collect();
        assert_eq!(merged, vec!["p1", "p2", "p3"]);
        assert!(state.guest_liked.is_empty());
        assert_eq!(state.merge_guest_likes(), None);
    }

    #[test]
    fn test_is_liked_follows_scope() {
        let mut state = AppState::default();
        state.guest_liked.insert(ProductId::from("g"));
        assert!(state.is_liked(&ProductId::from("g")));

        state.session.sign_in(user(&["u"]));
        assert!(!state.is_liked(&ProductId::from("g")));
        assert!(state.is_liked(&ProductId::from("u")));
    }

    #[test]
    fn test_clear_session_keeps_guest_data() {
        let mut state = AppState::default();
        state.session.sign_in(user(&["p1"]));
        state.guest_liked.insert(ProductId::from("g"));
        state.clear_session();
        assert!(!state.session.is_authenticated());
        assert!(state.cart.is_none());
        assert_eq!(state.guest_liked.len(), 1);
    }

    #[test]
    fn test_persisted_snapshot_roundtrip() {
        let mut state = AppState::default();
        state.session.sign_in(user(&["p1"]));
        state.guest_liked.insert(ProductId::from("g"));
        state.drafts.login_email = Some("ada@example.com".to_string());
        state.viewed.record(ProductId::from("p1"));

        let persisted = state.snapshot_persisted(Some(SecretString::from("tok")));

        let mut restored = AppState::default();
        let token = restored.apply_persisted(persisted).unwrap();
        assert_eq!(token.expose_secret(), "tok");
        assert!(restored.session.is_authenticated());
        assert!(restored.session.liked().contains(&ProductId::from("p1")));
        assert_eq!(restored.drafts.login_email.as_deref(), Some("ada@example.com"));
        // Recently viewed is not persisted.
        assert!(restored.viewed.is_empty());
    }

    #[test]
    fn test_snapshot_stores_merged_likes_on_profile() {
        let mut state = AppState::default();
        state.session.sign_in(user(&["p1"]));
        state.guest_liked.insert(ProductId::from("g"));
        state.merge_guest_likes();

        let persisted = state.snapshot_persisted(Some(SecretString::from("tok")));
        let session = persisted.session.unwrap();
        assert_eq!(
            session.user.liked_product_ids,
            vec![ProductId::from("g"), ProductId::from("p1")]
        );
    }

    #[test]
    fn test_snapshot_without_token_omits_session() {
        let mut state = AppState::default();
        state.session.sign_in(user(&[]));
        assert!(state.snapshot_persisted(None).session.is_none());
    }

    #[tokio::test]
    async fn test_update_bumps_version() {
        let store = Store::default();
        let mut rx = store.subscribe();
        store
            .update(|s| s.guest_liked.insert(ProductId::from("p1")))
            .await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
        assert!(store.read(|s| s.is_liked(&ProductId::from("p1"))).await);
    }
}
