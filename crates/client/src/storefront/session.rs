//! Sign-in, sign-out and the post-login bootstrap.
//!
//! Login, email verification and silent refresh all establish a session the
//! same way: the user is signed into the store, guest likes are merged into
//! the user's set exactly once, state is persisted and the cart and order
//! history are fetched in the background.

use storefront_sync_core::{LoginForm, RegisterForm, User};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use super::Storefront;
use crate::error::{ApiError, PersistError};
use crate::store::{AppState, FormDrafts, RegisterDraft};

/// Result of one bootstrap step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Loaded,
    /// Nothing to load (e.g., the user has no cart yet).
    Skipped,
    Failed(String),
}

/// What the post-login bootstrap managed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub cart: StepOutcome,
    pub orders: StepOutcome,
}

impl BootstrapReport {
    const fn skipped() -> Self {
        Self {
            cart: StepOutcome::Skipped,
            orders: StepOutcome::Skipped,
        }
    }
}

/// A freshly established session.
#[derive(Debug)]
pub struct Authenticated {
    pub user: User,
    /// Background cart and order-history fetch.
    pub bootstrap: JoinHandle<BootstrapReport>,
}

impl Storefront {
    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for malformed input, otherwise the API
    /// error. State is untouched on failure.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn login(&self, form: LoginForm) -> Result<Authenticated, ApiError> {
        let email = form.email.trim().to_string();
        self.inner
            .store
            .update(|s| s.drafts.login_email = Some(email))
            .await;

        let user = self.inner.api.login(&form).await?;
        Ok(self.establish(user).await)
    }

    /// Create an account. The entered names and email are kept as a draft
    /// (without passwords) until the email is verified.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for invalid input, otherwise the API
    /// error.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn register(&self, form: RegisterForm) -> Result<(), ApiError> {
        let draft = RegisterDraft::from(&form);
        self.inner
            .store
            .update(|s| s.drafts.register = Some(draft))
            .await;
        self.persist().await;

        self.inner.api.register(&form).await
    }

    /// Confirm the emailed code, signing the user in.
    ///
    /// # Errors
    ///
    /// Returns the API error if the code is rejected.
    #[instrument(skip(self, code))]
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<Authenticated, ApiError> {
        let user = self.inner.api.verify_email(email, code).await?;
        Ok(self.establish(user).await)
    }

    /// Re-establish the session from the refresh cookie.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionExpired` (and clears the session) if the
    /// refresh is rejected.
    #[instrument(skip(self))]
    pub async fn silent_refresh(&self) -> Result<Authenticated, ApiError> {
        match self.inner.api.refresh_session().await {
            Ok(user) => Ok(self.establish(user).await),
            Err(e) => {
                if e.is_auth_failure() {
                    self.inner.store.update(AppState::clear_session).await;
                    self.persist().await;
                }
                Err(e)
            }
        }
    }

    /// Load persisted state into the store. Does not merge guest likes.
    ///
    /// A missing or unreadable file leaves the store empty. Returns whether
    /// a signed-in session was restored.
    ///
    /// # Errors
    ///
    /// Returns `PersistError::Io` if the file exists but cannot be read.
    pub async fn restore_session(&self) -> Result<bool, PersistError> {
        let Some(storage) = &self.inner.storage else {
            return Ok(false);
        };
        let state = match storage.load().await {
            Ok(Some(state)) => state,
            Ok(None) => return Ok(false),
            Err(PersistError::Json(e)) => {
                warn!(error = %e, path = %storage.path().display(), "Ignoring corrupt persisted state");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let token = self.inner.store.update(|s| s.apply_persisted(state)).await;
        let restored = token.is_some();
        if let Some(token) = token {
            self.inner.api.establish_session(token);
        }
        info!(restored, "Persisted state loaded");
        Ok(restored)
    }

    /// Sign out. The server call is best-effort; local session state is
    /// cleared either way. Guest data and drafts are kept.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.inner.api.logout().await;
        self.inner.store.update(AppState::clear_session).await;
        self.persist().await;
    }

    /// Fetch the cart (if the user has one) and the order history
    /// concurrently. Each step fails independently.
    pub async fn bootstrap(&self) -> BootstrapReport {
        let Some(has_cart) = self
            .inner
            .store
            .read(|s| s.session.user().map(|u| u.cart_id.is_some()))
            .await
        else {
            return BootstrapReport::skipped();
        };

        let api = &self.inner.api;
        let cart = async {
            if has_cart {
                Some(api.cart().await)
            } else {
                None
            }
        };
        let (cart, orders) = tokio::join!(cart, api.orders());

        let report = self
            .inner
            .store
            .update(|s| {
                let cart = match cart {
                    None => StepOutcome::Skipped,
                    Some(Ok(cart)) => {
                        s.cart = Some(cart);
                        StepOutcome::Loaded
                    }
                    Some(Err(e)) => StepOutcome::Failed(e.to_string()),
                };
                let orders = match orders {
                    Ok(orders) => {
                        s.orders = orders;
                        StepOutcome::Loaded
                    }
                    Err(e) => StepOutcome::Failed(e.to_string()),
                };
                BootstrapReport { cart, orders }
            })
            .await;

        if let StepOutcome::Failed(e) = &report.cart {
            warn!(error = %e, "Bootstrap cart fetch failed");
        }
        if let StepOutcome::Failed(e) = &report.orders {
            warn!(error = %e, "Bootstrap order history fetch failed");
        }
        self.persist().await;
        report
    }

    /// Sign the user into the store, merge guest likes, persist and spawn
    /// the bootstrap.
    async fn establish(&self, user: User) -> Authenticated {
        let signed_in = user.clone();
        self.inner
            .store
            .update(|s| {
                s.session.sign_in(signed_in);
                s.drafts = FormDrafts::default();
            })
            .await;
        self.merge_guest_likes().await;
        self.persist().await;
        info!(user_id = %user.id, "Signed in");

        let this = self.clone();
        let bootstrap = tokio::spawn(async move { this.bootstrap().await });
        Authenticated { user, bootstrap }
    }

    /// Move guest likes into the user's set and push the merged set to the
    /// server. The push is best-effort.
    pub(crate) async fn merge_guest_likes(&self) {
        let Some(merged) = self.inner.store.update(AppState::merge_guest_likes).await else {
            return;
        };
        info!(count = merged.len(), "Merged guest likes into account");
        if let Err(e) = self.inner.api.replace_liked_products(&merged).await {
            warn!(error = %e, "Failed to push merged liked products");
        }
    }
}
