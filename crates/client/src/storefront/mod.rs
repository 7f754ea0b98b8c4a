//! High-level storefront facade.
//!
//! [`Storefront`] ties the API client, the state store, optional persistence
//! and the optional notification hub together. Every operation here is a
//! network round-trip whose result lands in the [`Store`]; reads go through
//! [`Storefront::store`].
//!
//! Operations are grouped by area: [`session`], [`catalog`], [`likes`],
//! [`profile`], [`cart`], [`admin`] and [`notifications`].

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod likes;
pub mod notifications;
pub mod profile;
pub mod session;

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::api::{ApiClient, SessionEvent};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::persist::FileStorage;
use crate::realtime::HubClient;
use crate::store::{AppState, Store};

pub use notifications::LiveUpdates;
pub use session::{Authenticated, BootstrapReport, StepOutcome};

/// Storefront client facade. Cheap to clone.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    api: ApiClient,
    store: Store,
    storage: Option<FileStorage>,
    hub: Option<HubClient>,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api", &self.inner.api)
            .field("storage", &self.inner.storage)
            .field("hub", &self.inner.hub)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Storefront`].
#[derive(Debug, Clone)]
pub struct StorefrontBuilder {
    config: ClientConfig,
    state_path: Option<PathBuf>,
    hub: bool,
}

impl StorefrontBuilder {
    /// Persist state to the configured `state_path`.
    #[must_use]
    pub fn with_persistence(mut self) -> Self {
        self.state_path = Some(self.config.state_path.clone());
        self
    }

    /// Persist state to a specific file.
    #[must_use]
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    /// Enable the real-time notification hub.
    #[must_use]
    pub const fn with_hub(mut self) -> Self {
        self.hub = true;
        self
    }

    /// Build the facade.
    ///
    /// When called inside a Tokio runtime this also starts the task that
    /// reacts to token refreshes and expiries detected by the API client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn build(self) -> Result<Storefront, ApiError> {
        let api = ApiClient::new(&self.config)?;
        let store = Store::new(AppState::with_notification_limit(
            self.config.notification_limit,
        ));
        let storage = self.state_path.map(FileStorage::new);
        let hub = self.hub.then(|| {
            HubClient::new(
                self.config.hub_url.clone(),
                Arc::new(api.tokens().factory()),
                self.config.hub_invoke_timeout,
            )
        });

        let inner = Arc::new(StorefrontInner {
            api,
            store,
            storage,
            hub,
        });
        if tokio::runtime::Handle::try_current().is_ok() {
            spawn_session_listener(&inner);
        } else {
            debug!("No runtime, session events will not be observed");
        }
        Ok(Storefront { inner })
    }
}

impl Storefront {
    /// Start building a facade.
    #[must_use]
    pub const fn builder(config: ClientConfig) -> StorefrontBuilder {
        StorefrontBuilder {
            config,
            state_path: None,
            hub: false,
        }
    }

    /// The API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// The state store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// The notification hub, if enabled.
    #[must_use]
    pub fn hub(&self) -> Option<&HubClient> {
        self.inner.hub.as_ref()
    }

    /// Write the persisted slices. Failures are logged.
    pub async fn persist(&self) {
        let Some(storage) = &self.inner.storage else {
            return;
        };
        let inner = &self.inner;
        let saved = storage
            .save_with(|| async move {
                let token = inner.api.tokens().token();
                inner.store.read(|s| s.snapshot_persisted(token)).await
            })
            .await;
        if let Err(e) = saved {
            warn!(error = %e, path = %storage.path().display(), "Failed to persist state");
        }
    }

    async fn handle_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Refreshed(session) => {
                debug!("Token refreshed while sending a request");
                if let Some(user) = session.user {
                    self.inner
                        .store
                        .update(|s| s.session.sign_in(user))
                        .await;
                }
                self.merge_guest_likes().await;
            }
            SessionEvent::Expired => {
                warn!("Session expired, signing out");
                self.inner.store.update(AppState::clear_session).await;
            }
        }
        self.persist().await;
    }
}

fn spawn_session_listener(inner: &Arc<StorefrontInner>) {
    let mut events = inner.api.subscribe_session();
    let weak: Weak<StorefrontInner> = Arc::downgrade(inner);

    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session listener lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let Some(inner) = weak.upgrade() else {
                break;
            };
            Storefront { inner }.handle_session_event(event).await;
        }
        debug!("Session listener stopped");
    });
}
