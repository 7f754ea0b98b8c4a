//! Access token storage.
//!
//! The token lives in a `watch` cell tagged with a generation counter. Every
//! write bumps the generation, which lets the refresh coordinator tell
//! whether a `401` was answered with the token that is current now.

use std::sync::Arc;

use secrecy::SecretString;
use storefront_sync_core::User;
use tokio::sync::watch;

/// An access token plus the user it was issued for, when the server sent one.
#[derive(Clone)]
pub struct AuthSession {
    /// Bearer token for API requests.
    pub access_token: SecretString,
    /// The authenticated user.
    pub user: Option<User>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("user", &self.user.as_ref().map(|u| u.id.as_str()))
            .finish()
    }
}

/// Current token and its generation.
#[derive(Clone, Default)]
pub struct TokenState {
    token: Option<SecretString>,
    generation: u64,
}

impl TokenState {
    /// The bearer token, if signed in.
    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// Number of writes so far.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Shared, observable access token holder.
#[derive(Clone)]
pub struct TokenStore {
    cell: Arc<watch::Sender<TokenState>>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.cell.borrow();
        f.debug_struct("TokenStore")
            .field("token", &state.token.as_ref().map(|_| "[REDACTED]"))
            .field("generation", &state.generation)
            .finish()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (cell, _) = watch::channel(TokenState::default());
        Self {
            cell: Arc::new(cell),
        }
    }

    /// Current token and generation, read together.
    #[must_use]
    pub fn snapshot(&self) -> TokenState {
        self.cell.borrow().clone()
    }

    /// The current bearer token.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.cell.borrow().token.clone()
    }

    /// The current generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.cell.borrow().generation
    }

    /// Whether a token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.cell.borrow().token.is_some()
    }

    /// Store a new token. Returns the new generation.
    pub fn set(&self, token: SecretString) -> u64 {
        self.replace(Some(token))
    }

    /// Drop the token. Returns the new generation.
    pub fn clear(&self) -> u64 {
        self.replace(None)
    }

    fn replace(&self, token: Option<SecretString>) -> u64 {
        let mut generation = 0;
        self.cell.send_modify(|state| {
            state.token = token;
            state.generation += 1;
            generation = state.generation;
        });
        generation
    }

    /// Observe token changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TokenState> {
        self.cell.subscribe()
    }

    /// A callback returning the current token, for transports that read it
    /// on every connection attempt.
    #[must_use]
    pub fn factory(&self) -> impl Fn() -> Option<SecretString> + Send + Sync + 'static {
        let cell = Arc::clone(&self.cell);
        move || cell.borrow().token.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_generation_bumps_on_every_write() {
        let store = TokenStore::new();
        assert_eq!(store.generation(), 0);
        assert!(!store.is_authenticated());

        assert_eq!(store.set(SecretString::from("a")), 1);
        assert!(store.is_authenticated());
        assert_eq!(store.clear(), 2);
        assert!(store.token().is_none());
    }

    #[test]
    fn test_factory_reads_latest_token() {
        let store = TokenStore::new();
        let factory = store.factory();
        assert!(factory().is_none());
        store.set(SecretString::from("fresh"));
        assert_eq!(factory().unwrap().expose_secret(), "fresh");
    }

    #[test]
    fn test_debug_redacts_token() {
        let store = TokenStore::new();
        store.set(SecretString::from("super_secret_token"));
        let output = format!("{store:?}");
        assert!(!output.contains("super_secret_token"));
        assert!(output.contains("[REDACTED]"));
    }
}
