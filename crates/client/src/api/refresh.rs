//! Single-flight token refresh.
//!
//! Requests that fail with `401` all funnel into [`RefreshCoordinator::refresh_after`].
//! The first caller for a given token generation performs the refresh while
//! holding the lock; everyone queued behind it reuses the recorded outcome.

use std::future::Future;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::tokens::{AuthSession, TokenStore};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Refreshed,
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct Record {
    /// Generation whose token was rejected.
    generation: u64,
    outcome: Outcome,
}

/// Result of asking the coordinator for a fresh token.
#[derive(Debug)]
pub enum Refresh {
    /// This caller performed the refresh and a new token is stored.
    Performed(AuthSession),
    /// A newer token is already in place; retry with it.
    AlreadyCurrent,
    /// The refresh failed and the token was cleared. `performed` is true
    /// only for the caller that ran it.
    Failed {
        /// Whether this caller ran the failed refresh.
        performed: bool,
    },
}

/// Ensures at most one refresh is outstanding per API client.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    last: Mutex<Option<Record>>,
}

impl RefreshCoordinator {
    /// Create a coordinator with no recorded refresh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtain a token newer than `observed`, refreshing at most once.
    ///
    /// `observed` is the token generation the rejected request was sent
    /// with. `refresh` runs only if no other caller has already refreshed
    /// past that generation.
    pub async fn refresh_after<F, Fut>(
        &self,
        tokens: &TokenStore,
        observed: u64,
        refresh: F,
    ) -> Refresh
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AuthSession, ApiError>>,
    {
        let mut last = self.last.lock().await;

        if let Some(record) = *last
            && record.generation == observed
        {
            debug!(generation = observed, outcome = ?record.outcome, "Reusing refresh outcome");
            return match record.outcome {
                Outcome::Refreshed => Refresh::AlreadyCurrent,
                Outcome::Failed => Refresh::Failed { performed: false },
            };
        }

        if tokens.generation() != observed {
            debug!(
                observed,
                current = tokens.generation(),
                "Token changed since request, skipping refresh"
            );
            return Refresh::AlreadyCurrent;
        }

        match refresh().await {
            Ok(session) => {
                tokens.set(session.access_token.clone());
                *last = Some(Record {
                    generation: observed,
                    outcome: Outcome::Refreshed,
                });
                debug!(generation = observed, "Access token refreshed");
                Refresh::Performed(session)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                tokens.clear();
                *last = Some(Record {
                    generation: observed,
                    outcome: Outcome::Failed,
                });
                Refresh::Failed { performed: true }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use secrecy::{ExposeSecret, SecretString};

    use super::*;

    fn session(token: &str) -> AuthSession {
        AuthSession {
            access_token: SecretString::from(token.to_string()),
            user: None,
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_refresh_once() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let tokens = TokenStore::new();
        tokens.set(SecretString::from("stale"));
        let observed = tokens.generation();
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let tokens = tokens.clone();
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    coordinator
                        .refresh_after(&tokens, observed, || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(session("fresh"))
                        })
                        .await
                })
            })
            .collect();

        let mut performed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Refresh::Performed(_) => performed += 1,
                Refresh::AlreadyCurrent => {}
                Refresh::Failed { .. } => panic!("refresh should succeed"),
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(performed, 1);
        assert_eq!(tokens.token().unwrap().expose_secret(), "fresh");
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_clears_token() {
        let coordinator = RefreshCoordinator::new();
        let tokens = TokenStore::new();
        tokens.set(SecretString::from("stale"));
        let observed = tokens.generation();

        let first = coordinator
            .refresh_after(&tokens, observed, || async { Err(ApiError::Unauthorized) })
            .await;
        assert!(matches!(first, Refresh::Failed { performed: true }));
        assert!(tokens.token().is_none());

        let second = coordinator
            .refresh_after(&tokens, observed, || async { Ok(session("unexpected")) })
            .await;
        assert!(matches!(second, Refresh::Failed { performed: false }));
    }

    #[tokio::test]
    async fn test_newer_token_skips_refresh() {
        let coordinator = RefreshCoordinator::new();
        let tokens = TokenStore::new();
        let observed = tokens.set(SecretString::from("old"));
        tokens.set(SecretString::from("from-login"));

        let outcome = coordinator
            .refresh_after(&tokens, observed, || async {
                Err(ApiError::NotFound("refresh endpoint".to_string()))
            })
            .await;
        assert!(matches!(outcome, Refresh::AlreadyCurrent));
    }
}
