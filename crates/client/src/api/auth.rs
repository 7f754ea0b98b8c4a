//! Authentication endpoints.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use storefront_sync_core::{LoginForm, RegisterForm, User};
use tracing::{debug, instrument, warn};

use super::tokens::AuthSession;
use super::{ApiClient, Refresh, RequestSpec};
use crate::error::ApiError;

/// Token payload returned by login, verification and refresh.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    user: Option<User>,
}

impl TokenResponse {
    pub(crate) fn into_session(self) -> AuthSession {
        AuthSession {
            access_token: SecretString::from(self.access_token),
            user: self.user,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyEmailRequest<'a> {
    email: &'a str,
    code: &'a str,
}

impl ApiClient {
    /// Sign in with email and password.
    ///
    /// Stores the issued token and returns the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for malformed input and
    /// `ApiError::Unauthorized` for rejected credentials.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn login(&self, form: &LoginForm) -> Result<User, ApiError> {
        form.validate()?;
        let spec = RequestSpec::post("auth/login")
            .json(form)?
            .without_auth_retry();
        let response: TokenResponse = self.request(&spec).await?;
        self.sign_in(response.into_session()).await
    }

    /// Create an account. The server emails a verification code.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for invalid input or the API error.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn register(&self, form: &RegisterForm) -> Result<(), ApiError> {
        form.validate()?;
        let spec = RequestSpec::post("auth/register")
            .json(form)?
            .without_auth_retry();
        self.execute(&spec).await
    }

    /// Confirm an email address with the emailed code, signing the user in.
    ///
    /// # Errors
    ///
    /// Returns the API error if the code is rejected.
    #[instrument(skip(self, code))]
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<User, ApiError> {
        let spec = RequestSpec::post("auth/verify-email")
            .json(&VerifyEmailRequest { email, code })?
            .without_auth_retry();
        let response: TokenResponse = self.request(&spec).await?;
        self.sign_in(response.into_session()).await
    }

    /// Refresh the session from the refresh cookie (e.g., at startup).
    ///
    /// Goes through the same single-flight coordinator as the `401` path.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionExpired` if the refresh is rejected.
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> Result<User, ApiError> {
        let observed = self.tokens().generation();
        let outcome = self
            .inner
            .refresh
            .refresh_after(&self.inner.tokens, observed, || self.refresh_token())
            .await;

        match outcome {
            Refresh::Performed(AuthSession {
                user: Some(user), ..
            }) => Ok(user),
            Refresh::Performed(_) | Refresh::AlreadyCurrent => {
                self.cache().invalidate(super::Tag::User);
                self.current_user().await
            }
            Refresh::Failed { .. } => {
                self.cache().invalidate_all();
                Err(ApiError::SessionExpired)
            }
        }
    }

    /// Sign out on the server and forget the local token.
    ///
    /// The server call is best-effort; the local session is cleared either way.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let spec = RequestSpec::post("auth/logout").without_auth_retry();
        if let Err(e) = self.execute(&spec).await {
            warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
        self.clear_session();
    }

    async fn sign_in(&self, session: AuthSession) -> Result<User, ApiError> {
        self.establish_session(session.access_token);
        match session.user {
            Some(user) => Ok(user),
            None => {
                debug!("Token response had no user, fetching profile");
                self.current_user().await
            }
        }
    }
}
