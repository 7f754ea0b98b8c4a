//! Storefront HTTP API client.
//!
//! Every request goes through one wrapper that attaches the bearer token,
//! and on `401` waits for a single shared token refresh before replaying
//! the request once. Read queries are cached by [`QueryCache`] and mutations
//! invalidate the affected resource tags.
//!
//! Resource methods are split by area: [`auth`], [`products`], [`cart`],
//! [`orders`] and [`users`].

pub mod auth;
pub mod cache;
pub mod cart;
pub mod orders;
pub mod products;
pub mod refresh;
pub mod tokens;
pub mod users;

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ApiError, ProblemDetails};

pub use cache::{QueryCache, QueryKey, Tag};
pub use refresh::{Refresh, RefreshCoordinator};
pub use tokens::{AuthSession, TokenState, TokenStore};

/// Capacity of the session event channel.
const SESSION_EVENT_CAPACITY: usize = 16;

/// How much of an unexpected response body is logged.
const LOGGED_BODY_CHARS: usize = 500;

// =============================================================================
// Session Events
// =============================================================================

/// Session changes made by the request pipeline itself.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A `401` triggered a successful refresh.
    Refreshed(AuthSession),
    /// A refresh failed; the token was cleared.
    Expired,
}

// =============================================================================
// Request Description
// =============================================================================

/// One field of a multipart form.
#[derive(Clone)]
pub enum FormPart {
    /// Plain text field.
    Text {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
    },
    /// File upload.
    File {
        /// Field name.
        name: String,
        /// Original file name.
        file_name: String,
        /// MIME type.
        content_type: String,
        /// File contents.
        bytes: Vec<u8>,
    },
}

impl std::fmt::Debug for FormPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text { name, value } => f
                .debug_struct("Text")
                .field("name", name)
                .field("value", value)
                .finish(),
            Self::File {
                name,
                file_name,
                bytes,
                ..
            } => f
                .debug_struct("File")
                .field("name", name)
                .field("file_name", file_name)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

impl FormPart {
    /// A text field.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Request body.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<FormPart>),
}

/// A request that can be rebuilt and sent again after a token refresh.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    path: String,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    body: RequestBody,
    retry_on_unauthorized: bool,
}

impl RequestSpec {
    /// A request with the given method and API-relative path.
    ///
    /// `path` is split on `/`; use [`segment`](Self::segment) for values
    /// that need escaping.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            method,
            path,
            segments,
            query: Vec::new(),
            body: RequestBody::Empty,
            retry_on_unauthorized: true,
        }
    }

    /// `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST` request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT` request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `DELETE` request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append one path segment. Reserved characters are percent-encoded.
    #[must_use]
    pub fn segment(mut self, value: impl AsRef<str>) -> Self {
        let value = value.as_ref();
        self.path = format!("{}/{value}", self.path.trim_end_matches('/'));
        self.segments.push(value.to_string());
        self
    }

    /// Append query parameters.
    #[must_use]
    pub fn query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Send a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Parse` if `body` cannot be serialized.
    pub fn json(mut self, body: &impl Serialize) -> Result<Self, ApiError> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Send a multipart form.
    #[must_use]
    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    /// Do not attempt a token refresh on `401` (used by the auth endpoints).
    #[must_use]
    pub const fn without_auth_retry(mut self) -> Self {
        self.retry_on_unauthorized = false;
        self
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// API-relative path, unescaped.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Absolute URL under `base`, which must end with `/`.
    fn url(&self, base: &Url) -> Result<Url, ApiError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(&self.segments);
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront HTTP API.
///
/// Cheap to clone; all clones share the token, refresh lock and cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: Url,
    tokens: TokenStore,
    refresh: RefreshCoordinator,
    cache: QueryCache,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("tokens", &self.inner.tokens)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .cookie_store(true)
            .build()?;
        let cache = QueryCache::new(config.cache_capacity, config.cache_ttl);
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url: config.api_url.clone(),
                tokens: TokenStore::new(),
                refresh: RefreshCoordinator::new(),
                cache,
                events,
            }),
        })
    }

    /// The access token holder.
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// The query cache.
    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    /// Subscribe to refreshes and expiries detected while sending requests.
    #[must_use]
    pub fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Forget the token and every cached query.
    pub fn clear_session(&self) {
        self.inner.tokens.clear();
        self.inner.cache.invalidate_all();
    }

    /// Store a token obtained by signing in.
    pub(crate) fn establish_session(&self, token: SecretString) {
        self.inner.tokens.set(token);
        self.inner.cache.invalidate_many(&[Tag::User, Tag::Cart, Tag::Orders]);
    }

    // =========================================================================
    // Request Pipeline
    // =========================================================================

    /// Send a request and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure, non-success status, failed
    /// refresh (`SessionExpired`) or an undecodable body.
    pub async fn request<T: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<T, ApiError> {
        let response = self.send(spec).await?;
        decode(response).await
    }

    /// Send a request and ignore the response body.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::request`], minus body decoding.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<(), ApiError> {
        self.send(spec).await.map(drop)
    }

    /// Run a read query through the cache.
    ///
    /// Identical `(tag, endpoint, args)` triples share one cache entry and
    /// one in-flight request.
    ///
    /// # Errors
    ///
    /// Returns the (possibly shared) request error.
    pub async fn query<T: DeserializeOwned>(
        &self,
        tag: Tag,
        endpoint: &'static str,
        args: &impl Serialize,
        spec: RequestSpec,
    ) -> Result<T, ApiError> {
        let key = QueryKey::new(tag, endpoint, args)?;
        let this = self.clone();
        self.inner
            .cache
            .get_or_load(key, async move { this.request::<Value>(&spec).await })
            .await
    }

    /// Send with the current token, refreshing and replaying once on `401`.
    #[instrument(skip(self, spec), fields(method = %spec.method, path = %spec.path))]
    async fn send(&self, spec: &RequestSpec) -> Result<Response, ApiError> {
        let observed = self.inner.tokens.snapshot();
        let response = self.dispatch(spec, observed.token()).await?;

        if response.status() != StatusCode::UNAUTHORIZED || !spec.retry_on_unauthorized {
            return check_status(spec, response).await;
        }

        debug!(generation = observed.generation(), "Unauthorized, requesting token refresh");
        let outcome = self
            .inner
            .refresh
            .refresh_after(&self.inner.tokens, observed.generation(), || {
                self.refresh_token()
            })
            .await;

        match outcome {
            Refresh::Performed(session) => {
                let _ = self.inner.events.send(SessionEvent::Refreshed(session));
            }
            Refresh::AlreadyCurrent => {}
            Refresh::Failed { performed } => {
                if performed {
                    self.inner.cache.invalidate_all();
                    let _ = self.inner.events.send(SessionEvent::Expired);
                }
                return Err(ApiError::SessionExpired);
            }
        }

        let token = self.inner.tokens.token();
        let response = self.dispatch(spec, token.as_ref()).await?;
        check_status(spec, response).await
    }

    /// Build and send one HTTP request.
    async fn dispatch(
        &self,
        spec: &RequestSpec,
        token: Option<&SecretString>,
    ) -> Result<Response, ApiError> {
        let url = spec.url(&self.inner.base_url)?;
        let mut request = self.inner.http.request(spec.method.clone(), url);
        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }
        request = match &spec.body {
            RequestBody::Empty => request,
            RequestBody::Json(body) => request.json(body),
            RequestBody::Multipart(parts) => request.multipart(build_form(parts)?),
        };

        Ok(request.send().await?)
    }

    /// `POST /auth/refresh` using the refresh cookie.
    async fn refresh_token(&self) -> Result<AuthSession, ApiError> {
        let spec = RequestSpec::post("auth/refresh").without_auth_retry();
        let response = self.dispatch(&spec, None).await?;
        let response = check_status(&spec, response).await?;
        let body: auth::TokenResponse = decode(response).await?;
        Ok(body.into_session())
    }
}

fn build_form(parts: &[FormPart]) -> Result<reqwest::multipart::Form, ApiError> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                let file = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(content_type)?;
                form.part(name.clone(), file)
            }
        };
    }
    Ok(form)
}

/// Map non-success statuses to errors, decoding problem details if present.
async fn check_status(spec: &RequestSpec, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let problem = serde_json::from_str::<ProblemDetails>(&body).unwrap_or_else(|_| {
        ProblemDetails::from_detail(
            status
                .canonical_reason()
                .map_or_else(|| status.to_string(), str::to_string),
        )
    });

    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        StatusCode::FORBIDDEN => Err(ApiError::Forbidden(problem.message())),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound(spec.path.clone())),
        _ => {
            warn!(
                status = %status,
                path = %spec.path,
                body = %body.chars().take(LOGGED_BODY_CHARS).collect::<String>(),
                "API returned non-success status"
            );
            Err(ApiError::Api { status, problem })
        }
    }
}

/// Decode a JSON body, logging the raw text on failure.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        error!(
            error = %e,
            body = %text.chars().take(LOGGED_BODY_CHARS).collect::<String>(),
            "Failed to parse API response"
        );
        ApiError::Parse(e)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_spec_builder() {
        let spec = RequestSpec::get("products")
            .query([("pageNumber", "2"), ("color", "red")])
            .without_auth_retry();
        assert_eq!(spec.method(), &Method::GET);
        assert_eq!(spec.path(), "products");
        assert_eq!(spec.query.len(), 2);
        assert!(!spec.retry_on_unauthorized);
    }

    #[test]
    fn test_request_spec_is_replayable() {
        let spec = RequestSpec::post("users/me/avatar").multipart(vec![FormPart::File {
            name: "avatar".to_string(),
            file_name: "me.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        }]);
        let replay = spec.clone();
        assert!(build_form(&spec.body_parts()).is_ok());
        assert!(build_form(&replay.body_parts()).is_ok());
    }

    #[test]
    fn test_form_part_debug_hides_bytes() {
        let part = FormPart::File {
            name: "image".to_string(),
            file_name: "a.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![0; 2048],
        };
        assert!(format!("{part:?}").contains("len: 2048"));
    }

    #[tokio::test]
    async fn test_client_joins_paths_under_api_prefix() {
        let config = ClientConfig::new(Url::parse("http://127.0.0.1:9/api").unwrap()).unwrap();
        let client = ApiClient::new(&config).unwrap();
        let url = RequestSpec::get("products/categories")
            .url(&client.inner.base_url)
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9/api/products/categories");
    }

    #[test]
    fn test_segments_are_percent_encoded() {
        let base = Url::parse("http://127.0.0.1:9/api/").unwrap();
        let spec = RequestSpec::post("users/me/liked-products").segment("a b/c?d#e");
        assert_eq!(spec.path(), "users/me/liked-products/a b/c?d#e");
        assert_eq!(
            spec.url(&base).unwrap().as_str(),
            "http://127.0.0.1:9/api/users/me/liked-products/a%20b%2Fc%3Fd%23e"
        );

        let spec = RequestSpec::get("products").query([("brand", "A&B")]);
        assert_eq!(
            spec.url(&base).unwrap().as_str(),
            "http://127.0.0.1:9/api/products?brand=A%26B"
        );
    }

    impl RequestSpec {
        fn body_parts(&self) -> Vec<FormPart> {
            match &self.body {
                RequestBody::Multipart(parts) => parts.clone(),
                _ => Vec::new(),
            }
        }
    }
}
