//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_API_URL` - Base URL of the storefront HTTP API
//!
//! ## Optional
//! - `STOREFRONT_HUB_URL` - Real-time hub endpoint (default: `/hubs/notifications`
//!   on the API host, with a `ws`/`wss` scheme)
//! - `STOREFRONT_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `STOREFRONT_CACHE_TTL_SECS` - Query cache time-to-live (default: 300)
//! - `STOREFRONT_CACHE_CAPACITY` - Query cache max entries (default: 1000)
//! - `STOREFRONT_NOTIFICATION_LIMIT` - Max retained notifications, at least 1 (default: 50)
//! - `STOREFRONT_HUB_INVOKE_TIMEOUT_SECS` - Wait for a pending hub connection (default: 5)
//! - `STOREFRONT_STATE_PATH` - Persisted state file (default: `.storefront/state.json`)

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_CACHE_CAPACITY: u64 = 1000;
const DEFAULT_NOTIFICATION_LIMIT: usize = 50;
const DEFAULT_HUB_INVOKE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_STATE_PATH: &str = ".storefront/state.json";
const HUB_PATH: &str = "/hubs/notifications";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the HTTP API (always ends with `/`)
    pub api_url: Url,
    /// WebSocket URL of the notification hub
    pub hub_url: Url,
    /// Fixed timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// Query cache time-to-live
    pub cache_ttl: Duration,
    /// Query cache max entries
    pub cache_capacity: u64,
    /// Max notifications kept in the feed
    pub notification_limit: usize,
    /// How long a hub call waits for a pending connection
    pub hub_invoke_timeout: Duration,
    /// Where persisted state is written
    pub state_path: PathBuf,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the API URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if no hub URL can be derived
    /// from `api_url` (e.g., a non-HTTP scheme).
    pub fn new(api_url: Url) -> Result<Self, ConfigError> {
        let api_url = with_trailing_slash(api_url);
        let hub_url = derive_hub_url(&api_url)?;
        Ok(Self {
            api_url,
            hub_url,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            notification_limit: DEFAULT_NOTIFICATION_LIMIT,
            hub_invoke_timeout: Duration::from_secs(DEFAULT_HUB_INVOKE_TIMEOUT_SECS),
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("STOREFRONT_API_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("STOREFRONT_API_URL".to_string()))?;
        let api_url = parse_url("STOREFRONT_API_URL", &api_url)?;
        let mut config = Self::new(api_url)?;

        if let Some(hub) = lookup("STOREFRONT_HUB_URL").filter(|v| !v.trim().is_empty()) {
            config.hub_url = parse_url("STOREFRONT_HUB_URL", &hub)?;
        }
        if let Some(secs) = parse_optional::<u64>(&lookup, "STOREFRONT_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_optional::<u64>(&lookup, "STOREFRONT_CACHE_TTL_SECS")? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(capacity) = parse_optional(&lookup, "STOREFRONT_CACHE_CAPACITY")? {
            config.cache_capacity = capacity;
        }
        if let Some(limit) =
            parse_optional::<NonZeroUsize>(&lookup, "STOREFRONT_NOTIFICATION_LIMIT")?
        {
            config.notification_limit = limit.get();
        }
        if let Some(secs) = parse_optional::<u64>(&lookup, "STOREFRONT_HUB_INVOKE_TIMEOUT_SECS")? {
            config.hub_invoke_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup("STOREFRONT_STATE_PATH").filter(|v| !v.trim().is_empty()) {
            config.state_path = PathBuf::from(path);
        }

        Ok(config)
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_optional<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .transpose()
}

/// Relative request paths resolve under the API prefix only if the base
/// URL's path ends with `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn derive_hub_url(api_url: &Url) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| {
        ConfigError::InvalidEnvVar("STOREFRONT_API_URL".to_string(), reason.to_string())
    };
    let scheme = match api_url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Err(invalid("scheme must be http or https")),
    };
    let mut hub = api_url
        .join(HUB_PATH)
        .map_err(|e| invalid(&e.to_string()))?;
    hub.set_scheme(scheme)
        .map_err(|()| invalid("cannot derive hub URL"))?;
    Ok(hub)
}
