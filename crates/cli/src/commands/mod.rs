//! Command implementations.

pub mod account;
pub mod catalog;
pub mod watch;

use storefront_sync_client::{ApiError, ClientConfig, ConfigError, HubError, PersistError, Storefront};
use thiserror::Error;

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// API request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Notification hub call failed.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// Persisted state could not be read.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Invalid argument.
    #[error("{0}")]
    InvalidArgument(String),

    /// Waiting for Ctrl+C failed.
    #[error("Signal handler error: {0}")]
    Signal(#[from] std::io::Error),
}

/// Build a persisting facade and restore the previous session.
async fn connect(with_hub: bool) -> Result<Storefront, CliError> {
    let config = ClientConfig::from_env()?;
    let mut builder = Storefront::builder(config).with_persistence();
    if with_hub {
        builder = builder.with_hub();
    }
    let storefront = builder.build()?;
    let restored = storefront.restore_session().await?;
    tracing::debug!(restored, "Session restored");
    Ok(storefront)
}
