//! Storefront Sync client library.
//!
//! Keeps a local copy of catalog, cart, order, session and notification
//! state in sync with the storefront HTTP API and its real-time hub.
//!
//! # Modules
//!
//! - [`api`] - HTTP client with bearer auth, single-flight token refresh and a tagged query cache
//! - [`realtime`] - Notification hub client (`SignalR` JSON protocol over WebSocket)
//! - [`store`] - In-memory application state
//! - [`optimistic`] - Optimistic set membership with rollback
//! - [`persist`] - Persisted state file
//! - [`storefront`] - Facade tying the pieces together

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod optimistic;
pub mod persist;
pub mod realtime;
pub mod store;
pub mod storefront;

pub use api::{ApiClient, SessionEvent};
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, HubError, PersistError};
pub use realtime::{ConnectionState, HubClient, PushEvent};
pub use store::{AppState, Store};
pub use storefront::{Storefront, StorefrontBuilder};
