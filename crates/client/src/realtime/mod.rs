//! Real-time notification hub.
//!
//! The hub is optional: when it cannot be reached the client keeps working
//! without push updates.

pub mod client;
pub mod events;
pub mod protocol;
pub mod retry;

pub use client::{ConnectionState, HubClient, HubGuard, TokenFactory};
pub use events::PushEvent;
pub use retry::ReconnectPolicy;
