//! Storefront Sync Core - Shared domain types.
//!
//! This crate provides the types used by the rest of the workspace:
//! - `storefront-sync-client` - API client, caches, real-time hub and state store
//! - `sfs` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients, no async runtime. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - IDs, products, filters, carts, orders, users, notifications and forms

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
