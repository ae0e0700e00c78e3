//! Cartwheel Core - Shared domain types.
//!
//! This crate provides the types used across all Cartwheel components:
//! - `storefront` - Session, cart, and wishlist stores backed by the REST API
//! - `cli` - Terminal front end driving the stores
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async.
//! Wire formats and identifier normalization live in the storefront crate;
//! everything here is already normalized.
//!
//! # Modules
//!
//! - [`types`] - Identifiers, products, prices, cart lines, users, and emails

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
