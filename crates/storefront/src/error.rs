//! Errors raised while assembling a [`Storefront`](crate::state::Storefront).
//!
//! Store operations never fail with these: auth errors come back as
//! [`AuthError`](crate::session::AuthError) and cart/wishlist failures are
//! absorbed into notifications plus reconciliation.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Environment configuration was missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("API client error: {0}")]
    Api(#[from] ApiError),
}
