//! Storefront REST API.
//!
//! # Architecture
//!
//! - [`ShopApi`] is the seam the stores depend on; [`ApiClient`] is the
//!   `reqwest` implementation used in production
//! - Wire payloads are decoded into private `wire` types and normalized by
//!   `conversions` (one identifier field, quantities ≥ 1) before any store
//!   sees them
//! - The bearer token is read from the [`CredentialStore`](crate::credentials::CredentialStore)
//!   on every request, so a logout takes effect immediately
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |---|---|
//! | Validate session | `GET auth/me` |
//! | Register | `POST auth/register` |
//! | Login | `POST auth/login` |
//! | Fetch cart | `GET cart` |
//! | Add to cart | `POST cart` |
//! | Update cart line | `PUT cart/:productId` |
//! | Remove cart line | `DELETE cart/:productId` |
//! | Clear cart | `DELETE cart` |
//! | Fetch wishlist | `GET wishlist` |
//! | Add to wishlist | `POST wishlist` |
//! | Remove from wishlist | `DELETE wishlist/:productId` |

mod client;
mod conversions;
mod wire;

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use cartwheel_core::{CartLine, Product, ProductId, User};

use crate::credentials::{AuthToken, CredentialError};

pub use client::ApiClient;

/// Errors that can occur when talking to the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, timeout, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("API error: {status} - {}", message.as_deref().unwrap_or("(no message)"))]
    Status {
        status: u16,
        /// `message` (or `error`) field of the JSON error body, if any.
        message: Option<String>,
    },

    /// Response body was not the expected JSON.
    #[error("Parse error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A record arrived without `id` or `_id`.
    #[error("{0} record has no identifier")]
    MissingId(&'static str),

    /// Login/register succeeded but carried no usable token.
    #[error("auth response carried an empty token")]
    EmptyToken,

    /// The configured base URL cannot take path segments.
    #[error("API base URL cannot be extended with a path")]
    InvalidBaseUrl,

    /// The persisted credential could not be read.
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),
}

impl ApiError {
    /// Message the server attached to a rejection, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Whether the server rejected the request as unauthenticated.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

/// Fields submitted when creating an account.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Body of `POST auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A freshly issued session: token plus the identity it belongs to.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub token: AuthToken,
    pub user: User,
}

/// Operations the stores need from the backend.
///
/// Implementations attach the persisted credential themselves; callers
/// never pass tokens around.
pub trait ShopApi: Send + Sync + 'static {
    /// `GET auth/me`: the user the persisted token belongs to.
    fn current_user(&self) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// `POST auth/register`.
    fn register(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<AuthGrant, ApiError>> + Send;

    /// `POST auth/login`.
    fn login(
        &self,
        request: &LoginRequest,
    ) -> impl Future<Output = Result<AuthGrant, ApiError>> + Send;

    /// `GET cart`, projected into cart lines.
    fn fetch_cart(&self) -> impl Future<Output = Result<Vec<CartLine>, ApiError>> + Send;

    /// `POST cart` with a quantity delta.
    fn add_to_cart(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `PUT cart/:productId` with an absolute quantity.
    fn update_cart_line(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `DELETE cart/:productId`.
    fn remove_cart_line(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `DELETE cart`.
    fn clear_cart(&self) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `GET wishlist`.
    fn fetch_wishlist(&self) -> impl Future<Output = Result<Vec<Product>, ApiError>> + Send;

    /// `POST wishlist`.
    fn add_to_wishlist(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `DELETE wishlist/:productId`.
    fn remove_from_wishlist(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
