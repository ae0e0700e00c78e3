//! Cartwheel storefront client library.
//!
//! Client-side state for an e-commerce storefront: who is signed in, what
//! is in the cart, and what is on the wishlist, each kept in sync with the
//! Cartwheel REST API.
//!
//! # Architecture
//!
//! - [`session::SessionStore`] owns the user and the persisted token
//! - [`cart::CartStore`] and [`wishlist::WishlistStore`] apply every change
//!   locally first, confirm it with the server in the background, and
//!   re-fetch the server's view when a confirmation fails
//! - [`state::Storefront`] builds all of them once around one
//!   [`api::ShopApi`] implementation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod credentials;
pub mod error;
pub mod notify;
pub mod session;
pub mod state;
pub mod wishlist;

mod sync;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, ApiError, Registration, ShopApi};
pub use cart::CartStore;
pub use checkout::{Checkout, CheckoutError, CheckoutSummary};
pub use config::{ClientConfig, ConfigError};
pub use credentials::{
    AuthToken, CredentialError, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
pub use error::StorefrontError;
pub use notify::{ChannelNotifier, Notification, NotificationKind, Notifier, TracingNotifier};
pub use session::{AuthError, AuthSuccess, SessionPhase, SessionSnapshot, SessionStore};
pub use state::Storefront;
pub use wishlist::WishlistStore;
