//! Storefront context shared by every consumer.

use std::sync::Arc;

use crate::api::{ApiClient, ShopApi};
use crate::cart::CartStore;
use crate::checkout::Checkout;
use crate::config::ClientConfig;
use crate::credentials::{CredentialStore, FileCredentialStore};
use crate::error::StorefrontError;
use crate::notify::Notifier;
use crate::session::SessionStore;
use crate::wishlist::WishlistStore;

/// Every store, built once and wired to one session.
///
/// This struct is cheaply cloneable via `Arc`; hand clones to whatever
/// presents the stores instead of reaching for globals.
pub struct Storefront<A = ApiClient> {
    inner: Arc<StorefrontInner<A>>,
}

struct StorefrontInner<A> {
    api: Arc<A>,
    session: SessionStore<A>,
    cart: CartStore<A>,
    wishlist: WishlistStore<A>,
    checkout: Checkout<A>,
}

impl<A> Clone for Storefront<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Storefront<ApiClient> {
    /// Build a storefront talking to the configured API, with the token
    /// persisted at `config.token_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(
        config: &ClientConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, StorefrontError> {
        let credentials: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::new(config.token_path.clone()));
        let api = ApiClient::new(config, Arc::clone(&credentials))?;
        Ok(Self::new(Arc::new(api), credentials, notifier))
    }
}

impl<A: ShopApi> Storefront<A> {
    /// Wire the stores around `api`.
    ///
    /// `credentials` must be the slot `api` reads its bearer token from.
    #[must_use]
    pub fn new(
        api: Arc<A>,
        credentials: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let session = SessionStore::new(Arc::clone(&api), credentials);
        let cart = CartStore::new(Arc::clone(&api), &session, Arc::clone(&notifier));
        let wishlist = WishlistStore::new(Arc::clone(&api), &session, notifier);
        let checkout = Checkout::new(&session, &cart);

        Self {
            inner: Arc::new(StorefrontInner {
                api,
                session,
                cart,
                wishlist,
                checkout,
            }),
        }
    }

    #[must_use]
    pub fn api(&self) -> &A {
        &self.inner.api
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore<A> {
        &self.inner.session
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore<A> {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore<A> {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn checkout(&self) -> &Checkout<A> {
        &self.inner.checkout
    }

    /// Validate the persisted session and hydrate the stores.
    ///
    /// Resolves once the session check is done and the cart and wishlist
    /// hold the server's contents.
    ///
    /// Calling it after an explicit login or logout skips the session check;
    /// that action already resolved it.
    pub async fn start(&self) {
        self.inner.session.initialize().await;
        self.settle().await;
    }

    /// Wait for every background confirmation in both stores.
    pub async fn settle(&self) {
        // A cart reconcile never schedules wishlist work (and vice versa),
        // so one pass over each is enough.
        self.inner.cart.settle().await;
        self.inner.wishlist.settle().await;
    }
}
