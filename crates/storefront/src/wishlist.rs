//! Wishlist store.
//!
//! An ordered set of products keyed by product id, with the same
//! optimistic confirm-or-reconcile cycle as the cart. Saving to the wishlist
//! requires a signed-in user.

use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use cartwheel_core::{Product, ProductId};

use crate::api::{ApiClient, ApiError, ShopApi};
use crate::notify::{Notification, Notifier};
use crate::session::{SessionListener, SessionStore};
use crate::sync::{SyncTasks, lock};

const ADD_FAILED: &str = "Failed to add to wishlist";
const LOGIN_TO_SAVE: &str = "Please log in to save items to your wishlist";

/// Client-side wishlist synchronized with `GET/POST/DELETE wishlist`.
///
/// Cheap to clone; clones share state.
pub struct WishlistStore<A = ApiClient> {
    inner: Arc<WishlistInner<A>>,
}

struct WishlistInner<A> {
    api: Arc<A>,
    session: SessionStore<A>,
    notifier: Arc<dyn Notifier>,
    items: Mutex<Vec<Product>>,
    sync: SyncTasks,
}

impl<A> Clone for WishlistStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: ShopApi> WishlistStore<A> {
    /// Create an empty wishlist that follows `session`.
    #[must_use]
    pub fn new(api: Arc<A>, session: &SessionStore<A>, notifier: Arc<dyn Notifier>) -> Self {
        let inner = Arc::new(WishlistInner {
            api,
            session: session.clone(),
            notifier,
            items: Mutex::new(Vec::new()),
            sync: SyncTasks::default(),
        });
        let listener: Weak<WishlistInner<A>> = Arc::downgrade(&inner);
        session.add_listener(listener);
        Self { inner }
    }

    #[must_use]
    pub fn items(&self) -> Vec<Product> {
        lock(&self.inner.items).clone()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        lock(&self.inner.items).len()
    }

    /// Whether `product_id` is saved. Local only.
    #[must_use]
    pub fn is_member(&self, product_id: &ProductId) -> bool {
        lock(&self.inner.items).iter().any(|p| &p.id == product_id)
    }

    /// Replace the local items with the server's wishlist. Signed out, the
    /// wishlist is emptied.
    pub async fn refresh(&self) {
        let epoch = self.inner.sync.epoch();
        if !self.inner.session.is_authenticated() {
            self.replace_items(epoch, Vec::new());
            return;
        }

        match self.inner.api.fetch_wishlist().await {
            Ok(items) => {
                if !self.replace_items(epoch, items) {
                    tracing::debug!("session changed during wishlist refresh; discarding");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to refresh wishlist"),
        }
    }

    /// Same contract as the cart's: the epoch is checked under the items lock.
    fn replace_items(&self, epoch: u64, items: Vec<Product>) -> bool {
        let mut current = lock(&self.inner.items);
        if !self.inner.sync.is_current(epoch) {
            return false;
        }
        *current = items;
        true
    }

    pub async fn settle(&self) {
        self.inner.sync.settle().await;
    }

    /// Save `product`.
    ///
    /// Signed out: opens the login prompt and changes nothing. Already
    /// saved: tells the user so and changes nothing.
    pub fn add_item(&self, product: &Product) {
        if !self.inner.session.require_auth() {
            self.inner.notifier.notify(Notification::info(LOGIN_TO_SAVE));
            return;
        }

        let added = {
            let mut items = lock(&self.inner.items);
            if items.iter().any(|p| p.id == product.id) {
                false
            } else {
                items.push(product.clone());
                true
            }
        };

        if !added {
            self.inner.notifier.notify(Notification::info(format!(
                "{} is already in your wishlist",
                product.name
            )));
            return;
        }

        self.inner
            .notifier
            .notify(Notification::success(format!("Added {} to wishlist", product.name)));

        let product_id = product.id.clone();
        self.confirm("add", Some(ADD_FAILED), move |api| async move {
            api.add_to_wishlist(&product_id).await
        });
    }

    /// Drop `product_id`. An info notification is shown only when
    /// `display_name` is given.
    pub fn remove_item(&self, product_id: &ProductId, display_name: Option<&str>) {
        lock(&self.inner.items).retain(|p| &p.id != product_id);
        if let Some(name) = display_name {
            self.inner
                .notifier
                .notify(Notification::info(format!("Removed {name} from wishlist")));
        }

        let product_id = product_id.clone();
        self.confirm("remove", None, move |api| async move {
            api.remove_from_wishlist(&product_id).await
        });
    }

    /// Remove `product` if saved, otherwise save it.
    pub fn toggle(&self, product: &Product) {
        if self.is_member(&product.id) {
            self.remove_item(&product.id, Some(&product.name));
        } else {
            self.add_item(product);
        }
    }

    fn confirm<F, Fut>(&self, operation: &'static str, failure: Option<&'static str>, call: F)
    where
        F: FnOnce(Arc<A>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        let store = self.clone();
        let epoch = self.inner.sync.epoch();
        self.inner.sync.spawn(async move {
            let Err(e) = call(Arc::clone(&store.inner.api)).await else {
                return;
            };
            if !store.inner.sync.is_current(epoch) {
                return;
            }
            if e.is_unauthorized() {
                tracing::info!(operation, "wishlist change needs a signed-in user; reconciling");
            } else {
                tracing::warn!(operation, error = %e, "wishlist change rejected; reconciling");
            }
            if let Some(message) = failure {
                store.inner.notifier.notify(Notification::error(message));
            }
            store.refresh().await;
        });
    }
}

impl<A: ShopApi> SessionListener for WishlistInner<A> {
    fn session_changed(self: Arc<Self>, authenticated: bool) {
        {
            let mut items = lock(&self.items);
            self.sync.advance();
            items.clear();
        }
        if authenticated {
            let store = WishlistStore { inner: self };
            let hydrate = store.clone();
            store.inner.sync.spawn(async move { hydrate.refresh().await });
        }
    }
}
