//! Cart store.
//!
//! Local lines are the UI's view of the cart. Every mutation is applied
//! here first, then confirmed with the server in the background; a failed
//! confirmation triggers a `refresh()` so the local view converges back to
//! the server's.
//!
//! The cart is empty while signed out. A change made anyway still goes to
//! the server without a token; the rejection reconciles the cart back to
//! empty like any other failed confirmation.

use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use rust_decimal::Decimal;

use cartwheel_core::{CartLine, Product, ProductId};

use crate::api::{ApiClient, ApiError, ShopApi};
use crate::notify::{Notification, Notifier};
use crate::session::{SessionListener, SessionStore};
use crate::sync::{SyncTasks, lock};

const ADD_FAILED: &str = "Failed to add to cart";

/// Client-side cart synchronized with `GET/POST/PUT/DELETE cart`.
///
/// Cheap to clone; clones share state.
pub struct CartStore<A = ApiClient> {
    inner: Arc<CartInner<A>>,
}

struct CartInner<A> {
    api: Arc<A>,
    session: SessionStore<A>,
    notifier: Arc<dyn Notifier>,
    lines: Mutex<Vec<CartLine>>,
    sync: SyncTasks,
}

impl<A> Clone for CartStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: ShopApi> CartStore<A> {
    /// Create an empty cart that follows `session`.
    #[must_use]
    pub fn new(api: Arc<A>, session: &SessionStore<A>, notifier: Arc<dyn Notifier>) -> Self {
        let inner = Arc::new(CartInner {
            api,
            session: session.clone(),
            notifier,
            lines: Mutex::new(Vec::new()),
            sync: SyncTasks::default(),
        });
        let listener: Weak<CartInner<A>> = Arc::downgrade(&inner);
        session.add_listener(listener);
        Self { inner }
    }

    // =========================================================================
    // Readers
    // =========================================================================

    /// Snapshot of the lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        lock(&self.inner.lines).clone()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn count(&self) -> usize {
        lock(&self.inner.lines).len()
    }

    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> Option<u32> {
        lock(&self.inner.lines)
            .iter()
            .find(|l| &l.product_id == product_id)
            .map(|l| l.quantity)
    }

    /// Σ quantity × unit price.
    ///
    /// A line whose price label holds no number contributes nothing.
    #[must_use]
    pub fn total(&self) -> Decimal {
        total_of(&lock(&self.inner.lines))
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Replace the local lines with the server's cart.
    ///
    /// Signed out there is no server cart, so the lines are emptied. Fetch
    /// failures are logged and leave the local lines as they were.
    pub async fn refresh(&self) {
        let epoch = self.inner.sync.epoch();
        if !self.inner.session.is_authenticated() {
            self.replace_lines(epoch, Vec::new());
            return;
        }

        match self.inner.api.fetch_cart().await {
            Ok(lines) => {
                if !self.replace_lines(epoch, lines) {
                    tracing::debug!("session changed during cart refresh; discarding");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to refresh cart"),
        }
    }

    /// Publish `lines` unless the session moved past `epoch`.
    ///
    /// The epoch is checked under the lines lock, which the session listener
    /// also holds while it advances and clears.
    fn replace_lines(&self, epoch: u64, lines: Vec<CartLine>) -> bool {
        let mut current = lock(&self.inner.lines);
        if !self.inner.sync.is_current(epoch) {
            return false;
        }
        *current = lines;
        true
    }

    /// Wait for every in-flight confirmation (and any refresh it
    /// triggered) to finish.
    pub async fn settle(&self) {
        self.inner.sync.settle().await;
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of `product`.
    pub fn add_item(&self, product: &Product) {
        apply_add(&mut lock(&self.inner.lines), product);
        self.inner
            .notifier
            .notify(Notification::success(format!("Added {} to cart", product.name)));

        let product_id = product.id.clone();
        self.confirm("add", Some(ADD_FAILED), move |api| async move {
            api.add_to_cart(&product_id, 1).await
        });
    }

    /// Drop the line for `product_id`. An info notification is shown only
    /// when `display_name` is given.
    pub fn remove_item(&self, product_id: &ProductId, display_name: Option<&str>) {
        apply_remove(&mut lock(&self.inner.lines), product_id);
        if let Some(name) = display_name {
            self.inner
                .notifier
                .notify(Notification::info(format!("Removed {name} from cart")));
        }

        let product_id = product_id.clone();
        self.confirm("remove", None, move |api| async move {
            api.remove_cart_line(&product_id).await
        });
    }

    /// Overwrite the quantity of an existing line. Quantities below 1 are
    /// ignored; use [`remove_item`](Self::remove_item) to drop a line.
    pub fn set_quantity(&self, product_id: &ProductId, quantity: u32) {
        if quantity < 1 {
            return;
        }
        if !apply_set_quantity(&mut lock(&self.inner.lines), product_id, quantity) {
            tracing::debug!(product_id = %product_id, "no cart line to update");
            return;
        }

        let product_id = product_id.clone();
        self.confirm("update", None, move |api| async move {
            api.update_cart_line(&product_id, quantity).await
        });
    }

    /// Step the quantity down by one, removing the line (silently) at 1.
    pub fn decrement(&self, product_id: &ProductId) {
        match self.quantity_of(product_id) {
            Some(quantity) if quantity > 1 => self.set_quantity(product_id, quantity - 1),
            Some(_) => self.remove_item(product_id, None),
            None => {}
        }
    }

    /// Empty the cart. A failed confirmation is only logged.
    pub fn clear(&self) {
        lock(&self.inner.lines).clear();

        self.inner.sync.spawn({
            let api = Arc::clone(&self.inner.api);
            async move {
                if let Err(e) = api.clear_cart().await {
                    tracing::warn!(error = %e, "failed to clear server cart");
                }
            }
        });
    }

    /// Run `call` in the background; on failure, notify (if `failure` is
    /// given) and reconcile with the server.
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
                tracing::info!(operation, "cart change needs a signed-in user; reconciling");
            } else {
                tracing::warn!(operation, error = %e, "cart change rejected; reconciling");
            }
            if let Some(message) = failure {
                store.inner.notifier.notify(Notification::error(message));
            }
            store.refresh().await;
        });
    }
}

impl<A: ShopApi> SessionListener for CartInner<A> {
    fn session_changed(self: Arc<Self>, authenticated: bool) {
        {
            let mut lines = lock(&self.lines);
            self.sync.advance();
            lines.clear();
        }
        if authenticated {
            let store = CartStore { inner: self };
            let hydrate = store.clone();
            store.inner.sync.spawn(async move { hydrate.refresh().await });
        }
    }
}

fn apply_add(lines: &mut Vec<CartLine>, product: &Product) {
    match lines.iter_mut().find(|l| l.product_id == product.id) {
        Some(line) => line.quantity = line.quantity.saturating_add(1),
        None => lines.push(CartLine::single(product.clone())),
    }
}

fn apply_remove(lines: &mut Vec<CartLine>, product_id: &ProductId) {
    lines.retain(|l| &l.product_id != product_id);
}

fn apply_set_quantity(lines: &mut [CartLine], product_id: &ProductId, quantity: u32) -> bool {
    match lines.iter_mut().find(|l| &l.product_id == product_id) {
        Some(line) => {
            line.quantity = quantity;
            true
        }
        None => false,
    }
}

fn total_of(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .map(|line| {
            line.line_total().unwrap_or_else(|e| {
                tracing::warn!(product_id = %line.product_id, error = %e, "unpriced cart line");
                Decimal::ZERO
            })
        })
        .sum()
}
