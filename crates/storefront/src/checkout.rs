//! Checkout gate.
//!
//! Checkout is the one cart flow that opens the login prompt. Adding to the
//! cart while signed out does not prompt; the change is simply rejected.

use rust_decimal::Decimal;
use thiserror::Error;

use cartwheel_core::CartLine;

use crate::api::{ApiClient, ShopApi};
use crate::cart::CartStore;
use crate::session::SessionStore;

/// Why checkout could not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// Not signed in. The login prompt has been opened.
    #[error("Please log in to check out")]
    LoginRequired,

    #[error("Your cart is empty")]
    EmptyCart,
}

/// What is being checked out.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSummary {
    pub lines: Vec<CartLine>,
    /// Number of distinct lines.
    pub count: usize,
    pub total: Decimal,
}

pub struct Checkout<A = ApiClient> {
    session: SessionStore<A>,
    cart: CartStore<A>,
}

impl<A> Clone for Checkout<A> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            cart: self.cart.clone(),
        }
    }
}

impl<A: ShopApi> Checkout<A> {
    #[must_use]
    pub fn new(session: &SessionStore<A>, cart: &CartStore<A>) -> Self {
        Self {
            session: session.clone(),
            cart: cart.clone(),
        }
    }

    /// Start checkout from the current cart.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::LoginRequired`] (after opening the login
    /// prompt) when signed out, and [`CheckoutError::EmptyCart`] when there
    /// is nothing to buy.
    pub fn begin(&self) -> Result<CheckoutSummary, CheckoutError> {
        if !self.session.require_auth() {
            return Err(CheckoutError::LoginRequired);
        }

        let lines = self.cart.lines();
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        Ok(CheckoutSummary {
            count: lines.len(),
            total: self.cart.total(),
            lines,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::notify::{Notifier, TracingNotifier};
    use crate::test_support::{FakeApi, lamp, mug};

    fn setup() -> (Arc<FakeApi>, SessionStore<FakeApi>, CartStore<FakeApi>) {
        let api = Arc::new(FakeApi::new());
        let session = SessionStore::new(Arc::clone(&api), api.credentials());
        let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
        let cart = CartStore::new(Arc::clone(&api), &session, notifier);
        (api, session, cart)
    }

    #[tokio::test]
    async fn test_signed_out_add_then_checkout_prompts_login() {
        let (_api, session, cart) = setup();
        session.initialize().await;
        let checkout = Checkout::new(&session, &cart);

        cart.add_item(&lamp());
        cart.settle().await;
        assert!(!session.show_login_prompt());
        assert_eq!(cart.count(), 0);

        assert_eq!(checkout.begin(), Err(CheckoutError::LoginRequired));
        assert!(session.show_login_prompt());
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let (_api, session, cart) = setup();
        session.login("asha@example.com", "hunter22").await.unwrap();
        cart.settle().await;

        let checkout = Checkout::new(&session, &cart);
        assert_eq!(checkout.begin(), Err(CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_summary() {
        let (_api, session, cart) = setup();
        session.login("asha@example.com", "hunter22").await.unwrap();
        cart.settle().await;
        cart.add_item(&lamp());
        cart.add_item(&lamp());
        cart.add_item(&mug());
        cart.settle().await;

        let summary = Checkout::new(&session, &cart).begin().unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.total, Decimal::from(4498));
    }
}
