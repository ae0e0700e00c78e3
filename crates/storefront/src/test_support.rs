//! In-memory backend and notification sink for store tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use cartwheel_core::{CartLine, ListedPrice, Product, ProductId, User, UserId};
use rust_decimal::Decimal;

use crate::api::{ApiError, AuthGrant, LoginRequest, Registration, ShopApi};
use crate::credentials::{AuthToken, CredentialStore, MemoryCredentialStore};
use crate::notify::{Notification, Notifier};
use crate::sync::lock;

struct Account {
    user: User,
    password: String,
    token: String,
}

#[derive(Default)]
struct FakeState {
    accounts: Vec<Account>,
    carts: HashMap<UserId, Vec<CartLine>>,
    wishlists: HashMap<UserId, Vec<Product>>,
    catalog: Vec<Product>,
    failing: HashSet<&'static str>,
    calls: Vec<String>,
}

/// Backend double with one seeded account (`asha@example.com` /
/// `hunter22`) and a small catalog.
///
/// Authenticates requests with the token in its shared credential store,
/// like the real client does.
pub(crate) struct FakeApi {
    credentials: Arc<MemoryCredentialStore>,
    state: Mutex<FakeState>,
}

pub(crate) fn product(id: &str, name: &str, price: ListedPrice) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        price,
        category: String::new(),
        img: String::new(),
        description: None,
        specs: None,
    }
}

/// `Desk Lamp`, listed as `"₹1,999"`.
pub(crate) fn lamp() -> Product {
    product("lamp", "Desk Lamp", ListedPrice::Label("₹1,999".to_string()))
}

/// `Coffee Mug`, listed as `500`.
pub(crate) fn mug() -> Product {
    product("mug", "Coffee Mug", ListedPrice::Amount(Decimal::from(500)))
}

/// `Kettle`, listed as `2499`.
pub(crate) fn kettle() -> Product {
    product("kettle", "Kettle", ListedPrice::Amount(Decimal::from(2499)))
}

pub(crate) fn registration(name: &str, email: &str) -> Registration {
    Registration {
        name: name.to_string(),
        email: email.to_string(),
        password: "hunter22".to_string(),
        phone: None,
    }
}

fn status(status: u16, message: Option<&str>) -> ApiError {
    ApiError::Status {
        status,
        message: message.map(str::to_string),
    }
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        let asha = User {
            id: UserId::new("u1"),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: None,
        };
        Self {
            credentials: Arc::new(MemoryCredentialStore::new()),
            state: Mutex::new(FakeState {
                accounts: vec![Account {
                    user: asha,
                    password: "hunter22".to_string(),
                    token: "tok-u1".to_string(),
                }],
                catalog: vec![lamp(), mug(), kettle()],
                ..FakeState::default()
            }),
        }
    }

    /// The credential slot requests are authenticated from.
    pub(crate) fn credentials(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.credentials) as Arc<dyn CredentialStore>
    }

    /// Persist the token of the account registered under `email`.
    pub(crate) fn sign_in_as(&self, email: &str) {
        let token = lock(&self.state)
            .accounts
            .iter()
            .find(|a| a.user.email == email)
            .map(|a| a.token.clone());
        if let Some(token) = token {
            let _ = self.credentials.save(&AuthToken::new(token));
        }
    }

    /// Make every call to `operation` fail with a 500.
    pub(crate) fn fail(&self, operation: &'static str) {
        lock(&self.state).failing.insert(operation);
    }

    pub(crate) fn heal(&self, operation: &'static str) {
        lock(&self.state).failing.remove(operation);
    }

    /// Requests received so far, e.g. `"POST /cart lamp"`.
    pub(crate) fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Server-side cart of the seeded account.
    pub(crate) fn server_cart(&self) -> Vec<CartLine> {
        lock(&self.state)
            .carts
            .get(&UserId::new("u1"))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn set_server_cart(&self, lines: Vec<CartLine>) {
        lock(&self.state).carts.insert(UserId::new("u1"), lines);
    }

    /// Server-side wishlist of the seeded account.
    pub(crate) fn server_wishlist(&self) -> Vec<Product> {
        lock(&self.state)
            .wishlists
            .get(&UserId::new("u1"))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn set_server_wishlist(&self, products: Vec<Product>) {
        lock(&self.state).wishlists.insert(UserId::new("u1"), products);
    }

    /// Record `call`, then apply failure injection and token checks.
    fn begin(
        &self,
        state: &mut FakeState,
        operation: &'static str,
        call: String,
        authenticated: bool,
    ) -> Result<Option<UserId>, ApiError> {
        state.calls.push(call);
        if state.failing.contains(operation) {
            return Err(status(500, None));
        }
        if !authenticated {
            return Ok(None);
        }
        let token = self.credentials.load()?;
        let user_id = token.and_then(|token| {
            state
                .accounts
                .iter()
                .find(|a| a.token == token.expose())
                .map(|a| a.user.id.clone())
        });
        match user_id {
            Some(id) => Ok(Some(id)),
            None => Err(status(401, Some("Not authorized, token failed"))),
        }
    }

    fn user_id(
        &self,
        state: &mut FakeState,
        operation: &'static str,
        call: String,
    ) -> Result<UserId, ApiError> {
        self.begin(state, operation, call, true)?
            .ok_or_else(|| status(401, Some("Not authorized")))
    }
}

impl ShopApi for FakeApi {
    async fn current_user(&self) -> Result<User, ApiError> {
        let mut state = lock(&self.state);
        let id = self.user_id(&mut state, "current_user", "GET /auth/me".to_string())?;
        state
            .accounts
            .iter()
            .find(|a| a.user.id == id)
            .map(|a| a.user.clone())
            .ok_or_else(|| status(404, Some("User not found")))
    }

    async fn register(&self, registration: &Registration) -> Result<AuthGrant, ApiError> {
        let mut state = lock(&self.state);
        self.begin(&mut state, "register", "POST /auth/register".to_string(), false)?;
        if state.accounts.iter().any(|a| a.user.email == registration.email) {
            return Err(status(409, Some("User already exists")));
        }

        let n = state.accounts.len() + 1;
        let user = User {
            id: UserId::new(format!("u{n}")),
            name: registration.name.clone(),
            email: registration.email.clone(),
            phone: registration.phone.clone(),
        };
        let token = format!("tok-u{n}");
        state.accounts.push(Account {
            user: user.clone(),
            password: registration.password.clone(),
            token: token.clone(),
        });
        Ok(AuthGrant {
            token: AuthToken::new(token),
            user,
        })
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthGrant, ApiError> {
        let mut state = lock(&self.state);
        self.begin(&mut state, "login", "POST /auth/login".to_string(), false)?;
        state
            .accounts
            .iter()
            .find(|a| a.user.email == request.email && a.password == request.password)
            .map(|a| AuthGrant {
                token: AuthToken::new(a.token.clone()),
                user: a.user.clone(),
            })
            .ok_or_else(|| status(401, Some("Invalid email or password")))
    }

    async fn fetch_cart(&self) -> Result<Vec<CartLine>, ApiError> {
        let mut state = lock(&self.state);
        let id = self.user_id(&mut state, "fetch_cart", "GET /cart".to_string())?;
        Ok(state.carts.get(&id).cloned().unwrap_or_default())
    }

    async fn add_to_cart(&self, product_id: &ProductId, quantity: u32) -> Result<(), ApiError> {
        let mut state = lock(&self.state);
        let id = self.user_id(&mut state, "add_to_cart", format!("POST /cart {product_id}"))?;
        let product = state
            .catalog
            .iter()
            .find(|p| &p.id == product_id)
            .cloned()
            .ok_or_else(|| status(404, Some("Product not found")))?;

        let cart = state.carts.entry(id).or_default();
        match cart.iter_mut().find(|l| &l.product_id == product_id) {
            Some(line) => line.quantity += quantity,
            None => cart.push(CartLine {
                product_id: product.id.clone(),
                product,
                quantity,
            }),
        }
        Ok(())
    }

    async fn update_cart_line(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let mut state = lock(&self.state);
        let call = format!("PUT /cart/{product_id} {quantity}");
        let id = self.user_id(&mut state, "update_cart_line", call)?;
        let line = state
            .carts
            .entry(id)
            .or_default()
            .iter_mut()
            .find(|l| &l.product_id == product_id)
            .ok_or_else(|| status(404, Some("Item not in cart")))?;
        line.quantity = quantity;
        Ok(())
    }

    async fn remove_cart_line(&self, product_id: &ProductId) -> Result<(), ApiError> {
        let mut state = lock(&self.state);
        let call = format!("DELETE /cart/{product_id}");
        let id = self.user_id(&mut state, "remove_cart_line", call)?;
        state
            .carts
            .entry(id)
            .or_default()
            .retain(|l| &l.product_id != product_id);
        Ok(())
    }

    async fn clear_cart(&self) -> Result<(), ApiError> {
        let mut state = lock(&self.state);
        let id = self.user_id(&mut state, "clear_cart", "DELETE /cart".to_string())?;
        state.carts.remove(&id);
        Ok(())
    }

    async fn fetch_wishlist(&self) -> Result<Vec<Product>, ApiError> {
        let mut state = lock(&self.state);
        let id = self.user_id(&mut state, "fetch_wishlist", "GET /wishlist".to_string())?;
        Ok(state.wishlists.get(&id).cloned().unwrap_or_default())
    }

    async fn add_to_wishlist(&self, product_id: &ProductId) -> Result<(), ApiError> {
        let mut state = lock(&self.state);
        let call = format!("POST /wishlist {product_id}");
        let id = self.user_id(&mut state, "add_to_wishlist", call)?;
        let product = state
            .catalog
            .iter()
            .find(|p| &p.id == product_id)
            .cloned()
            .ok_or_else(|| status(404, Some("Product not found")))?;

        let wishlist = state.wishlists.entry(id).or_default();
        if !wishlist.iter().any(|p| &p.id == product_id) {
            wishlist.push(product);
        }
        Ok(())
    }

    async fn remove_from_wishlist(&self, product_id: &ProductId) -> Result<(), ApiError> {
        let mut state = lock(&self.state);
        let call = format!("DELETE /wishlist/{product_id}");
        let id = self.user_id(&mut state, "remove_from_wishlist", call)?;
        state
            .wishlists
            .entry(id)
            .or_default()
            .retain(|p| &p.id != product_id);
        Ok(())
    }
}

/// Notifier that keeps everything it was sent.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn notifications(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|n| n.message.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        lock(&self.sent).push(notification);
    }
}
