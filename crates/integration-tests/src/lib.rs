//! End-to-end test harness for Cartwheel.
//!
//! Runs an in-process `axum` backend that speaks the storefront REST API the
//! way the production server does (Mongo-style `_id` fields, price labels,
//! `qty` line quantities) and wires a real [`Storefront`] to it over HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartwheel-integration-tests
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use cartwheel_core::{ListedPrice, Product, ProductId};
use cartwheel_storefront::{
    ApiClient, ChannelNotifier, ClientConfig, CredentialStore, Notification, Storefront,
};

/// Catalog id of the desk lamp (listed as `"₹1,999"`).
pub const LAMP: &str = "665f1c0000000000000000a1";
/// Catalog id of the coffee mug (listed as `500`).
pub const MUG: &str = "665f1c0000000000000000b2";
/// Catalog id of the kettle, sent as the number `42`.
pub const KETTLE: &str = "42";

/// The seeded account.
pub const EMAIL: &str = "asha@example.com";
pub const PASSWORD: &str = "hunter22";

// =============================================================================
// Products as the client sees them
// =============================================================================

fn snapshot(id: &str, name: &str, price: ListedPrice, category: &str) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        price,
        category: category.to_string(),
        img: format!("/img/{category}.jpg"),
        description: None,
        specs: None,
    }
}

#[must_use]
pub fn lamp() -> Product {
    snapshot(LAMP, "Desk Lamp", ListedPrice::Label("₹1,999".to_string()), "lighting")
}

#[must_use]
pub fn mug() -> Product {
    snapshot(MUG, "Coffee Mug", ListedPrice::Amount(Decimal::from(500)), "kitchen")
}

#[must_use]
pub fn kettle() -> Product {
    snapshot(KETTLE, "Kettle", ListedPrice::Amount(Decimal::from(2499)), "kitchen")
}

// =============================================================================
// Backend state
// =============================================================================

#[derive(Clone)]
struct Account {
    id: String,
    name: String,
    email: String,
    password: String,
    token: String,
}

impl Account {
    fn document(&self) -> Value {
        json!({ "_id": self.id, "name": self.name, "email": self.email })
    }
}

struct BackendState {
    accounts: Vec<Account>,
    catalog: Vec<Value>,
    carts: HashMap<String, Vec<(String, u32)>>,
    wishlists: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    requests: Vec<String>,
}

impl BackendState {
    fn seeded() -> Self {
        Self {
            accounts: vec![Account {
                id: "64a0000000000000000000u1".to_string(),
                name: "Asha".to_string(),
                email: EMAIL.to_string(),
                password: PASSWORD.to_string(),
                token: "jwt-asha".to_string(),
            }],
            catalog: vec![
                json!({
                    "_id": LAMP, "name": "Desk Lamp", "price": "₹1,999",
                    "category": "lighting", "img": "/img/lighting.jpg",
                    "specs": {"wattage": "9W"}
                }),
                json!({
                    "_id": MUG, "name": "Coffee Mug", "price": 500,
                    "category": "kitchen", "img": "/img/kitchen.jpg"
                }),
                json!({
                    "id": 42, "name": "Kettle", "price": 2499,
                    "category": "kitchen", "img": "/img/kitchen.jpg"
                }),
            ],
            carts: HashMap::new(),
            wishlists: HashMap::new(),
            failing: HashSet::new(),
            requests: Vec::new(),
        }
    }

    /// Log the request; answer 500 if the route is set to fail.
    fn begin(&mut self, route: String) -> Result<(), Response> {
        let failing = self.failing.contains(&route);
        self.requests.push(route);
        if failing {
            return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        }
        Ok(())
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<Account, Response> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let Some(token) = token else {
            return Err(rejection(StatusCode::UNAUTHORIZED, "Not authorized, no token"));
        };

        self.accounts
            .iter()
            .find(|a| a.token == token)
            .cloned()
            .ok_or_else(|| rejection(StatusCode::UNAUTHORIZED, "Not authorized, token failed"))
    }

    fn product(&self, id: &str) -> Option<&Value> {
        self.catalog.iter().find(|p| {
            let doc_id = p.get("_id").and_then(Value::as_str).map(str::to_string);
            let num_id = p.get("id").and_then(Value::as_i64).map(|n| n.to_string());
            doc_id.as_deref() == Some(id) || num_id.as_deref() == Some(id)
        })
    }
}

fn rejection(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Shared handle to the fake backend's state.
#[derive(Clone)]
pub struct Backend {
    inner: Arc<Mutex<BackendState>>,
}

impl Backend {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BackendState::seeded())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn account(&self, email: &str) -> Option<Account> {
        self.lock().accounts.iter().find(|a| a.email == email).cloned()
    }

    /// Answer 500 to every request on `route`, e.g. `"POST /cart"`.
    pub fn fail(&self, route: &str) {
        self.lock().failing.insert(route.to_string());
    }

    pub fn heal(&self, route: &str) {
        self.lock().failing.remove(route);
    }

    /// Requests received so far, e.g. `"PUT /cart/42"`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    /// The bearer token the backend issues to `email`.
    #[must_use]
    pub fn token_for(&self, email: &str) -> Option<String> {
        self.account(email).map(|a| a.token)
    }

    /// Server-side cart of `email` as `(product id, qty)` pairs.
    #[must_use]
    pub fn cart_of(&self, email: &str) -> Vec<(String, u32)> {
        let Some(account) = self.account(email) else {
            return Vec::new();
        };
        self.lock().carts.get(&account.id).cloned().unwrap_or_default()
    }

    pub fn seed_cart(&self, email: &str, items: &[(&str, u32)]) {
        if let Some(account) = self.account(email) {
            let items = items.iter().map(|(id, qty)| ((*id).to_string(), *qty)).collect();
            self.lock().carts.insert(account.id, items);
        }
    }

    /// Server-side wishlist of `email` as product ids.
    #[must_use]
    pub fn wishlist_of(&self, email: &str) -> Vec<String> {
        let Some(account) = self.account(email) else {
            return Vec::new();
        };
        self.lock().wishlists.get(&account.id).cloned().unwrap_or_default()
    }

    pub fn seed_wishlist(&self, email: &str, ids: &[&str]) {
        if let Some(account) = self.account(email) {
            let ids = ids.iter().map(|id| (*id).to_string()).collect();
            self.lock().wishlists.insert(account.id, ids);
        }
    }
}

// =============================================================================
// Routes
// =============================================================================

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddBody {
    product_id: String,
    qty: u32,
}

#[derive(Deserialize)]
struct QtyBody {
    qty: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WishlistBody {
    product_id: String,
}

fn routes(backend: Backend) -> Router {
    let api = Router::new()
        .route("/auth/me", get(current_user))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/cart", get(fetch_cart).post(add_to_cart).delete(clear_cart))
        .route("/cart/{id}", delete(remove_cart_line).put(update_cart_line))
        .route("/wishlist", get(fetch_wishlist).post(add_to_wishlist))
        .route("/wishlist/{id}", delete(remove_from_wishlist));

    Router::new().nest("/api", api).with_state(backend)
}

async fn current_user(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    let mut state = backend.lock();
    if let Err(r) = state.begin("GET /auth/me".to_string()) {
        return r;
    }
    match state.authorize(&headers) {
        Ok(account) => Json(json!({ "user": account.document() })).into_response(),
        Err(r) => r,
    }
}

async fn login(State(backend): State<Backend>, Json(body): Json<LoginBody>) -> Response {
    let mut state = backend.lock();
    if let Err(r) = state.begin("POST /auth/login".to_string()) {
        return r;
    }
    let account = state
        .accounts
        .iter()
        .find(|a| a.email == body.email && a.password == body.password);
    match account {
        Some(account) => {
            // Login answers the user fields inline next to the token.
            let mut doc = account.document();
            doc["token"] = Value::String(account.token.clone());
            Json(doc).into_response()
        }
        None => rejection(StatusCode::UNAUTHORIZED, "Invalid email or password"),
    }
}

async fn register(State(backend): State<Backend>, Json(body): Json<RegisterBody>) -> Response {
    let mut state = backend.lock();
    if let Err(r) = state.begin("POST /auth/register".to_string()) {
        return r;
    }
    if state.accounts.iter().any(|a| a.email == body.email) {
        return rejection(StatusCode::BAD_REQUEST, "User already exists");
    }

    let n = state.accounts.len() + 1;
    let account = Account {
        id: format!("64a00000000000000000000{n}"),
        name: body.name,
        email: body.email,
        password: body.password,
        token: format!("jwt-{n}"),
    };
    let response = json!({ "token": account.token, "user": account.document() });
    state.accounts.push(account);
    (StatusCode::CREATED, Json(response)).into_response()
}

async fn fetch_cart(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    let mut state = backend.lock();
    if let Err(r) = state.begin("GET /cart".to_string()) {
        return r;
    }
    let account = match state.authorize(&headers) {
        Ok(account) => account,
        Err(r) => return r,
    };

    let items: Vec<Value> = state
        .carts
        .get(&account.id)
        .into_iter()
        .flatten()
        .filter_map(|(id, qty)| {
            state
                .product(id)
                .map(|product| json!({ "product": product, "qty": qty }))
        })
        .collect();
    Json(json!({ "items": items })).into_response()
}

async fn add_to_cart(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<AddBody>,
) -> Response {
    let mut state = backend.lock();
    if let Err(r) = state.begin("POST /cart".to_string()) {
        return r;
    }
    let account = match state.authorize(&headers) {
        Ok(account) => account,
        Err(r) => return r,
    };
    if state.product(&body.product_id).is_none() {
        return rejection(StatusCode::NOT_FOUND, "Product not found");
    }

    let cart = state.carts.entry(account.id).or_default();
    match cart.iter_mut().find(|(id, _)| *id == body.product_id) {
        Some((_, qty)) => *qty += body.qty,
        None => cart.push((body.product_id, body.qty)),
    }
    StatusCode::OK.into_response()
}

async fn update_cart_line(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<QtyBody>,
) -> Response {
    let mut state = backend.lock();
    if let Err(r) = state.begin(format!("PUT /cart/{id}")) {
        return r;
    }
    let account = match state.authorize(&headers) {
        Ok(account) => account,
        Err(r) => return r,
    };

    let line = state
        .carts
        .entry(account.id)
        .or_default()
        .iter_mut()
        .find(|(line_id, _)| *line_id == id);
    match line {
        Some((_, qty)) => {
            *qty = body.qty;
            StatusCode::OK.into_response()
        }
        None => rejection(StatusCode::NOT_FOUND, "Item not in cart"),
    }
}

async fn remove_cart_line(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut state = backend.lock();
    if let Err(r) = state.begin(format!("DELETE /cart/{id}")) {
        return r;
    }
    let account = match state.authorize(&headers) {
        Ok(account) => account,
        Err(r) => return r,
    };
    state
        .carts
        .entry(account.id)
        .or_default()
        .retain(|(line_id, _)| *line_id != id);
    StatusCode::OK.into_response()
}

async fn clear_cart(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    let mut state = backend.lock();
    if let Err(r) = state.begin("DELETE /cart".to_string()) {
        return r;
    }
    let account = match state.authorize(&headers) {
        Ok(account) => account,
        Err(r) => return r,
    };
    state.carts.remove(&account.id);
    StatusCode::OK.into_response()
}

async fn fetch_wishlist(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    let mut state = backend.lock();
    if let Err(r) = state.begin("GET /wishlist".to_string()) {
        return r;
    }
    let account = match state.authorize(&headers) {
        Ok(account) => account,
        Err(r) => return r,
    };

    let products: Vec<Value> = state
        .wishlists
        .get(&account.id)
        .into_iter()
        .flatten()
        .filter_map(|id| state.product(id).cloned())
        .collect();
    Json(json!({ "products": products })).into_response()
}

async fn add_to_wishlist(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<WishlistBody>,
) -> Response {
    let mut state = backend.lock();
    if let Err(r) = state.begin("POST /wishlist".to_string()) {
        return r;
    }
    let account = match state.authorize(&headers) {
        Ok(account) => account,
        Err(r) => return r,
    };
    if state.product(&body.product_id).is_none() {
        return rejection(StatusCode::NOT_FOUND, "Product not found");
    }

    let wishlist = state.wishlists.entry(account.id).or_default();
    if !wishlist.contains(&body.product_id) {
        wishlist.push(body.product_id);
    }
    StatusCode::OK.into_response()
}

async fn remove_from_wishlist(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut state = backend.lock();
    if let Err(r) = state.begin(format!("DELETE /wishlist/{id}")) {
        return r;
    }
    let account = match state.authorize(&headers) {
        Ok(account) => account,
        Err(r) => return r,
    };
    state
        .wishlists
        .entry(account.id)
        .or_default()
        .retain(|saved| *saved != id);
    StatusCode::OK.into_response()
}

// =============================================================================
// Server
// =============================================================================

/// A fake backend listening on an ephemeral local port.
///
/// The server task is aborted on drop.
pub struct TestServer {
    base_url: String,
    backend: Backend,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Bind `127.0.0.1:0` and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let backend = Backend::new();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let app = routes(backend.clone());
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log_server_error(&e);
            }
        });

        Self {
            base_url: format!("http://{addr}/api"),
            backend,
            task,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Client configuration pointing at this server.
    ///
    /// # Panics
    ///
    /// Panics if the base URL does not parse.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.base_url).expect("Test server URL is valid")
    }

    /// A storefront talking to this server over HTTP, with its
    /// notifications delivered to the returned receiver.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn storefront(
        &self,
        credentials: Arc<dyn CredentialStore>,
    ) -> (Storefront, UnboundedReceiver<Notification>) {
        let api = ApiClient::new(&self.config(), Arc::clone(&credentials))
            .expect("Failed to build API client");
        let (notifier, rx) = ChannelNotifier::channel();
        (Storefront::new(Arc::new(api), credentials, Arc::new(notifier)), rx)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[allow(clippy::print_stderr)]
fn log_server_error(e: &std::io::Error) {
    eprintln!("test server stopped: {e}");
}

/// Drain every notification delivered so far.
pub fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        out.push(notification);
    }
    out
}
