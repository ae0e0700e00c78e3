//! Raw JSON payloads as the backend sends them.
//!
//! These mirror the server's documents loosely: identifiers may be `id` or
//! `_id`, strings or numbers, and most fields are optional. Nothing outside
//! `api` sees these types.

use serde::Deserialize;
use serde_json::{Map, Value};

use cartwheel_core::ListedPrice;

/// An identifier as sent on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum WireId {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
pub(super) struct WireProduct {
    #[serde(default)]
    pub id: Option<WireId>,
    #[serde(default, rename = "_id")]
    pub doc_id: Option<WireId>,
    pub name: String,
    pub price: ListedPrice,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub specs: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireUser {
    #[serde(default)]
    pub id: Option<WireId>,
    #[serde(default, rename = "_id")]
    pub doc_id: Option<WireId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Login answers `{token, ...user}`; register answers `{token, user}`.
#[derive(Debug, Deserialize)]
pub(super) struct WireAuthResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(flatten)]
    pub inline: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireCart {
    #[serde(default)]
    pub items: Vec<WireCartItem>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireCartItem {
    pub product: Value,
    #[serde(alias = "quantity")]
    pub qty: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireWishlist {
    #[serde(default)]
    pub products: Vec<Value>,
}

/// Error body, e.g. `{"message": "Invalid email or password"}`.
#[derive(Debug, Deserialize)]
pub(super) struct WireErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
