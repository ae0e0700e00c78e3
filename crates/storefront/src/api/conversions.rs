//! Wire payload → domain type conversions.
//!
//! This is the only place that knows identifiers can arrive as `id` or
//! `_id`. Lists are converted leniently: a malformed record is logged and
//! skipped so one bad document cannot hide the rest of a cart.

use serde_json::Value;

use cartwheel_core::{CartLine, Product, ProductId, User, UserId};

use super::ApiError;
use super::AuthGrant;
use super::wire::{WireAuthResponse, WireCart, WireId, WireProduct, WireUser, WireWishlist};
use crate::credentials::AuthToken;

/// Pick the first usable identifier from `id` then `_id`.
fn normalize_id(
    id: Option<WireId>,
    doc_id: Option<WireId>,
    kind: &'static str,
) -> Result<String, ApiError> {
    [id, doc_id]
        .into_iter()
        .flatten()
        .find_map(|wire| match wire {
            WireId::Text(text) if !text.trim().is_empty() => Some(text),
            WireId::Text(_) => None,
            WireId::Number(n) => Some(n.to_string()),
        })
        .ok_or(ApiError::MissingId(kind))
}

pub(super) fn convert_product(wire: WireProduct) -> Result<Product, ApiError> {
    Ok(Product {
        id: ProductId::new(normalize_id(wire.id, wire.doc_id, "product")?),
        name: wire.name,
        price: wire.price,
        category: wire.category.unwrap_or_default(),
        img: wire.img.unwrap_or_default(),
        description: wire.description,
        specs: wire.specs,
    })
}

pub(super) fn product_from_value(value: Value) -> Result<Product, ApiError> {
    convert_product(serde_json::from_value::<WireProduct>(value)?)
}

pub(super) fn convert_user(wire: WireUser) -> Result<User, ApiError> {
    Ok(User {
        id: UserId::new(normalize_id(wire.id, wire.doc_id, "user")?),
        name: wire.name.unwrap_or_default(),
        email: wire.email.unwrap_or_default(),
        phone: wire.phone,
    })
}

pub(super) fn user_from_value(value: Value) -> Result<User, ApiError> {
    convert_user(serde_json::from_value::<WireUser>(value)?)
}

/// `auth/me` answers either the bare user record or `{user: {...}}`.
pub(super) fn convert_current_user(value: Value) -> Result<User, ApiError> {
    match value {
        Value::Object(mut fields) if matches!(fields.get("user"), Some(Value::Object(_))) => {
            user_from_value(fields.remove("user").unwrap_or(Value::Null))
        }
        other => user_from_value(other),
    }
}

pub(super) fn convert_auth(wire: WireAuthResponse) -> Result<AuthGrant, ApiError> {
    if wire.token.trim().is_empty() {
        return Err(ApiError::EmptyToken);
    }

    let user = match wire.user {
        Some(user @ Value::Object(_)) => user_from_value(user)?,
        _ => user_from_value(Value::Object(wire.inline))?,
    };

    Ok(AuthGrant {
        token: AuthToken::new(wire.token),
        user,
    })
}

pub(super) fn convert_cart(wire: WireCart) -> Vec<CartLine> {
    let mut lines: Vec<CartLine> = Vec::with_capacity(wire.items.len());

    for item in wire.items {
        if item.qty < 1 {
            tracing::warn!(qty = item.qty, "skipping cart item with quantity below 1");
            continue;
        }
        let quantity = u32::try_from(item.qty).unwrap_or(u32::MAX);

        let product = match product_from_value(item.product) {
            Ok(product) => product,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed cart item");
                continue;
            }
        };

        // At most one line per product: merge duplicates the server sent.
        if let Some(existing) = lines.iter_mut().find(|l| l.product_id == product.id) {
            existing.quantity = existing.quantity.saturating_add(quantity);
            continue;
        }

        lines.push(CartLine {
            product_id: product.id.clone(),
            product,
            quantity,
        });
    }

    lines
}

pub(super) fn convert_wishlist(wire: WireWishlist) -> Vec<Product> {
    let mut products: Vec<Product> = Vec::with_capacity(wire.products.len());

    for value in wire.products {
        match product_from_value(value) {
            Ok(product) if products.iter().any(|p| p.id == product.id) => {}
            Ok(product) => products.push(product),
            Err(e) => tracing::warn!(error = %e, "skipping malformed wishlist product"),
        }
    }

    products
}
