//! Catalog product records.
//!
//! Products are owned by the catalog; the stores only keep snapshots of
//! them keyed by [`ProductId`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::ProductId;
use super::price::{ListedPrice, PriceError};

/// A product snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Normalized product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Listed price, numeric or a display label.
    pub price: ListedPrice,
    /// Catalog category slug.
    #[serde(default)]
    pub category: String,
    /// Image URL.
    #[serde(default)]
    pub img: String,
    /// Long-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form specification table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs: Option<Map<String, Value>>,
}

impl Product {
    /// Resolve the listed price to a unit amount.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] if the price label cannot be parsed.
    pub fn unit_amount(&self) -> Result<Decimal, PriceError> {
        self.price.unit_amount()
    }
}
