//! Cart line items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::PriceError;
use super::product::Product;

/// One product-quantity pair in the cart.
///
/// A line never holds a quantity below 1; the stores remove the line
/// instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    /// A new line holding one unit of `product`.
    #[must_use]
    pub fn single(product: Product) -> Self {
        Self {
            product_id: product.id.clone(),
            product,
            quantity: 1,
        }
    }

    /// `quantity × unit price`.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] if the snapshot's price label cannot be parsed.
    pub fn line_total(&self) -> Result<Decimal, PriceError> {
        Ok(self.product.unit_amount()? * Decimal::from(self.quantity))
    }
}
