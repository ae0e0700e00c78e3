//! Subcommand implementations and shared output helpers.

pub mod cart;
pub mod session;
pub mod wishlist;

use std::str::FromStr;

use clap::Args;
use rust_decimal::Decimal;
use thiserror::Error;

use cartwheel_core::{ListedPrice, Product, ProductId};
use cartwheel_storefront::{Notification, NotificationKind};

/// Errors from command-line input.
#[derive(Debug, Error)]
pub enum InputError {
    /// `--price` is neither a number nor a label with digits in it.
    #[error("Invalid price: {0}")]
    InvalidPrice(String),
}

/// Product snapshot given on the command line.
#[derive(Args, Debug, Clone)]
pub struct ProductArgs {
    /// Product identifier
    #[arg(long)]
    pub id: String,

    /// Display name
    #[arg(long)]
    pub name: String,

    /// Listed price, e.g. `500` or `"₹1,999"`
    #[arg(long)]
    pub price: String,

    /// Catalog category
    #[arg(long, default_value = "")]
    pub category: String,
}

impl ProductArgs {
    /// Build the product snapshot the stores keep.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::InvalidPrice`] if the price resolves to no
    /// amount.
    pub fn into_product(self) -> Result<Product, InputError> {
        let price = match Decimal::from_str(self.price.trim()) {
            Ok(amount) => ListedPrice::Amount(amount),
            Err(_) => ListedPrice::Label(self.price.clone()),
        };
        if price.unit_amount().is_err() {
            return Err(InputError::InvalidPrice(self.price));
        }

        Ok(Product {
            id: ProductId::new(self.id),
            name: self.name,
            price,
            category: self.category,
            img: String::new(),
            description: None,
            specs: None,
        })
    }
}

#[allow(clippy::print_stdout)]
pub fn print_notification(notification: &Notification) {
    let marker = match notification.kind {
        NotificationKind::Success => "✓",
        NotificationKind::Info => "•",
        NotificationKind::Error => "✗",
    };
    println!("{marker} {}", notification.message);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(price: &str) -> ProductArgs {
        ProductArgs {
            id: "lamp".to_string(),
            name: "Desk Lamp".to_string(),
            price: price.to_string(),
            category: String::new(),
        }
    }

    #[test]
    fn test_numeric_price_is_amount() {
        let product = args("500").into_product().unwrap();
        assert_eq!(product.price, ListedPrice::Amount(Decimal::from(500)));
    }

    #[test]
    fn test_label_price_is_kept() {
        let product = args("₹1,999").into_product().unwrap();
        assert_eq!(product.unit_amount().unwrap(), Decimal::from(1999));
    }

    #[test]
    fn test_price_without_digits_is_rejected() {
        assert!(matches!(
            args("free").into_product(),
            Err(InputError::InvalidPrice(_))
        ));
    }
}
