//! Core types for Cartwheel.
//!
//! This module provides type-safe wrappers for storefront domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod price;
pub mod product;
pub mod user;

pub use cart::CartLine;
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{ListedPrice, PriceError};
pub use product::Product;
pub use user::{ProfilePatch, User};
