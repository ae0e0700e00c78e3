//! Cart and checkout commands.

use clap::Subcommand;

use cartwheel_core::ProductId;
use cartwheel_storefront::Storefront;

use super::ProductArgs;

#[derive(Subcommand)]
pub enum CartAction {
    /// List the cart lines and total
    List,
    /// Add one unit of a product
    Add {
        #[command(flatten)]
        product: ProductArgs,
    },
    /// Remove a product's line
    Remove {
        /// Product identifier
        id: String,
    },
    /// Set a line's quantity
    Set {
        /// Product identifier
        id: String,

        /// New quantity (at least 1)
        quantity: u32,
    },
    /// Take one unit off a line, removing it at zero
    Decrement {
        /// Product identifier
        id: String,
    },
    /// Empty the cart
    Clear,
}

/// Apply `action`, wait for the server to confirm, then print the cart.
///
/// # Errors
///
/// Returns an error if the product given to `add` is invalid.
pub async fn run(shop: &Storefront, action: CartAction) -> Result<(), Box<dyn std::error::Error>> {
    let cart = shop.cart();
    match action {
        CartAction::List => {}
        CartAction::Add { product } => cart.add_item(&product.into_product()?),
        CartAction::Remove { id } => {
            let id = ProductId::new(id);
            let name = cart
                .lines()
                .into_iter()
                .find(|l| l.product_id == id)
                .map(|l| l.product.name);
            cart.remove_item(&id, name.as_deref());
        }
        CartAction::Set { id, quantity } => cart.set_quantity(&ProductId::new(id), quantity),
        CartAction::Decrement { id } => cart.decrement(&ProductId::new(id)),
        CartAction::Clear => cart.clear(),
    }

    if !shop.session().is_authenticated() {
        tracing::warn!("not signed in; cart changes are not saved");
    }
    cart.settle().await;
    print_cart(shop);
    Ok(())
}

/// Print what checkout would charge.
///
/// # Errors
///
/// Returns [`CheckoutError`](cartwheel_storefront::CheckoutError) when
/// signed out or the cart is empty.
#[allow(clippy::print_stdout)]
pub fn checkout(shop: &Storefront) -> Result<(), Box<dyn std::error::Error>> {
    let summary = shop.checkout().begin()?;
    for line in &summary.lines {
        println!("{:>4} × {}  {}", line.quantity, line.product.name, line.product.price);
    }
    println!("{} item(s), total {}", summary.count, summary.total);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_cart(shop: &Storefront) {
    let cart = shop.cart();
    let lines = cart.lines();
    if lines.is_empty() {
        println!("Cart is empty");
        return;
    }
    for line in &lines {
        println!(
            "{:<12} {:>4} × {}  {}",
            line.product_id, line.quantity, line.product.name, line.product.price
        );
    }
    println!("total {}", cart.total());
}
