//! Wishlist commands.

use clap::Subcommand;

use cartwheel_core::ProductId;
use cartwheel_storefront::Storefront;

use super::ProductArgs;

#[derive(Subcommand)]
pub enum WishlistAction {
    /// List saved products
    List,
    /// Save a product
    Add {
        #[command(flatten)]
        product: ProductArgs,
    },
    /// Save a product, or unsave it if already saved
    Toggle {
        #[command(flatten)]
        product: ProductArgs,
    },
    /// Unsave a product
    Remove {
        /// Product identifier
        id: String,
    },
}

/// Apply `action`, wait for the server to confirm, then print the wishlist.
///
/// # Errors
///
/// Returns an error if the product given to `add`/`toggle` is invalid.
pub async fn run(
    shop: &Storefront,
    action: WishlistAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let wishlist = shop.wishlist();
    match action {
        WishlistAction::List => {}
        WishlistAction::Add { product } => wishlist.add_item(&product.into_product()?),
        WishlistAction::Toggle { product } => wishlist.toggle(&product.into_product()?),
        WishlistAction::Remove { id } => {
            let id = ProductId::new(id);
            let name = wishlist
                .items()
                .into_iter()
                .find(|p| p.id == id)
                .map(|p| p.name);
            wishlist.remove_item(&id, name.as_deref());
        }
    }

    wishlist.settle().await;
    print_wishlist(shop);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_wishlist(shop: &Storefront) {
    let items = shop.wishlist().items();
    if items.is_empty() {
        println!("Wishlist is empty");
        return;
    }
    for product in &items {
        println!("{:<12} {}  {}", product.id, product.name, product.price);
    }
}
