//! Cartwheel CLI - storefront session, cart, and wishlist from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the token is kept under the user config dir)
//! cartwheel login -e asha@example.com -p hunter22
//!
//! # Add a product and look at the cart
//! cartwheel cart add --id 665f --name "Desk Lamp" --price "₹1,999"
//! cartwheel cart list
//!
//! # Review what checkout would charge
//! cartwheel checkout
//! ```
//!
//! # Environment Variables
//!
//! - `CARTWHEEL_API_URL` - Base URL of the storefront API (required)
//! - `CARTWHEEL_TOKEN_PATH` - Where the session token is persisted
//! - `RUST_LOG` - Log filter (default `cartwheel_storefront=info`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cartwheel_storefront::{ChannelNotifier, ClientConfig, Storefront};

mod commands;

#[derive(Parser)]
#[command(name = "cartwheel")]
#[command(author, version, about = "Cartwheel storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        #[arg(long)]
        phone: Option<String>,
    },
    /// Sign out and forget the stored token
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Inspect or change the cart
    Cart {
        #[command(subcommand)]
        action: commands::cart::CartAction,
    },
    /// Inspect or change the wishlist
    Wishlist {
        #[command(subcommand)]
        action: commands::wishlist::WishlistAction,
    },
    /// Summarize the cart for checkout
    Checkout,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cartwheel_storefront=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::from_env()?;
    let (notifier, mut notifications) = ChannelNotifier::channel();
    let shop = Storefront::from_config(&config, Arc::new(notifier))?;
    shop.start().await;

    let result = match cli.command {
        Commands::Login { email, password } => {
            commands::session::login(&shop, &email, &password).await
        }
        Commands::Register {
            name,
            email,
            password,
            phone,
        } => commands::session::register(&shop, name, email, password, phone).await,
        Commands::Logout => {
            commands::session::logout(&shop);
            Ok(())
        }
        Commands::Whoami => {
            commands::session::whoami(&shop);
            Ok(())
        }
        Commands::Cart { action } => commands::cart::run(&shop, action).await,
        Commands::Wishlist { action } => commands::wishlist::run(&shop, action).await,
        Commands::Checkout => commands::cart::checkout(&shop),
    };

    // Let background confirmations finish before the process exits.
    shop.settle().await;
    while let Ok(notification) = notifications.try_recv() {
        commands::print_notification(&notification);
    }

    result
}
