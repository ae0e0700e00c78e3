//! Sign-in commands.

use cartwheel_storefront::{Registration, Storefront};

/// Sign in and report the greeting.
///
/// # Errors
///
/// Returns the [`AuthError`](cartwheel_storefront::AuthError) if the credentials are rejected.
#[allow(clippy::print_stdout)]
pub async fn login(
    shop: &Storefront,
    email: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let success = shop.session().login(email, password).await?;
    println!("{}", success.message);
    Ok(())
}

/// Create an account and sign in.
///
/// # Errors
///
/// Returns the [`AuthError`](cartwheel_storefront::AuthError) if the backend refuses the registration.
#[allow(clippy::print_stdout)]
pub async fn register(
    shop: &Storefront,
    name: String,
    email: String,
    password: String,
    phone: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registration = Registration {
        name,
        email,
        password,
        phone,
    };
    let success = shop.session().register(registration).await?;
    println!("{} ({})", success.message, success.user.email);
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn logout(shop: &Storefront) {
    let was_signed_in = shop.session().is_authenticated();
    shop.session().logout();
    if was_signed_in {
        println!("Signed out");
    } else {
        println!("Not signed in");
    }
}

#[allow(clippy::print_stdout)]
pub fn whoami(shop: &Storefront) {
    match shop.session().user() {
        Some(user) => {
            println!("{} <{}>", user.display_name(), user.email);
            if let Some(phone) = user.phone {
                println!("phone: {phone}");
            }
        }
        None => println!("Not signed in"),
    }
}
