//! Account commands: sign-in, cart, orders and likes.

use secrecy::{ExposeSecret, SecretString};
use storefront_sync_client::storefront::StepOutcome;
use storefront_sync_core::{LoginForm, ProductId};

use super::{CliError, connect};

/// Sign in. The password is read from `STOREFRONT_PASSWORD`.
#[allow(clippy::print_stdout)]
pub async fn login(email: String) -> Result<(), CliError> {
    let password = std::env::var("STOREFRONT_PASSWORD")
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("STOREFRONT_PASSWORD"))?;

    let storefront = connect(false).await?;
    let form = LoginForm {
        email,
        password: password.expose_secret().to_owned(),
    };
    let authenticated = storefront.login(form).await?;
    println!("Signed in as {}", authenticated.user.display_name());

    match authenticated.bootstrap.await {
        Ok(report) => {
            for (step, outcome) in [("cart", report.cart), ("orders", report.orders)] {
                if let StepOutcome::Failed(reason) = outcome {
                    tracing::warn!(step, %reason, "Could not load account data");
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, "Bootstrap task failed"),
    }
    Ok(())
}

/// Sign out.
#[allow(clippy::print_stdout)]
pub async fn logout() -> Result<(), CliError> {
    let storefront = connect(false).await?;
    storefront.logout().await;
    println!("Signed out");
    Ok(())
}

/// Print the cart.
#[allow(clippy::print_stdout)]
pub async fn cart() -> Result<(), CliError> {
    let storefront = connect(false).await?;
    let cart = storefront.refresh_cart().await?;

    if cart.is_empty() {
        println!("Cart is empty");
        return Ok(());
    }
    for item in &cart.items {
        println!(
            "{:>3} x {:<40} {:<8} {:<4} {:>10}",
            item.quantity,
            item.product_name,
            item.color,
            item.size,
            item.line_total()
        );
    }
    println!("{} items, subtotal {}", cart.item_count(), cart.subtotal());
    Ok(())
}

/// Print the order history.
#[allow(clippy::print_stdout)]
pub async fn orders() -> Result<(), CliError> {
    let storefront = connect(false).await?;
    let orders = storefront.refresh_orders().await?;

    if orders.is_empty() {
        println!("No orders");
    }
    for order in &orders {
        println!(
            "#{:<10} {}  {:<12} {:<10} {:>10}",
            order.order_number,
            order.created_at.format("%Y-%m-%d"),
            order.status.to_string(),
            order.payment_status.to_string(),
            order.total
        );
    }
    Ok(())
}

/// Toggle a liked product.
#[allow(clippy::print_stdout)]
pub async fn like(product_id: String) -> Result<(), CliError> {
    let storefront = connect(false).await?;
    let id = ProductId::new(product_id);
    let liked = storefront.toggle_liked_product(&id).await?;
    if liked {
        println!("Liked {id}");
    } else {
        println!("Unliked {id}");
    }
    Ok(())
}
