//! Cart commands.

use renomarket_client::Marketplace;
use renomarket_client::models::Cart;
use renomarket_core::ProductId;

use super::CliError;

pub async fn show(market: &Marketplace) -> Result<(), CliError> {
    // The session start already loaded the cart; refetch to be current.
    if !market.cart().refresh_cart().await {
        return Err(CliError::Cart("refresh"));
    }
    print_cart(market.cart().cart().as_ref());
    Ok(())
}

pub async fn add(market: &Marketplace, product_id: &str, quantity: u32) -> Result<(), CliError> {
    let cart = market.cart();
    if !cart.add_to_cart(&ProductId::new(product_id), quantity).await {
        return Err(CliError::Cart("add"));
    }
    print_cart(cart.cart().as_ref());
    Ok(())
}

pub async fn set(market: &Marketplace, product_id: &str, quantity: u32) -> Result<(), CliError> {
    let cart = market.cart();
    if !cart.update_quantity(&ProductId::new(product_id), quantity).await {
        return Err(CliError::Cart("update"));
    }
    print_cart(cart.cart().as_ref());
    Ok(())
}

pub async fn remove(market: &Marketplace, product_id: &str) -> Result<(), CliError> {
    let cart = market.cart();
    if !cart.remove_from_cart(&ProductId::new(product_id)).await {
        return Err(CliError::Cart("remove"));
    }
    print_cart(cart.cart().as_ref());
    Ok(())
}

pub async fn clear(market: &Marketplace) -> Result<(), CliError> {
    if !market.cart().clear_cart().await {
        return Err(CliError::Cart("clear"));
    }
    println!("Panier vidé");
    Ok(())
}

fn print_cart(cart: Option<&Cart>) {
    let Some(cart) = cart.filter(|cart| !cart.is_empty()) else {
        println!("Panier vide");
        return;
    };

    for item in &cart.items {
        let name = if item.product.name.is_empty() {
            item.product.id.as_str()
        } else {
            item.product.name.as_str()
        };
        println!("  {:>3} × {name:<40} {}", item.quantity, item.price);
    }
    println!("{} article(s), total {}", cart.item_count(), cart.total_amount);
}
