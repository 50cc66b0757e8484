//! Integration tests for the cart session.

#![allow(clippy::unwrap_used)]

use renomarket_client::api::MemoryTokenStore;
use renomarket_client::services::CartService;
use renomarket_core::{Money, ProductId};
use renomarket_integration_tests::MockBackend;
use serde_json::json;

async fn mounted_cart(backend: &MockBackend) -> CartService {
    let (api, _) = backend.logged_in_client();
    let cart = CartService::new(api);
    assert!(cart.mount().await);
    cart
}

#[tokio::test]
async fn test_mount_without_token_makes_no_request() {
    let backend = MockBackend::start().await;
    let (api, _) = backend.client_with(MemoryTokenStore::new());
    let cart = CartService::new(api);

    assert!(!cart.mount().await);
    assert!(cart.cart().is_none());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_mount_loads_existing_cart() {
    let backend = MockBackend::start().await;
    backend.set_cart(&[("p1", 2), ("p2", 1)]);

    let cart = mounted_cart(&backend).await;

    assert_eq!(cart.item_count(), 3);
    assert_eq!(cart.cart().unwrap().total_amount, Money::from(45));
    assert!(!cart.state().is_cart_open);
}

#[tokio::test]
async fn test_add_to_cart_replaces_cart_and_opens_it() {
    let backend = MockBackend::start().await;
    let cart = mounted_cart(&backend).await;

    assert!(cart.add_to_cart(&ProductId::new("p1"), 2).await);
    assert!(cart.add_to_cart(&ProductId::new("p2"), 1).await);

    let state = cart.state();
    assert!(state.is_cart_open);
    assert!(!state.is_loading);
    assert_eq!(state.item_count, 3);
    assert_eq!(
        state.item_count,
        state.cart.as_ref().unwrap().items.iter().map(|i| i.quantity).sum::<u32>()
    );
}

#[tokio::test]
async fn test_update_quantity_uses_server_totals() {
    let backend = MockBackend::start().await;
    backend.set_cart(&[("p1", 2)]);
    let cart = mounted_cart(&backend).await;
    assert_eq!(cart.cart().unwrap().total_amount, Money::from(20));

    assert!(cart.update_quantity(&ProductId::new("p1"), 3).await);

    let state = cart.state();
    assert_eq!(state.item_count, 3);
    let snapshot = state.cart.unwrap();
    assert_eq!(snapshot.total_amount, Money::from(30));
    assert_eq!(snapshot.items[0].price, Money::from(30));
}

#[tokio::test]
async fn test_backend_cart_is_authoritative() {
    let backend = MockBackend::start().await;
    backend.set_cart(&[("p1", 2)]);
    backend.respond_with_cart(json!({
        "items": [{"product": {"_id": "p1"}, "quantity": 2, "price": 20}],
        "totalAmount": 40
    }));
    let cart = mounted_cart(&backend).await;
    assert_eq!(cart.item_count(), 2);

    backend.respond_with_cart(json!({
        "items": [{"product": {"_id": "p1"}, "quantity": 3, "price": 30}],
        "totalAmount": 60
    }));
    assert!(cart.update_quantity(&ProductId::new("p1"), 3).await);

    let state = cart.state();
    assert_eq!(state.item_count, 3);
    assert_eq!(state.cart.unwrap().total_amount, Money::from(60));
}

#[tokio::test]
async fn test_remove_and_clear() {
    let backend = MockBackend::start().await;
    backend.set_cart(&[("p1", 1), ("p2", 2)]);
    let cart = mounted_cart(&backend).await;

    assert!(cart.remove_from_cart(&ProductId::new("p1")).await);
    assert_eq!(cart.item_count(), 2);
    assert!(cart.cart().unwrap().line(&ProductId::new("p1")).is_none());

    assert!(cart.clear_cart().await);
    assert_eq!(cart.item_count(), 0);
    assert!(cart.cart().unwrap().is_empty());
}

#[tokio::test]
async fn test_zero_quantity_removes_line() {
    let backend = MockBackend::start().await;
    backend.set_cart(&[("p1", 1)]);
    let cart = mounted_cart(&backend).await;

    assert!(cart.update_quantity(&ProductId::new("p1"), 0).await);
    assert!(cart.cart().unwrap().is_empty());
    assert_eq!(backend.calls_to("/cart/items/p1")[0].method, "DELETE");
}

#[tokio::test]
async fn test_rejected_mutations_leave_cart_untouched() {
    let backend = MockBackend::start().await;
    backend.set_cart(&[("p1", 2)]);
    let cart = mounted_cart(&backend).await;
    let before = cart.state();
    backend.reject_cart_mutations();

    assert!(!cart.add_to_cart(&ProductId::new("p2"), 1).await);
    assert!(!cart.update_quantity(&ProductId::new("p1"), 5).await);
    assert!(!cart.remove_from_cart(&ProductId::new("p1")).await);
    assert!(!cart.clear_cart().await);

    assert_eq!(cart.state(), before);
}

#[tokio::test]
async fn test_http_error_leaves_cart_untouched() {
    let backend = MockBackend::start().await;
    backend.set_cart(&[("p1", 2)]);
    let cart = mounted_cart(&backend).await;
    let before = cart.state();

    // 404: product not in cart
    assert!(!cart.update_quantity(&ProductId::new("p9"), 1).await);
    assert!(!cart.remove_from_cart(&ProductId::new("p9")).await);

    assert_eq!(cart.state(), before);
}
