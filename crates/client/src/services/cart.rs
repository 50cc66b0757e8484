//! Cart session state.
//!
//! The backend owns the cart. Every successful mutation replaces the local
//! copy with the cart returned by the server and recomputes the item count
//! from it; a failed mutation leaves local state exactly as it was.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use renomarket_core::ProductId;

use crate::api::{ApiClient, ApiError, ApiResponse, endpoints};
use crate::models::Cart;

/// Observable cart state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartState {
    /// Last cart received from the backend.
    pub cart: Option<Cart>,
    /// Sum of line quantities in `cart`.
    pub item_count: u32,
    /// A cart request is in flight.
    pub is_loading: bool,
    /// Whether the cart drawer is shown.
    pub is_cart_open: bool,
}

/// Cart service.
#[derive(Clone)]
pub struct CartService {
    inner: Arc<CartInner>,
}

struct CartInner {
    api: ApiClient,
    state: watch::Sender<CartState>,
}

impl std::fmt::Debug for CartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddItem<'a> {
    product_id: &'a str,
    quantity: u32,
}

#[derive(Serialize)]
struct SetQuantity {
    quantity: u32,
}

impl CartService {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(CartState::default());
        Self {
            inner: Arc::new(CartInner { api, state }),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn cart(&self) -> Option<Cart> {
        self.inner.state.borrow().cart.clone()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.inner.state.borrow().item_count
    }

    // =========================================================================
    // Backend Operations
    // =========================================================================

    /// Load the cart once at startup, only if a session token is stored.
    ///
    /// Returns whether a cart was loaded.
    pub async fn mount(&self) -> bool {
        if !self.inner.api.has_token() {
            debug!("No session, skipping cart load");
            return false;
        }
        self.refresh_cart().await
    }

    /// Refetch the cart.
    #[instrument(skip(self))]
    pub async fn refresh_cart(&self) -> bool {
        let api = &self.inner.api;
        self.apply("refresh", false, api.get(endpoints::CART)).await
    }

    /// Add units of a product and open the cart on success.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_to_cart(&self, product_id: &ProductId, quantity: u32) -> bool {
        let body = AddItem {
            product_id: product_id.as_str(),
            quantity,
        };
        let api = &self.inner.api;
        self.apply("add", true, api.post(endpoints::CART, &body))
            .await
    }

    /// Set a line's quantity. A quantity of zero removes the line.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_quantity(&self, product_id: &ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove_from_cart(product_id).await;
        }

        let endpoint = endpoints::cart_item(product_id);
        let api = &self.inner.api;
        self.apply(
            "update",
            false,
            api.put(&endpoint, &SetQuantity { quantity }),
        )
        .await
    }

    /// Remove a product's line.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_cart(&self, product_id: &ProductId) -> bool {
        let endpoint = endpoints::cart_item(product_id);
        let api = &self.inner.api;
        self.apply("remove", false, api.delete(&endpoint)).await
    }

    /// Empty the cart.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> bool {
        let api = &self.inner.api;
        self.apply("clear", false, api.delete(endpoints::CART)).await
    }

    // =========================================================================
    // Local State
    // =========================================================================

    pub fn open_cart(&self) {
        self.set_open(true);
    }

    pub fn close_cart(&self) {
        self.set_open(false);
    }

    pub fn toggle_cart(&self) {
        self.inner
            .state
            .send_modify(|state| state.is_cart_open = !state.is_cart_open);
    }

    /// Forget the local cart, e.g. after logout.
    pub fn reset(&self) {
        self.inner.state.send_replace(CartState::default());
    }

    fn set_open(&self, open: bool) {
        self.inner.state.send_if_modified(|state| {
            let changed = state.is_cart_open != open;
            state.is_cart_open = open;
            changed
        });
    }

    /// Run a cart request with the loading flag raised, then adopt the
    /// returned cart if the backend reported success.
    async fn apply<F>(&self, operation: &'static str, open_on_success: bool, request: F) -> bool
    where
        F: Future<Output = Result<ApiResponse<Cart>, ApiError>>,
    {
        self.inner.state.send_modify(|state| state.is_loading = true);

        let cart = match request.await {
            Ok(response) if response.success => response.data,
            Ok(response) => {
                warn!(operation, message = ?response.message, "Cart request rejected");
                None
            }
            Err(e) => {
                warn!(operation, error = %e, "Cart request failed");
                None
            }
        };

        let updated = cart.is_some();
        self.inner.state.send_modify(|state| {
            state.is_loading = false;
            if let Some(cart) = cart {
                state.item_count = cart.item_count();
                state.cart = Some(cart);
                if open_on_success {
                    state.is_cart_open = true;
                }
            }
        });

        if updated {
            debug!(operation, item_count = self.item_count(), "Cart updated");
        }
        updated
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::MemoryTokenStore;
    use crate::config::ClientConfig;

    fn service(store: MemoryTokenStore) -> CartService {
        let config = ClientConfig::for_api_url("http://127.0.0.1:9/api").unwrap();
        CartService::new(ApiClient::new(config, Arc::new(store)).unwrap())
    }

    #[test]
    fn test_open_close_toggle() {
        let cart = service(MemoryTokenStore::new());
        assert!(!cart.state().is_cart_open);

        cart.open_cart();
        assert!(cart.state().is_cart_open);
        cart.toggle_cart();
        assert!(!cart.state().is_cart_open);
        cart.toggle_cart();
        cart.close_cart();
        assert!(!cart.state().is_cart_open);
    }

    #[tokio::test]
    async fn test_mount_without_token_is_noop() {
        let cart = service(MemoryTokenStore::new());
        assert!(!cart.mount().await);
        assert_eq!(cart.state(), CartState::default());
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_state_untouched() {
        let cart = service(MemoryTokenStore::with_tokens("access", None));
        cart.inner.state.send_modify(|state| {
            state.cart = Some(Cart::default());
            state.is_cart_open = false;
        });
        let before = cart.state();

        assert!(!cart.add_to_cart(&ProductId::new("p1"), 1).await);
        assert!(!cart.update_quantity(&ProductId::new("p1"), 2).await);
        assert!(!cart.remove_from_cart(&ProductId::new("p1")).await);

        assert_eq!(cart.state(), before);
        assert!(!cart.state().is_loading);
    }

    #[test]
    fn test_reset_drops_everything() {
        let cart = service(MemoryTokenStore::new());
        cart.inner.state.send_modify(|state| {
            state.cart = Some(Cart::default());
            state.item_count = 4;
            state.is_cart_open = true;
        });
        cart.reset();
        assert_eq!(cart.state(), CartState::default());
    }

    #[test]
    fn test_add_item_body_shape() {
        let body = AddItem {
            product_id: "p1",
            quantity: 2,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"productId": "p1", "quantity": 2})
        );
    }
}
