//! Shopping cart as returned by `/cart`.
//!
//! The backend is the source of truth: every mutation returns the complete
//! cart, and `total_amount` is always the server's figure.

use serde::{Deserialize, Serialize};

use renomarket_core::{Money, ProductId};

/// The authenticated user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Lines, one per product.
    #[serde(default)]
    pub items: Vec<CartItem>,
    /// Server-computed total.
    #[serde(default)]
    pub total_amount: Money,
}

impl Cart {
    /// Total number of units across all lines, saturating at `u32::MAX`.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .map(|item| item.quantity)
            .fold(0, u32::saturating_add)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Line for a product, if present.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product.id == product_id)
    }
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Populated product summary.
    pub product: CartProduct,
    /// Units ordered.
    pub quantity: u32,
    /// Line price as computed by the backend.
    pub price: Money,
}

/// Product fields populated into cart lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProduct {
    #[serde(rename = "_id")]
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
    /// Current unit price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_item_count_sums_quantities() {
        let cart: Cart = serde_json::from_value(serde_json::json!({
            "items": [
                {"product": {"_id": "p1"}, "quantity": 2, "price": 20},
                {"product": {"_id": "p2", "name": "Robinet"}, "quantity": 5, "price": 75}
            ],
            "totalAmount": 95
        }))
        .unwrap();

        assert_eq!(cart.item_count(), 7);
        assert_eq!(cart.total_amount, Money::from(95));
        assert_eq!(
            cart.line(&ProductId::new("p2")).unwrap().product.name,
            "Robinet"
        );
        assert!(cart.line(&ProductId::new("p3")).is_none());
    }

    #[test]
    fn test_item_count_saturates_on_huge_quantities() {
        let cart: Cart = serde_json::from_value(serde_json::json!({
            "items": [
                {"product": {"_id": "p1"}, "quantity": u32::MAX, "price": 1},
                {"product": {"_id": "p2"}, "quantity": 1, "price": 1}
            ],
            "totalAmount": 0
        }))
        .unwrap();

        assert_eq!(cart.item_count(), u32::MAX);
    }

    #[test]
    fn test_empty_cart_defaults() {
        let cart: Cart = serde_json::from_str("{}").unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.total_amount, Money::ZERO);
    }
}
