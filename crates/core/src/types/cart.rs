//! Cart types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartId, CartItemId, ProductId};

/// A line item in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Line item ID.
    pub id: CartItemId,
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Product name at the time it was added.
    pub product_name: String,
    /// Product slug for linking.
    #[serde(default)]
    pub slug: String,
    /// Selected color.
    pub color: String,
    /// Selected size.
    pub size: String,
    /// Quantity.
    pub quantity: u32,
    /// Price per unit.
    pub unit_price: Decimal,
    /// Thumbnail.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CartItem {
    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The authenticated user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Cart ID (also referenced from the user record).
    pub id: CartId,
    /// Line items.
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Request body for adding a product variant to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItem {
    pub product_id: ProductId,
    pub color: String,
    pub size: String,
    pub quantity: u32,
}

/// Request body for changing a line item quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItem {
    pub quantity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: u32, cents: i64) -> CartItem {
        CartItem {
            id: CartItemId::from("line"),
            product_id: ProductId::from("p1"),
            product_name: "Tee".to_string(),
            slug: "tee".to_string(),
            color: "red".to_string(),
            size: "M".to_string(),
            quantity,
            unit_price: Decimal::new(cents, 2),
            image_url: None,
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart {
            id: CartId::from("c1"),
            items: vec![item(2, 1050), item(1, 999)],
        };
        assert_eq!(cart.subtotal(), Decimal::new(3099, 2));
        assert_eq!(cart.item_count(), 3);
        assert!(!cart.is_empty());
    }
}
