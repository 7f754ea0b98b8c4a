//! User profile and stock-subscription types.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::id::{CartId, ProductId, UserId};

/// Role name granted to store administrators.
pub const ADMIN_ROLE: &str = "admin";

/// The signed-in user as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Last name.
    #[serde(default)]
    pub last_name: String,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Avatar image URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// The user's cart, once one exists.
    #[serde(default)]
    pub cart_id: Option<CartId>,
    /// Role names.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Permission names.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Liked product IDs.
    #[serde(default)]
    pub liked_product_ids: Vec<ProductId>,
    /// Back-in-stock subscriptions.
    #[serde(default)]
    pub stock_subscriptions: Vec<StockSubscriptionKey>,
}

impl User {
    /// Full name, falling back to the email address.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }

    /// Whether the user has the given role (case-insensitive).
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    /// Whether the user has the given permission.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Whether the user may use the product editor.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

// =============================================================================
// Stock Subscription Key
// =============================================================================

/// Errors that can occur when parsing a [`StockSubscriptionKey`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StockSubscriptionKeyError {
    /// The key does not have three `_`-separated parts.
    #[error("stock subscription key must look like productId_color_size, got {0:?}")]
    Malformed(String),
}

/// Identifies a back-in-stock subscription for one product variant.
///
/// Serialized as `productId_color_size`. Product IDs never contain `_`, so
/// the key splits on the first two underscores and the size keeps any rest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StockSubscriptionKey {
    pub product_id: ProductId,
    pub color: String,
    pub size: String,
}

impl StockSubscriptionKey {
    /// Create a new key.
    #[must_use]
    pub fn new(product_id: ProductId, color: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            product_id,
            color: color.into(),
            size: size.into(),
        }
    }
}

impl fmt::Display for StockSubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.product_id, self.color, self.size)
    }
}

impl FromStr for StockSubscriptionKey {
    type Err = StockSubscriptionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(product), Some(color), Some(size))
                if !product.is_empty() && !color.is_empty() && !size.is_empty() =>
            {
                Ok(Self::new(ProductId::from(product), color, size))
            }
            _ => Err(StockSubscriptionKeyError::Malformed(s.to_string())),
        }
    }
}

impl Serialize for StockSubscriptionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StockSubscriptionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_key_format() {
        let key = StockSubscriptionKey::new(ProductId::from("p9"), "navy", "XL");
        assert_eq!(key.to_string(), "p9_navy_XL");
        assert_eq!("p9_navy_XL".parse::<StockSubscriptionKey>().unwrap(), key);
    }

    #[test]
    fn test_stock_key_size_keeps_rest() {
        let key: StockSubscriptionKey = "p1_black_EU_42".parse().unwrap();
        assert_eq!(key.color, "black");
        assert_eq!(key.size, "EU_42");
    }

    #[test]
    fn test_stock_key_rejects_malformed() {
        assert!("p1_black".parse::<StockSubscriptionKey>().is_err());
        assert!("__M".parse::<StockSubscriptionKey>().is_err());
    }

    #[test]
    fn test_user_deserializes_with_subscriptions() {
        let json = r#"{
            "id": "u1",
            "email": "ada@example.com",
            "firstName": "Ada",
            "cartId": "c1",
            "roles": ["Admin"],
            "likedProductIds": ["p2", "p3"],
            "stockSubscriptions": ["p2_red_S"]
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.display_name(), "Ada");
        assert!(user.is_admin());
        assert_eq!(user.cart_id, Some(CartId::from("c1")));
        assert_eq!(user.stock_subscriptions[0].size, "S");
    }
}
