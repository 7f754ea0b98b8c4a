//! Price arithmetic using decimal amounts.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A list price with an optional sale price.
///
/// A sale price only counts when it is strictly lower than the list price;
/// the API occasionally sends stale sale prices equal to or above the list
/// price and those are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTag {
    /// Regular price.
    pub price: Decimal,
    /// Discounted price, if any.
    pub sale_price: Option<Decimal>,
}

impl PriceTag {
    /// Create a new price tag.
    #[must_use]
    pub const fn new(price: Decimal, sale_price: Option<Decimal>) -> Self {
        Self { price, sale_price }
    }

    /// Whether a valid sale price applies.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.sale_price.is_some_and(|sale| sale < self.price)
    }

    /// The price the customer pays.
    #[must_use]
    pub fn effective(&self) -> Decimal {
        match self.sale_price {
            Some(sale) if sale < self.price => sale,
            _ => self.price,
        }
    }

    /// Discount as a whole percentage (rounded), or zero when not on sale.
    #[must_use]
    pub fn discount_percent(&self) -> u32 {
        if !self.is_on_sale() || self.price.is_zero() {
            return 0;
        }
        let ratio = (self.price - self.effective()) / self.price * Decimal::ONE_HUNDRED;
        ratio.round().to_u32().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_price_applies_when_lower() {
        let tag = PriceTag::new(Decimal::new(10000, 2), Some(Decimal::new(7500, 2)));
        assert!(tag.is_on_sale());
        assert_eq!(tag.effective(), Decimal::new(7500, 2));
        assert_eq!(tag.discount_percent(), 25);
    }

    #[test]
    fn test_stale_sale_price_ignored() {
        let tag = PriceTag::new(Decimal::new(5000, 2), Some(Decimal::new(5000, 2)));
        assert!(!tag.is_on_sale());
        assert_eq!(tag.effective(), Decimal::new(5000, 2));
        assert_eq!(tag.discount_percent(), 0);
    }

    #[test]
    fn test_no_sale_price() {
        let tag = PriceTag::new(Decimal::new(1999, 2), None);
        assert_eq!(tag.effective(), Decimal::new(1999, 2));
    }
}
