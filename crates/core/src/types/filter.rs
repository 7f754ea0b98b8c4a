//! Product filter and query-string mapping.
//!
//! The filter is a flat record of optional fields. It is serialized to URL
//! query parameters for deep links and sent as-is to the catalog endpoint.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Default number of products per page.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Sort order for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
    Popularity,
}

impl SortKey {
    /// Query-string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Rating => "rating",
            Self::Popularity => "popularity",
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "rating" => Ok(Self::Rating),
            "popularity" => Ok(Self::Popularity),
            _ => Err(format!("invalid sort key: {s}")),
        }
    }
}

/// Catalog filter and pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub product_type: Option<String>,
    pub sub_type: Option<String>,
    pub brand: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort_by: Option<SortKey>,
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
    pub is_new: Option<bool>,
    pub is_trending: Option<bool>,
    pub is_on_sale: Option<bool>,
}

impl ProductFilter {
    /// Effective page number (1-based, defaults to 1).
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page_number.unwrap_or(1).max(1)
    }

    /// Effective page size.
    #[must_use]
    pub fn size_per_page(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    /// The same filter with pagination removed.
    #[must_use]
    pub fn without_pagination(&self) -> Self {
        Self {
            page_number: None,
            page_size: None,
            ..self.clone()
        }
    }

    /// Serialized selection (everything except pagination).
    ///
    /// Two filters select the same product set exactly when their selection
    /// keys are equal.
    #[must_use]
    pub fn selection_key(&self) -> String {
        self.without_pagination().to_query_string()
    }

    /// Query parameters as `(key, value)` pairs in a fixed order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(value) = value
                && !value.is_empty()
            {
                pairs.push((key, value));
            }
        };

        push("search", self.search.clone());
        push("category", self.category.clone());
        push("subCategory", self.sub_category.clone());
        push("type", self.product_type.clone());
        push("subType", self.sub_type.clone());
        push("brand", self.brand.clone());
        push("color", self.color.clone());
        push("size", self.size.clone());
        push("minPrice", self.min_price.map(|p| p.normalize().to_string()));
        push("maxPrice", self.max_price.map(|p| p.normalize().to_string()));
        push("sortBy", self.sort_by.map(|s| s.as_str().to_string()));
        push("pageNumber", self.page_number.map(|n| n.to_string()));
        push("pageSize", self.page_size.map(|n| n.to_string()));
        push("isNew", self.is_new.map(|b| b.to_string()));
        push("isTrending", self.is_trending.map(|b| b.to_string()));
        push("isOnSale", self.is_on_sale.map(|b| b.to_string()));
        pairs
    }

    /// Serialize to a URL query string (without the leading `?`).
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.to_pairs() {
            serializer.append_pair(key, &value);
        }
        serializer.finish()
    }

    /// Parse a URL query string. A leading `?` is accepted.
    ///
    /// Unknown keys are ignored and values that fail to parse are dropped,
    /// so a hand-edited URL never prevents the page from loading.
    #[must_use]
    pub fn from_query_string(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut filter = Self::default();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let text = Some(value.to_string());
            match key.as_ref() {
                "search" => filter.search = text,
                "category" => filter.category = text,
                "subCategory" => filter.sub_category = text,
                "type" => filter.product_type = text,
                "subType" => filter.sub_type = text,
                "brand" => filter.brand = text,
                "color" => filter.color = text,
                "size" => filter.size = text,
                "minPrice" => filter.min_price = value.parse().ok(),
                "maxPrice" => filter.max_price = value.parse().ok(),
                "sortBy" => filter.sort_by = value.parse().ok(),
                "pageNumber" => filter.page_number = value.parse().ok().filter(|n| *n > 0),
                "pageSize" => filter.page_size = value.parse().ok().filter(|n| *n > 0),
                "isNew" => filter.is_new = value.parse().ok(),
                "isTrending" => filter.is_trending = value.parse().ok(),
                "isOnSale" => filter.is_on_sale = value.parse().ok(),
                _ => {}
            }
        }

        filter
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_roundtrip_preserves_fields() {
        let filter = ProductFilter {
            category: Some("women".to_string()),
            brand: Some("Acme & Co".to_string()),
            min_price: Some(Decimal::new(1000, 2)),
            sort_by: Some(SortKey::PriceDesc),
            page_number: Some(3),
            is_new: Some(true),
            ..ProductFilter::default()
        };

        let query = filter.to_query_string();
        assert!(query.contains("brand=Acme+%26+Co"));
        assert!(query.contains("minPrice=10"));
        assert_eq!(ProductFilter::from_query_string(&query), ProductFilter {
            min_price: Some(Decimal::new(10, 0)),
            ..filter
        });
    }

    #[test]
    fn test_from_query_string_ignores_garbage() {
        let filter =
            ProductFilter::from_query_string("?category=men&pageNumber=abc&sortBy=bogus&foo=bar&size=");
        assert_eq!(filter.category.as_deref(), Some("men"));
        assert_eq!(filter.page_number, None);
        assert_eq!(filter.sort_by, None);
        assert_eq!(filter.size, None);
    }

    #[test]
    fn test_selection_key_ignores_pagination() {
        let first = ProductFilter {
            category: Some("kids".to_string()),
            page_number: Some(1),
            ..ProductFilter::default()
        };
        let second = ProductFilter {
            page_number: Some(4),
            page_size: Some(24),
            ..first.clone()
        };
        assert_eq!(first.selection_key(), second.selection_key());
    }

    #[test]
    fn test_page_defaults() {
        let filter = ProductFilter::default();
        assert_eq!(filter.page(), 1);
        assert_eq!(filter.size_per_page(), DEFAULT_PAGE_SIZE);
    }
}
