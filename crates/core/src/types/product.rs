//! Product catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId};
use super::price::PriceTag;

// =============================================================================
// Image Types
// =============================================================================

/// Product or color-variant image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    /// Image URL.
    pub url: String,
    /// Whether this is the main (cover) image.
    #[serde(default)]
    pub is_main: bool,
    /// Alt text for accessibility.
    #[serde(default)]
    pub alt_text: Option<String>,
}

/// An image that can carry the "main" flag.
pub trait MainFlag {
    /// Whether this image is flagged main.
    fn is_main(&self) -> bool;
    /// Set or clear the main flag.
    fn set_main(&mut self, is_main: bool);
}

impl MainFlag for ProductImage {
    fn is_main(&self) -> bool {
        self.is_main
    }

    fn set_main(&mut self, is_main: bool) {
        self.is_main = is_main;
    }
}

/// Flag exactly one image as main whenever any images exist.
///
/// The first image already flagged main keeps the flag; when none is flagged
/// the first image becomes main. Returns `true` if any flag changed.
pub fn normalize_main_image<T: MainFlag>(images: &mut [T]) -> bool {
    let Some(main_index) = images
        .iter()
        .position(MainFlag::is_main)
        .or_else(|| (!images.is_empty()).then_some(0))
    else {
        return false;
    };

    let mut changed = false;
    for (index, image) in images.iter_mut().enumerate() {
        let should_be_main = index == main_index;
        if image.is_main() != should_be_main {
            image.set_main(should_be_main);
            changed = true;
        }
    }
    changed
}

// =============================================================================
// Variant Types
// =============================================================================

/// A size of a color variant with its own stock count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeVariant {
    /// Size label (e.g., "M", "42").
    pub size: String,
    /// Units in stock.
    #[serde(default)]
    pub stock: u32,
}

/// A color variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorVariant {
    /// Color name (e.g., "black").
    pub color: String,
    /// Optional hex swatch.
    #[serde(default)]
    pub color_code: Option<String>,
    /// Images for this color.
    #[serde(default)]
    pub images: Vec<ProductImage>,
    /// Available sizes.
    #[serde(default)]
    pub sizes: Vec<SizeVariant>,
}

impl ColorVariant {
    /// Total units in stock across sizes.
    #[must_use]
    pub fn total_stock(&self) -> u32 {
        self.sizes.iter().map(|s| s.stock).sum()
    }
}

// =============================================================================
// Category, Rating and Attribute Types
// =============================================================================

/// Where a product sits in the category tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPath {
    /// Top-level category (e.g., "women").
    pub category: String,
    /// Second level (e.g., "clothing").
    #[serde(default)]
    pub sub_category: Option<String>,
    /// Product type (e.g., "dresses").
    #[serde(default, rename = "type")]
    pub product_type: Option<String>,
    /// Product sub-type (e.g., "maxi").
    #[serde(default)]
    pub sub_type: Option<String>,
}

/// A category node returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Category ID.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// Child categories.
    #[serde(default)]
    pub sub_categories: Vec<Category>,
}

impl Category {
    /// Find a category by slug anywhere in this subtree.
    #[must_use]
    pub fn find(&self, slug: &str) -> Option<&Self> {
        if self.slug == slug {
            return Some(self);
        }
        self.sub_categories.iter().find_map(|child| child.find(slug))
    }
}

/// Aggregate rating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    /// Average rating on a 1-5 scale.
    pub average: f64,
    /// Number of ratings.
    pub count: u32,
}

/// A customer review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Review ID.
    pub id: String,
    /// Reviewer display name.
    pub author: String,
    /// Rating from 1 to 5.
    pub rating: u8,
    /// Review text.
    #[serde(default)]
    pub comment: Option<String>,
    /// When the review was written.
    pub created_at: DateTime<Utc>,
}

/// Free-form product attribute (e.g., "Material" = "Cotton").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAttribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// URL slug.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Brand name.
    pub brand: String,
    /// Plain text description.
    #[serde(default)]
    pub description: String,
    /// Regular price.
    pub price: Decimal,
    /// Discounted price, if any.
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    /// Category placement.
    #[serde(default)]
    pub category_path: CategoryPath,
    /// Color variants, each with its own sizes and stock.
    #[serde(default)]
    pub colors: Vec<ColorVariant>,
    /// Product-level images.
    #[serde(default)]
    pub images: Vec<ProductImage>,
    /// Aggregate rating.
    #[serde(default)]
    pub rating: Option<RatingSummary>,
    /// Reviews.
    #[serde(default)]
    pub reviews: Vec<Review>,
    /// Attribute list.
    #[serde(default)]
    pub attributes: Vec<ProductAttribute>,
    /// Newly added product.
    #[serde(default)]
    pub is_new: bool,
    /// Trending product.
    #[serde(default)]
    pub is_trending: bool,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Enforce the one-main-image rule at product level and per color.
    ///
    /// Returns `true` if any image flag changed.
    pub fn normalize_images(&mut self) -> bool {
        let mut changed = normalize_main_image(&mut self.images);
        for color in &mut self.colors {
            changed |= normalize_main_image(&mut color.images);
        }
        changed
    }

    /// The product's main image.
    #[must_use]
    pub fn main_image(&self) -> Option<&ProductImage> {
        self.images
            .iter()
            .find(|image| image.is_main)
            .or_else(|| self.images.first())
    }

    /// Price and sale price as a [`PriceTag`].
    #[must_use]
    pub const fn price_tag(&self) -> PriceTag {
        PriceTag::new(self.price, self.sale_price)
    }

    /// The price the customer pays.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        self.price_tag().effective()
    }

    /// Color variant by name.
    #[must_use]
    pub fn color(&self, color: &str) -> Option<&ColorVariant> {
        self.colors
            .iter()
            .find(|variant| variant.color.eq_ignore_ascii_case(color))
    }

    /// Stock for a specific color and size (zero if unknown).
    #[must_use]
    pub fn stock_for(&self, color: &str, size: &str) -> u32 {
        self.color(color)
            .and_then(|variant| variant.sizes.iter().find(|s| s.size == size))
            .map_or(0, |s| s.stock)
    }

    /// Whether any size of any color is in stock.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.colors.iter().any(|color| color.total_stock() > 0)
    }
}

/// A page of products as returned by the catalog endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    /// Products on this page.
    pub items: Vec<Product>,
    /// Total matching products across all pages.
    pub total_count: u32,
    /// 1-based page number.
    pub page_number: u32,
    /// Page size used by the server.
    pub page_size: u32,
}

impl ProductPage {
    /// Whether more pages follow this one.
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        u64::from(self.page_number) * u64::from(self.page_size) < u64::from(self.total_count)
    }
}
