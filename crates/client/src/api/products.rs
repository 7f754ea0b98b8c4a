//! Catalog endpoints.

use serde::Serialize;
use storefront_sync_core::{
    Category, ColorDraft, ImageUpload, Product, ProductDraft, ProductFilter, ProductId,
    ProductPage, SizeVariant,
};
use tracing::instrument;

use super::{ApiClient, FormPart, RequestSpec, Tag};
use crate::error::ApiError;

impl ApiClient {
    /// List products matching a filter.
    ///
    /// # Errors
    ///
    /// Returns the API error (shared with concurrent identical queries).
    #[instrument(skip(self, filter), fields(query = %filter.to_query_string()))]
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, ApiError> {
        let spec = RequestSpec::get("products").query(filter.to_pairs());
        self.query(Tag::Products, "products", filter, spec).await
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` (possibly wrapped in `Shared`) if no
    /// product has this slug.
    #[instrument(skip(self))]
    pub async fn get_product(&self, slug: &str) -> Result<Product, ApiError> {
        let spec = RequestSpec::get("products").segment(slug);
        self.query(Tag::Products, "product", &slug, spec).await
    }

    /// The category tree.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let spec = RequestSpec::get("products/categories");
        self.query(Tag::Categories, "categories", &(), spec).await
    }

    /// Create a product from an editor draft.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the draft is invalid, otherwise the
    /// API error.
    #[instrument(skip(self, draft), fields(slug = %draft.slug))]
    pub async fn create_product(&self, draft: &ProductDraft) -> Result<Product, ApiError> {
        draft.validate()?;
        let spec = RequestSpec::post("products").multipart(draft_form(draft)?);
        let product = self.request(&spec).await?;
        self.cache().invalidate(Tag::Products);
        Ok(product)
    }

    /// Replace a product with an editor draft.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the draft is invalid, otherwise the
    /// API error.
    #[instrument(skip(self, draft), fields(slug = %draft.slug))]
    pub async fn update_product(
        &self,
        id: &ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, ApiError> {
        draft.validate()?;
        let spec = RequestSpec::put("products")
            .segment(id.as_str())
            .multipart(draft_form(draft)?);
        let product = self.request(&spec).await?;
        self.cache().invalidate(Tag::Products);
        Ok(product)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), ApiError> {
        self.execute(&RequestSpec::delete("products").segment(id.as_str()))
            .await?;
        self.cache().invalidate(Tag::Products);
        Ok(())
    }
}

/// Color metadata sent alongside the uploaded color images.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ColorMeta<'a> {
    color: &'a str,
    color_code: Option<&'a str>,
    sizes: &'a [SizeVariant],
    image_count: usize,
    main_image_index: Option<usize>,
}

impl<'a> From<&'a ColorDraft> for ColorMeta<'a> {
    fn from(color: &'a ColorDraft) -> Self {
        Self {
            color: &color.color,
            color_code: color.color_code.as_deref(),
            sizes: &color.sizes,
            image_count: color.images.len(),
            main_image_index: color.images.iter().position(|i| i.is_main),
        }
    }
}

fn file_part(name: String, image: &ImageUpload) -> FormPart {
    FormPart::File {
        name,
        file_name: image.file_name.clone(),
        content_type: image.content_type.clone(),
        bytes: image.bytes.clone(),
    }
}

/// Encode a draft as multipart fields.
///
/// Images are normalized so exactly one is main per group before encoding.
fn draft_form(draft: &ProductDraft) -> Result<Vec<FormPart>, ApiError> {
    let mut draft = draft.clone();
    draft.normalize_images();

    let mut parts = vec![
        FormPart::text("name", draft.name.trim()),
        FormPart::text("slug", draft.slug.as_str()),
        FormPart::text("brand", draft.brand.trim()),
        FormPart::text("description", draft.description.as_str()),
        FormPart::text("price", draft.price.normalize().to_string()),
        FormPart::text("categoryPath", serde_json::to_string(&draft.category_path)?),
        FormPart::text("attributes", serde_json::to_string(&draft.attributes)?),
        FormPart::text("isNew", draft.is_new.to_string()),
        FormPart::text("isTrending", draft.is_trending.to_string()),
    ];
    if let Some(sale) = draft.sale_price {
        parts.push(FormPart::text("salePrice", sale.normalize().to_string()));
    }

    let colors: Vec<ColorMeta<'_>> = draft.colors.iter().map(ColorMeta::from).collect();
    parts.push(FormPart::text("colors", serde_json::to_string(&colors)?));

    if let Some(main) = draft.images.iter().position(|i| i.is_main) {
        parts.push(FormPart::text("mainImageIndex", main.to_string()));
    }
    for image in &draft.images {
        parts.push(file_part("images".to_string(), image));
    }
    for (index, color) in draft.colors.iter().enumerate() {
        for image in &color.images {
            parts.push(file_part(format!("colorImages[{index}]"), image));
        }
    }

    Ok(parts)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use storefront_sync_core::CategoryPath;

    use super::*;

    fn upload(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, 0x50],
            is_main: false,
        }
    }

    fn text_value<'a>(parts: &'a [FormPart], field: &str) -> Option<&'a str> {
        parts.iter().find_map(|part| match part {
            FormPart::Text { name, value } if name == field => Some(value.as_str()),
            _ => None,
        })
    }

    #[test]
    fn test_draft_form_encodes_fields_and_files() {
        let draft = ProductDraft {
            name: "Wool Coat".to_string(),
            slug: "wool-coat".to_string(),
            brand: "Acme".to_string(),
            price: Decimal::new(19900, 2),
            sale_price: Some(Decimal::new(14900, 2)),
            category_path: CategoryPath {
                category: "women".to_string(),
                ..CategoryPath::default()
            },
            colors: vec![ColorDraft {
                color: "camel".to_string(),
                sizes: vec![SizeVariant {
                    size: "S".to_string(),
                    stock: 1,
                }],
                images: vec![upload("c1.png"), upload("c2.png")],
                ..ColorDraft::default()
            }],
            images: vec![upload("a.png"), upload("b.png")],
            ..ProductDraft::default()
        };

        let parts = draft_form(&draft).unwrap();
        assert_eq!(text_value(&parts, "price"), Some("199"));
        assert_eq!(text_value(&parts, "salePrice"), Some("149"));
        assert_eq!(text_value(&parts, "mainImageIndex"), Some("0"));

        let colors: serde_json::Value =
            serde_json::from_str(text_value(&parts, "colors").unwrap()).unwrap();
        assert_eq!(colors[0]["mainImageIndex"], 0);
        assert_eq!(colors[0]["imageCount"], 2);

        let files = parts
            .iter()
            .filter(|p| matches!(p, FormPart::File { .. }))
            .count();
        assert_eq!(files, 4);
    }
}
