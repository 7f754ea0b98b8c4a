//! Query de-duplication and tag invalidation.

#![allow(clippy::unwrap_used)]

use storefront_sync_client::ApiClient;
use storefront_sync_core::{AddCartItem, ProductFilter};
use storefront_sync_integration_tests::{CATALOG_SIZE, Endpoint, FakeApi};

#[tokio::test]
async fn test_identical_queries_share_one_request() {
    let fake = FakeApi::start().await;
    let api = ApiClient::new(&fake.config()).unwrap();
    let filter = ProductFilter {
        brand: Some("Acme".to_string()),
        ..ProductFilter::default()
    };

    let (first, second) = tokio::join!(api.list_products(&filter), api.list_products(&filter));
    let first = first.unwrap();

    assert_eq!(first, second.unwrap());
    assert_eq!(first.total_count as usize, CATALOG_SIZE / 2);
    assert_eq!(fake.hits(Endpoint::Products), 1);

    api.list_products(&filter).await.unwrap();
    assert_eq!(fake.hits(Endpoint::Products), 1);
}

#[tokio::test]
async fn test_distinct_filters_are_fetched_separately() {
    let fake = FakeApi::start().await;
    let api = ApiClient::new(&fake.config()).unwrap();
    let page_one = ProductFilter::default();
    let page_two = ProductFilter {
        page_number: Some(2),
        ..ProductFilter::default()
    };

    let (first, second) = tokio::join!(
        api.list_products(&page_one),
        api.list_products(&page_two)
    );

    assert_eq!(first.unwrap().page_number, 1);
    assert_eq!(second.unwrap().page_number, 2);
    assert_eq!(fake.hits(Endpoint::Products), 2);
}

#[tokio::test]
async fn test_failed_query_is_not_cached() {
    let fake = FakeApi::start().await;
    let api = ApiClient::new(&fake.config()).unwrap();
    fake.fail(Endpoint::Categories);

    assert!(api.categories().await.is_err());

    fake.recover(Endpoint::Categories);
    let categories = api.categories().await.unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(fake.hits(Endpoint::Categories), 2);
}

#[tokio::test]
async fn test_cart_mutation_invalidates_cached_cart() {
    let fake = FakeApi::start().await;
    let api = ApiClient::new(&fake.config()).unwrap();
    api.login(&fake.login_form()).await.unwrap();

    assert!(api.cart().await.unwrap().is_empty());
    api.cart().await.unwrap();
    assert_eq!(fake.hits(Endpoint::Cart), 1);

    let updated = api
        .add_cart_item(&AddCartItem {
            product_id: "p3".into(),
            color: "red".to_string(),
            size: "M".to_string(),
            quantity: 2,
        })
        .await
        .unwrap();
    assert_eq!(updated.item_count(), 2);

    let cart = api.cart().await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(fake.hits(Endpoint::Cart), 2);
}
