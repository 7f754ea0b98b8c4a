//! Guest likes, the one-time merge on login and optimistic rollback.

#![allow(clippy::unwrap_used)]

use storefront_sync_client::{ApiError, Storefront};
use storefront_sync_core::{ProductId, StockSubscriptionKey};
use storefront_sync_integration_tests::{Endpoint, FakeApi};

fn id(value: &str) -> ProductId {
    ProductId::from(value)
}

#[tokio::test]
async fn test_guest_likes_merge_once_on_login() {
    let fake = FakeApi::start().await;
    fake.set_liked(&["p3"]);
    let storefront = Storefront::builder(fake.config()).build().unwrap();

    assert!(storefront.toggle_liked_product(&id("p1")).await.unwrap());
    assert!(storefront.toggle_liked_product(&id("p2")).await.unwrap());
    assert_eq!(fake.hits(Endpoint::ToggleLike), 0);

    let session = storefront.login(fake.login_form()).await.unwrap();
    session.bootstrap.await.unwrap();

    storefront
        .store()
        .read(|s| {
            assert!(s.guest_liked.is_empty());
            assert_eq!(s.liked_products(), vec![id("p1"), id("p2"), id("p3")]);
        })
        .await;
    assert_eq!(
        fake.replaced_liked(),
        Some(vec!["p1".to_string(), "p2".to_string(), "p3".to_string()])
    );
    assert_eq!(fake.hits(Endpoint::ReplaceLiked), 1);

    storefront.logout().await;
    storefront
        .login(fake.login_form())
        .await
        .unwrap()
        .bootstrap
        .await
        .unwrap();
    assert_eq!(fake.hits(Endpoint::ReplaceLiked), 1);
    assert_eq!(fake.liked(), vec!["p1", "p2", "p3"]);
}

#[tokio::test]
async fn test_rejected_like_rolls_back() {
    let fake = FakeApi::start().await;
    let storefront = Storefront::builder(fake.config()).build().unwrap();
    storefront
        .login(fake.login_form())
        .await
        .unwrap()
        .bootstrap
        .await
        .unwrap();

    fake.fail(Endpoint::ToggleLike);
    assert!(storefront.toggle_liked_product(&id("p5")).await.is_err());
    assert!(!storefront.store().read(|s| s.is_liked(&id("p5"))).await);

    fake.recover(Endpoint::ToggleLike);
    assert!(storefront.toggle_liked_product(&id("p5")).await.unwrap());
    assert!(storefront.store().read(|s| s.is_liked(&id("p5"))).await);
    assert_eq!(fake.liked(), vec!["p5"]);
}

#[tokio::test]
async fn test_stock_subscription_requires_sign_in() {
    let fake = FakeApi::start().await;
    let storefront = Storefront::builder(fake.config()).build().unwrap();
    let key = StockSubscriptionKey::new(id("p2"), "red", "M");

    let err = storefront.toggle_stock_subscription(&key).await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(fake.hits(Endpoint::ToggleStockSubscription), 0);
}

#[tokio::test]
async fn test_stock_subscription_toggles_when_signed_in() {
    let fake = FakeApi::start().await;
    let storefront = Storefront::builder(fake.config()).build().unwrap();
    storefront
        .login(fake.login_form())
        .await
        .unwrap()
        .bootstrap
        .await
        .unwrap();
    let key = StockSubscriptionKey::new(id("p2"), "red", "M");

    assert!(storefront.toggle_stock_subscription(&key).await.unwrap());
    assert!(
        storefront
            .store()
            .read(|s| s.session.subscriptions().contains(&key))
            .await
    );
    assert_eq!(fake.hits(Endpoint::ToggleStockSubscription), 1);
}

#[tokio::test]
async fn test_ids_with_reserved_characters_reach_the_server_intact() {
    let fake = FakeApi::start().await;
    let storefront = Storefront::builder(fake.config()).build().unwrap();
    storefront
        .login(fake.login_form())
        .await
        .unwrap()
        .bootstrap
        .await
        .unwrap();

    assert!(
        storefront
            .toggle_liked_product(&id("linen shirt/xl?v=2"))
            .await
            .unwrap()
    );
    assert_eq!(fake.liked(), vec!["linen shirt/xl?v=2"]);
}
