//! Profile edits keep the liked set and are validated before sending.

#![allow(clippy::unwrap_used)]

use storefront_sync_client::{ApiError, Storefront};
use storefront_sync_core::{ProductId, ProfileUpdate};
use storefront_sync_integration_tests::{Endpoint, FakeApi};

fn update(first_name: &str) -> ProfileUpdate {
    ProfileUpdate {
        first_name: first_name.to_string(),
        last_name: "Doe".to_string(),
        phone: None,
    }
}

#[tokio::test]
async fn test_profile_update_keeps_liked_products() {
    let fake = FakeApi::start().await;
    fake.set_liked(&["p1"]);
    let storefront = Storefront::builder(fake.config()).build().unwrap();
    storefront
        .login(fake.login_form())
        .await
        .unwrap()
        .bootstrap
        .await
        .unwrap();
    storefront
        .toggle_liked_product(&ProductId::from("p2"))
        .await
        .unwrap();

    let user = storefront.update_profile(&update("Janet")).await.unwrap();
    assert_eq!(user.first_name, "Janet");

    storefront
        .store()
        .read(|s| {
            assert_eq!(s.session.user().unwrap().first_name, "Janet");
            assert_eq!(
                s.liked_products(),
                vec![ProductId::from("p1"), ProductId::from("p2")]
            );
        })
        .await;
}

#[tokio::test]
async fn test_invalid_profile_is_not_sent() {
    let fake = FakeApi::start().await;
    let storefront = Storefront::builder(fake.config()).build().unwrap();
    storefront
        .login(fake.login_form())
        .await
        .unwrap()
        .bootstrap
        .await
        .unwrap();

    let err = storefront.update_profile(&update("  ")).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
    assert_eq!(fake.hits(Endpoint::UpdateProfile), 0);
    storefront
        .store()
        .read(|s| assert_eq!(s.session.user().unwrap().first_name, "Jane"))
        .await;
}
