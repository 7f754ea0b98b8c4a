//! Persisted state across facade restarts.

#![allow(clippy::unwrap_used)]

use storefront_sync_client::Storefront;
use storefront_sync_core::{ProductId, StockSubscriptionKey};
use storefront_sync_integration_tests::{Endpoint, FakeApi};

#[tokio::test]
async fn test_session_survives_restart() {
    let fake = FakeApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    {
        let storefront = Storefront::builder(fake.config())
            .with_state_path(&path)
            .build()
            .unwrap();
        storefront
            .toggle_liked_product(&ProductId::from("p1"))
            .await
            .unwrap();
        storefront
            .login(fake.login_form())
            .await
            .unwrap()
            .bootstrap
            .await
            .unwrap();
    }

    let storefront = Storefront::builder(fake.config())
        .with_state_path(&path)
        .build()
        .unwrap();
    assert!(storefront.restore_session().await.unwrap());
    assert!(storefront.api().tokens().is_authenticated());
    storefront
        .store()
        .read(|s| {
            assert_eq!(s.session.user().unwrap().email, "jane@example.com");
            assert!(s.guest_liked.is_empty());
            assert!(s.is_liked(&ProductId::from("p1")));
            assert_eq!(s.cart.as_ref().unwrap().id.as_str(), "c1");
        })
        .await;

    let orders = storefront.refresh_orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(fake.hits(Endpoint::Refresh), 0);
}

#[tokio::test]
async fn test_signed_in_toggles_survive_restart() {
    let fake = FakeApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let key: StockSubscriptionKey = "p2_red_M".parse().unwrap();

    {
        let storefront = Storefront::builder(fake.config())
            .with_state_path(&path)
            .build()
            .unwrap();
        storefront
            .login(fake.login_form())
            .await
            .unwrap()
            .bootstrap
            .await
            .unwrap();
        assert!(
            storefront
                .toggle_liked_product(&ProductId::from("p1"))
                .await
                .unwrap()
        );
        assert!(storefront.toggle_stock_subscription(&key).await.unwrap());
    }
    assert_eq!(fake.liked(), vec!["p1"]);

    let storefront = Storefront::builder(fake.config())
        .with_state_path(&path)
        .build()
        .unwrap();
    assert!(storefront.restore_session().await.unwrap());
    storefront
        .store()
        .read(|s| {
            assert!(s.is_liked(&ProductId::from("p1")));
            assert!(s.session.subscriptions().contains(&key));
        })
        .await;

    // The next toggle unlikes, matching what the server holds.
    assert!(
        !storefront
            .toggle_liked_product(&ProductId::from("p1"))
            .await
            .unwrap()
    );
    assert!(fake.liked().is_empty());
}

#[tokio::test]
async fn test_rejected_like_is_persisted_rolled_back() {
    let fake = FakeApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    {
        let storefront = Storefront::builder(fake.config())
            .with_state_path(&path)
            .build()
            .unwrap();
        storefront
            .login(fake.login_form())
            .await
            .unwrap()
            .bootstrap
            .await
            .unwrap();
        fake.fail(Endpoint::ToggleLike);
        storefront
            .toggle_liked_product(&ProductId::from("p1"))
            .await
            .unwrap_err();
    }

    let storefront = Storefront::builder(fake.config())
        .with_state_path(&path)
        .build()
        .unwrap();
    assert!(storefront.restore_session().await.unwrap());
    assert!(
        !storefront
            .store()
            .read(|s| s.is_liked(&ProductId::from("p1")))
            .await
    );
}

#[tokio::test]
async fn test_guest_state_survives_restart_without_session() {
    let fake = FakeApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");

    let first = Storefront::builder(fake.config())
        .with_state_path(&path)
        .build()
        .unwrap();
    first
        .toggle_liked_product(&ProductId::from("p4"))
        .await
        .unwrap();
    drop(first);

    let second = Storefront::builder(fake.config())
        .with_state_path(&path)
        .build()
        .unwrap();
    assert!(!second.restore_session().await.unwrap());
    assert!(
        second
            .store()
            .read(|s| s.guest_liked.contains(&ProductId::from("p4")))
            .await
    );
}

#[tokio::test]
async fn test_corrupt_state_file_is_ignored() {
    let fake = FakeApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{ not json").unwrap();

    let storefront = Storefront::builder(fake.config())
        .with_state_path(&path)
        .build()
        .unwrap();

    assert!(!storefront.restore_session().await.unwrap());
    assert!(!storefront.store().read(|s| s.session.is_authenticated()).await);
}
