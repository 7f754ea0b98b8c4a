//! Print live notifications until interrupted.

use storefront_sync_client::ConnectionState;

use super::{CliError, connect};

/// Connect to the hub and print each new notification until Ctrl+C.
#[allow(clippy::print_stdout)]
pub async fn run(order: Option<String>) -> Result<(), CliError> {
    let storefront = connect(true).await?;
    let Some(live) = storefront.start_notifications() else {
        return Err(CliError::InvalidArgument("notification hub is not enabled".to_string()));
    };
    let Some(hub) = storefront.hub() else {
        return Err(CliError::InvalidArgument("notification hub is not enabled".to_string()));
    };

    if let Some(order) = order {
        hub.subscribe_order(&order).await?;
        tracing::info!(%order, "Following order updates");
    }

    let mut state = hub.watch_state();
    let mut changes = storefront.store().subscribe();
    let mut printed = storefront
        .store()
        .read(|s| s.notifications.iter().next().map(|n| n.id.clone()))
        .await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            Ok(()) = state.changed() => {
                let current = *state.borrow_and_update();
                if current == ConnectionState::Disconnected {
                    tracing::warn!("Hub disconnected");
                }
            }
            Ok(()) = changes.changed() => {
                changes.borrow_and_update();
                let fresh = storefront
                    .store()
                    .read(|s| {
                        s.notifications
                            .iter()
                            .take_while(|n| Some(&n.id) != printed.as_ref())
                            .cloned()
                            .collect::<Vec<_>>()
                    })
                    .await;
                for notification in fresh.iter().rev() {
                    println!(
                        "[{}] {}: {}",
                        notification.created_at.format("%H:%M:%S"),
                        notification.title,
                        notification.message
                    );
                }
                if let Some(newest) = fresh.first() {
                    printed = Some(newest.id.clone());
                }
            }
        }
    }

    live.stop().await;
    Ok(())
}
