//! Notification feed and the live-update pump from the hub.

use chrono::Utc;
use storefront_sync_core::NotificationId;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Storefront;
use crate::realtime::HubGuard;

/// Running hub connection plus the task that feeds push events into the
/// notification feed. Both stop when this is dropped.
#[must_use = "live updates stop when this is dropped"]
#[derive(Debug)]
pub struct LiveUpdates {
    guard: Option<HubGuard>,
    pump: JoinHandle<()>,
}

impl LiveUpdates {
    /// Stop the pump and close the hub connection.
    pub async fn stop(mut self) {
        self.pump.abort();
        if let Some(guard) = self.guard.take() {
            guard.stop().await;
        }
    }
}

impl Drop for LiveUpdates {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl Storefront {
    /// Connect to the hub and start feeding push events into the
    /// notification feed. Returns `None` when the hub is not enabled.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start_notifications(&self) -> Option<LiveUpdates> {
        let hub = self.inner.hub.as_ref()?;
        let mut events = hub.subscribe_events();
        let guard = hub.start();
        let this = self.clone();

        let pump = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Notification pump lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let notification = event.into_notification(Utc::now());
                let added = this
                    .inner
                    .store
                    .update(|s| s.notifications.push(notification))
                    .await;
                if added {
                    this.persist().await;
                }
            }
            debug!("Notification pump stopped");
        });

        Some(LiveUpdates {
            guard: Some(guard),
            pump,
        })
    }

    /// Mark one notification read. Returns whether it was unread.
    pub async fn mark_notification_read(&self, id: &NotificationId) -> bool {
        let changed = self
            .inner
            .store
            .update(|s| s.notifications.mark_read(id))
            .await;
        if changed {
            self.persist().await;
        }
        changed
    }

    /// Mark every notification read.
    pub async fn mark_all_notifications_read(&self) {
        self.inner
            .store
            .update(|s| s.notifications.mark_all_read())
            .await;
        self.persist().await;
    }

    /// Remove one notification. Returns whether it existed.
    pub async fn remove_notification(&self, id: &NotificationId) -> bool {
        let removed = self
            .inner
            .store
            .update(|s| s.notifications.remove(id))
            .await;
        if removed {
            self.persist().await;
        }
        removed
    }

    /// Drop every notification.
    pub async fn clear_notifications(&self) {
        self.inner.store.update(|s| s.notifications.clear()).await;
        self.persist().await;
    }

    /// Change how many notifications are kept (at least one), trimming the
    /// oldest.
    pub async fn set_notification_limit(&self, limit: usize) {
        self.inner
            .store
            .update(|s| s.notifications.set_limit(limit))
            .await;
        self.persist().await;
    }
}
