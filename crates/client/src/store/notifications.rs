//! Bounded, newest-first notification feed.

use std::collections::VecDeque;

use storefront_sync_core::{Notification, NotificationId};

/// Default number of notifications kept.
pub const DEFAULT_NOTIFICATION_LIMIT: usize = 50;

/// Notifications received from the hub, newest first.
///
/// `unread` always equals the number of unread entries in `items`.
#[derive(Debug, Clone)]
pub struct NotificationFeed {
    items: VecDeque<Notification>,
    unread: usize,
    max: usize,
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self::with_limit(DEFAULT_NOTIFICATION_LIMIT)
    }
}

impl NotificationFeed {
    /// Create a feed keeping at most `max` entries. A limit of zero is
    /// raised to one.
    #[must_use]
    pub fn with_limit(max: usize) -> Self {
        Self {
            items: VecDeque::new(),
            unread: 0,
            max: max.max(1),
        }
    }

    /// Rebuild a feed from stored entries (newest first).
    #[must_use]
    pub fn from_items(items: Vec<Notification>, max: usize) -> Self {
        let mut feed = Self::with_limit(max);
        for notification in items.into_iter().rev() {
            feed.push(notification);
        }
        feed
    }

    /// Prepend a notification, dropping the oldest entries past the limit.
    ///
    /// Returns `false` if a notification with the same ID is already present.
    pub fn push(&mut self, notification: Notification) -> bool {
        if self.items.iter().any(|n| n.id == notification.id) {
            return false;
        }
        if !notification.is_read {
            self.unread += 1;
        }
        self.items.push_front(notification);
        self.trim();
        true
    }

    /// Mark one notification as read. Returns whether it changed.
    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        match self.items.iter_mut().find(|n| &n.id == id) {
            Some(n) if !n.is_read => {
                n.is_read = true;
                self.unread = self.unread.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    /// Mark every notification as read.
    pub fn mark_all_read(&mut self) {
        for n in &mut self.items {
            n.is_read = true;
        }
        self.unread = 0;
    }

    /// Remove one notification. Returns whether it was present.
    pub fn remove(&mut self, id: &NotificationId) -> bool {
        let Some(index) = self.items.iter().position(|n| &n.id == id) else {
            return false;
        };
        if let Some(removed) = self.items.remove(index)
            && !removed.is_read
        {
            self.unread = self.unread.saturating_sub(1);
        }
        true
    }

    /// Drop every notification.
    pub fn clear(&mut self) {
        self.items.clear();
        self.unread = 0;
    }

    /// Change the limit, trimming immediately if needed. A limit of zero is
    /// raised to one.
    pub fn set_limit(&mut self, max: usize) {
        self.max = max.max(1);
        self.trim();
    }

    /// Number of unread notifications.
    #[must_use]
    pub const fn unread_count(&self) -> usize {
        self.unread
    }

    /// Maximum number of entries kept.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.max
    }

    /// Notifications, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    /// Notifications as a vector, newest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Notification> {
        self.items.iter().cloned().collect()
    }

    /// Number of notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the feed is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn trim(&mut self) {
        while self.items.len() > self.max {
            if let Some(dropped) = self.items.pop_back()
                && !dropped.is_read
            {
                self.unread = self.unread.saturating_sub(1);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use storefront_sync_core::{NotificationPayload, ProductId};

    use super::*;

    fn notification(n: i64) -> Notification {
        Notification::new(
            format!("title {n}"),
            "message",
            NotificationPayload::NewProduct {
                product_id: ProductId::from(format!("p{n}")),
                slug: format!("slug-{n}"),
                name: format!("Product {n}"),
            },
            Utc.timestamp_millis_opt(1_700_000_000_000 + n)
                .unwrap(),
        )
    }

    fn ids(feed: &NotificationFeed) -> Vec<String> {
        feed.iter().map(|n| n.title.clone()).collect()
    }

    #[test]
    fn test_push_prepends_and_counts_unread() {
        let mut feed = NotificationFeed::default();
        feed.push(notification(1));
        feed.push(notification(2));
        assert_eq!(ids(&feed), vec!["title 2", "title 1"]);
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn test_duplicate_id_is_ignored() {
        let mut feed = NotificationFeed::default();
        assert!(feed.push(notification(1)));
        assert!(!feed.push(notification(1)));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.unread_count(), 1);
    }

    #[test]
    fn test_overflow_drops_oldest_and_adjusts_unread() {
        let mut feed = NotificationFeed::with_limit(3);
        for n in 1..=3 {
            feed.push(notification(n));
        }
        let oldest = feed.iter().last().map(|n| n.id.clone()).unwrap();
        feed.mark_read(&oldest);
        assert_eq!(feed.unread_count(), 2);

        // Drops the read "title 1", then the unread "title 2".
        feed.push(notification(4));
        assert_eq!(feed.unread_count(), 3);
        feed.push(notification(5));
        assert_eq!(ids(&feed), vec!["title 5", "title 4", "title 3"]);
        assert_eq!(feed.unread_count(), 3);
    }

    #[test]
    fn test_mark_remove_and_clear() {
        let mut feed = NotificationFeed::default();
        feed.push(notification(1));
        feed.push(notification(2));
        let first = feed.iter().next().map(|n| n.id.clone()).unwrap();

        assert!(feed.mark_read(&first));
        assert!(!feed.mark_read(&first));
        assert_eq!(feed.unread_count(), 1);

        assert!(feed.remove(&first));
        assert_eq!(feed.unread_count(), 1);

        feed.mark_all_read();
        assert_eq!(feed.unread_count(), 0);
        feed.clear();
        assert!(feed.is_empty());
    }

    #[test]
    fn test_zero_limit_keeps_one() {
        let mut feed = NotificationFeed::with_limit(0);
        assert_eq!(feed.limit(), 1);
        feed.set_limit(0);
        assert_eq!(feed.limit(), 1);
    }

    #[test]
    fn test_set_limit_trims() {
        let mut feed = NotificationFeed::default();
        for n in 1..=5 {
            feed.push(notification(n));
        }
        feed.set_limit(2);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn test_from_items_keeps_order() {
        let mut feed = NotificationFeed::default();
        for n in 1..=3 {
            feed.push(notification(n));
        }
        let restored = NotificationFeed::from_items(feed.to_vec(), 10);
        assert_eq!(ids(&restored), ids(&feed));
    }
}
