//! Notifications produced from real-time push events.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{NotificationId, OrderId, ProductId, ShipmentId};
use super::status::{OrderStatus, PaymentStatus, ShipmentStatus};

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    Order,
    Shipment,
    Payment,
    Stock,
    NewProduct,
    Generic,
}

impl NotificationKind {
    /// Stable identifier used in synthesized notification IDs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Shipment => "shipment",
            Self::Payment => "payment",
            Self::Stock => "stock",
            Self::NewProduct => "new-product",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific notification data.
///
/// The variant determines the notification kind, so the two can never
/// disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum NotificationPayload {
    Order {
        order_id: OrderId,
        status: OrderStatus,
    },
    Shipment {
        order_id: OrderId,
        shipment_id: Option<ShipmentId>,
        status: ShipmentStatus,
        tracking_number: Option<String>,
    },
    Payment {
        order_id: OrderId,
        status: PaymentStatus,
        amount: Option<Decimal>,
    },
    Stock {
        product_id: ProductId,
        color: String,
        size: String,
        quantity: u32,
    },
    NewProduct {
        product_id: ProductId,
        slug: String,
        name: String,
    },
    Generic {
        reference: Option<String>,
        data: Option<serde_json::Value>,
    },
}

impl NotificationPayload {
    /// Category of this payload.
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::Order { .. } => NotificationKind::Order,
            Self::Shipment { .. } => NotificationKind::Shipment,
            Self::Payment { .. } => NotificationKind::Payment,
            Self::Stock { .. } => NotificationKind::Stock,
            Self::NewProduct { .. } => NotificationKind::NewProduct,
            Self::Generic { .. } => NotificationKind::Generic,
        }
    }

    /// ID of the entity the notification is about.
    #[must_use]
    pub fn source_id(&self) -> &str {
        match self {
            Self::Order { order_id, .. }
            | Self::Shipment { order_id, .. }
            | Self::Payment { order_id, .. } => order_id.as_str(),
            Self::Stock { product_id, .. } | Self::NewProduct { product_id, .. } => {
                product_id.as_str()
            }
            Self::Generic { reference, .. } => reference.as_deref().unwrap_or("none"),
        }
    }
}

/// A notification in the user's feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Synthesized ID (`kind-sourceId-timestampMillis`).
    pub id: NotificationId,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Whether the user has seen it.
    #[serde(default)]
    pub is_read: bool,
    /// When the notification was received.
    pub created_at: DateTime<Utc>,
    /// Kind-specific data.
    pub payload: NotificationPayload,
}

impl Notification {
    /// Build an unread notification with a synthesized ID.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        payload: NotificationPayload,
        created_at: DateTime<Utc>,
    ) -> Self {
        let id = NotificationId::new(format!(
            "{}-{}-{}",
            payload.kind(),
            payload.source_id(),
            created_at.timestamp_millis()
        ));
        Self {
            id,
            title: title.into(),
            message: message.into(),
            is_read: false,
            created_at,
            payload,
        }
    }

    /// Category of this notification.
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        self.payload.kind()
    }
}
