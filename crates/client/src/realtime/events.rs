//! Server push events and their mapping to feed notifications.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use storefront_sync_core::{
    Notification, NotificationPayload, OrderId, OrderStatus, PaymentStatus, ProductId,
    ShipmentId, ShipmentStatus,
};

use crate::error::HubError;

/// Hub method names the server invokes on the client.
pub mod target {
    pub const SHIPMENT_STATUS_UPDATED: &str = "ShipmentStatusUpdated";
    pub const ORDER_STATUS_UPDATED: &str = "OrderStatusUpdated";
    pub const PAYMENT_STATUS_UPDATED: &str = "PaymentStatusUpdated";
    pub const STOCK_AVAILABLE: &str = "StockAvailable";
    pub const NEW_PRODUCT_ADDED: &str = "NewProductAdded";
    pub const NOTIFICATION: &str = "Notification";
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChange {
    pub order_id: OrderId,
    #[serde(default)]
    pub order_number: Option<String>,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentStatusChange {
    pub order_id: OrderId,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub shipment_id: Option<ShipmentId>,
    pub status: ShipmentStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusChange {
    pub order_id: OrderId,
    #[serde(default)]
    pub order_number: Option<String>,
    pub status: PaymentStatus,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAvailability {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    pub color: String,
    pub size: String,
    #[serde(default)]
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub product_id: ProductId,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericMessage {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// An event pushed by the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    OrderStatus(OrderStatusChange),
    ShipmentStatus(ShipmentStatusChange),
    PaymentStatus(PaymentStatusChange),
    StockAvailable(StockAvailability),
    NewProduct(NewProduct),
    Generic(GenericMessage),
}

impl PushEvent {
    /// Decode a server invocation. Returns `None` for targets this client
    /// does not know.
    ///
    /// # Errors
    ///
    /// Returns `HubError::Protocol` if a known target carries a malformed
    /// payload.
    pub fn decode(method: &str, arguments: &[Value]) -> Result<Option<Self>, HubError> {
        let event = match method {
            target::ORDER_STATUS_UPDATED => Self::OrderStatus(first_argument(method, arguments)?),
            target::SHIPMENT_STATUS_UPDATED => {
                Self::ShipmentStatus(first_argument(method, arguments)?)
            }
            target::PAYMENT_STATUS_UPDATED => {
                Self::PaymentStatus(first_argument(method, arguments)?)
            }
            target::STOCK_AVAILABLE => Self::StockAvailable(first_argument(method, arguments)?),
            target::NEW_PRODUCT_ADDED => Self::NewProduct(first_argument(method, arguments)?),
            target::NOTIFICATION => Self::Generic(first_argument(method, arguments)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Build the feed entry for this event, received at `now`.
    #[must_use]
    pub fn into_notification(self, now: DateTime<Utc>) -> Notification {
        match self {
            Self::OrderStatus(e) => Notification::new(
                "Order update",
                format!(
                    "Order {} is now {}",
                    order_label(&e.order_id, e.order_number.as_deref()),
                    e.status
                ),
                NotificationPayload::Order {
                    order_id: e.order_id,
                    status: e.status,
                },
                now,
            ),
            Self::ShipmentStatus(e) => {
                let tracking = e
                    .tracking_number
                    .as_ref()
                    .map(|t| format!(" (tracking {t})"))
                    .unwrap_or_default();
                let message = format!(
                    "Shipment for order {} is {}{tracking}",
                    order_label(&e.order_id, e.order_number.as_deref()),
                    e.status.to_string().replace('_', " ")
                );
                Notification::new(
                    "Shipment update",
                    message,
                    NotificationPayload::Shipment {
                        order_id: e.order_id,
                        shipment_id: e.shipment_id,
                        status: e.status,
                        tracking_number: e.tracking_number,
                    },
                    now,
                )
            }
            Self::PaymentStatus(e) => Notification::new(
                "Payment update",
                format!(
                    "Payment for order {} is {}",
                    order_label(&e.order_id, e.order_number.as_deref()),
                    e.status
                ),
                NotificationPayload::Payment {
                    order_id: e.order_id,
                    status: e.status,
                    amount: e.amount,
                },
                now,
            ),
            Self::StockAvailable(e) => {
                let name = e
                    .product_name
                    .clone()
                    .unwrap_or_else(|| e.product_id.to_string());
                Notification::new(
                    "Back in stock",
                    format!("{name} ({}, {}) is available again", e.color, e.size),
                    NotificationPayload::Stock {
                        product_id: e.product_id,
                        color: e.color,
                        size: e.size,
                        quantity: e.quantity,
                    },
                    now,
                )
            }
            Self::NewProduct(e) => Notification::new(
                "New arrival",
                format!("{} just landed", e.name),
                NotificationPayload::NewProduct {
                    product_id: e.product_id,
                    slug: e.slug,
                    name: e.name,
                },
                now,
            ),
            Self::Generic(e) => Notification::new(
                e.title,
                e.message,
                NotificationPayload::Generic {
                    reference: e.reference,
                    data: e.data,
                },
                now,
            ),
        }
    }
}

fn first_argument<T: DeserializeOwned>(method: &str, arguments: &[Value]) -> Result<T, HubError> {
    let value = arguments
        .first()
        .ok_or_else(|| HubError::Protocol(format!("{method} without arguments")))?;
    T::deserialize(value).map_err(|e| HubError::Protocol(format!("{method}: {e}")))
}

fn order_label(id: &OrderId, number: Option<&str>) -> String {
    number.map_or_else(|| id.to_string(), |n| format!("#{n}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;
    use storefront_sync_core::NotificationKind;

    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    #[test]
    fn test_decode_shipment() {
        let event = PushEvent::decode(target::SHIPMENT_STATUS_UPDATED, &[json!({
            "orderId": "o1",
            "orderNumber": "1001",
            "shipmentId": "s1",
            "status": "in_transit",
            "trackingNumber": "ZX9"
        })])
        .unwrap()
        .unwrap();

        let notification = event.into_notification(at());
        assert_eq!(notification.kind(), NotificationKind::Shipment);
        assert_eq!(notification.id.as_str(), "shipment-o1-1700000000000");
        assert_eq!(
            notification.message,
            "Shipment for order #1001 is in transit (tracking ZX9)"
        );
        assert!(!notification.is_read);
    }

    #[test]
    fn test_decode_stock() {
        let event = PushEvent::decode(target::STOCK_AVAILABLE, &[json!({
            "productId": "p1",
            "productName": "Linen Shirt",
            "color": "white",
            "size": "M",
            "quantity": 3
        })])
        .unwrap()
        .unwrap();
        let notification = event.into_notification(at());
        assert_eq!(notification.id.as_str(), "stock-p1-1700000000000");
        assert_eq!(notification.message, "Linen Shirt (white, M) is available again");
    }

    #[test]
    fn test_generic_keeps_title() {
        let event = PushEvent::decode(target::NOTIFICATION, &[json!({
            "title": "Sale",
            "message": "Everything 20% off"
        })])
        .unwrap()
        .unwrap();
        let notification = event.into_notification(at());
        assert_eq!(notification.title, "Sale");
        assert_eq!(notification.id.as_str(), "generic-none-1700000000000");
    }

    #[test]
    fn test_unknown_target_is_skipped() {
        assert_eq!(PushEvent::decode("SomethingElse", &[]).unwrap(), None);
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(PushEvent::decode(target::ORDER_STATUS_UPDATED, &[]).is_err());
        assert!(
            PushEvent::decode(target::ORDER_STATUS_UPDATED, &[json!({"status": "shipped"})])
                .is_err()
        );
    }
}
