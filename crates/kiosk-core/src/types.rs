//! # Domain Types
//!
//! Core domain types used throughout the kiosk backend.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │     Device      │   │ CatalogProduct  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id             │   │  id             │       │
//! │  │  gateway_order  │   │  activation_code│   │  price_cents    │       │
//! │  │  status         │   │  device_ident.  │   │  is_active      │       │
//! │  │  items (JSON)   │   │  status         │   └─────────────────┘       │
//! │  │  stock_processed│   └────────┬────────┘                              │
//! │  └────────┬────────┘            │                                       │
//! │           │                     ▼                                       │
//! │           ▼              ┌─────────────────┐   ┌─────────────────┐       │
//! │  ┌─────────────────┐     │  DeviceSession  │   │  StockMovement  │       │
//! │  │   OrderItem     │     │  id = token     │   │  append-only    │       │
//! │  │  product_id,qty │     │  expires_at     │   │  audit entry    │       │
//! │  └─────────────────┘     └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Orders carry two keys:
//! - `id`: UUID v4 - internal, immutable
//! - `gateway_order_id`: assigned by the payment terminal, used by webhooks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Order Status
// =============================================================================

/// The status of a kiosk order.
///
/// ## State Machine
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                                                                         │
/// │            ┌──────────► processing                                      │
/// │            │                                                            │
/// │  pending ──┼──────────► processed  (stock decremented exactly once)     │
/// │            │                                                            │
/// │            ├──────────► canceled / failed / expired                     │
/// │            │                                                            │
/// │            └──────────► refunded / action_required                      │
/// │                                                                         │
/// │  Non-pending statuses are terminal for stock processing, but the       │
/// │  gateway stays the source of truth: later events may overwrite them.   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Registered locally after the gateway accepted the terminal order.
    Pending,
    /// The terminal is handling the payment.
    Processing,
    /// Payment confirmed.
    Processed,
    Canceled,
    Failed,
    Expired,
    Refunded,
    /// The terminal needs operator or customer interaction.
    ActionRequired,
}

impl OrderStatus {
    /// Returns the stored/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Processed => "processed",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Failed => "failed",
            OrderStatus::Expired => "expired",
            OrderStatus::Refunded => "refunded",
            OrderStatus::ActionRequired => "action_required",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// One line of an order's immutable item snapshot.
///
/// The snapshot is stored as a JSON array. Older rows wrote the product
/// reference as `id` and kiosk clients send `productId`, so both spellings
/// are accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    #[serde(alias = "id", alias = "productId")]
    pub product_id: String,
    pub quantity: i64,
}

impl OrderItem {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        OrderItem {
            product_id: product_id.into(),
            quantity,
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A kiosk order as persisted by the order store.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    /// Internal identifier (UUID v4).
    pub id: String,

    /// Identifier assigned by the payment gateway (unique).
    pub gateway_order_id: String,

    /// Owning user.
    pub user_id: String,

    pub status: OrderStatus,

    /// Server-computed total in cents. Never taken from the client.
    pub total_cents: i64,

    pub payment_method: String,

    /// Readable entries of the item snapshot.
    pub items: Vec<OrderItem>,

    /// Set exactly once, together with status `processed`.
    pub stock_processed: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the total as Money.
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Sum of item quantities, ignoring non-positive entries.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity.max(0)).sum()
    }
}

/// Input for registering a new order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrder {
    pub user_id: String,
    pub gateway_order_id: String,
    pub total: Money,
    pub payment_method: String,
    pub items: Vec<OrderItem>,
}

/// Read-only status view returned to polling clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderStatusView {
    pub gateway_order_id: String,
    pub status: OrderStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// An order as listed on the user's profile page.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserOrder {
    #[serde(flatten)]
    pub order: Order,
    pub item_count: i64,
}

impl From<Order> for UserOrder {
    fn from(order: Order) -> Self {
        let item_count = order.item_count();
        UserOrder { order, item_count }
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Append-only audit entry for a stock decrement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    /// Quantity removed (always positive).
    pub quantity: i64,
    pub reason: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Builds the movement reason for a sale settled by a gateway order.
pub fn sale_movement_reason(gateway_order_id: &str) -> String {
    format!("Sale - order {}", gateway_order_id)
}

// =============================================================================
// Catalog
// =============================================================================

/// A product as seen by the re-pricing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub is_active: bool,
}

impl CatalogProduct {
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Device
// =============================================================================

/// Lifecycle status of a kiosk device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Inactive,
    Active,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        DeviceStatus::Inactive
    }
}

/// A kiosk device (totem) record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Device {
    pub id: String,

    /// Outstanding activation code; cleared when consumed.
    pub activation_code: Option<String>,

    /// The code that activated this row, kept for audit.
    pub consumed_code: Option<String>,

    /// Hardware identifier bound to this row.
    pub device_identifier: Option<String>,

    pub status: DeviceStatus,

    #[ts(as = "Option<String>")]
    pub activated_at: Option<DateTime<Utc>>,

    #[ts(as = "Option<String>")]
    pub last_seen_at: Option<DateTime<Utc>>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Device {
    pub fn is_active(&self) -> bool {
        self.status == DeviceStatus::Active
    }
}

/// A bearer session issued to an activated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeviceSession {
    /// Opaque bearer token.
    pub id: String,
    /// Owning device row id.
    pub device_id: String,
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl DeviceSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Why a heartbeat was or was not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatReason {
    NotFound,
    Inactive,
    Active,
}

/// Outcome of a device heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Heartbeat {
    pub allowed: bool,
    pub reason: HeartbeatReason,
}

impl Heartbeat {
    pub const fn denied(reason: HeartbeatReason) -> Self {
        Heartbeat {
            allowed: false,
            reason,
        }
    }

    pub const fn allowed() -> Self {
        Heartbeat {
            allowed: true,
            reason: HeartbeatReason::Active,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_serializes_snake_case() {
        let json = serde_json::to_string(&OrderStatus::ActionRequired).unwrap();
        assert_eq!(json, "\"action_required\"");
        assert_eq!(OrderStatus::ActionRequired.to_string(), "action_required");
    }

    #[test]
    fn test_order_item_accepts_id_alias() {
        let item: OrderItem = serde_json::from_str(r#"{"id":"p1","quantity":2}"#).unwrap();
        assert_eq!(item, OrderItem::new("p1", 2));

        let item: OrderItem =
            serde_json::from_str(r#"{"product_id":"p2","quantity":1}"#).unwrap();
        assert_eq!(item.product_id, "p2");
    }

    #[test]
    fn test_heartbeat_serialization() {
        let json = serde_json::to_value(Heartbeat::denied(HeartbeatReason::NotFound)).unwrap();
        assert_eq!(json["allowed"], false);
        assert_eq!(json["reason"], "not_found");
    }

    #[test]
    fn test_session_expiry_is_inclusive() {
        let now = Utc::now();
        let session = DeviceSession {
            id: "t".into(),
            device_id: "d".into(),
            expires_at: now,
            created_at: now,
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_sale_movement_reason_references_order() {
        assert_eq!(sale_movement_reason("mp-1"), "Sale - order mp-1");
    }
}
