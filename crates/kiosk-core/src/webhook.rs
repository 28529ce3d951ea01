//! # Gateway Webhook Events
//!
//! Typed view of the notifications pushed by the payment gateway.
//!
//! ## Payload Shape
//! ```text
//! {
//!   "action": "order.processed",     ← what happened
//!   "type":   "order",               ← fallback when action is absent
//!   "data":   { "id": "ORD01J..." }  ← gateway order id (string or number)
//! }
//! ```
//!
//! Every body maps to exactly one [`GatewayEvent`] variant. Only
//! `StatusChanged` leads to any work; the other variants are acknowledged
//! and discarded by the reconciliation engine.

use serde::Deserialize;

use crate::status::status_for_action;
use crate::types::OrderStatus;

/// A parsed webhook notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// A known action for a specific gateway order.
    StatusChanged {
        gateway_order_id: String,
        action: String,
        status: OrderStatus,
    },

    /// Well-formed, but the action is outside the status table.
    Unknown {
        gateway_order_id: String,
        action: String,
    },

    /// Valid JSON without an action or without an order id.
    Incomplete,

    /// The body is not a JSON object of the expected shape.
    Unparseable { reason: String },
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    action: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: Option<RawData>,
}

#[derive(Debug, Deserialize)]
struct RawData {
    #[serde(default)]
    id: Option<RawId>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_id(self) -> Option<String> {
        match self {
            RawId::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            RawId::Number(n) => Some(n.to_string()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl GatewayEvent {
    /// Parses a raw webhook body. Never fails: malformed input becomes
    /// [`GatewayEvent::Unparseable`].
    pub fn parse(body: &[u8]) -> GatewayEvent {
        match serde_json::from_slice::<RawEnvelope>(body) {
            Ok(raw) => GatewayEvent::from_envelope(raw),
            Err(e) => GatewayEvent::Unparseable {
                reason: e.to_string(),
            },
        }
    }

    fn from_envelope(raw: RawEnvelope) -> GatewayEvent {
        let action = non_empty(raw.action).or_else(|| non_empty(raw.kind));
        let gateway_order_id = raw.data.and_then(|d| d.id).and_then(RawId::into_id);

        let (action, gateway_order_id) = match (action, gateway_order_id) {
            (Some(a), Some(id)) => (a, id),
            _ => return GatewayEvent::Incomplete,
        };

        match status_for_action(&action) {
            Some(status) => GatewayEvent::StatusChanged {
                gateway_order_id,
                action,
                status,
            },
            None => GatewayEvent::Unknown {
                gateway_order_id,
                action,
            },
        }
    }

    /// Gateway order id, when the event carried one.
    pub fn gateway_order_id(&self) -> Option<&str> {
        match self {
            GatewayEvent::StatusChanged {
                gateway_order_id, ..
            }
            | GatewayEvent::Unknown {
                gateway_order_id, ..
            } => Some(gateway_order_id),
            GatewayEvent::Incomplete | GatewayEvent::Unparseable { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_action() {
        let event = GatewayEvent::parse(br#"{"action":"order.canceled","data":{"id":"mp-99"}}"#);
        assert_eq!(
            event,
            GatewayEvent::StatusChanged {
                gateway_order_id: "mp-99".to_string(),
                action: "order.canceled".to_string(),
                status: OrderStatus::Canceled,
            }
        );
    }

    #[test]
    fn test_numeric_id_is_accepted() {
        let event = GatewayEvent::parse(br#"{"action":"order.processed","data":{"id":12345}}"#);
        assert_eq!(event.gateway_order_id(), Some("12345"));
    }

    #[test]
    fn test_type_is_used_when_action_is_missing() {
        let event = GatewayEvent::parse(br#"{"type":"order.expired","data":{"id":"mp-1"}}"#);
        assert!(matches!(
            event,
            GatewayEvent::StatusChanged {
                status: OrderStatus::Expired,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_action() {
        let event = GatewayEvent::parse(br#"{"action":"order.created","data":{"id":"mp-1"}}"#);
        assert!(matches!(event, GatewayEvent::Unknown { .. }));
    }

    #[test]
    fn test_missing_fields_are_incomplete() {
        assert_eq!(GatewayEvent::parse(br#"{}"#), GatewayEvent::Incomplete);
        assert_eq!(
            GatewayEvent::parse(br#"{"action":"order.processed"}"#),
            GatewayEvent::Incomplete
        );
        assert_eq!(
            GatewayEvent::parse(br#"{"data":{"id":"mp-1"}}"#),
            GatewayEvent::Incomplete
        );
        assert_eq!(
            GatewayEvent::parse(br#"{"action":"  ","data":{"id":""}}"#),
            GatewayEvent::Incomplete
        );
    }

    #[test]
    fn test_garbage_is_unparseable() {
        assert!(matches!(
            GatewayEvent::parse(b"not json"),
            GatewayEvent::Unparseable { .. }
        ));
        assert!(matches!(
            GatewayEvent::parse(br#"["order.processed"]"#),
            GatewayEvent::Unparseable { .. }
        ));
        assert!(matches!(
            GatewayEvent::parse(br#"{"action":"order.processed","data":"mp-1"}"#),
            GatewayEvent::Unparseable { .. }
        ));
    }
}
