//! # Gateway Status Mapping
//!
//! Fixed translation tables from payment-gateway vocabulary to
//! [`OrderStatus`].
//!
//! ```text
//! ┌───────────────────────────────┬──────────────────────────┐
//! │ webhook action                │ OrderStatus              │
//! ├───────────────────────────────┼──────────────────────────┤
//! │ order.processed               │ processed (+ stock)      │
//! │ order.canceled                │ canceled                 │
//! │ order.failed                  │ failed                   │
//! │ order.expired                 │ expired                  │
//! │ order.refunded                │ refunded                 │
//! │ order.action_required         │ action_required          │
//! │ anything else                 │ (discarded)              │
//! └───────────────────────────────┴──────────────────────────┘
//! ```

use crate::types::OrderStatus;

/// Maps a webhook `action` to the internal status it announces.
///
/// Returns `None` for actions outside the table; callers acknowledge and
/// discard those events.
pub fn status_for_action(action: &str) -> Option<OrderStatus> {
    match action {
        "order.processed" => Some(OrderStatus::Processed),
        "order.canceled" => Some(OrderStatus::Canceled),
        "order.failed" => Some(OrderStatus::Failed),
        "order.expired" => Some(OrderStatus::Expired),
        "order.refunded" => Some(OrderStatus::Refunded),
        "order.action_required" => Some(OrderStatus::ActionRequired),
        _ => None,
    }
}

/// Maps the `status` field of a gateway order lookup to the internal status.
///
/// `created` carries no news for an order that is already registered, so it
/// maps to `None` like unknown values do.
pub fn status_for_gateway_order(status: &str) -> Option<OrderStatus> {
    match status {
        "at_terminal" | "processing" => Some(OrderStatus::Processing),
        "processed" => Some(OrderStatus::Processed),
        "canceled" => Some(OrderStatus::Canceled),
        "failed" => Some(OrderStatus::Failed),
        "expired" => Some(OrderStatus::Expired),
        "refunded" => Some(OrderStatus::Refunded),
        "action_required" => Some(OrderStatus::ActionRequired),
        _ => None,
    }
}
