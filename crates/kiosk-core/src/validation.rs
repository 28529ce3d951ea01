//! # Validation Module
//!
//! Input validation for the kiosk backend.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (axum Json)                                   │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Presence, format, and range rules                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE (gateway_order_id, activation_code, device_identifier)    │
//! │  └── CHECK (stock quantity >= 0)                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{NewOrder, OrderItem};
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Trims `value` and rejects it when empty.
///
/// ## Example
/// ```rust
/// use kiosk_core::validation::require_text;
///
/// assert_eq!(require_text("device_id", "  dev-1 ").unwrap(), "dev-1");
/// assert!(require_text("device_id", "   ").is_err());
/// ```
pub fn require_text<'a>(field: &str, value: &'a str) -> ValidationResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::required(field));
    }
    if trimmed.len() > 255 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 255,
        });
    }
    Ok(trimmed)
}

/// Validates a UUID string (e.g., a user id).
///
/// ## Example
/// ```rust
/// use kiosk_core::validation::validate_uuid;
///
/// assert!(validate_uuid("user_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("user_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    uuid::Uuid::parse_str(id.trim()).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an item quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an order total.
pub fn validate_total(total: Money) -> ValidationResult<()> {
    if !total.is_positive() {
        return Err(ValidationError::must_be_positive("total"));
    }
    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates an item list: non-empty, bounded, every line well-formed.
pub fn validate_items(items: &[OrderItem]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Empty {
            field: "items".to_string(),
        });
    }

    if items.len() > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        });
    }

    for item in items {
        require_text("product_id", &item.product_id)?;
        validate_quantity(item.quantity)?;
    }

    Ok(())
}

/// Validates a registration request before it reaches the order store.
///
/// ## Rules
/// - `user_id` is a UUID
/// - `gateway_order_id` and `payment_method` are non-empty
/// - `total` is positive
/// - `items` pass [`validate_items`]
pub fn validate_new_order(order: &NewOrder) -> ValidationResult<()> {
    validate_uuid("user_id", &order.user_id)?;
    require_text("gateway_order_id", &order.gateway_order_id)?;
    validate_total(order.total)?;
    require_text("payment_method", &order.payment_method)?;
    validate_items(&order.items)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> NewOrder {
        NewOrder {
            user_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
            gateway_order_id: "mp-1".to_string(),
            total: Money::from_cents(2500),
            payment_method: "credit_card".to_string(),
            items: vec![OrderItem::new("p1", 2)],
        }
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_items() {
        assert!(validate_items(&[OrderItem::new("p1", 1)]).is_ok());
        assert!(matches!(
            validate_items(&[]),
            Err(ValidationError::Empty { .. })
        ));
        assert!(validate_items(&[OrderItem::new(" ", 1)]).is_err());
        assert!(validate_items(&[OrderItem::new("p1", 0)]).is_err());
    }

    #[test]
    fn test_validate_new_order() {
        assert!(validate_new_order(&sample_order()).is_ok());

        let mut order = sample_order();
        order.user_id = "abc".to_string();
        assert!(matches!(
            validate_new_order(&order),
            Err(ValidationError::InvalidFormat { .. })
        ));

        let mut order = sample_order();
        order.total = Money::zero();
        assert_eq!(
            validate_new_order(&order),
            Err(ValidationError::must_be_positive("total"))
        );

        let mut order = sample_order();
        order.payment_method = "".to_string();
        assert_eq!(
            validate_new_order(&order),
            Err(ValidationError::required("payment_method"))
        );
    }
}
