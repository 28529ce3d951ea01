//! # Error Types
//!
//! Domain-specific error types for kiosk-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kiosk-core errors (this file)                                         │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── MoneyParseError  - Decimal amount could not be read               │
//! │                                                                         │
//! │  kiosk-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  kiosk-engine errors                                                   │
//! │  └── EngineError      - Domain taxonomy (conflict, code used, ...)     │
//! │                                                                         │
//! │  HTTP errors (in app)                                                  │
//! │  └── ApiError         - What the kiosk client sees (serialized)        │
//! │                                                                         │
//! │  Flow: ValidationError → EngineError → ApiError → Kiosk client         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any store or gateway call runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Collection must not be empty.
    #[error("{field} must contain at least one entry")]
    Empty { field: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::MustBePositive`].
    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }
}

// =============================================================================
// Money Parse Error
// =============================================================================

/// Failure to read a decimal amount such as `"12.50"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    #[error("amount is empty")]
    Empty,

    #[error("amount '{0}' is not a decimal number")]
    NotDecimal(String),

    #[error("amount '{0}' has more than two decimal places")]
    TooPrecise(String),

    #[error("amount '{0}' is out of range")]
    Overflow(String),
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::required("user_id");
        assert_eq!(err.to_string(), "user_id is required");

        let err = ValidationError::must_be_positive("total");
        assert_eq!(err.to_string(), "total must be positive");

        let err = ValidationError::Empty {
            field: "items".to_string(),
        };
        assert_eq!(err.to_string(), "items must contain at least one entry");
    }

    #[test]
    fn test_money_parse_error_messages() {
        let err = MoneyParseError::TooPrecise("1.005".to_string());
        assert_eq!(
            err.to_string(),
            "amount '1.005' has more than two decimal places"
        );
    }
}
