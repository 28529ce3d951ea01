//! # Engine Error Types
//!
//! Domain error taxonomy shared by reconciliation and activation.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Engine Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌──────────────────────┐  ┌──────────────────┐   │
//! │  │  Caller input   │  │  Domain (4xx)        │  │  Operational     │   │
//! │  │                 │  │                      │  │                  │   │
//! │  │  Validation 400 │  │  InvalidProduct      │  │  Gateway         │   │
//! │  │  NotFound   404 │  │  AlreadyActivated    │  │  Internal        │   │
//! │  │  Conflict   409 │  │  CodeNotFound        │  │                  │   │
//! │  │                 │  │  CodeAlreadyUsed     │  │                  │   │
//! │  │                 │  │  CodeNotApplicable   │  │                  │   │
//! │  │                 │  │  DeviceBoundElsewhere│  │                  │   │
//! │  │                 │  │  AlreadyUsedOrInact. │  │                  │   │
//! │  │                 │  │  CancelRejected      │  │                  │   │
//! │  └─────────────────┘  └──────────────────────┘  └──────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant has a stable machine code ([`EngineError::code`]) and an
//! HTTP-equivalent status ([`EngineError::http_status`]).

use thiserror::Error;

use crate::gateway::GatewayError;
use kiosk_core::ValidationError;
use kiosk_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Caller Input
    // =========================================================================
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// State already claimed by a concurrent actor (or a duplicate).
    #[error("Conflict: {0}")]
    Conflict(String),

    // =========================================================================
    // Domain
    // =========================================================================
    /// A referenced product is missing or inactive.
    #[error("Invalid or inactive product: {product_id}")]
    InvalidProduct { product_id: String },

    #[error("Device is already activated")]
    AlreadyActivated,

    #[error("Activation code not found")]
    CodeNotFound,

    #[error("Activation code already used")]
    CodeAlreadyUsed,

    /// The code is bound to different hardware.
    #[error("Activation code is not valid for this device")]
    CodeNotApplicable,

    #[error("Device identifier is bound to another device record")]
    DeviceBoundElsewhere,

    /// Lost the activation race after all pre-checks passed.
    #[error("Activation code already used or device no longer inactive")]
    AlreadyUsedOrInactive,

    /// The gateway refused a cancellation with a server error.
    #[error("Order cannot be canceled right now; it may already be in progress at the terminal")]
    CancelRejected {
        status: u16,
        details: Option<serde_json::Value>,
    },

    // =========================================================================
    // Operational
    // =========================================================================
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable, machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::InvalidProduct { .. } => "INVALID_PRODUCT",
            EngineError::AlreadyActivated => "ALREADY_ACTIVATED",
            EngineError::CodeNotFound => "CODE_NOT_FOUND",
            EngineError::CodeAlreadyUsed => "CODE_ALREADY_USED",
            EngineError::CodeNotApplicable => "CODE_NOT_APPLICABLE",
            EngineError::DeviceBoundElsewhere => "DEVICE_BOUND_ELSEWHERE",
            EngineError::AlreadyUsedOrInactive => "ALREADY_USED_OR_INACTIVE",
            EngineError::CancelRejected { .. } => "CANCEL_REJECTED",
            EngineError::Gateway(_) => "GATEWAY_ERROR",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP-equivalent status code.
    ///
    /// A gateway rejection with a 4xx status is passed through so the
    /// caller sees what the terminal API reported.
    pub fn http_status(&self) -> u16 {
        match self {
            EngineError::Validation(_) | EngineError::InvalidProduct { .. } => 400,
            EngineError::NotFound { .. } | EngineError::CodeNotFound => 404,
            EngineError::Conflict(_)
            | EngineError::AlreadyActivated
            | EngineError::CodeAlreadyUsed
            | EngineError::DeviceBoundElsewhere
            | EngineError::AlreadyUsedOrInactive => 409,
            EngineError::CodeNotApplicable => 403,
            EngineError::CancelRejected { status, .. } => *status,
            EngineError::Gateway(GatewayError::Rejected { status, .. })
                if (400..500).contains(status) =>
            {
                *status
            }
            EngineError::Gateway(GatewayError::Timeout) => 504,
            EngineError::Gateway(_) => 502,
            EngineError::Internal(_) => 500,
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

/// Store failures are operational, except duplicates.
///
/// Lookups that may legitimately miss return `Option` from the store, so a
/// `DbError::NotFound` reaching the engine is unexpected.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation { field, value } => {
                EngineError::Conflict(format!("{} '{}' already exists", field, value))
            }
            other => EngineError::Internal(other.to_string()),
        }
    }
}
