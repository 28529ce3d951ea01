//! # API Error Type
//!
//! Unified JSON error body for every route.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  handler ── Result<Json<T>, ApiError>                                   │
//! │     │                                                                   │
//! │     ├── EngineError ──► code + http_status ──► ApiError                │
//! │     ├── bad JSON body ─────────────────────► ApiError (400)            │
//! │     └── missing bearer token ──────────────► ApiError (401)            │
//! │                                                                         │
//! │  ApiError ──► IntoResponse ──► { "code": "...", "message": "..." }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal failures are logged with full detail but answered with a generic
//! message.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

use kiosk_engine::{EngineError, GatewayError};

/// Error body returned by the API.
///
/// ```json
/// { "code": "CODE_ALREADY_USED", "message": "Activation code already used" }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,

    /// Machine-readable error code.
    pub code: &'static str,

    /// Human-readable message.
    pub message: String,

    /// Upstream payload for gateway failures, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal server error",
        )
    }

    fn with_details(mut self, details: Option<serde_json::Value>) -> Self {
        self.details = details;
        self
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match err {
            EngineError::Internal(detail) => {
                error!(error = %detail, "Internal error");
                ApiError::internal()
            }
            EngineError::CancelRejected { ref details, .. } => {
                let details = details.clone();
                ApiError::new(status, err.code(), err.to_string()).with_details(details)
            }
            EngineError::Gateway(GatewayError::Rejected {
                status: upstream,
                ref message,
                ref details,
                ..
            }) => {
                error!(upstream_status = upstream, message = %message, "Gateway rejected request");
                let code = err.code();
                ApiError::new(status, code, message.clone()).with_details(details.clone())
            }
            EngineError::Gateway(ref gateway) => {
                error!(error = %gateway, "Gateway unavailable");
                ApiError::new(status, err.code(), err.to_string())
            }
            other => ApiError::new(status, other.code(), other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Result type for route handlers.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// JSON Extractor
// =============================================================================

/// `Json<T>` whose rejection is an [`ApiError`] body instead of plain text.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_detail_is_hidden() {
        let api: ApiError = EngineError::Internal("disk I/O error at page 7".into()).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code, "INTERNAL_ERROR");
        assert!(!api.message.contains("disk"));
    }

    #[test]
    fn test_domain_errors_keep_code_and_status() {
        let api: ApiError = EngineError::CodeNotApplicable.into();
        assert_eq!(api.status, StatusCode::FORBIDDEN);
        assert_eq!(api.code, "CODE_NOT_APPLICABLE");

        let api: ApiError = EngineError::not_found("Order", "mp-1").into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.message, "Order not found: mp-1");
    }

    #[test]
    fn test_cancel_rejection_carries_details() {
        let api: ApiError = EngineError::CancelRejected {
            status: 500,
            details: Some(serde_json::json!({ "message": "in progress" })),
        }
        .into();

        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code, "CANCEL_REJECTED");
        let body = serde_json::to_value(&api).unwrap();
        assert_eq!(body["details"]["message"], "in progress");
    }

    #[test]
    fn test_gateway_timeout_maps_to_504() {
        let api: ApiError = EngineError::Gateway(GatewayError::Timeout).into();
        assert_eq!(api.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(api.code, "GATEWAY_ERROR");
    }
}
