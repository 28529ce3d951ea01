//! # Payment Gateway Adapter
//!
//! Thin client for the payment terminal's order API.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Terminal Order API                                   │
//! │                                                                         │
//! │  POST   {base}/v1/orders        Authorization: Bearer <token>          │
//! │                                 X-Idempotency-Key: order-<ext ref>     │
//! │         → { id, status, external_reference }                           │
//! │                                                                         │
//! │  DELETE {base}/v1/orders/{id}   → 2xx | structured error               │
//! │                                                                         │
//! │  GET    {base}/v1/orders/{id}   → { id, status, status_detail, ... }   │
//! │                                                                         │
//! │  Errors: { "message": "...", "errors": [ { "code": "..." } ] }         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The gateway is an unreliable collaborator: every call is bounded by the
//! client timeout and every failure is categorized into [`GatewayError`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use kiosk_core::Money;

/// Gateway error code for a terminal that already has an order queued.
pub const ALREADY_QUEUED_ON_TERMINAL: &str = "already_queued_order_on_terminal";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request did not complete within the client timeout.
    #[error("Gateway request timed out")]
    Timeout,

    /// Network-level failure (DNS, connect, TLS, ...).
    #[error("Gateway transport error: {0}")]
    Transport(String),

    /// The gateway answered with a non-success status.
    #[error("Gateway rejected request ({status}): {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// A success response whose body could not be read.
    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// The documented error code of a rejection, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            GatewayError::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, GatewayError::Rejected { status, .. } if *status >= 500)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

// =============================================================================
// Payload
// =============================================================================

/// Maps a kiosk payment method to the terminal's payment type.
pub fn terminal_payment_type(payment_method_id: &str) -> &str {
    match payment_method_id {
        "pix" => "qr",
        other => other,
    }
}

/// Body of `POST /v1/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalOrderRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub external_reference: String,
    pub description: String,
    pub expiration_time: String,
    pub transactions: Transactions,
    pub config: TerminalConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transactions {
    pub payments: Vec<PaymentAmount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentAmount {
    /// Two-decimal string, e.g. `"12.50"`.
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalConfig {
    pub point: PointConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethodConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointConfig {
    pub terminal_id: String,
    pub print_on_terminal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentMethodConfig {
    pub default_type: String,
}

impl TerminalOrderRequest {
    /// Builds a point-of-sale order for one payment of `total`.
    pub fn new(
        external_reference: &str,
        description: &str,
        total: Money,
        terminal_id: &str,
        payment_method_id: Option<&str>,
    ) -> Self {
        TerminalOrderRequest {
            kind: "point".to_string(),
            external_reference: external_reference.to_string(),
            description: description.to_string(),
            expiration_time: "PT30M".to_string(),
            transactions: Transactions {
                payments: vec![PaymentAmount {
                    amount: total.to_decimal_string(),
                }],
            },
            config: TerminalConfig {
                point: PointConfig {
                    terminal_id: terminal_id.to_string(),
                    print_on_terminal: "no_ticket".to_string(),
                },
                payment_method: payment_method_id
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(|m| PaymentMethodConfig {
                        default_type: terminal_payment_type(m).to_string(),
                    }),
            },
        }
    }
}

/// Deterministic idempotency key: retries of one logical order share it.
pub fn idempotency_key(external_reference: &str) -> String {
    format!("order-{}", external_reference)
}

// =============================================================================
// Responses
// =============================================================================

/// The gateway's acknowledgement of a created order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub external_reference: Option<String>,
}

/// The gateway's current view of an order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrderDetails {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub status_detail: Option<String>,
}

// =============================================================================
// Trait
// =============================================================================

/// Operations the engine needs from the payment terminal API.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        request: &TerminalOrderRequest,
        idempotency_key: &str,
    ) -> Result<GatewayOrder, GatewayError>;

    async fn cancel_order(&self, gateway_order_id: &str) -> Result<(), GatewayError>;

    async fn get_order(&self, gateway_order_id: &str) -> Result<GatewayOrderDetails, GatewayError>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// Connection settings for [`HttpGateway`].
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// API root, e.g. `https://api.mercadopago.com`.
    pub base_url: String,
    pub access_token: String,
    /// Upper bound for each request.
    pub timeout: Duration,
}

/// `reqwest`-backed [`PaymentGateway`].
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(HttpGateway {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token,
        })
    }

    fn order_url(&self, gateway_order_id: Option<&str>) -> String {
        match gateway_order_id {
            Some(id) => format!("{}/v1/orders/{}", self.base_url, id),
            None => format!("{}/v1/orders", self.base_url),
        }
    }

    /// Turns a non-success response into [`GatewayError::Rejected`].
    async fn rejection(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let body = response.bytes().await.unwrap_or_default();

        let details = serde_json::from_slice::<serde_json::Value>(&body).unwrap_or_else(|_| {
            serde_json::json!({ "message": String::from_utf8_lossy(&body).to_string() })
        });

        let code = details["errors"][0]["code"].as_str().map(str::to_string);
        let message = details["message"]
            .as_str()
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("gateway returned HTTP {}", status));

        warn!(status, code = ?code, "Gateway rejected request");

        GatewayError::Rejected {
            status,
            code,
            message,
            details: Some(details),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_order(
        &self,
        request: &TerminalOrderRequest,
        idempotency_key: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        debug!(external_reference = %request.external_reference, "Creating terminal order");

        let response = self
            .client
            .post(self.order_url(None))
            .bearer_auth(&self.access_token)
            .header("X-Idempotency-Key", idempotency_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    async fn cancel_order(&self, gateway_order_id: &str) -> Result<(), GatewayError> {
        debug!(gateway_order_id = %gateway_order_id, "Canceling terminal order");

        let response = self
            .client
            .delete(self.order_url(Some(gateway_order_id)))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(())
    }

    async fn get_order(&self, gateway_order_id: &str) -> Result<GatewayOrderDetails, GatewayError> {
        let response = self
            .client
            .get(self.order_url(Some(gateway_order_id)))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        response
            .json::<GatewayOrderDetails>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
