//! # Payment Routes
//!
//! Terminal orders at the payment gateway, and the gateway's webhook.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::Serialize;

use kiosk_engine::{CreatedGatewayOrder, GatewayOrderRequest, WebhookAck};

use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/payments/orders", post(create_order))
        .route("/api/payments/orders/{id}", delete(cancel_order))
        .route("/api/payments/webhook", post(webhook))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrderResponse {
    pub order_id: String,
    pub status: String,
    pub external_reference: String,
    /// Two-decimal string, as sent to the terminal.
    pub total_amount: String,
}

impl From<CreatedGatewayOrder> for CreatedOrderResponse {
    fn from(created: CreatedGatewayOrder) -> Self {
        CreatedOrderResponse {
            order_id: created.gateway_order_id,
            status: created.status,
            external_reference: created.external_reference,
            total_amount: created.total.to_decimal_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    success: bool,
    message: &'static str,
}

async fn create_order(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GatewayOrderRequest>,
) -> ApiResult<Json<CreatedOrderResponse>> {
    let created = state.orders.create_gateway_order(&request).await?;
    Ok(Json(created.into()))
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    state.orders.cancel_order(&id).await?;
    Ok(Json(CancelResponse {
        success: true,
        message: "Order canceled",
    }))
}

/// Always answers `200 {"ok":true}` so the gateway stops redelivering,
/// whatever the body held.
async fn webhook(State(state): State<AppState>, body: Bytes) -> Json<WebhookAck> {
    Json(state.orders.process_webhook_event(&body).await)
}
