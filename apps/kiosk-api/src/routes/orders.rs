//! # Order Routes

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kiosk_core::{Money, NewOrder, Order, OrderItem, OrderStatus, UserOrder};
use kiosk_engine::{GatewayOrderRequest, WebhookOutcome};

use crate::error::{ApiError, ApiJson, ApiResult};
use crate::routes::payments::CreatedOrderResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", post(register_order))
        .route("/api/orders/checkout", post(checkout))
        .route("/api/orders/{id}/status", get(order_status))
        .route("/api/orders/{id}/reconcile", post(reconcile_order))
        .route("/api/users/{user_id}/orders", get(user_orders))
}

// =============================================================================
// Bodies
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOrderBody {
    pub user_id: String,
    #[serde(alias = "mercadopagoOrderId")]
    pub gateway_order_id: String,
    /// Decimal amount, e.g. `12.5`.
    pub total_amount: serde_json::Number,
    pub payment_method: String,
    pub items: Vec<OrderItem>,
}

impl RegisterOrderBody {
    fn into_new_order(self) -> Result<NewOrder, ApiError> {
        let total = Money::parse_decimal(&self.total_amount.to_string())
            .map_err(|e| ApiError::bad_request(format!("totalAmount: {}", e)))?;

        Ok(NewOrder {
            user_id: self.user_id,
            gateway_order_id: self.gateway_order_id,
            total,
            payment_method: self.payment_method,
            items: self.items,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub user_id: String,
    #[serde(flatten)]
    pub order: GatewayOrderRequest,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct RegisteredResponse {
    success: bool,
    order: Order,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    #[serde(flatten)]
    gateway_order: CreatedOrderResponse,
    order: Order,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    order_id: String,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    order_id: String,
    gateway_status: String,
    status: OrderStatus,
    /// Whether the local order was written.
    changed: bool,
}

// =============================================================================
// Handlers
// =============================================================================

async fn register_order(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterOrderBody>,
) -> ApiResult<Json<RegisteredResponse>> {
    let order = state.orders.register_order(body.into_new_order()?).await?;
    Ok(Json(RegisteredResponse {
        success: true,
        order,
    }))
}

async fn checkout(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CheckoutBody>,
) -> ApiResult<Json<CheckoutResponse>> {
    let checkout = state.orders.checkout(&body.user_id, &body.order).await?;
    Ok(Json(CheckoutResponse {
        gateway_order: checkout.gateway_order.into(),
        order: checkout.order,
    }))
}

async fn order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let view = state.orders.get_status(&id).await?;
    Ok(Json(StatusResponse {
        order_id: view.gateway_order_id,
        status: view.status,
        created_at: view.created_at,
    }))
}

async fn reconcile_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReconcileResponse>> {
    let report = state.orders.reconcile_with_gateway(&id).await?;
    let changed = matches!(
        report.outcome,
        Some(WebhookOutcome::StatusUpdated { .. }) | Some(WebhookOutcome::StockSettled(_))
    );

    Ok(Json(ReconcileResponse {
        order_id: report.view.gateway_order_id,
        gateway_status: report.gateway_status,
        status: report.view.status,
        changed,
    }))
}

async fn user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<UserOrder>>> {
    Ok(Json(state.orders.list_user_orders(&user_id).await?))
}
