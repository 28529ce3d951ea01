//! Test support: an in-process [`PaymentGateway`] and file-backed databases.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use kiosk_db::{Database, DbConfig, DbResult};

use crate::gateway::{
    GatewayError, GatewayOrder, GatewayOrderDetails, PaymentGateway, TerminalOrderRequest,
};

#[derive(Debug, Default)]
struct FakeState {
    creates: Vec<(TerminalOrderRequest, String)>,
    create_rejection: Option<(u16, Option<String>)>,
    cancel_rejection: Option<u16>,
    statuses: HashMap<String, String>,
}

/// Scriptable gateway: accepts everything unless told otherwise.
///
/// Created orders get the id `mp-<external_reference>`.
#[derive(Debug, Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
}

fn rejection(status: u16, code: Option<String>) -> GatewayError {
    GatewayError::Rejected {
        status,
        code: code.clone(),
        message: format!("fake gateway rejection {}", status),
        details: Some(serde_json::json!({
            "message": "fake gateway rejection",
            "errors": code.map(|c| vec![serde_json::json!({ "code": c })]).unwrap_or_default(),
        })),
    }
}

impl FakeGateway {
    /// The last accepted create call and its idempotency key.
    pub async fn last_create(&self) -> Option<(TerminalOrderRequest, String)> {
        self.state.lock().await.creates.last().cloned()
    }

    pub async fn create_count(&self) -> usize {
        self.state.lock().await.creates.len()
    }

    /// Makes subsequent creates fail with `status` and an optional error code.
    pub async fn reject_create_with(&self, status: u16, code: Option<&str>) {
        self.state.lock().await.create_rejection = Some((status, code.map(str::to_string)));
    }

    /// Makes subsequent cancels fail with `status`.
    pub async fn reject_cancel_with(&self, status: u16) {
        self.state.lock().await.cancel_rejection = Some(status);
    }

    /// Sets the status `get_order` reports for an order.
    pub async fn set_order_status(&self, gateway_order_id: &str, status: &str) {
        self.state
            .lock()
            .await
            .statuses
            .insert(gateway_order_id.to_string(), status.to_string());
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        request: &TerminalOrderRequest,
        idempotency_key: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        let mut state = self.state.lock().await;
        if let Some((status, code)) = state.create_rejection.clone() {
            return Err(rejection(status, code));
        }

        state
            .creates
            .push((request.clone(), idempotency_key.to_string()));

        let id = format!("mp-{}", request.external_reference);
        state.statuses.insert(id.clone(), "created".to_string());

        Ok(GatewayOrder {
            id,
            status: "created".to_string(),
            external_reference: Some(request.external_reference.clone()),
        })
    }

    async fn cancel_order(&self, gateway_order_id: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        if let Some(status) = state.cancel_rejection {
            return Err(rejection(status, None));
        }
        state
            .statuses
            .insert(gateway_order_id.to_string(), "canceled".to_string());
        Ok(())
    }

    async fn get_order(&self, gateway_order_id: &str) -> Result<GatewayOrderDetails, GatewayError> {
        let state = self.state.lock().await;
        match state.statuses.get(gateway_order_id) {
            Some(status) => Ok(GatewayOrderDetails {
                id: gateway_order_id.to_string(),
                status: status.clone(),
                status_detail: None,
            }),
            None => Err(rejection(404, Some("order_not_found".to_string()))),
        }
    }
}

/// A fresh database file under the system temp dir.
///
/// Unlike `DbConfig::in_memory()` this pool has several connections, so
/// concurrent requests really race inside SQLite.
pub async fn file_database() -> DbResult<Database> {
    let path = std::env::temp_dir().join(format!("kiosk-test-{}.db", Uuid::new_v4()));
    Database::new(DbConfig::new(path).max_connections(8)).await
}
