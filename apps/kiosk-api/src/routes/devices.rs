//! # Device Routes
//!
//! ```text
//! POST /api/devices/activate   { activationCode, deviceId } → session token
//! POST /api/devices/heartbeat  { deviceId }                 → { allowed, reason }
//! POST /api/devices/session    { deviceId }                 → fresh session token
//! GET  /api/devices/session    Authorization: Bearer <token>
//! ```

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kiosk_core::Heartbeat;
use kiosk_engine::Activation;

use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/devices/activate", post(activate))
        .route("/api/devices/heartbeat", post(heartbeat))
        .route("/api/devices/session", post(renew_session).get(current_session))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateBody {
    #[serde(default)]
    pub activation_code: String,
    #[serde(default)]
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceBody {
    #[serde(default)]
    pub device_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    success: bool,
    session_token: String,
    expires_at: DateTime<Utc>,
    device_id: Option<String>,
}

impl From<Activation> for SessionResponse {
    fn from(activation: Activation) -> Self {
        SessionResponse {
            success: true,
            session_token: activation.session.id,
            expires_at: activation.session.expires_at,
            device_id: activation.device.device_identifier,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSessionResponse {
    device_id: Option<String>,
    expires_at: DateTime<Utc>,
    last_seen_at: Option<DateTime<Utc>>,
}

async fn activate(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ActivateBody>,
) -> ApiResult<Json<SessionResponse>> {
    let activation = state
        .devices
        .activate(&body.activation_code, &body.device_id)
        .await?;
    Ok(Json(activation.into()))
}

async fn heartbeat(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DeviceBody>,
) -> ApiResult<Json<Heartbeat>> {
    Ok(Json(state.devices.validate_heartbeat(&body.device_id).await?))
}

async fn renew_session(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DeviceBody>,
) -> ApiResult<Json<SessionResponse>> {
    let activation = state.devices.renew_session(&body.device_id).await?;
    Ok(Json(activation.into()))
}

async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<CurrentSessionResponse>> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

    let validated = state
        .devices
        .validate_session(token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    Ok(Json(CurrentSessionResponse {
        device_id: validated.device.device_identifier,
        expires_at: validated.session.expires_at,
        last_seen_at: validated.device.last_seen_at,
    }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  tok-1 "));
        assert_eq!(bearer_token(&headers), Some("tok-1"));
    }
}
