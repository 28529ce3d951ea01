//! # Device Activation
//!
//! One-shot activation of kiosk devices, heartbeats and bearer sessions.
//!
//! ## Activation Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  activate(code, device_id)                                              │
//! │                                                                         │
//! │  1. trim both, reject empty                       → Validation         │
//! │  2. row bound to device_id is active              → AlreadyActivated   │
//! │       (that row consumed this very code)          → CodeAlreadyUsed    │
//! │  3. no row holds the code                         → CodeNotFound       │
//! │     code's row is active                          → CodeAlreadyUsed    │
//! │  4. code's row bound to other hardware            → CodeNotApplicable  │
//! │  5. device_id bound to a different row            → DeviceBoundElsewhere│
//! │  6. conditional UPDATE ... WHERE status='inactive' AND code = ?        │
//! │       unique violation on device_identifier       → Conflict           │
//! │       0 rows (lost the race)                      → AlreadyUsedOrInactive│
//! │       1 row                                       → Activated + session │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps 2-5 are advisory reads; only step 6 decides. No lock is held
//! between them.

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, EngineResult};
use kiosk_core::validation::require_text;
use kiosk_core::{Device, DeviceSession, Heartbeat, HeartbeatReason};
use kiosk_db::{ActivationWrite, Database};

/// A successful activation.
#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub device: Device,
    pub session: DeviceSession,
}

/// A session that passed validation, with its owning device.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedSession {
    pub device: Device,
    pub session: DeviceSession,
}

/// Device activation state machine plus session issuance.
#[derive(Debug, Clone)]
pub struct DeviceActivation {
    db: Database,
    session_validity: Duration,
}

impl DeviceActivation {
    pub fn new(db: Database, session_validity: Duration) -> Self {
        DeviceActivation {
            db,
            session_validity,
        }
    }

    /// Redeems an activation code for a device identifier.
    pub async fn activate(&self, activation_code: &str, device_id: &str) -> EngineResult<Activation> {
        let code = require_text("activation_code", activation_code)?;
        let device_id = require_text("device_id", device_id)?;
        let devices = self.db.devices();

        let bound = devices.find_by_identifier(device_id).await?;
        if let Some(existing) = bound.as_ref().filter(|d| d.is_active()) {
            if existing.consumed_code.as_deref() == Some(code) {
                return Err(EngineError::CodeAlreadyUsed);
            }
            return Err(EngineError::AlreadyActivated);
        }

        let target = devices
            .find_by_code(code)
            .await?
            .ok_or(EngineError::CodeNotFound)?;
        if target.is_active() {
            return Err(EngineError::CodeAlreadyUsed);
        }

        if let Some(bound_to) = target.device_identifier.as_deref() {
            if bound_to != device_id {
                return Err(EngineError::CodeNotApplicable);
            }
        }

        if let Some(existing) = bound.as_ref() {
            if existing.id != target.id {
                return Err(EngineError::DeviceBoundElsewhere);
            }
        }

        let expires_at = Utc::now() + self.session_validity;
        match devices.activate(&target.id, code, device_id, expires_at).await? {
            ActivationWrite::Activated { device, session } => {
                info!(device_id = %device_id, row_id = %device.id, "Device activated");
                Ok(Activation { device, session })
            }
            ActivationWrite::Conflict => {
                warn!(device_id = %device_id, "Activation lost to a concurrent binding");
                Err(EngineError::Conflict(format!(
                    "device {} was bound to another record concurrently",
                    device_id
                )))
            }
            ActivationWrite::NotUpdated => {
                warn!(device_id = %device_id, "Activation code consumed concurrently");
                Err(EngineError::AlreadyUsedOrInactive)
            }
        }
    }

    /// Checks that a device may keep operating and records that it was seen.
    pub async fn validate_heartbeat(&self, device_id: &str) -> EngineResult<Heartbeat> {
        let device_id = require_text("device_id", device_id)?;
        let devices = self.db.devices();

        let Some(device) = devices.find_by_identifier(device_id).await? else {
            debug!(device_id = %device_id, "Heartbeat from unknown device");
            return Ok(Heartbeat::denied(HeartbeatReason::NotFound));
        };
        if !device.is_active() {
            return Ok(Heartbeat::denied(HeartbeatReason::Inactive));
        }

        if !devices.touch_last_seen(&device.id).await? {
            error!(device_id = %device_id, "Heartbeat update matched no active row");
            return Err(EngineError::Internal(format!(
                "heartbeat update for device {} affected no rows",
                device_id
            )));
        }

        Ok(Heartbeat::allowed())
    }

    /// Issues a fresh session for a device row, revoking older ones.
    pub async fn issue_session(&self, device: &Device) -> EngineResult<DeviceSession> {
        let expires_at = Utc::now() + self.session_validity;
        let session = self.db.sessions().issue(&device.id, expires_at).await?;
        debug!(row_id = %device.id, "Session issued");
        Ok(session)
    }

    /// Re-binds a running device: heartbeat first, then a new session.
    ///
    /// ## Errors
    /// * `NotFound` - no device with that identifier
    /// * `AlreadyUsedOrInactive` - the device is not active
    pub async fn renew_session(&self, device_id: &str) -> EngineResult<Activation> {
        let heartbeat = self.validate_heartbeat(device_id).await?;
        match heartbeat.reason {
            HeartbeatReason::NotFound => {
                return Err(EngineError::not_found("Device", device_id.trim()))
            }
            HeartbeatReason::Inactive => return Err(EngineError::AlreadyUsedOrInactive),
            HeartbeatReason::Active => {}
        }

        let device = self
            .db
            .devices()
            .find_by_identifier(device_id.trim())
            .await?
            .ok_or_else(|| EngineError::not_found("Device", device_id.trim()))?;
        let session = self.issue_session(&device).await?;
        Ok(Activation { device, session })
    }

    /// Resolves a bearer token to a live session on an active device.
    ///
    /// Returns `None` for unknown, expired or orphaned tokens.
    pub async fn validate_session(&self, token: &str) -> EngineResult<Option<ValidatedSession>> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }

        let Some(session) = self.db.sessions().find(token).await? else {
            return Ok(None);
        };
        if session.is_expired(Utc::now()) {
            debug!(row_id = %session.device_id, "Expired session presented");
            return Ok(None);
        }

        let device = self.db.devices().get(&session.device_id).await?;
        Ok(device
            .filter(Device::is_active)
            .map(|device| ValidatedSession { device, session }))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_db::DbConfig;

    async fn setup() -> (Database, DeviceActivation) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let activation = DeviceActivation::new(db.clone(), Duration::days(30));
        (db, activation)
    }

    #[tokio::test]
    async fn test_activate_then_reuse_is_code_already_used() {
        let (db, activation) = setup().await;
        db.devices().insert_inactive("ABC123", Some("dev-1")).await.unwrap();

        let first = activation.activate("ABC123", "dev-1").await.unwrap();
        assert!(first.device.is_active());
        assert_eq!(first.device.activation_code, None);
        assert!(first.session.expires_at > Utc::now() + Duration::days(29));

        let err = activation.activate("ABC123", "dev-1").await.unwrap_err();
        assert!(matches!(err, EngineError::CodeAlreadyUsed));
    }

    #[tokio::test]
    async fn test_activate_validation() {
        let (_, activation) = setup().await;
        for (code, device) in [("", "dev-1"), ("ABC123", "   ")] {
            assert!(matches!(
                activation.activate(code, device).await,
                Err(EngineError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_activate_unknown_code() {
        let (_, activation) = setup().await;
        assert!(matches!(
            activation.activate("NOPE00", "dev-1").await,
            Err(EngineError::CodeNotFound)
        ));
    }

    #[tokio::test]
    async fn test_active_device_cannot_take_another_code() {
        let (db, activation) = setup().await;
        db.devices().insert_inactive("AAA111", None).await.unwrap();
        db.devices().insert_inactive("BBB222", None).await.unwrap();

        activation.activate("AAA111", "dev-1").await.unwrap();
        assert!(matches!(
            activation.activate("BBB222", "dev-1").await,
            Err(EngineError::AlreadyActivated)
        ));
    }

    #[tokio::test]
    async fn test_consumed_code_on_other_device_is_code_already_used() {
        let (db, activation) = setup().await;
        db.devices().insert_inactive("AAA111", None).await.unwrap();
        activation.activate("AAA111", "dev-1").await.unwrap();

        assert!(matches!(
            activation.activate("AAA111", "dev-2").await,
            Err(EngineError::CodeAlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn test_code_scoped_to_bound_hardware() {
        let (db, activation) = setup().await;
        db.devices().insert_inactive("AAA111", Some("dev-1")).await.unwrap();

        assert!(matches!(
            activation.activate("AAA111", "dev-2").await,
            Err(EngineError::CodeNotApplicable)
        ));
    }

    #[tokio::test]
    async fn test_identifier_bound_to_other_inactive_row() {
        let (db, activation) = setup().await;
        db.devices().insert_inactive("AAA111", Some("dev-1")).await.unwrap();
        db.devices().insert_inactive("BBB222", None).await.unwrap();

        assert!(matches!(
            activation.activate("BBB222", "dev-1").await,
            Err(EngineError::DeviceBoundElsewhere)
        ));
    }

    #[tokio::test]
    async fn test_heartbeat_outcomes() {
        let (db, activation) = setup().await;
        db.devices().insert_inactive("AAA111", Some("dev-1")).await.unwrap();

        assert_eq!(
            activation.validate_heartbeat("ghost").await.unwrap(),
            Heartbeat::denied(HeartbeatReason::NotFound)
        );
        assert_eq!(
            activation.validate_heartbeat("dev-1").await.unwrap(),
            Heartbeat::denied(HeartbeatReason::Inactive)
        );

        activation.activate("AAA111", "dev-1").await.unwrap();
        assert_eq!(
            activation.validate_heartbeat("dev-1").await.unwrap(),
            Heartbeat::allowed()
        );
        assert!(matches!(
            activation.validate_heartbeat("").await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_renew_session_revokes_previous_token() {
        let (db, activation) = setup().await;
        db.devices().insert_inactive("AAA111", None).await.unwrap();
        let first = activation.activate("AAA111", "dev-1").await.unwrap();

        let renewed = activation.renew_session("dev-1").await.unwrap();
        assert_ne!(renewed.session.id, first.session.id);
        assert!(activation
            .validate_session(&first.session.id)
            .await
            .unwrap()
            .is_none());

        let valid = activation
            .validate_session(&renewed.session.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(valid.device.device_identifier.as_deref(), Some("dev-1"));
        assert_eq!(db.sessions().count_for_device(&first.device.id).await.unwrap(), 1);

        assert!(matches!(
            activation.renew_session("ghost").await,
            Err(EngineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let (db, activation) = setup().await;
        let device = db.devices().insert_inactive("AAA111", None).await.unwrap();
        activation.activate("AAA111", "dev-1").await.unwrap();

        let stale = db
            .sessions()
            .issue(&device.id, Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        assert!(activation.validate_session(&stale.id).await.unwrap().is_none());
        assert!(activation.validate_session("").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_activations_have_one_winner() {
        let db = crate::testing::file_database().await.unwrap();
        db.devices().insert_inactive("RACE01", None).await.unwrap();
        let activation = DeviceActivation::new(db.clone(), Duration::days(30));

        let attempts: Vec<_> = (0..8)
            .map(|n| {
                let activation = activation.clone();
                tokio::spawn(async move {
                    activation.activate("RACE01", &format!("dev-{}", n % 2)).await
                })
            })
            .collect();

        let mut winners = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert!(
                    matches!(
                        e,
                        EngineError::Conflict(_)
                            | EngineError::AlreadyUsedOrInactive
                            | EngineError::CodeAlreadyUsed
                            | EngineError::AlreadyActivated
                    ),
                    "unexpected loser error: {e:?}"
                ),
            }
        }

        assert_eq!(winners, 1);
        let device = db.devices().find_by_code("RACE01").await.unwrap().unwrap();
        assert!(device.is_active());
        assert_eq!(db.sessions().count_for_device(&device.id).await.unwrap(), 1);
        db.close().await;
    }
}
