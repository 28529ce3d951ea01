//! # Device Repository
//!
//! Kiosk device records and their one-shot activation.
//!
//! ## Activation Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   │                                                                     │
//! │   ▼                                                                     │
//! │  UPDATE devices                                                        │
//! │     SET device_identifier = ?, status = 'active',                      │
//! │         consumed_code = activation_code, activation_code = NULL, ...   │
//! │   WHERE id = ? AND status = 'inactive' AND activation_code = ?         │
//! │   │                                                                     │
//! │   ├── UNIQUE(device_identifier) fails → Conflict                       │
//! │   ├── 0 rows → NotUpdated (someone else consumed the code first)       │
//! │   └── 1 row  → replace sessions, COMMIT → Activated                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::session::replace_sessions;
use kiosk_core::{Device, DeviceSession, DeviceStatus};

/// Repository for kiosk devices.
#[derive(Debug, Clone)]
pub struct DeviceRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    id: String,
    activation_code: Option<String>,
    consumed_code: Option<String>,
    device_identifier: Option<String>,
    status: DeviceStatus,
    activated_at: Option<DateTime<Utc>>,
    last_seen_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Device {
            id: row.id,
            activation_code: row.activation_code,
            consumed_code: row.consumed_code,
            device_identifier: row.device_identifier,
            status: row.status,
            activated_at: row.activated_at,
            last_seen_at: row.last_seen_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const DEVICE_COLUMNS: &str = "id, activation_code, consumed_code, device_identifier, status, \
                              activated_at, last_seen_at, created_at, updated_at";

/// Result of the conditional activation write.
#[derive(Debug)]
pub enum ActivationWrite {
    /// The row flipped to active and a session was issued.
    Activated { device: Device, session: DeviceSession },
    /// The guarded update matched no row.
    NotUpdated,
    /// The identifier is already bound to another row.
    Conflict,
}

impl DeviceRepository {
    /// Creates a new DeviceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DeviceRepository { pool }
    }

    /// Provisions an inactive device holding an activation code.
    ///
    /// `device_identifier` pre-binds the code to one piece of hardware.
    pub async fn insert_inactive(
        &self,
        activation_code: &str,
        device_identifier: Option<&str>,
    ) -> DbResult<Device> {
        debug!(activation_code = %activation_code, "Provisioning device");

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO devices (id, activation_code, device_identifier, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&id)
        .bind(activation_code)
        .bind(device_identifier)
        .bind(DeviceStatus::Inactive)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, activation_code),
            other => other,
        })?;

        Ok(Device {
            id,
            activation_code: Some(activation_code.to_string()),
            consumed_code: None,
            device_identifier: device_identifier.map(str::to_string),
            status: DeviceStatus::Inactive,
            activated_at: None,
            last_seen_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Gets a device by row id.
    pub async fn get(&self, id: &str) -> DbResult<Option<Device>> {
        let sql = format!("SELECT {} FROM devices WHERE id = ?1", DEVICE_COLUMNS);
        let row = sqlx::query_as::<_, DeviceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Device::from))
    }

    /// Gets the device bound to a hardware identifier.
    pub async fn find_by_identifier(&self, device_identifier: &str) -> DbResult<Option<Device>> {
        let sql = format!("SELECT {} FROM devices WHERE device_identifier = ?1", DEVICE_COLUMNS);
        let row = sqlx::query_as::<_, DeviceRow>(&sql)
            .bind(device_identifier)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Device::from))
    }

    /// Finds the device holding a code, outstanding or already consumed.
    ///
    /// An outstanding code wins over a consumed one with the same value.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Device>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM devices
            WHERE activation_code = ?1 OR consumed_code = ?1
            ORDER BY CASE WHEN activation_code = ?1 THEN 0 ELSE 1 END, updated_at DESC
            LIMIT 1
            "#,
            DEVICE_COLUMNS
        );
        let row = sqlx::query_as::<_, DeviceRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Device::from))
    }

    /// Conditionally activates a device and issues its first session.
    ///
    /// See the module docs for the guarded update.
    pub async fn activate(
        &self,
        id: &str,
        activation_code: &str,
        device_identifier: &str,
        session_expires_at: DateTime<Utc>,
    ) -> DbResult<ActivationWrite> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE devices
            SET device_identifier = ?3,
                status = ?4,
                consumed_code = activation_code,
                activation_code = NULL,
                activated_at = ?5,
                last_seen_at = ?5,
                updated_at = ?5
            WHERE id = ?1 AND status = ?6 AND activation_code = ?2
            "#,
        )
        .bind(id)
        .bind(activation_code)
        .bind(device_identifier)
        .bind(DeviceStatus::Active)
        .bind(now)
        .bind(DeviceStatus::Inactive)
        .execute(&mut *tx)
        .await;

        let rows = match result {
            Ok(done) => done.rows_affected(),
            Err(e) => {
                let err = DbError::from(e);
                if err.is_unique_violation_on("devices.device_identifier") {
                    info!(device_identifier = %device_identifier, "Identifier already bound");
                    return Ok(ActivationWrite::Conflict);
                }
                return Err(err);
            }
        };

        if rows == 0 {
            return Ok(ActivationWrite::NotUpdated);
        }

        let session = replace_sessions(&mut tx, id, session_expires_at).await?;
        tx.commit().await?;

        let device = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Device", id))?;

        info!(device_id = %id, "Device activated");
        Ok(ActivationWrite::Activated { device, session })
    }

    /// Records a heartbeat on an active device.
    ///
    /// ## Returns
    /// * `Ok(true)` - `last_seen_at` updated
    /// * `Ok(false)` - the row is no longer active
    pub async fn touch_last_seen(&self, id: &str) -> DbResult<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE devices SET last_seen_at = ?2, updated_at = ?2 WHERE id = ?1 AND status = ?3",
        )
        .bind(id)
        .bind(now)
        .bind(DeviceStatus::Active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn expiry() -> DateTime<Utc> {
        Utc::now() + chrono::Duration::days(30)
    }

    #[tokio::test]
    async fn test_insert_and_find_by_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let devices = db.devices();
        let device = devices.insert_inactive("ABC123", None).await.unwrap();

        let found = devices.find_by_code("ABC123").await.unwrap().unwrap();
        assert_eq!(found.id, device.id);
        assert_eq!(found.status, DeviceStatus::Inactive);
        assert!(devices.find_by_code("ZZZ999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let devices = db.devices();
        devices.insert_inactive("ABC123", None).await.unwrap();
        let err = devices.insert_inactive("ABC123", None).await.unwrap_err();
        assert!(err.is_unique_violation_on("devices.activation_code"));
    }

    #[tokio::test]
    async fn test_activate_consumes_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let devices = db.devices();
        let device = devices.insert_inactive("ABC123", None).await.unwrap();

        let write = devices
            .activate(&device.id, "ABC123", "hw-1", expiry())
            .await
            .unwrap();
        let ActivationWrite::Activated { device: active, session } = write else {
            panic!("expected activation");
        };

        assert!(active.is_active());
        assert_eq!(active.activation_code, None);
        assert_eq!(active.consumed_code.as_deref(), Some("ABC123"));
        assert_eq!(active.device_identifier.as_deref(), Some("hw-1"));
        assert!(active.activated_at.is_some());
        assert_eq!(session.device_id, device.id);

        // The consumed code still resolves, to the now-active row.
        let by_code = devices.find_by_code("ABC123").await.unwrap().unwrap();
        assert!(by_code.is_active());

        let again = devices
            .activate(&device.id, "ABC123", "hw-1", expiry())
            .await
            .unwrap();
        assert!(matches!(again, ActivationWrite::NotUpdated));
    }

    #[tokio::test]
    async fn test_activate_identifier_conflict() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let devices = db.devices();
        let first = devices.insert_inactive("AAA111", None).await.unwrap();
        let second = devices.insert_inactive("BBB222", None).await.unwrap();

        devices.activate(&first.id, "AAA111", "hw-1", expiry()).await.unwrap();
        let write = devices
            .activate(&second.id, "BBB222", "hw-1", expiry())
            .await
            .unwrap();

        assert!(matches!(write, ActivationWrite::Conflict));
        let untouched = devices.get(&second.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, DeviceStatus::Inactive);
        assert_eq!(untouched.activation_code.as_deref(), Some("BBB222"));
    }

    #[tokio::test]
    async fn test_touch_last_seen_requires_active() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let devices = db.devices();
        let device = devices.insert_inactive("ABC123", Some("hw-9")).await.unwrap();

        assert!(!devices.touch_last_seen(&device.id).await.unwrap());

        devices.activate(&device.id, "ABC123", "hw-9", expiry()).await.unwrap();
        assert!(devices.touch_last_seen(&device.id).await.unwrap());
        assert!(devices
            .find_by_identifier("hw-9")
            .await
            .unwrap()
            .unwrap()
            .last_seen_at
            .is_some());
    }
}
