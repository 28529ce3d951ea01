//! # Device Session Repository
//!
//! Bearer sessions for activated devices. A device holds at most one live
//! session: issuing a new one deletes the old rows in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use kiosk_core::DeviceSession;

/// Repository for device sessions.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    device_id: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for DeviceSession {
    fn from(row: SessionRow) -> Self {
        DeviceSession {
            id: row.id,
            device_id: row.device_id,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

/// Replaces a device's sessions with a fresh one on an open connection.
pub(crate) async fn replace_sessions(
    conn: &mut SqliteConnection,
    device_id: &str,
    expires_at: DateTime<Utc>,
) -> DbResult<DeviceSession> {
    sqlx::query("DELETE FROM device_sessions WHERE device_id = ?1")
        .bind(device_id)
        .execute(&mut *conn)
        .await?;

    let session = DeviceSession {
        id: Uuid::new_v4().to_string(),
        device_id: device_id.to_string(),
        expires_at,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO device_sessions (id, device_id, expires_at, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&session.id)
    .bind(&session.device_id)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(device_id = %device_id, "Device session issued");
    Ok(session)
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Issues a session for a device, revoking any previous ones.
    pub async fn issue(&self, device_id: &str, expires_at: DateTime<Utc>) -> DbResult<DeviceSession> {
        let mut tx = self.pool.begin().await?;
        let session = replace_sessions(&mut tx, device_id, expires_at).await?;
        tx.commit().await?;
        Ok(session)
    }

    /// Looks up a session by its bearer token.
    pub async fn find(&self, token: &str) -> DbResult<Option<DeviceSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, device_id, expires_at, created_at FROM device_sessions WHERE id = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DeviceSession::from))
    }

    /// Number of session rows held by a device.
    pub async fn count_for_device(&self, device_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM device_sessions WHERE device_id = ?1")
                .bind(device_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
