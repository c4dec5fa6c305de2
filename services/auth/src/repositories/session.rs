//! Permanent session repository for database operations

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::{SessionRepository, user::decode_role};
use crate::models::{ActiveSession, NewSession, PermanentSession, Principal, SessionSummary};

/// Session repository
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_active_session(row: PgRow) -> DatabaseResult<ActiveSession> {
    let session = PermanentSession {
        id: row.try_get("id").map_err(DatabaseError::Query)?,
        user_id: row.try_get("user_id").map_err(DatabaseError::Query)?,
        token_hash: row.try_get("token_hash").map_err(DatabaseError::Query)?,
        device_info: row.try_get("device_info").map_err(DatabaseError::Query)?,
        ip_address: row.try_get("ip_address").map_err(DatabaseError::Query)?,
        created_at: row.try_get("created_at").map_err(DatabaseError::Query)?,
        last_activity: row.try_get("last_activity").map_err(DatabaseError::Query)?,
        expires_at: row.try_get("expires_at").map_err(DatabaseError::Query)?,
        is_active: row.try_get("is_active").map_err(DatabaseError::Query)?,
    };

    let principal = Principal {
        id: session.user_id,
        email: row.try_get("email").map_err(DatabaseError::Query)?,
        name: row.try_get("name").map_err(DatabaseError::Query)?,
        role: decode_role(&row)?,
    };

    Ok(ActiveSession { session, principal })
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn insert(&self, session: &NewSession) -> DatabaseResult<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO user_sessions (id, user_id, token_hash, device_info, ip_address, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(session.user_id)
        .bind(&session.token_hash)
        .bind(&session.device_info)
        .bind(&session.ip_address)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(id)
    }

    async fn find_active_by_hash(&self, token_hash: &str) -> DatabaseResult<Option<ActiveSession>> {
        let row = sqlx::query(
            r#"
            SELECT s.id, s.user_id, s.token_hash, s.device_info, s.ip_address,
                   s.created_at, s.last_activity, s.expires_at, s.is_active,
                   u.name, u.email, u.role
            FROM user_sessions s
            JOIN users u ON s.user_id = u.id
            WHERE s.token_hash = $1 AND s.is_active = TRUE
              AND (s.expires_at IS NULL OR s.expires_at > NOW())
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.map(map_active_session).transpose()
    }

    async fn touch(&self, token_hash: &str) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            UPDATE user_sessions
            SET last_activity = NOW()
            WHERE token_hash = $1 AND is_active = TRUE
            "#,
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    async fn deactivate(&self, token_hash: &str) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET is_active = FALSE
            WHERE token_hash = $1 AND is_active = TRUE
            "#,
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_all(&self, user_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET is_active = FALSE
            WHERE user_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected())
    }

    async fn deactivate_expired(&self) -> DatabaseResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET is_active = FALSE
            WHERE is_active = TRUE AND expires_at IS NOT NULL AND expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        if result.rows_affected() > 0 {
            info!("Deactivated {} expired sessions", result.rows_affected());
        }

        Ok(result.rows_affected())
    }

    async fn list_active(&self, user_id: Uuid) -> DatabaseResult<Vec<SessionSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, device_info, ip_address, last_activity, created_at, expires_at
            FROM user_sessions
            WHERE user_id = $1 AND is_active = TRUE
            ORDER BY last_activity DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.into_iter()
            .map(|row| -> DatabaseResult<SessionSummary> {
                Ok(SessionSummary {
                    id: row.try_get("id").map_err(DatabaseError::Query)?,
                    device_info: row.try_get("device_info").map_err(DatabaseError::Query)?,
                    ip_address: row.try_get("ip_address").map_err(DatabaseError::Query)?,
                    last_activity: row.try_get("last_activity").map_err(DatabaseError::Query)?,
                    created_at: row.try_get("created_at").map_err(DatabaseError::Query)?,
                    expires_at: row.try_get("expires_at").map_err(DatabaseError::Query)?,
                })
            })
            .collect()
    }
}
