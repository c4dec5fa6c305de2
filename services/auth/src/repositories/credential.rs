//! Third-party credential repository for database operations

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::CredentialRepository;
use crate::models::{EncryptedCredential, NewCredential, Provider};

/// Credential repository
#[derive(Clone)]
pub struct PgCredentialRepository {
    pool: PgPool,
}

impl PgCredentialRepository {
    /// Create a new credential repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_credential(row: PgRow) -> DatabaseResult<EncryptedCredential> {
    let provider: String = row.try_get("provider").map_err(DatabaseError::Query)?;

    Ok(EncryptedCredential {
        provider: provider.parse().map_err(DatabaseError::Decode)?,
        id: row.try_get("id").map_err(DatabaseError::Query)?,
        user_id: row.try_get("user_id").map_err(DatabaseError::Query)?,
        username: row.try_get("username").map_err(DatabaseError::Query)?,
        encrypted_token: row.try_get("encrypted_token").map_err(DatabaseError::Query)?,
        scopes: row.try_get("scopes").map_err(DatabaseError::Query)?,
        last_verified: row.try_get("last_verified").map_err(DatabaseError::Query)?,
        is_active: row.try_get("is_active").map_err(DatabaseError::Query)?,
        created_at: row.try_get("created_at").map_err(DatabaseError::Query)?,
        updated_at: row.try_get("updated_at").map_err(DatabaseError::Query)?,
    })
}

#[async_trait]
impl CredentialRepository for PgCredentialRepository {
    async fn upsert(&self, credential: &NewCredential) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_credentials (id, user_id, provider, username, encrypted_token, scopes)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, provider) DO UPDATE SET
                username = EXCLUDED.username,
                encrypted_token = EXCLUDED.encrypted_token,
                scopes = EXCLUDED.scopes,
                last_verified = NOW(),
                is_active = TRUE,
                updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(credential.user_id)
        .bind(credential.provider.as_str())
        .bind(&credential.username)
        .bind(&credential.encrypted_token)
        .bind(&credential.scopes)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    async fn find_active(
        &self,
        user_id: Uuid,
        provider: Provider,
    ) -> DatabaseResult<Option<EncryptedCredential>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, provider, username, encrypted_token, scopes,
                   last_verified, is_active, created_at, updated_at
            FROM provider_credentials
            WHERE user_id = $1 AND provider = $2 AND is_active = TRUE
            "#,
        )
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.map(map_credential).transpose()
    }

    async fn deactivate(&self, user_id: Uuid, provider: Provider) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE provider_credentials
            SET is_active = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND provider = $2 AND is_active = TRUE
            "#,
        )
        .bind(user_id)
        .bind(provider.as_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }
}
