//! Permanent, server-tracked sessions
//!
//! The raw session secret is handed to the client exactly once. Only its
//! SHA-256 digest is stored, so a leaked table cannot be replayed as bearer
//! tokens.

use chrono::{Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::models::{ActiveSession, NewSession, SessionSummary};
use crate::repositories::SessionRepository;

/// Random bytes behind every session secret
pub const SESSION_SECRET_BYTES: usize = 64;

/// A freshly created permanent session
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Raw secret; returned to the client and never stored
    pub secret: String,
    pub session_id: Uuid,
}

/// Session store for permanent sessions
#[derive(Clone)]
pub struct SessionStore {
    repository: Arc<dyn SessionRepository>,
}

impl SessionStore {
    /// Create a new session store
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self { repository }
    }

    /// Generate a hex-encoded secret from the operating system CSPRNG
    pub fn generate_secret() -> AuthResult<String> {
        let mut bytes = [0u8; SESSION_SECRET_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| AuthError::EncryptionBackendFailure(e.to_string()))?;
        Ok(hex::encode(bytes))
    }

    /// One-way digest stored in place of the secret
    pub fn hash_secret(secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Store a session for `user_id` keyed by the digest of `raw_secret`
    pub async fn create_session(
        &self,
        user_id: Uuid,
        raw_secret: &str,
        device_info: Option<String>,
        ip_address: Option<String>,
        ttl: Option<Duration>,
    ) -> AuthResult<Uuid> {
        info!("Creating permanent session for user: {}", user_id);

        let session = NewSession {
            user_id,
            token_hash: Self::hash_secret(raw_secret),
            device_info,
            ip_address,
            expires_at: ttl.map(|ttl| Utc::now() + ttl),
        };

        Ok(self.repository.insert(&session).await?)
    }

    /// Generate a secret and create a session for it
    pub async fn issue(
        &self,
        user_id: Uuid,
        device_info: Option<String>,
        ip_address: Option<String>,
        ttl: Option<Duration>,
    ) -> AuthResult<IssuedSession> {
        let secret = Self::generate_secret()?;
        let session_id = self
            .create_session(user_id, &secret, device_info, ip_address, ttl)
            .await?;

        Ok(IssuedSession { secret, session_id })
    }

    /// Resolve a raw secret to its live session and record the activity
    pub async fn validate(&self, raw_secret: &str) -> AuthResult<ActiveSession> {
        if raw_secret.is_empty() {
            return Err(AuthError::SessionNotFound);
        }

        let token_hash = Self::hash_secret(raw_secret);
        let active = self
            .repository
            .find_active_by_hash(&token_hash)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        let matches: bool = active
            .session
            .token_hash
            .as_bytes()
            .ct_eq(token_hash.as_bytes())
            .into();
        if !matches {
            return Err(AuthError::SessionNotFound);
        }

        self.repository.touch(&token_hash).await?;
        debug!("Validated permanent session {}", active.session.id);

        Ok(active)
    }

    /// Soft-revoke the session behind `raw_secret`
    pub async fn revoke(&self, raw_secret: &str) -> AuthResult<bool> {
        if raw_secret.is_empty() {
            return Ok(false);
        }

        let revoked = self
            .repository
            .deactivate(&Self::hash_secret(raw_secret))
            .await?;
        if revoked {
            info!("Revoked permanent session");
        }

        Ok(revoked)
    }

    /// Soft-revoke every session of a user (logout from all devices)
    pub async fn revoke_all(&self, user_id: Uuid) -> AuthResult<u64> {
        info!("Revoking all sessions for user: {}", user_id);
        Ok(self.repository.deactivate_all(user_id).await?)
    }

    /// Active sessions of a user, most recently used first
    pub async fn list_active(&self, user_id: Uuid) -> AuthResult<Vec<SessionSummary>> {
        Ok(self.repository.list_active(user_id).await?)
    }

    /// Soft-revoke sessions whose expiry has passed
    pub async fn deactivate_expired(&self) -> AuthResult<u64> {
        Ok(self.repository.deactivate_expired().await?)
    }
}
