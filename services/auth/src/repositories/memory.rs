//! In-process implementation of the storage traits
//!
//! Mirrors the PostgreSQL semantics: sessions and credentials are only ever
//! soft-revoked, and there is at most one credential row per user and provider.

use async_trait::async_trait;
use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CredentialRepository, SessionRepository, UserRepository};
use crate::models::{
    ActiveSession, EncryptedCredential, NewCredential, NewSession, PermanentSession, Provider,
    Role, SessionSummary, User,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: Vec<PermanentSession>,
    credentials: Vec<EncryptedCredential>,
}

/// Shared in-memory tables
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed user, e.g. to seed an administrator
    pub async fn insert_user(&self, user: User) {
        self.tables.lock().await.users.insert(user.id, user);
    }

    /// Every session row of a user, revoked ones included
    pub async fn sessions_for(&self, user_id: Uuid) -> Vec<PermanentSession> {
        self.tables
            .lock()
            .await
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Every credential row of a user, revoked ones included
    pub async fn credentials_for(&self, user_id: Uuid) -> Vec<EncryptedCredential> {
        self.tables
            .lock()
            .await
            .credentials
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Overwrite the stored blob of a credential row
    pub async fn replace_encrypted_token(&self, user_id: Uuid, provider: Provider, blob: &str) {
        let mut tables = self.tables.lock().await;
        if let Some(row) = tables
            .credentials
            .iter_mut()
            .find(|c| c.user_id == user_id && c.provider == provider)
        {
            row.encrypted_token = blob.to_string();
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, name: &str, email: &str, password_hash: &str) -> DatabaseResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == email) {
            return Err(DatabaseError::Conflict(format!(
                "email already registered: {}",
                email
            )));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        };

        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert(&self, session: &NewSession) -> DatabaseResult<Uuid> {
        let now = Utc::now();
        let row = PermanentSession {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            token_hash: session.token_hash.clone(),
            device_info: session.device_info.clone(),
            ip_address: session.ip_address.clone(),
            created_at: now,
            last_activity: now,
            expires_at: session.expires_at,
            is_active: true,
        };
        let id = row.id;

        self.tables.lock().await.sessions.push(row);
        Ok(id)
    }

    async fn find_active_by_hash(&self, token_hash: &str) -> DatabaseResult<Option<ActiveSession>> {
        let now = Utc::now();
        let tables = self.tables.lock().await;

        let found = tables
            .sessions
            .iter()
            .find(|s| s.token_hash == token_hash && s.is_usable_at(now))
            .and_then(|session| {
                tables.users.get(&session.user_id).map(|user| ActiveSession {
                    session: session.clone(),
                    principal: user.principal(),
                })
            });

        Ok(found)
    }

    async fn touch(&self, token_hash: &str) -> DatabaseResult<()> {
        let now = Utc::now();
        let mut tables = self.tables.lock().await;

        for session in tables
            .sessions
            .iter_mut()
            .filter(|s| s.token_hash == token_hash && s.is_active)
        {
            session.last_activity = now;
        }

        Ok(())
    }

    async fn deactivate(&self, token_hash: &str) -> DatabaseResult<bool> {
        let mut tables = self.tables.lock().await;
        let mut flipped = false;

        for session in tables
            .sessions
            .iter_mut()
            .filter(|s| s.token_hash == token_hash && s.is_active)
        {
            session.is_active = false;
            flipped = true;
        }

        Ok(flipped)
    }

    async fn deactivate_all(&self, user_id: Uuid) -> DatabaseResult<u64> {
        let mut tables = self.tables.lock().await;
        let mut count = 0;

        for session in tables
            .sessions
            .iter_mut()
            .filter(|s| s.user_id == user_id && s.is_active)
        {
            session.is_active = false;
            count += 1;
        }

        Ok(count)
    }

    async fn deactivate_expired(&self) -> DatabaseResult<u64> {
        let now = Utc::now();
        let mut tables = self.tables.lock().await;
        let mut count = 0;

        for session in tables
            .sessions
            .iter_mut()
            .filter(|s| s.is_active && !s.is_usable_at(now))
        {
            session.is_active = false;
            count += 1;
        }

        Ok(count)
    }

    async fn list_active(&self, user_id: Uuid) -> DatabaseResult<Vec<SessionSummary>> {
        let tables = self.tables.lock().await;

        let mut sessions: Vec<SessionSummary> = tables
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.is_active)
            .map(SessionSummary::from)
            .collect();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

        Ok(sessions)
    }
}

#[async_trait]
impl CredentialRepository for MemoryStore {
    async fn upsert(&self, credential: &NewCredential) -> DatabaseResult<()> {
        let now = Utc::now();
        let mut tables = self.tables.lock().await;

        match tables
            .credentials
            .iter_mut()
            .find(|c| c.user_id == credential.user_id && c.provider == credential.provider)
        {
            Some(row) => {
                row.username = credential.username.clone();
                row.encrypted_token = credential.encrypted_token.clone();
                row.scopes = credential.scopes.clone();
                row.last_verified = now;
                row.is_active = true;
                row.updated_at = now;
            }
            None => tables.credentials.push(EncryptedCredential {
                id: Uuid::new_v4(),
                user_id: credential.user_id,
                provider: credential.provider,
                username: credential.username.clone(),
                encrypted_token: credential.encrypted_token.clone(),
                scopes: credential.scopes.clone(),
                last_verified: now,
                is_active: true,
                created_at: now,
                updated_at: now,
            }),
        }

        Ok(())
    }

    async fn find_active(
        &self,
        user_id: Uuid,
        provider: Provider,
    ) -> DatabaseResult<Option<EncryptedCredential>> {
        let tables = self.tables.lock().await;

        Ok(tables
            .credentials
            .iter()
            .find(|c| c.user_id == user_id && c.provider == provider && c.is_active)
            .cloned())
    }

    async fn deactivate(&self, user_id: Uuid, provider: Provider) -> DatabaseResult<bool> {
        let now = Utc::now();
        let mut tables = self.tables.lock().await;

        match tables
            .credentials
            .iter_mut()
            .find(|c| c.user_id == user_id && c.provider == provider && c.is_active)
        {
            Some(row) => {
                row.is_active = false;
                row.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
