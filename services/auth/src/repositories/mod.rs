//! Storage seams for users, sessions and third-party credentials
//!
//! Each trait has a PostgreSQL implementation used by the service and an
//! in-process [`MemoryStore`] implementation.

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    ActiveSession, EncryptedCredential, NewCredential, NewSession, Provider, SessionSummary, User,
};

pub mod credential;
pub mod memory;
pub mod session;
pub mod user;

pub use credential::PgCredentialRepository;
pub use memory::MemoryStore;
pub use session::PgSessionRepository;
pub use user::PgUserRepository;

/// Principal store
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user with role `user`; a taken email is `DatabaseError::Conflict`
    async fn create(&self, name: &str, email: &str, password_hash: &str) -> DatabaseResult<User>;

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>>;
}

/// Persistence for permanent sessions; all lookups are by token hash
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new active session, returning its id
    async fn insert(&self, session: &NewSession) -> DatabaseResult<Uuid>;

    /// Find an active, unexpired session together with its owner
    async fn find_active_by_hash(&self, token_hash: &str) -> DatabaseResult<Option<ActiveSession>>;

    /// Advance `last_activity` on an active session
    async fn touch(&self, token_hash: &str) -> DatabaseResult<()>;

    /// Soft-revoke one session; returns whether a row matched
    async fn deactivate(&self, token_hash: &str) -> DatabaseResult<bool>;

    /// Soft-revoke every session of a user; returns the number of rows flipped
    async fn deactivate_all(&self, user_id: Uuid) -> DatabaseResult<u64>;

    /// Soft-revoke active sessions whose expiry has passed
    async fn deactivate_expired(&self) -> DatabaseResult<u64>;

    /// Active sessions of a user, most recently used first
    async fn list_active(&self, user_id: Uuid) -> DatabaseResult<Vec<SessionSummary>>;
}

/// Persistence for encrypted third-party credentials
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Insert or replace the single row for (user, provider) and mark it active
    async fn upsert(&self, credential: &NewCredential) -> DatabaseResult<()>;

    async fn find_active(
        &self,
        user_id: Uuid,
        provider: Provider,
    ) -> DatabaseResult<Option<EncryptedCredential>>;

    /// Soft-delete; returns whether an active row was flipped
    async fn deactivate(&self, user_id: Uuid, provider: Provider) -> DatabaseResult<bool>;
}

/// Apply the embedded schema migrations
pub async fn migrate(pool: &PgPool) -> DatabaseResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| common::error::DatabaseError::Migration(e.to_string()))
}
