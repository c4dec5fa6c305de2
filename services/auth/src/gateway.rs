//! Authentication facade over sessions and signed tokens
//!
//! A bearer token is offered to an ordered chain of strategies. Permanent
//! sessions are consulted before signed tokens so that a revoked session is
//! never rescued by the stateless path.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::error::DatabaseError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::models::{DeviceInfo, LoginCredentials, NewUser, Principal, Role, SessionSummary};
use crate::password::{hash_password, verify_password};
use crate::repositories::UserRepository;
use crate::session::SessionStore;
use crate::token::TokenCodec;
use crate::validation::{validate_email, validate_name, validate_password};

/// Which credential type authenticated a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Permanent,
    Ephemeral,
}

/// Outcome of a successful authorization
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    #[serde(rename = "user")]
    pub principal: Principal,
    pub session_kind: SessionKind,
}

/// Credential handed to the client at login or registration
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCredential {
    pub token: String,
    pub user: Principal,
    pub permanent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request metadata recorded on permanent sessions
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// One way of turning a bearer token into a principal
#[async_trait]
pub trait BearerStrategy: Send + Sync {
    fn kind(&self) -> SessionKind;

    async fn validate(&self, token: &str) -> AuthResult<Principal>;
}

/// Treats the bearer token as a permanent-session secret
pub struct PermanentSessionStrategy {
    sessions: SessionStore,
}

impl PermanentSessionStrategy {
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl BearerStrategy for PermanentSessionStrategy {
    fn kind(&self) -> SessionKind {
        SessionKind::Permanent
    }

    async fn validate(&self, token: &str) -> AuthResult<Principal> {
        self.sessions
            .validate(token)
            .await
            .map(|active| active.principal)
    }
}

/// Treats the bearer token as a signed ephemeral token
pub struct EphemeralTokenStrategy {
    codec: TokenCodec,
}

impl EphemeralTokenStrategy {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }
}

#[async_trait]
impl BearerStrategy for EphemeralTokenStrategy {
    fn kind(&self) -> SessionKind {
        SessionKind::Ephemeral
    }

    async fn validate(&self, token: &str) -> AuthResult<Principal> {
        self.codec
            .verify(token, Utc::now())
            .map(|claims| claims.principal())
    }
}

/// Issues credentials at login and answers "who is this bearer token"
#[derive(Clone)]
pub struct AuthGateway {
    strategies: Arc<Vec<Box<dyn BearerStrategy>>>,
    sessions: SessionStore,
    codec: TokenCodec,
    users: Arc<dyn UserRepository>,
    session_ttl: Option<Duration>,
}

impl AuthGateway {
    /// Build the gateway; `session_ttl` of `None` makes permanent sessions
    /// never expire
    pub fn new(
        codec: TokenCodec,
        sessions: SessionStore,
        users: Arc<dyn UserRepository>,
        session_ttl: Option<Duration>,
    ) -> Self {
        let strategies: Vec<Box<dyn BearerStrategy>> = vec![
            Box::new(PermanentSessionStrategy::new(sessions.clone())),
            Box::new(EphemeralTokenStrategy::new(codec.clone())),
        ];

        Self {
            strategies: Arc::new(strategies),
            sessions,
            codec,
            users,
            session_ttl,
        }
    }

    /// Resolve a bearer token, optionally requiring an exact role
    pub async fn authorize(
        &self,
        token: &str,
        required_role: Option<Role>,
    ) -> AuthResult<AuthContext> {
        for strategy in self.strategies.iter() {
            match strategy.validate(token).await {
                Ok(principal) => {
                    if let Some(required) = required_role {
                        if principal.role != required {
                            warn!(
                                "User {} with role {} denied; {} required",
                                principal.id, principal.role, required
                            );
                            return Err(AuthError::ForbiddenRole { required });
                        }
                    }

                    return Ok(AuthContext {
                        principal,
                        session_kind: strategy.kind(),
                    });
                }
                Err(e) if e.is_authentication_failure() => {
                    debug!("{:?} strategy rejected bearer token: {}", strategy.kind(), e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(AuthError::Unauthenticated)
    }

    /// Verify credentials and issue exactly one artifact: a permanent session
    /// when `remember_me`, otherwise an ephemeral token
    pub async fn login(
        &self,
        credentials: &LoginCredentials,
        remember_me: bool,
        client: &ClientInfo,
    ) -> AuthResult<IssuedCredential> {
        info!("Login attempt for user: {}", credentials.email);

        let user = self
            .users
            .find_by_email(credentials.email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&credentials.password, &user.password_hash)? {
            warn!("Invalid password for user: {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let principal = user.principal();

        if remember_me {
            let device_info =
                DeviceInfo::detect(client.user_agent.as_deref(), client.ip_address.as_deref());
            let issued = self
                .sessions
                .issue(
                    principal.id,
                    Some(device_info.to_json()),
                    client.ip_address.clone(),
                    self.session_ttl,
                )
                .await?;

            Ok(IssuedCredential {
                token: issued.secret,
                user: principal,
                permanent: true,
                session_id: Some(issued.session_id),
                expires_at: None,
            })
        } else {
            self.issue_ephemeral(principal)
        }
    }

    /// Create an account and sign the new user in with an ephemeral token
    pub async fn register(&self, new_user: &NewUser) -> AuthResult<IssuedCredential> {
        let name = new_user.name.trim();
        let email = new_user.email.trim();

        validate_name(name).map_err(AuthError::Validation)?;
        validate_email(email).map_err(AuthError::Validation)?;
        validate_password(&new_user.password).map_err(AuthError::Validation)?;

        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&new_user.password)?;
        // A concurrent registration can still win between the check and the insert.
        let user = self
            .users
            .create(name, email, &password_hash)
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Storage(other),
            })?;
        info!("Registered user: {}", user.id);

        self.issue_ephemeral(user.principal())
    }

    fn issue_ephemeral(&self, principal: Principal) -> AuthResult<IssuedCredential> {
        let issued = self.codec.issue(&principal)?;

        Ok(IssuedCredential {
            token: issued.token,
            user: principal,
            permanent: false,
            session_id: None,
            expires_at: Some(issued.expires_at),
        })
    }

    /// Revoke the presented token if it is a permanent session
    ///
    /// Ephemeral tokens cannot be revoked; the client discards them.
    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        self.sessions.revoke(token).await?;
        Ok(())
    }

    /// Revoke every permanent session of a principal
    pub async fn logout_all(&self, user_id: Uuid) -> AuthResult<u64> {
        self.sessions.revoke_all(user_id).await
    }

    pub async fn list_active_sessions(&self, user_id: Uuid) -> AuthResult<Vec<SessionSummary>> {
        self.sessions.list_active(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::repositories::MemoryStore;
    use crate::token::TokenConfig;

    const PASSWORD: &str = "hunter2hunter2";

    fn codec() -> TokenCodec {
        TokenCodec::new(TokenConfig {
            secret: "gateway-test-secret-gateway-test-secret".to_string(),
            expiry: 3600,
        })
    }

    fn gateway(memory: &MemoryStore) -> AuthGateway {
        AuthGateway::new(
            codec(),
            SessionStore::new(Arc::new(memory.clone())),
            Arc::new(memory.clone()),
            None,
        )
    }

    async fn seed(memory: &MemoryStore, email: &str, role: Role) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Seeded".to_string(),
            email: email.to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            role,
            created_at: now,
            updated_at: now,
        };
        memory.insert_user(user.clone()).await;
        user
    }

    fn credentials(email: &str) -> LoginCredentials {
        LoginCredentials {
            email: email.to_string(),
            password: PASSWORD.to_string(),
        }
    }

    fn browser() -> ClientInfo {
        ClientInfo {
            user_agent: Some("Mozilla/5.0 (Macintosh) Firefox/121.0".to_string()),
            ip_address: Some("203.0.113.7".to_string()),
        }
    }

    #[tokio::test]
    async fn test_remember_me_issues_only_a_session() {
        let memory = MemoryStore::new();
        let gateway = gateway(&memory);
        let user = seed(&memory, "ada@example.com", Role::User).await;

        let issued = gateway
            .login(&credentials("ada@example.com"), true, &browser())
            .await
            .unwrap();
        assert!(issued.permanent);
        assert!(issued.session_id.is_some());
        assert!(issued.expires_at.is_none());
        assert!(codec().decode(&issued.token).is_err());

        let sessions = gateway.list_active_sessions(user.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].ip_address.as_deref(), Some("203.0.113.7"));
        let device = sessions[0].device_info.as_deref().unwrap();
        assert!(device.contains("\"browser\":\"Firefox\""));
        assert!(device.contains("\"device_type\":\"desktop\""));

        let context = gateway.authorize(&issued.token, None).await.unwrap();
        assert_eq!(context.session_kind, SessionKind::Permanent);
        assert_eq!(context.principal.id, user.id);
    }

    #[tokio::test]
    async fn test_plain_login_issues_only_a_token() {
        let memory = MemoryStore::new();
        let gateway = gateway(&memory);
        let user = seed(&memory, "ada@example.com", Role::User).await;

        let issued = gateway
            .login(&credentials("ada@example.com"), false, &browser())
            .await
            .unwrap();
        assert!(!issued.permanent);
        assert!(issued.expires_at.is_some());
        assert!(memory.sessions_for(user.id).await.is_empty());

        let context = gateway.authorize(&issued.token, None).await.unwrap();
        assert_eq!(context.session_kind, SessionKind::Ephemeral);
        assert_eq!(context.principal, user.principal());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let memory = MemoryStore::new();
        let gateway = gateway(&memory);
        seed(&memory, "ada@example.com", Role::User).await;

        let wrong_password = LoginCredentials {
            email: "ada@example.com".to_string(),
            password: "not-the-password".to_string(),
        };
        let err = gateway
            .login(&wrong_password, false, &ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = gateway
            .login(&credentials("nobody@example.com"), true, &ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_logout_all_leaves_later_logins_alone() {
        let memory = MemoryStore::new();
        let gateway = gateway(&memory);
        let user = seed(&memory, "ada@example.com", Role::User).await;

        let mut secrets = Vec::new();
        for _ in 0..3 {
            let issued = gateway
                .login(&credentials("ada@example.com"), true, &browser())
                .await
                .unwrap();
            secrets.push(issued.token);
        }
        assert_eq!(gateway.list_active_sessions(user.id).await.unwrap().len(), 3);

        assert_eq!(gateway.logout_all(user.id).await.unwrap(), 3);
        for secret in &secrets {
            let err = gateway.authorize(secret, None).await.unwrap_err();
            assert!(matches!(err, AuthError::Unauthenticated));
        }

        let fresh = gateway
            .login(&credentials("ada@example.com"), true, &browser())
            .await
            .unwrap();
        assert!(gateway.authorize(&fresh.token, None).await.is_ok());
        assert_eq!(gateway.list_active_sessions(user.id).await.unwrap().len(), 1);
        assert_eq!(memory.sessions_for(user.id).await.len(), 4);
    }

    #[tokio::test]
    async fn test_admin_requirement_is_forbidden_not_unauthenticated() {
        let memory = MemoryStore::new();
        let gateway = gateway(&memory);
        seed(&memory, "ada@example.com", Role::User).await;
        seed(&memory, "root@example.com", Role::Admin).await;

        let user_token = gateway
            .login(&credentials("ada@example.com"), false, &browser())
            .await
            .unwrap()
            .token;
        let err = gateway
            .authorize(&user_token, Some(Role::Admin))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::ForbiddenRole {
                required: Role::Admin
            }
        ));

        let admin_session = gateway
            .login(&credentials("root@example.com"), true, &browser())
            .await
            .unwrap()
            .token;
        let context = gateway
            .authorize(&admin_session, Some(Role::Admin))
            .await
            .unwrap();
        assert_eq!(context.principal.role, Role::Admin);

        // Exact match: an admin does not satisfy a `user` requirement.
        let err = gateway
            .authorize(&admin_session, Some(Role::User))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ForbiddenRole { .. }));
    }

    #[tokio::test]
    async fn test_bad_tokens_collapse_to_unauthenticated() {
        let memory = MemoryStore::new();
        let gateway = gateway(&memory);
        let user = seed(&memory, "ada@example.com", Role::User).await;

        let expired = codec()
            .encode(
                &user.principal(),
                Utc::now() - Duration::hours(2),
                Duration::hours(1),
            )
            .unwrap();
        let foreign = TokenCodec::new(TokenConfig {
            secret: "someone-else-entirely-someone-else".to_string(),
            expiry: 3600,
        })
        .issue(&user.principal())
        .unwrap()
        .token;

        for token in [expired.as_str(), foreign.as_str(), "garbage", ""] {
            let err = gateway.authorize(token, None).await.unwrap_err();
            assert!(matches!(err, AuthError::Unauthenticated), "{}", token);
        }
    }

    #[tokio::test]
    async fn test_logout_revokes_session_and_ignores_tokens() {
        let memory = MemoryStore::new();
        let gateway = gateway(&memory);
        seed(&memory, "ada@example.com", Role::User).await;

        let session = gateway
            .login(&credentials("ada@example.com"), true, &browser())
            .await
            .unwrap();
        gateway.logout(&session.token).await.unwrap();
        assert!(gateway.authorize(&session.token, None).await.is_err());

        let token = gateway
            .login(&credentials("ada@example.com"), false, &browser())
            .await
            .unwrap();
        gateway.logout(&token.token).await.unwrap();
        // No server-side revocation for ephemeral tokens.
        assert!(gateway.authorize(&token.token, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_register_issues_token_and_rejects_duplicates() {
        let memory = MemoryStore::new();
        let gateway = gateway(&memory);
        let new_user = NewUser {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: PASSWORD.to_string(),
        };

        let issued = gateway.register(&new_user).await.unwrap();
        assert!(!issued.permanent);
        assert_eq!(issued.user.role, Role::User);
        assert!(gateway.authorize(&issued.token, None).await.is_ok());
        assert!(
            gateway
                .login(&credentials("ada@example.com"), false, &browser())
                .await
                .is_ok()
        );

        let err = gateway.register(&new_user).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));

        let err = gateway
            .register(&NewUser {
                password: "short".to_string(),
                email: "other@example.com".to_string(),
                ..new_user
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    /// Lookup that never sees existing users, as when a concurrent
    /// registration commits between the check and the insert
    struct StaleLookup(MemoryStore);

    #[async_trait]
    impl UserRepository for StaleLookup {
        async fn create(
            &self,
            name: &str,
            email: &str,
            password_hash: &str,
        ) -> common::error::DatabaseResult<User> {
            self.0.create(name, email, password_hash).await
        }

        async fn find_by_email(&self, _email: &str) -> common::error::DatabaseResult<Option<User>> {
            Ok(None)
        }

        async fn find_by_id(&self, id: Uuid) -> common::error::DatabaseResult<Option<User>> {
            self.0.find_by_id(id).await
        }
    }

    #[tokio::test]
    async fn test_register_race_reports_email_taken() {
        let memory = MemoryStore::new();
        let gateway = AuthGateway::new(
            codec(),
            SessionStore::new(Arc::new(memory.clone())),
            Arc::new(StaleLookup(memory.clone())),
            None,
        );
        let new_user = NewUser {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: PASSWORD.to_string(),
        };

        gateway.register(&new_user).await.unwrap();
        let err = gateway.register(&new_user).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn test_session_ttl_is_applied() {
        let memory = MemoryStore::new();
        let gateway = AuthGateway::new(
            codec(),
            SessionStore::new(Arc::new(memory.clone())),
            Arc::new(memory.clone()),
            Some(Duration::days(30)),
        );
        let user = seed(&memory, "ada@example.com", Role::User).await;

        gateway
            .login(&credentials("ada@example.com"), true, &browser())
            .await
            .unwrap();

        let sessions = gateway.list_active_sessions(user.id).await.unwrap();
        let expires_at = sessions[0].expires_at.unwrap();
        assert!(expires_at > Utc::now() + Duration::days(29));
    }
}
